#![no_main]
use libfuzzer_sys::fuzz_target;
use prefixdb::{BufferMode, Database};

fn covered(prefixes: &[(u32, u8)], address: u32) -> bool {
    prefixes
        .iter()
        .any(|&(network, length)| (network ^ address) & (u32::MAX << (32 - length as u32)) == 0)
}

fuzz_target!(|data: &[u8]| {
    // Each 5-byte chunk is a prefix: 4 address bytes and a length
    let prefixes: Vec<(u32, u8)> = data
        .chunks_exact(5)
        .map(|c| {
            let address = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
            (address, c[4] % 32 + 1)
        })
        .collect();

    let mut db = Database::new();
    for &(address, length) in &prefixes {
        db.insert(address, length).unwrap();
    }
    let bytes = db.to_vec().unwrap();
    let loaded = Database::load_bytes(&bytes, BufferMode::Borrow).unwrap();

    for &(address, _) in &prefixes {
        for probe in [address, address.wrapping_add(1), address.wrapping_sub(1), !address] {
            let expected = covered(&prefixes, probe);
            assert_eq!(loaded.lookup(probe).unwrap().is_match(), expected);
        }
    }
});
