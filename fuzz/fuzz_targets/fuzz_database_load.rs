#![no_main]
use libfuzzer_sys::fuzz_target;
use prefixdb::{BufferMode, Database};

fuzz_target!(|data: &[u8]| {
    // Garbage must be rejected or answered, never crash
    if let Ok(mut db) = Database::load_bytes(data, BufferMode::Borrow) {
        for address in [0u32, 0x0A00_0001, 0x8000_0000, 0xC0A8_0101, u32::MAX] {
            let _ = db.lookup(address);
        }
        // thawing a hostile store must fail cleanly too
        if db.insert(0x0102_0304u32, 32).is_ok() {
            let _ = db.search(0x0102_0304u32);
        }
    }
});
