#![no_main]
use libfuzzer_sys::fuzz_target;
use prefixdb::Database;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let mut db = Database::new();
        if db.insert_str(text).is_ok() {
            let _ = db.search_str(text.split('/').next().unwrap_or(text));
        }
    }
});
