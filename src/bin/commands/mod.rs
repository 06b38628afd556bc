pub mod bench_cmd;
pub mod import_cmd;
pub mod inspect_cmd;
pub mod search_cmd;

pub use bench_cmd::cmd_bench;
pub use import_cmd::cmd_import;
pub use inspect_cmd::cmd_inspect;
pub use search_cmd::cmd_search;
