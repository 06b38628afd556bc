use anyhow::{Context, Result};
use prefixdb::{parse_address, Database, LoadMode};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli_utils::format_search_line;

#[derive(Serialize)]
struct SearchResult<'a> {
    address: &'a str,
    matched: bool,
}

pub fn cmd_search(
    database: PathBuf,
    addresses: Vec<String>,
    json_output: bool,
    mmap: bool,
) -> Result<()> {
    let mode = if mmap { LoadMode::Mmap } else { LoadMode::Copy };
    let db = Database::from_path(&database)
        .mode(mode)
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let mut results = Vec::with_capacity(addresses.len());
    for address in &addresses {
        // unparseable addresses simply do not match
        let matched = match parse_address(address) {
            Ok(parsed) => db
                .lookup(parsed)
                .with_context(|| format!("Search failed for: {}", address))?
                .is_match(),
            Err(_) => false,
        };
        results.push(SearchResult { address, matched });
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            println!("{}", format_search_line(result.address, result.matched));
        }
    }
    Ok(())
}
