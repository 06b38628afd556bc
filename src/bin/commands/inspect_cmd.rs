use anyhow::{Context, Result};
use prefixdb::Database;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let db = Database::from_path(&database)
        .mmap()
        .open()
        .with_context(|| format!("Failed to load database: {}", database.display()))?;

    let stats = db.stats();
    let layout = stats
        .layout
        .context("Loaded database holds no serialized store")?;

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "version": format!("{:#06x}", layout.version),
            "nodes_count": layout.nodes_count,
            "records_size": layout.records_size,
            "field_bits": layout.records_size as u32 * 8,
            "total_size": layout.total_size,
            "empty": layout.nodes_count == 0,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Database:     {}", database.display());
        println!(
            "Version:      {}.{}",
            layout.version >> 8,
            layout.version & 0xff
        );
        println!("Records:      {}", format_number(layout.nodes_count as usize));
        println!(
            "Field width:  {} bytes ({} bits)",
            layout.records_size,
            layout.records_size as u32 * 8
        );
        println!(
            "Size:         {} ({} bytes)",
            format_bytes(layout.total_size as usize),
            layout.total_size
        );
        if layout.nodes_count == 0 {
            println!();
            println!("Database is empty: no address matches.");
        }
    }
    Ok(())
}
