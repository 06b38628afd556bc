use anyhow::{Context, Result};
use prefixdb::Database;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_import(list: PathBuf, database: PathBuf) -> Result<()> {
    let start = Instant::now();
    let mut db = Database::new();

    let count = db
        .insert_file(&list)
        .with_context(|| format!("Failed to import prefix list: {}", list.display()))?;
    db.save(&database)
        .with_context(|| format!("Failed to save database: {}", database.display()))?;

    let size = db.to_bytes()?.len();
    eprintln!(
        "Imported {} prefixes into {} ({}) in {:.3}s",
        format_number(count),
        database.display(),
        format_bytes(size),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
