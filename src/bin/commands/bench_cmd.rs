use anyhow::{bail, Result};
use prefixdb::{Database, LoadMode, Lookup};
use rand::Rng;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::cli_utils::{format_bytes, format_number, format_qps, rate};

fn report(label: &str, ok: bool, elapsed: Duration, detail: Option<String>) {
    println!(
        "{:<28}{} [{:.6}s]{}",
        label,
        if ok { "pass" } else { "fail" },
        elapsed.as_secs_f64(),
        detail.map(|d| format!(" [{}]", d)).unwrap_or_default()
    );
}

fn random_octet<R: Rng>(rng: &mut R, max: u8) -> u8 {
    rng.random_range(1..=max)
}

pub fn cmd_bench(
    prefixes: usize,
    searches: usize,
    output: Option<PathBuf>,
    keep: bool,
) -> Result<()> {
    println!("=== PrefixDB Benchmark ===\n");
    println!("Configuration:");
    println!("  Prefixes:   {} (random /16 to /27)", format_number(prefixes));
    println!("  Searches:   {}", format_number(searches));
    println!();

    let path = output.unwrap_or_else(|| {
        std::env::temp_dir().join(format!("prefixdb_bench_{}.pfdb", std::process::id()))
    });
    let mut rng = rand::rng();
    let mut failed = false;

    let start = Instant::now();
    let mut db = Database::new();
    report("allocate empty database", true, start.elapsed(), None);

    let start = Instant::now();
    let mut errors = 0usize;
    for _ in 0..prefixes {
        let address = Ipv4Addr::new(
            random_octet(&mut rng, 223),
            random_octet(&mut rng, 223),
            random_octet(&mut rng, 223),
            random_octet(&mut rng, 223),
        );
        let length = rng.random_range(16..=27);
        if db.insert(address, length).is_err() {
            errors += 1;
        }
    }
    let elapsed = start.elapsed();
    report(
        &format!("add {} prefixes", prefixes),
        errors == 0,
        elapsed,
        Some(format!("{} prefixes/s", format_qps(rate(prefixes, elapsed)))),
    );
    failed |= errors > 0;

    let start = Instant::now();
    let saved = db.save(&path);
    let elapsed = start.elapsed();
    let size = match &saved {
        Ok(()) => Some(format_bytes(db.to_bytes()?.len())),
        Err(err) => Some(err.to_string()),
    };
    report("save database", saved.is_ok(), elapsed, size);
    failed |= saved.is_err();

    let start = Instant::now();
    let released = db.release();
    report("release database", released.is_ok(), start.elapsed(), None);
    failed |= released.is_err();

    let start = Instant::now();
    let loaded = Database::load_file(&path, LoadMode::Copy);
    report("load database", loaded.is_ok(), start.elapsed(), None);

    match loaded {
        Ok(mut db) => {
            let (mut matched, mut unmatched, mut errors) = (0usize, 0usize, 0usize);
            let start = Instant::now();
            for _ in 0..searches {
                let address = Ipv4Addr::new(
                    random_octet(&mut rng, 253),
                    random_octet(&mut rng, 253),
                    random_octet(&mut rng, 253),
                    random_octet(&mut rng, 253),
                );
                match db.search(address) {
                    Ok(Lookup::Match) => matched += 1,
                    Ok(Lookup::NoMatch) => unmatched += 1,
                    Err(_) => errors += 1,
                }
            }
            let elapsed = start.elapsed();
            report(
                &format!("search {} addresses", searches),
                errors == 0,
                elapsed,
                Some(format!(
                    "{} searches/s - {} matched - {} unmatched",
                    format_qps(rate(searches, elapsed)),
                    format_number(matched),
                    format_number(unmatched)
                )),
            );
            failed |= errors > 0;

            let start = Instant::now();
            let released = db.release();
            report("release database", released.is_ok(), start.elapsed(), None);
            failed |= released.is_err();
        }
        Err(_) => failed = true,
    }

    println!();
    if keep {
        println!("Database kept: {}", path.display());
    } else {
        let _ = std::fs::remove_file(&path);
    }

    if failed {
        bail!("benchmark failed");
    }
    println!("✓ Benchmark complete");
    Ok(())
}
