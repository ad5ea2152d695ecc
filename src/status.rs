//! Index status report for `dqa status`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::store::index_status;

pub fn run_status(config: &Config) -> Result<()> {
    match index_status(&config.storage.index_dir)? {
        None => {
            println!("index: not built");
            println!(
                "  run `dqa ingest` to build it from {}",
                config.storage.uploads_dir.display()
            );
        }
        Some(status) => {
            println!("index: ready");
            println!("  passages: {}", status.passages);
            println!("  vector dims: {}", status.dims);
            if let Some(built_at) = status.built_at {
                let ts: DateTime<Utc> = built_at.into();
                println!("  built: {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            println!("  location: {}", config.storage.index_dir.display());
        }
    }
    Ok(())
}
