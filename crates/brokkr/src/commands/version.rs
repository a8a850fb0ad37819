//! `brokkr version` - show version information

use crate::cli::VersionArgs;
use anyhow::Result;

pub fn run(args: VersionArgs) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    if args.json {
        println!("{}", serde_json::json!({ "name": "brokkr", "version": version }));
    } else {
        println!("brokkr {}", version);
    }

    Ok(())
}
