//! Build script for the Spotify client library.
//!
//! Copies the `.env.example` configuration template into the user's local
//! data directory, next to where [`config::load_env`] looks for `.env`.
//!
//! # Destination Location
//!
//! - Linux: `~/.local/share/sporlclient/.env.example`
//! - macOS: `~/Library/Application Support/sporlclient/.env.example`
//! - Windows: `%LOCALAPPDATA%/sporlclient/.env.example`
//!
//! A missing template or an unwritable data directory only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let env_example_path = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("sporlclient");

    if env_example_path.is_file() {
        let contents = fs::read_to_string(&env_example_path)?;
        let copied = fs::create_dir_all(&out_dir)
            .and_then(|_| fs::write(out_dir.join(".env.example"), contents));
        if let Err(e) = copied {
            println!(
                "cargo:warning=could not copy .env.example to {}: {}",
                out_dir.display(),
                e
            );
        }
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
    }

    Ok(())
}
