//! Serves a mirrored site for offline viewing.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin serve                       # ./output on port 8080
//! cargo run --bin serve -- --dir site -p 3000
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use site_mirror::{config::DEFAULT_OUTPUT_DIR, logging, serve};

#[derive(Debug, Parser)]
#[command(name = "serve", about = "Serve a mirrored site locally")]
struct Cli {
    /// Directory produced by `mirror`
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    dir: PathBuf,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let cli = Cli::parse();
    println!("Press Ctrl+C to stop");
    serve(cli.dir, cli.port).await?;

    Ok(())
}
