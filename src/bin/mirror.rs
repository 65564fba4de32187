//! Mirrors a web page and its same-origin assets to disk.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin mirror -- https://example.com
//! cargo run --bin mirror -- --strategy static -o site https://example.com/docs/
//! ```

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use site_mirror::{
    MirrorConfig, Strategy,
    config::{DEFAULT_OUTPUT_DIR, DEFAULT_SCROLL_STEPS, DEFAULT_USER_AGENT},
    logging, mirror,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mirror", about = "Mirror a web page and its assets to disk")]
struct Cli {
    /// Page to mirror
    url: String,

    /// User-Agent name
    #[arg(short = 'A', long = "agent", env = "MIRROR_AGENT", default_value = DEFAULT_USER_AGENT)]
    agent: String,

    /// Output directory
    #[arg(short, long, env = "MIRROR_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Link discovery strategy: `live` (headless Chromium) or `static` (HTML/CSS scan)
    #[arg(short, long, default_value_t = Strategy::Live)]
    strategy: Strategy,

    /// Viewport-height scroll steps after the page loads (live only)
    #[arg(long, default_value_t = DEFAULT_SCROLL_STEPS)]
    scrolls: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Seconds to wait for outstanding intercepted requests (live only)
    #[arg(long, default_value_t = 120)]
    idle_timeout: u64,

    /// Chromium executable (live only)
    #[arg(long, env = "CHROME")]
    chrome: Option<PathBuf>,
}

impl From<Cli> for MirrorConfig {
    fn from(cli: Cli) -> Self {
        Self {
            user_agent: cli.agent,
            output_dir: cli.output_dir,
            strategy: cli.strategy,
            scroll_steps: cli.scrolls,
            request_timeout: Duration::from_secs(cli.timeout),
            idle_timeout: Duration::from_secs(cli.idle_timeout),
            chrome_executable: cli.chrome,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let cli = Cli::parse();
    let url = cli.url.clone();
    let config = MirrorConfig::from(cli);

    let summary = mirror(&url, &config).await?;
    info!("done: {summary}");
    println!(
        "Run `cargo run --bin serve -- --dir {}` to view offline.",
        config.output_dir.display()
    );

    Ok(())
}
