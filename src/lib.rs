//! # Site Mirror
//!
//! A library for mirroring a web page and its same-origin assets to disk so
//! the copy can be served statically.
//!
//! Two discovery strategies share one decode-and-write core:
//!
//! 1. **Static** - Fetch the page over HTTP and scan its HTML and CSS text for
//!    root-relative asset references.
//!
//! 2. **Live** - Load the page in headless Chromium, intercept every
//!    same-origin request it makes and save the responses.
//!
//! Every resource is written once, at `<output>/<url path>`; the root document
//! is always `<output>/index.html`. [`serve`] puts the result back online.
//!
//! ## Example
//!
//! ```no_run
//! use site_mirror::{MirrorConfig, Strategy, mirror};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MirrorConfig {
//!         strategy: Strategy::Static,
//!         ..MirrorConfig::default()
//!     };
//!     let summary = mirror("https://example.com", &config).await?;
//!     println!("{summary}");
//!
//!     site_mirror::serve(&config.output_dir, 8080).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod links;
pub mod live;
pub mod logging;
pub mod static_mirror;
pub mod summary;
pub mod target;
pub mod tracker;
pub mod writer;

mod serve;

use std::sync::Arc;

use tracing::info;

pub use config::{MirrorConfig, Strategy};
pub use error::MirrorError;
pub use fetch::{Fetcher, HttpFetcher};
pub use ledger::DedupLedger;
pub use serve::serve;
pub use summary::MirrorSummary;
pub use target::MirrorTarget;
pub use writer::ResourceWriter;

use live::{ChromiumSession, Interceptor, LiveMirror};
use tracker::CompletionTracker;

/// Mirrors `url` into `config.output_dir` using `config.strategy`.
///
/// # Errors
///
/// Returns a [`MirrorError`] when the run cannot proceed at all: the URL does
/// not parse, the root document cannot be fetched, or the browser cannot be
/// started. Failures on individual resources only show up in the summary.
pub async fn mirror(url: &str, config: &MirrorConfig) -> Result<MirrorSummary, MirrorError> {
    let target = MirrorTarget::parse(url)?;
    let writer = ResourceWriter::new(&config.output_dir);
    let ledger = Arc::new(DedupLedger::new());
    let fetcher = HttpFetcher::new(config)?;

    info!(
        url = target.as_str(),
        strategy = %config.strategy,
        output = %config.output_dir.display(),
        "mirroring"
    );

    match config.strategy {
        Strategy::Static => {
            static_mirror::mirror_static(&fetcher, &target, &writer, &ledger).await
        }
        Strategy::Live => {
            let tracker = CompletionTracker::new();
            let (interceptor, receiver) = Interceptor::new(Arc::new(fetcher), tracker.clone());
            let session = ChromiumSession::launch(config, &target, interceptor).await?;

            LiveMirror::new(
                target,
                writer,
                ledger,
                config.scroll_steps,
                config.idle_timeout,
            )
            .run(session, receiver, tracker)
            .await
        }
    }
}
