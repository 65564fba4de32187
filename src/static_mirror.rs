//! Mirroring by plain HTTP fetches and text scanning.
//!
//! The root document is fetched first. Links found in it are mirrored one at
//! a time, in discovery order: `href` values, then `src` values, then CSS
//! `url(...)` references. A linked stylesheet is scanned once more for its
//! own `url(...)` references; whatever those point at is mirrored but not
//! scanned again, so stylesheet recursion stops one level down.

use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::{MirrorError, ResourceError},
    fetch::Fetcher,
    ledger::DedupLedger,
    links,
    summary::MirrorSummary,
    target::MirrorTarget,
    writer::ResourceWriter,
};

/// Sequential mirror driver for the static strategy.
pub struct StaticMirror<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    target: &'a MirrorTarget,
    writer: &'a ResourceWriter,
    ledger: &'a DedupLedger,
    summary: MirrorSummary,
}

impl<'a, F: Fetcher + ?Sized> StaticMirror<'a, F> {
    pub fn new(
        fetcher: &'a F,
        target: &'a MirrorTarget,
        writer: &'a ResourceWriter,
        ledger: &'a DedupLedger,
    ) -> Self {
        Self {
            fetcher,
            target,
            writer,
            ledger,
            summary: MirrorSummary::default(),
        }
    }

    /// Runs the mirror to completion.
    ///
    /// # Errors
    ///
    /// Only a failure to fetch or decode the root document is returned.
    /// Every other failure is logged and counted in the summary.
    pub async fn run(mut self) -> Result<MirrorSummary, MirrorError> {
        let root = self.target.url().clone();
        self.ledger.mark(root.as_str());

        let body = self
            .fetch_decoded(&root)
            .await
            .map_err(|source| MirrorError::RootFetch {
                url: root.to_string(),
                source,
            })?;
        self.save(&root, &body).await;

        let document = String::from_utf8_lossy(&body);
        let discovered = links::discover(&document);
        debug!(count = discovered.len(), "links discovered in root document");

        for link in discovered {
            let Some(body) = self.mirror_link(&link).await else {
                continue;
            };
            if links::is_stylesheet(&link) {
                let stylesheet = String::from_utf8_lossy(&body);
                for nested in links::extract_css_links(&stylesheet) {
                    self.mirror_link(&nested).await;
                }
            }
        }

        Ok(self.summary)
    }

    /// Mirrors one discovered path. Returns the decoded body when the
    /// resource was fetched by this call.
    async fn mirror_link(&mut self, link: &str) -> Option<Vec<u8>> {
        let resolved = self.target.resolve(link);
        let url = match Url::parse(&resolved) {
            Ok(url) => url,
            Err(source) => {
                let err = ResourceError::InvalidUrl {
                    url: resolved,
                    source,
                };
                warn!(error = %err, "skipping resource");
                self.summary.failed += 1;
                return None;
            }
        };

        if !self.ledger.should_fetch(url.as_str()) {
            debug!(%url, "already mirrored");
            self.summary.skipped += 1;
            return None;
        }

        match self.fetch_decoded(&url).await {
            Ok(body) => {
                self.save(&url, &body).await;
                Some(body)
            }
            Err(err) => {
                warn!(%url, error = %err, "skipping resource");
                self.summary.failed += 1;
                None
            }
        }
    }

    async fn fetch_decoded(&self, url: &Url) -> Result<Vec<u8>, ResourceError> {
        let resource = self.fetcher.fetch(url.as_str()).await?;
        if !resource.status.is_success() {
            debug!(%url, status = %resource.status, "keeping non-success response as-is");
        }
        Ok(resource.into_envelope().decode()?)
    }

    async fn save(&mut self, url: &Url, body: &[u8]) {
        match self.writer.save_resource(self.target, url, body).await {
            Ok(saved) => {
                info!("{} -> {}", saved.url, saved.path.display());
                self.summary.saved += 1;
            }
            Err(err) => {
                warn!(%url, error = %err, "failed to save resource");
                self.summary.failed += 1;
            }
        }
    }
}

/// Mirrors `target` with the static strategy.
pub async fn mirror_static<F: Fetcher + ?Sized>(
    fetcher: &F,
    target: &MirrorTarget,
    writer: &ResourceWriter,
    ledger: &DedupLedger,
) -> Result<MirrorSummary, MirrorError> {
    StaticMirror::new(fetcher, target, writer, ledger).run().await
}
