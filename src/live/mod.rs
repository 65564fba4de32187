//! Mirroring by observing a real browser's network traffic.
//!
//! The browser session pauses every same-origin request, hands a copy of it
//! to an [`Interceptor`] which performs the real fetch, and answers the page with
//! the response it got. Each response is also posted onto a channel; a
//! consumer task drains it, skipping HTML and writing everything else.
//! A [`CompletionTracker`] keeps the run alive until every intercepted
//! request has been written or dropped.

mod chromium;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

pub use chromium::ChromiumSession;

use crate::{
    error::{FetchError, MirrorError, ResourceError},
    fetch::{FetchRequest, FetchedResource, Fetcher},
    ledger::DedupLedger,
    summary::MirrorSummary,
    target::MirrorTarget,
    tracker::{CompletionTracker, InFlight},
    writer::{INDEX_FILE, ResourceWriter},
};

/// A response observed in flight, plus the tracker slot it occupies.
#[derive(Debug)]
pub struct CapturedResponse {
    pub resource: FetchedResource,
    guard: InFlight,
}

/// Transport-independent half of request interception.
///
/// Browser adapters call [`begin`](Self::begin) as soon as a request is
/// paused and [`intercept`](Self::intercept) to perform it.
#[derive(Clone)]
pub struct Interceptor {
    fetcher: Arc<dyn Fetcher>,
    sender: mpsc::UnboundedSender<CapturedResponse>,
    tracker: CompletionTracker,
}

impl Interceptor {
    /// Creates an interceptor and the receiving end of its capture channel.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        tracker: CompletionTracker,
    ) -> (Self, mpsc::UnboundedReceiver<CapturedResponse>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let interceptor = Self {
            fetcher,
            sender,
            tracker,
        };
        (interceptor, receiver)
    }

    /// Registers a new in-flight request.
    pub fn begin(&self) -> InFlight {
        self.tracker.start()
    }

    /// Performs `request` and queues the response for saving.
    ///
    /// The returned resource is what the browser should be answered with.
    /// On error the slot is released immediately.
    pub async fn intercept(
        &self,
        guard: InFlight,
        request: FetchRequest,
    ) -> Result<FetchedResource, FetchError> {
        let resource = self.fetcher.send(request).await?;
        let url = resource.url.as_str();
        let captured = CapturedResponse {
            resource: resource.clone(),
            guard,
        };
        if self.sender.send(captured).is_err() {
            debug!(url, "capture channel closed, response not saved");
        }
        Ok(resource)
    }
}

/// A browser that can be driven through one page load.
#[async_trait]
pub trait CaptureSession: Send {
    /// Loads the target and waits for the load event.
    async fn navigate(&mut self, target: &MirrorTarget) -> Result<(), MirrorError>;

    /// Scrolls down one viewport height, `steps` times.
    async fn scroll(&mut self, steps: u32) -> Result<(), MirrorError>;

    /// Serialized DOM of the loaded document.
    async fn document(&mut self) -> Result<String, MirrorError>;

    /// Stops interception and closes the browser.
    async fn shutdown(&mut self) -> Result<(), MirrorError>;
}

/// Whether a response should be left out of the mirror.
fn is_html(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("html"))
}

/// Writes captured responses until told to stop, then drains what is queued.
struct Consumer {
    target: MirrorTarget,
    writer: ResourceWriter,
    ledger: Arc<DedupLedger>,
    summary: MirrorSummary,
}

impl Consumer {
    fn spawn(
        self,
        mut receiver: mpsc::UnboundedReceiver<CapturedResponse>,
        mut stop: oneshot::Receiver<()>,
    ) -> JoinHandle<MirrorSummary> {
        tokio::spawn(async move {
            let mut consumer = self;
            loop {
                tokio::select! {
                    captured = receiver.recv() => match captured {
                        Some(captured) => consumer.handle(captured).await,
                        None => break,
                    },
                    _ = &mut stop => {
                        receiver.close();
                        while let Some(captured) = receiver.recv().await {
                            consumer.handle(captured).await;
                        }
                        break;
                    }
                }
            }
            consumer.summary
        })
    }

    async fn handle(&mut self, captured: CapturedResponse) {
        let CapturedResponse {
            resource,
            guard: _guard,
        } = captured;
        let url_str = resource.url.clone();

        if is_html(resource.content_type()) {
            debug!(url = %url_str, "not saving html response");
            self.summary.skipped += 1;
            return;
        }

        let url = match Url::parse(&url_str) {
            Ok(url) => url,
            Err(source) => {
                let err = ResourceError::InvalidUrl {
                    url: url_str,
                    source,
                };
                warn!(error = %err, "skipping resource");
                self.summary.failed += 1;
                return;
            }
        };

        if !self.ledger.should_fetch(url.as_str()) {
            debug!(%url, "already mirrored");
            self.summary.skipped += 1;
            return;
        }

        let body = match resource.into_envelope().decode() {
            Ok(body) => body,
            Err(err) => {
                warn!(%url, error = %err, "skipping resource");
                self.summary.failed += 1;
                return;
            }
        };

        match self.writer.save_resource(&self.target, &url, &body).await {
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

/// Driver for the live-capture strategy.
pub struct LiveMirror {
    target: MirrorTarget,
    writer: ResourceWriter,
    ledger: Arc<DedupLedger>,
    scroll_steps: u32,
    idle_timeout: Duration,
}

impl LiveMirror {
    pub fn new(
        target: MirrorTarget,
        writer: ResourceWriter,
        ledger: Arc<DedupLedger>,
        scroll_steps: u32,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            target,
            writer,
            ledger,
            scroll_steps,
            idle_timeout,
        }
    }

    /// Drives `session` through one page load while saving what
    /// `receiver` delivers.
    ///
    /// # Errors
    ///
    /// Navigation failures are fatal. Failures on individual resources are
    /// logged and counted.
    pub async fn run<S: CaptureSession>(
        self,
        mut session: S,
        receiver: mpsc::UnboundedReceiver<CapturedResponse>,
        tracker: CompletionTracker,
    ) -> Result<MirrorSummary, MirrorError> {
        let (stop, stopped) = oneshot::channel();
        let consumer = Consumer {
            target: self.target.clone(),
            writer: self.writer.clone(),
            ledger: Arc::clone(&self.ledger),
            summary: MirrorSummary::default(),
        }
        .spawn(receiver, stopped);

        let outcome = self.capture(&mut session, &tracker).await;
        if let Err(err) = session.shutdown().await {
            warn!(error = %err, "browser did not shut down cleanly");
        }

        let _ = stop.send(());
        let mut summary = consumer
            .await
            .map_err(|e| MirrorError::Browser(format!("capture consumer panicked: {e}")))?;

        let document_saved = outcome?;
        if document_saved {
            summary.saved += 1;
        }
        Ok(summary)
    }

    /// Returns whether the rendered document was written.
    async fn capture<S: CaptureSession>(
        &self,
        session: &mut S,
        tracker: &CompletionTracker,
    ) -> Result<bool, MirrorError> {
        session.navigate(&self.target).await?;

        if let Err(err) = session.scroll(self.scroll_steps).await {
            warn!(error = %err, "scrolling failed, lazy content may be missing");
        }

        if !tracker.wait_idle_timeout(self.idle_timeout).await {
            warn!(
                in_flight = tracker.in_flight(),
                "gave up waiting for intercepted requests"
            );
        }

        // A non-HTML root was already written by the consumer.
        if !self.ledger.should_fetch(self.target.as_str()) {
            return Ok(false);
        }

        let document = match session.document().await {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "could not read rendered document");
                return Ok(false);
            }
        };

        let path = self.writer.output_dir().join(INDEX_FILE);
        match self
            .writer
            .save(self.target.as_str(), path, document.as_bytes())
            .await
        {
            Ok(saved) => {
                info!("{} -> {}", saved.url, saved.path.display());
                Ok(true)
            }
            Err(err) => {
                warn!(error = %err, "failed to save document");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::Path, sync::Mutex};

    use reqwest::{
        Method, StatusCode,
        header::{CONTENT_TYPE, HeaderMap, HeaderValue},
    };

    use super::*;

    /// Serves canned responses, optionally after a delay, and records every
    /// request it receives.
    struct StubFetcher {
        pages: HashMap<String, (&'static str, &'static str)>,
        delay: Duration,
        received: Mutex<Vec<FetchRequest>>,
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn send(&self, request: FetchRequest) -> Result<FetchedResource, FetchError> {
            tokio::time::sleep(self.delay).await;
            let url = request.url.clone();
            self.received.lock().unwrap().push(request);
            let Some((content_type, body)) = self.pages.get(&url) else {
                return Err(FetchError::new(url, "connection refused"));
            };
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(*content_type));
            Ok(FetchedResource {
                url,
                status: StatusCode::OK,
                headers,
                body: body.as_bytes().to_vec(),
            })
        }
    }

    /// Pretends to be a browser that issues a fixed list of requests on load.
    struct FakeSession {
        interceptor: Interceptor,
        requests: Vec<FetchRequest>,
    }

    #[async_trait]
    impl CaptureSession for FakeSession {
        async fn navigate(&mut self, _target: &MirrorTarget) -> Result<(), MirrorError> {
            for request in self.requests.drain(..) {
                let guard = self.interceptor.begin();
                let interceptor = self.interceptor.clone();
                tokio::spawn(async move {
                    let _ = interceptor.intercept(guard, request).await;
                });
            }
            Ok(())
        }

        async fn scroll(&mut self, _steps: u32) -> Result<(), MirrorError> {
            Ok(())
        }

        async fn document(&mut self) -> Result<String, MirrorError> {
            Ok("<html><body>rendered</body></html>".to_string())
        }

        async fn shutdown(&mut self) -> Result<(), MirrorError> {
            Ok(())
        }
    }

    const ROOT: &str = "https://example.com/";

    fn fetcher(delay: Duration) -> Arc<StubFetcher> {
        let pages = HashMap::from([
            (ROOT.to_string(), ("text/html; charset=utf-8", "<html>raw</html>")),
            (
                "https://example.com/static/app.js".to_string(),
                ("application/javascript", "app()"),
            ),
            (
                "https://example.com/img/a.png".to_string(),
                ("image/png", "png"),
            ),
            (
                "https://example.com/partial".to_string(),
                ("text/html", "<div>fragment</div>"),
            ),
            (
                "https://example.com/api/cart".to_string(),
                ("application/json", "{\"items\":1}"),
            ),
        ]);
        Arc::new(StubFetcher {
            pages,
            delay,
            received: Mutex::default(),
        })
    }

    async fn run_requests(
        fetcher: Arc<StubFetcher>,
        requests: Vec<FetchRequest>,
        dir: &Path,
    ) -> MirrorSummary {
        let tracker = CompletionTracker::new();
        let (interceptor, receiver) = Interceptor::new(fetcher, tracker.clone());
        let session = FakeSession {
            interceptor,
            requests,
        };
        let mirror = LiveMirror::new(
            MirrorTarget::parse(ROOT).unwrap(),
            ResourceWriter::new(dir),
            Arc::new(DedupLedger::new()),
            3,
            Duration::from_secs(5),
        );
        mirror.run(session, receiver, tracker).await.unwrap()
    }

    async fn run(urls: &[&str], delay: Duration, dir: &Path) -> MirrorSummary {
        let requests = urls.iter().map(|url| FetchRequest::get(*url)).collect();
        run_requests(fetcher(delay), requests, dir).await
    }

    #[tokio::test]
    async fn test_saves_subresources_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(
            &[
                ROOT,
                "https://example.com/static/app.js",
                "https://example.com/img/a.png",
                "https://example.com/partial",
            ],
            Duration::ZERO,
            dir.path(),
        )
        .await;

        assert_eq!(summary.saved, 3);
        assert_eq!(summary.skipped, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("static/app.js")).unwrap(),
            "app()"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<html><body>rendered</body></html>"
        );
        assert!(!dir.path().join("partial").exists());
    }

    #[tokio::test]
    async fn test_waits_for_slow_interceptions() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(
            &["https://example.com/img/a.png"],
            Duration::from_millis(100),
            dir.path(),
        )
        .await;

        assert_eq!(summary.saved, 2);
        assert!(dir.path().join("img/a.png").exists());
    }

    #[tokio::test]
    async fn test_repeated_response_saved_once() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(
            &[
                "https://example.com/img/a.png",
                "https://example.com/img/a.png",
            ],
            Duration::ZERO,
            dir.path(),
        )
        .await;

        assert_eq!(summary.saved, 2);
        assert_eq!(summary.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_releases_tracker() {
        let tracker = CompletionTracker::new();
        let (interceptor, mut receiver) =
            Interceptor::new(fetcher(Duration::ZERO), tracker.clone());

        let guard = interceptor.begin();
        let result = interceptor
            .intercept(guard, FetchRequest::get("https://example.com/missing.js"))
            .await;

        assert!(result.is_err());
        assert_eq!(tracker.in_flight(), 0);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_browser_request_forwarded_intact() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(Duration::ZERO);
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("cart=42"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let post = FetchRequest {
            url: "https://example.com/api/cart".to_string(),
            method: Method::POST,
            headers,
            body: Some(b"{\"add\":7}".to_vec()),
        };

        let summary = run_requests(Arc::clone(&fetcher), vec![post], dir.path()).await;

        let received = fetcher.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].method, Method::POST);
        assert_eq!(received[0].headers.get("cookie").unwrap(), "cart=42");
        assert_eq!(received[0].body.as_deref(), Some(&b"{\"add\":7}"[..]));
        assert_eq!(summary.saved, 2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("api/cart")).unwrap(),
            "{\"items\":1}"
        );
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("application/xhtml+xml")));
        assert!(!is_html(Some("text/css")));
        assert!(!is_html(None));
    }
}
