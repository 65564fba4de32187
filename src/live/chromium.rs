//! Headless Chromium session over the DevTools protocol.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chromiumoxide::{
    Page,
    browser::{Browser, BrowserConfig},
    cdp::browser_protocol::{
        fetch::{
            EnableParams, EventRequestPaused, FailRequestParams, FulfillRequestParams,
            HeaderEntry, RequestId, RequestPattern, RequestStage,
        },
        input::{DispatchMouseEventParams, DispatchMouseEventType},
        network::{ErrorReason, Request, SetUserAgentOverrideParams},
    },
    error::CdpError,
};
use futures::StreamExt;
use reqwest::{
    Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{CaptureSession, Interceptor};
use crate::{
    config::MirrorConfig,
    error::MirrorError,
    fetch::{FetchRequest, FetchedResource},
    target::MirrorTarget,
    tracker::InFlight,
};

/// Pause between scroll steps so lazy loaders get a chance to react.
const SCROLL_PAUSE: Duration = Duration::from_millis(20);

/// Fallback scroll distance when the window height cannot be read.
const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;

fn browser_error(context: &'static str) -> impl FnOnce(CdpError) -> MirrorError {
    move |e| MirrorError::Browser(format!("{context}: {e}"))
}

/// A Chromium instance with one page whose same-origin requests are
/// routed through an [`Interceptor`].
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    interception: JoinHandle<()>,
}

impl ChromiumSession {
    /// Launches the browser and installs the request hook for `target`.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: without the hook nothing can be captured.
    pub async fn launch(
        config: &MirrorConfig,
        target: &MirrorTarget,
        interceptor: Interceptor,
    ) -> Result<Self, MirrorError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let browser_config = builder
            .build()
            .map_err(|e| MirrorError::Browser(format!("invalid browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(browser_error("failed to launch chromium"))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "devtools handler event failed");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_error("failed to open page"))?;

        if !config.user_agent.is_empty() {
            page.set_user_agent(SetUserAgentOverrideParams::new(config.user_agent.clone()))
                .await
                .map_err(browser_error("failed to override user agent"))?;
        }

        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(browser_error("failed to listen for paused requests"))?;

        let pattern = RequestPattern::builder()
            .url_pattern(target.origin_pattern())
            .request_stage(RequestStage::Request)
            .build();
        page.execute(EnableParams::builder().pattern(pattern).build())
            .await
            .map_err(browser_error("failed to enable request interception"))?;

        let intercept_page = page.clone();
        let interception = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let guard = interceptor.begin();
                let page = intercept_page.clone();
                let interceptor = interceptor.clone();
                tokio::spawn(async move {
                    respond(&page, &interceptor, guard, &event).await;
                });
            }
        });

        Ok(Self {
            browser,
            page,
            handler,
            interception,
        })
    }

    async fn viewport_height(&self) -> f64 {
        let height = match self.page.evaluate("window.innerHeight").await {
            Ok(result) => result
                .value()
                .cloned()
                .and_then(|v| serde_json::from_value::<f64>(v).ok()),
            Err(e) => {
                debug!(error = %e, "could not read window height");
                None
            }
        };
        height
            .filter(|h| *h > 0.0)
            .unwrap_or(DEFAULT_VIEWPORT_HEIGHT)
    }
}

/// Performs the paused request and answers the page with the result.
async fn respond(
    page: &Page,
    interceptor: &Interceptor,
    guard: InFlight,
    event: &EventRequestPaused,
) {
    let url = event.request.url.as_str();
    let request = match upstream_request(&event.request) {
        Ok(request) => request,
        Err(e) => {
            warn!(url, error = %e, "could not copy intercepted request");
            drop(guard);
            fail(page, event).await;
            return;
        }
    };

    match interceptor.intercept(guard, request).await {
        Ok(resource) => match fulfill_params(event.request_id.clone(), &resource) {
            Ok(params) => {
                if let Err(e) = page.execute(params).await {
                    warn!(url, error = %e, "failed to fulfill intercepted request");
                }
            }
            Err(e) => {
                warn!(url, error = %e, "could not build fulfill request");
                fail(page, event).await;
            }
        },
        Err(err) => {
            warn!(error = %err, "intercepted request failed");
            fail(page, event).await;
        }
    }
}

/// Releases a paused request the page would otherwise wait on forever.
async fn fail(page: &Page, event: &EventRequestPaused) {
    let params = FailRequestParams::new(event.request_id.clone(), ErrorReason::Failed);
    if let Err(e) = page.execute(params).await {
        debug!(url = %event.request.url, error = %e, "failed to fail intercepted request");
    }
}

/// Copies the browser's request: method, headers and post data.
fn upstream_request(request: &Request) -> Result<FetchRequest, String> {
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|e| format!("invalid method `{}`: {e}", request.method))?;

    let mut headers = HeaderMap::new();
    if let Some(entries) = request.headers.inner().as_object() {
        for (name, value) in entries {
            let Some(value) = value.as_str() else {
                continue;
            };
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => debug!(header = %name, "dropping unrepresentable request header"),
            }
        }
    }

    let body = match &request.post_data_entries {
        Some(entries) => {
            let mut body = Vec::new();
            for bytes in entries.iter().filter_map(|entry| entry.bytes.as_ref()) {
                let encoded: &str = bytes.as_ref();
                let decoded = BASE64
                    .decode(encoded)
                    .map_err(|e| format!("malformed post data: {e}"))?;
                body.extend_from_slice(&decoded);
            }
            Some(body)
        }
        None => None,
    };

    Ok(FetchRequest {
        url: request.url.clone(),
        method,
        headers,
        body,
    })
}

fn fulfill_params(
    request_id: RequestId,
    resource: &FetchedResource,
) -> Result<FulfillRequestParams, String> {
    let headers: Vec<HeaderEntry> = resource
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| HeaderEntry::new(name.as_str(), value))
        })
        .collect();

    FulfillRequestParams::builder()
        .request_id(request_id)
        .response_code(i64::from(resource.status.as_u16()))
        .response_headers(headers)
        .body(BASE64.encode(&resource.body))
        .build()
}

#[async_trait]
impl CaptureSession for ChromiumSession {
    async fn navigate(&mut self, target: &MirrorTarget) -> Result<(), MirrorError> {
        self.page
            .goto(target.as_str())
            .await
            .map_err(browser_error("navigation failed"))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(browser_error("page did not finish loading"))?;
        Ok(())
    }

    async fn scroll(&mut self, steps: u32) -> Result<(), MirrorError> {
        let height = self.viewport_height().await;
        debug!(steps, height, "scrolling page");

        for _ in 0..steps {
            let wheel = DispatchMouseEventParams::builder()
                .r#type(DispatchMouseEventType::MouseWheel)
                .x(0.0)
                .y(0.0)
                .delta_x(0.0)
                .delta_y(height)
                .build()
                .map_err(|e| MirrorError::Browser(format!("invalid scroll event: {e}")))?;
            self.page
                .execute(wheel)
                .await
                .map_err(browser_error("scroll failed"))?;
            tokio::time::sleep(SCROLL_PAUSE).await;
        }
        Ok(())
    }

    async fn document(&mut self) -> Result<String, MirrorError> {
        self.page
            .content()
            .await
            .map_err(browser_error("failed to read document"))
    }

    async fn shutdown(&mut self) -> Result<(), MirrorError> {
        self.interception.abort();
        let closed = self
            .browser
            .close()
            .await
            .map_err(browser_error("failed to close browser"));
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "browser process did not exit cleanly");
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.interception.abort();
        self.handler.abort();
    }
}
