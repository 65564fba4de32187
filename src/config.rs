//! Settings for a mirror run.

use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

/// User-Agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "mirror/v0.0.1";

/// Directory the mirror is written to when none is configured.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Number of viewport-height scroll steps issued after the page loads.
pub const DEFAULT_SCROLL_STEPS: u32 = 100;

/// How links are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Fetch over HTTP and scan HTML/CSS text for references.
    Static,
    /// Load the page in headless Chromium and capture its network traffic.
    #[default]
    Live,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Live => f.write_str("live"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "live" => Ok(Self::Live),
            other => Err(format!("unknown strategy `{other}` (expected `static` or `live`)")),
        }
    }
}

/// Everything a mirror run needs besides the target URL.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// User-Agent for every outgoing request. Empty leaves the client default.
    pub user_agent: String,
    pub output_dir: PathBuf,
    pub strategy: Strategy,
    pub scroll_steps: u32,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Upper bound on waiting for in-flight interceptions after the page settles.
    pub idle_timeout: Duration,
    /// Chromium executable; `None` lets the driver search the usual places.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            strategy: Strategy::default(),
            scroll_steps: DEFAULT_SCROLL_STEPS,
            request_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(120),
            chrome_executable: None,
        }
    }
}
