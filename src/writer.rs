//! Maps URLs onto the output directory and persists bodies there.

use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs;
use url::Url;

use crate::{error::WriteError, target::MirrorTarget};

/// Suffix of the scratch file a body is written to before it is renamed.
const TEMP_SUFFIX: &str = ".part";

/// File name used for the root document and directory-like paths.
pub const INDEX_FILE: &str = "index.html";

/// A resource that has been written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedResource {
    pub url: String,
    pub path: PathBuf,
}

/// Writes mirrored resources below an output directory.
#[derive(Debug, Clone)]
pub struct ResourceWriter {
    output_dir: PathBuf,
}

impl ResourceWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where `url` lands on disk.
    ///
    /// The root document of `target` is always `index.html`. Anything else
    /// keeps its URL path below the output directory. `.` and `..` segments
    /// are dropped so the result never escapes the output directory.
    pub fn destination(&self, target: &MirrorTarget, url: &Url) -> PathBuf {
        if target.is_root(url) {
            return self.output_dir.join(INDEX_FILE);
        }

        let mut path = self.output_dir.clone();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !matches!(*seg, "" | "." | "..")).collect())
            .unwrap_or_default();
        for segment in &segments {
            path.push(segment);
        }

        if segments.is_empty() || url.path().ends_with('/') {
            path.push(INDEX_FILE);
        }
        path
    }

    /// Resolves the destination for `url` and writes `content` there.
    ///
    /// The top-level `index.html` belongs to the root document; any other
    /// URL that maps onto it is refused.
    pub async fn save_resource(
        &self,
        target: &MirrorTarget,
        url: &Url,
        content: &[u8],
    ) -> Result<SavedResource, WriteError> {
        let path = self.destination(target, url);
        if !target.is_root(url) && path == self.output_dir.join(INDEX_FILE) {
            return Err(WriteError {
                path,
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "reserved for the root document",
                ),
            });
        }
        self.save(url.as_str(), path, content).await
    }

    /// Writes `content` to `path`, creating parent directories first.
    ///
    /// The bytes go to a sibling `.part` file which is then renamed over the
    /// destination, so an interrupted write never leaves a truncated file in
    /// place.
    pub async fn save(
        &self,
        url: &str,
        path: PathBuf,
        content: &[u8],
    ) -> Result<SavedResource, WriteError> {
        let fail = |path: &Path, source| WriteError {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| fail(parent, e))?;
        }

        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        fs::write(&temp, content).await.map_err(|e| fail(&temp, e))?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(fail(&path, e));
        }

        Ok(SavedResource {
            url: url.to_string(),
            path,
        })
    }
}
