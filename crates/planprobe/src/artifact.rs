//! Local storage for downloaded plan documents.

use crate::result::ProbeResult;
use reqwest::Url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// A document written to the download directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedArtifact {
    /// Source URL
    pub url: String,
    /// Local path
    pub path: PathBuf,
    /// Size in bytes
    pub bytes: usize,
}

impl DownloadedArtifact {
    /// Size in kilobytes
    #[must_use]
    pub fn size_kb(&self) -> f64 {
        self.bytes as f64 / 1024.0
    }
}

/// Filename for a document URL: the last path segment without query or
/// fragment, or `plan_<millis>.pdf` when the path has no usable segment.
#[must_use]
pub fn file_name_for(url: &str, now_millis: i64) -> String {
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    };
    match segment {
        Some(name) if is_usable_name(&name) => name,
        _ => format!("plan_{now_millis}.pdf"),
    }
}

fn is_usable_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Download directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `dir` (created on first write)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if absent
    pub fn ensure_dir(&self) -> ProbeResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Local path a URL would be written to
    #[must_use]
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir
            .join(file_name_for(url, chrono::Utc::now().timestamp_millis()))
    }

    /// Write document bytes fetched from `url`
    pub fn save(&self, url: &str, bytes: &[u8]) -> ProbeResult<DownloadedArtifact> {
        self.ensure_dir()?;
        let path = self.path_for(url);
        std::fs::write(&path, bytes)?;
        let artifact = DownloadedArtifact {
            url: url.to_string(),
            path,
            bytes: bytes.len(),
        };
        info!(
            path = %artifact.path.display(),
            size_kb = %format!("{:.2}", artifact.size_kb()),
            "document downloaded"
        );
        Ok(artifact)
    }

    /// Read a saved document back
    pub fn read(&self, artifact: &DownloadedArtifact) -> ProbeResult<Vec<u8>> {
        Ok(std::fs::read(&artifact.path)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod file_names {
        use super::*;

        #[test]
        fn test_last_segment_without_query() {
            assert_eq!(
                file_name_for("https://site.test/docs/GAS_BASIC.pdf?v=3#page=2", 1),
                "GAS_BASIC.pdf"
            );
        }

        #[test]
        fn test_relative_reference() {
            assert_eq!(file_name_for("/content/plan-42.pdf?x=1", 1), "plan-42.pdf");
        }

        #[test]
        fn test_trailing_slash_falls_back() {
            assert_eq!(file_name_for("https://site.test/docs/", 1700), "plan_1700.pdf");
            assert_eq!(file_name_for("https://site.test", 5), "plan_5.pdf");
        }

        proptest! {
            #[test]
            fn prop_name_is_a_single_segment(
                dirs in proptest::collection::vec("[a-z0-9]{1,8}", 0..4),
                stem in "[A-Za-z0-9_-]{0,12}",
                query in proptest::option::of("[a-z]=[0-9]{1,3}"),
            ) {
                let mut url = format!("https://site.test/{}", dirs.join("/"));
                if !dirs.is_empty() {
                    url.push('/');
                }
                url.push_str(&stem);
                if let Some(q) = &query {
                    url.push('?');
                    url.push_str(q);
                }
                let name = file_name_for(&url, 99);
                prop_assert!(!name.is_empty());
                prop_assert!(!name.contains('/'));
                prop_assert!(!name.contains('?'));
                if stem.is_empty() {
                    prop_assert_eq!(name, "plan_99.pdf".to_string());
                } else {
                    prop_assert_eq!(name, stem);
                }
            }
        }
    }

    mod store {
        use super::*;

        #[test]
        fn test_save_creates_dir_and_round_trips() {
            let tmp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(tmp.path().join("test-results"));
            let bytes = b"%PDF-1.5 fake body \x00\xff".to_vec();
            let artifact = store
                .save("https://site.test/plans/basic.pdf?session=1", &bytes)
                .unwrap();
            assert_eq!(artifact.path, tmp.path().join("test-results").join("basic.pdf"));
            assert_eq!(artifact.bytes, bytes.len());
            assert_eq!(store.read(&artifact).unwrap(), bytes);
        }

        #[test]
        fn test_ensure_dir_is_idempotent() {
            let tmp = tempfile::tempdir().unwrap();
            let store = ArtifactStore::new(tmp.path().join("a/b"));
            store.ensure_dir().unwrap();
            store.ensure_dir().unwrap();
            assert!(store.dir().is_dir());
        }
    }
}
