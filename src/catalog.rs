//! Sample catalog — mirrors the instrument's sample set from an HTTP server
//! into a local cache directory that [`DirSource`](crate::loader::DirSource)
//! can read.
//!
//! Each server gets its own cache sub-directory named after the SHA-256 of
//! its base URL. Files already in the cache are never fetched again. A 404
//! means the sample does not exist and is not an error.

use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::bank::{BankId, NOTE_COUNT, SampleKey, SampleVariant};
use crate::error::LoadError;
use crate::loader::{LoadEvent, TOTAL_SAMPLES};

/// File extensions tried on the server, in order.
pub const EXTENSIONS: [&str; 3] = ["ogg", "wav", "mp3"];

/// A remote sample set and its local cache.
#[derive(Debug, Clone)]
pub struct Catalog {
    base_url: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl Catalog {
    /// Cache under the platform cache directory.
    pub fn new(base_url: &str) -> Result<Self, LoadError> {
        let dirs = ProjectDirs::from("net", "bitsynth", "bitsynth")
            .ok_or_else(|| io::Error::other("no home directory for the sample cache"))?;
        let root = dirs.cache_dir().join("samples");
        Ok(Self::with_cache_root(base_url, &root))
    }

    /// Cache under `root` instead of the platform cache directory.
    pub fn with_cache_root(base_url: &str, root: &Path) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let cache_dir = root.join(url_digest(&base_url));
        Catalog {
            base_url,
            cache_dir,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn sample_url(&self, stem: &str, extension: &str) -> String {
        format!("{}/{stem}.{extension}", self.base_url)
    }

    fn cached_file(&self, stem: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.cache_dir.join(format!("{stem}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Download every sample missing from the cache.
    ///
    /// Progress is reported exactly like a sample load. Individual download
    /// failures are logged and skipped; only an unusable cache directory is
    /// an error. Returns the cache directory.
    pub async fn sync<F>(&self, mut observer: F) -> Result<PathBuf, LoadError>
    where
        F: FnMut(LoadEvent),
    {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        let mut loaded = 0;
        let mut downloaded = 0;
        for bank in BankId::ALL {
            observer(LoadEvent::BankStarted { bank });
            for note in 0..NOTE_COUNT {
                for variant in [SampleVariant::OneShot, SampleVariant::Loop] {
                    if let Some(stem) = SampleKey::new(bank, note, variant).file_stem() {
                        if self.cached_file(&stem).is_none() {
                            match self.download(&stem).await {
                                Ok(true) => downloaded += 1,
                                Ok(false) => debug!(%stem, "Sample not on server"),
                                Err(e) => warn!(%stem, error = %e, "Sample download failed"),
                            }
                        }
                    }
                    loaded += 1;
                    observer(LoadEvent::Progress {
                        loaded,
                        total: TOTAL_SAMPLES,
                    });
                }
            }
        }

        info!(downloaded, dir = %self.cache_dir.display(), "Sample cache synced");
        Ok(self.cache_dir.clone())
    }

    /// Fetch one sample into the cache. `Ok(false)` when the server has no
    /// file for it under any extension.
    async fn download(&self, stem: &str) -> Result<bool, LoadError> {
        for ext in EXTENSIONS {
            let url = self.sample_url(stem, ext);
            let response = self.client.get(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            let bytes = response.error_for_status()?.bytes().await?;

            // An interrupted download must never look cached.
            let path = self.cache_dir.join(format!("{stem}.{ext}"));
            let partial = path.with_extension(format!("{ext}.part"));
            tokio::fs::write(&partial, &bytes).await?;
            tokio::fs::rename(&partial, &path).await?;
            debug!(%url, bytes = bytes.len(), "Downloaded sample");
            return Ok(true);
        }
        Ok(false)
    }
}

/// Hex SHA-256 of a base URL, used as its cache directory name.
pub fn url_digest(base_url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_url.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
