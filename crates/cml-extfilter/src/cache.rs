//! Disk cache for upstream radar images, keyed by `date + md5(url)` (§4.9).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use image::DynamicImage;
use md5::{Digest, Md5};
use reqwest::Client;

use cml_common::{CmlError, CmlResult};

pub struct ImageCache {
    client: Client,
    cache_dir: PathBuf,
}

impl ImageCache {
    pub fn new(client: Client, cache_dir: PathBuf) -> Self {
        Self { client, cache_dir }
    }

    fn cache_path(&self, date: DateTime<Utc>, url: &str) -> PathBuf {
        let mut hasher = Md5::new();
        hasher.update(url.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.cache_dir.join(format!("{}_{}.img", date.format("%Y-%m-%d"), hex))
    }

    /// Fetch and decode the image at `url`, serving from the disk cache
    /// when present. `date` is the frame's own logical date, used as the
    /// cache-key prefix so frames from different days never collide even
    /// when `url` is otherwise identical.
    pub async fn fetch(&self, date: DateTime<Utc>, url: &str) -> CmlResult<DynamicImage> {
        let path = self.cache_path(date, url);

        if let Ok(bytes) = tokio::fs::read(&path).await {
            if let Ok(image) = image::load_from_memory(&bytes) {
                return Ok(image);
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CmlError::ExternalFilterUnavailable(format!("fetch {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(CmlError::ExternalFilterUnavailable(format!(
                "fetch {url}: status {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CmlError::ExternalFilterUnavailable(format!("read body {url}: {e}")))?;

        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        let _ = tokio::fs::write(&path, &bytes).await;

        image::load_from_memory(&bytes).map_err(|e| CmlError::ExternalFilterUnavailable(format!("decode {url}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_is_stable_and_distinguishes_urls() {
        let cache = ImageCache::new(Client::new(), PathBuf::from("/tmp/cml-ext-cache"));
        let date = Utc::now();
        let a = cache.cache_path(date, "http://example.com/a.png");
        let b = cache.cache_path(date, "http://example.com/a.png");
        assert_eq!(a, b);
        let c = cache.cache_path(date, "http://example.com/b.png");
        assert_ne!(a, c);
    }
}
