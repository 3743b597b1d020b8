//! Blocking HTTP fetch layer shared by the mirror client (§4.D) and the
//! apply engine (§4.F). Timeouts and retry counts are delegated entirely to
//! configuration (§5: "the core exposes no timeout knob of its own" beyond
//! what it hands to this layer).

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::DeltaRepoError;
use crate::Result;

/// A thin wrapper over a blocking [`reqwest::blocking::Client`] configured
/// from [`crate::config::DownloadConfig`].
pub struct Downloader {
    client: Client,
    retries: u32,
    show_progress: bool,
}

impl Downloader {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.download.connect_timeout_secs))
            .timeout(Self::total_timeout(config.download.download_timeout_secs))
            .user_agent(format!("deltarepo/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DeltaRepoError::Http)?;

        Ok(Self {
            client,
            retries: config.download.retries,
            show_progress: config.download.show_progress,
        })
    }

    fn total_timeout(secs: u64) -> Option<Duration> {
        if secs == 0 {
            None
        } else {
            Some(Duration::from_secs(secs))
        }
    }

    /// Fetch `url` into a fresh temporary file, retrying transient failures.
    /// The caller is responsible for the file's lifetime; it's removed when
    /// the returned [`NamedTempFile`] drops.
    pub fn fetch_to_tempfile(&self, url: &str) -> Result<NamedTempFile> {
        let scratch = NamedTempFile::new()?;
        self.fetch_with_retries(url, scratch.path())?;
        Ok(scratch)
    }

    /// Fetch `url` to `dest`, creating parent directories as needed.
    pub fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.fetch_with_retries(url, dest)
    }

    fn fetch_with_retries(&self, url: &str, dest: &Path) -> Result<()> {
        let mut last_error = None;

        for attempt in 1..=self.retries.max(1) {
            if attempt > 1 {
                tracing::info!(url, attempt, "retrying download");
                std::thread::sleep(Duration::from_secs(2u64.pow(attempt - 1)));
            }
            match self.fetch_once(url, dest) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(url, attempt, error = %err, "download attempt failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.expect("loop runs at least once"))
    }

    fn fetch_once(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(DeltaRepoError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP {} fetching {}", response.status(), url),
            )));
        }

        let total_size = response.content_length();
        let progress = if self.show_progress {
            total_size.map(indicatif::ProgressBar::new)
        } else {
            None
        };

        let temp_path = dest.with_extension("part");
        let mut file = File::create(&temp_path)?;
        let mut reader = BufReader::new(response);
        let mut buffer = [0u8; 8192];

        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])?;
            if let Some(bar) = &progress {
                bar.inc(read as u64);
            }
        }
        file.flush()?;
        drop(file);
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        std::fs::rename(&temp_path, dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_timeout_zero_means_none() {
        assert_eq!(Downloader::total_timeout(0), None);
        assert_eq!(Downloader::total_timeout(30), Some(Duration::from_secs(30)));
    }
}
