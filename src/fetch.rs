use anyhow::Context;
use reqwest::Url;
use tracing::debug;

use crate::error::{ShellError, ShellResult};

/// A remote text file, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Last path segment of the address
    pub file_name: String,
    /// Body with line endings normalized to `\n` and no trailing newline
    pub content: String,
}

impl Download {
    pub fn new(file_name: impl Into<String>, body: &str) -> Self {
        Self {
            file_name: file_name.into(),
            content: body.lines().collect::<Vec<_>>().join("\n"),
        }
    }
}

/// Source of remote text for `curl`.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> ShellResult<Download>;
}

/// Fetches over HTTP(S) with a blocking client.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    fn get(url: Url) -> anyhow::Result<String> {
        let response = reqwest::blocking::get(url.clone())
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .context("server answered with an error status")?;
        response.text().context("body is not valid text")
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> ShellResult<Download> {
        let invalid = || ShellError::InvalidUrl { url: url.into() };

        let parsed = Url::parse(url).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }
        let file_name = file_name(&parsed).ok_or_else(invalid)?;

        debug!("fetch: {} into {}", url, file_name);
        let body = Self::get(parsed).map_err(|e| ShellError::Fetch {
            url: url.into(),
            reason: format!("{e:#}"),
        })?;
        Ok(Download::new(file_name, &body))
    }
}

/// Last non-empty segment of the address path.
fn file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_is_last_segment() -> anyhow::Result<()> {
        // Arrange
        let inputs = [
            "http://example.com/files/notes.txt",
            "https://example.com/a/b/",
            "http://example.com/data?x=1",
            "http://example.com/",
        ];
        let outputs = [Some("notes.txt"), Some("b"), Some("data"), None];

        for (input, output) in inputs.iter().zip(outputs.iter()) {
            // Act
            let result = file_name(&Url::parse(input)?);

            // Assert
            assert_eq!(result.as_deref(), *output, "{input}");
        }
        Ok(())
    }

    #[test]
    fn test_rejects_unsupported_urls() {
        let fetcher = HttpFetcher::new();

        for url in ["not a url", "ftp://example.com/file", "http://example.com/"] {
            let result = fetcher.fetch(url);

            assert!(
                matches!(result, Err(ShellError::InvalidUrl { .. })),
                "{url}: {result:?}"
            );
        }
    }

    #[test]
    fn test_download_normalizes_line_endings() {
        let download = Download::new("f", "one\r\ntwo\nthree\n");

        assert_eq!(download.content, "one\ntwo\nthree");
    }
}
