//! HTTP access to the directory site.

use anyhow::{anyhow, Context, Result};
use reqwest::header;
use url::Url;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

use super::parser::{parse_directory_links, parse_roster};
use super::types::{DayWindow, DirectoryLink, MunicipalityCode, RawEntry, REQUEST_TIMEOUT};
use super::DirectorySource;
use crate::TARGET_WEB_REQUEST;

/// Create the client used for every directory page.
pub fn create_http_client(user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .gzip(true)
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
}

/// The live directory, fetched over HTTP and parsed with CSS selectors.
pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpDirectory {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
        Ok(HttpDirectory {
            client: create_http_client(user_agent)?,
            base_url,
        })
    }

    /// URL of the roster page of `code` for `window`.
    pub fn roster_url(&self, code: &MunicipalityCode, window: DayWindow) -> Result<Url> {
        let mut url = self.base_url.join("comune.asp")?;
        url.query_pairs_mut()
            .append_pair("cod", code.as_str())
            .append_pair("domani", &window.query_flag().to_string());
        Ok(url)
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        debug!(target: TARGET_WEB_REQUEST, "Loading {}", url);
        let response = timeout(
            REQUEST_TIMEOUT,
            self.client
                .get(url.clone())
                .header(header::ACCEPT, "text/html,application/xhtml+xml")
                .send(),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "Request to {} timed out after {} seconds",
                url,
                REQUEST_TIMEOUT.as_secs()
            )
        })?
        .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Non-success status {} from {}", status, url));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        debug!(target: TARGET_WEB_REQUEST, "Received {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

impl DirectorySource for HttpDirectory {
    async fn node_links(&self, url: &str) -> Result<Vec<DirectoryLink>> {
        let url = Url::parse(url).with_context(|| format!("Invalid directory URL: {}", url))?;
        let html = self.fetch_page(&url).await?;
        Ok(parse_directory_links(&html, &url))
    }

    async fn roster(&self, code: &MunicipalityCode, window: DayWindow) -> Result<Vec<RawEntry>> {
        let url = self.roster_url(code, window)?;
        let html = self.fetch_page(&url).await?;
        parse_roster(&html).with_context(|| format!("Unexpected markup on {}", url))
    }
}

/// Retries failed page loads a bounded number of times with a fixed pause.
///
/// With `max_retries == 0` this is a plain pass-through and the first failure
/// is returned as is.
pub struct Retrying<S> {
    inner: S,
    max_retries: usize,
    delay: Duration,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, max_retries: usize, delay: Duration) -> Self {
        Retrying {
            inner,
            max_retries,
            delay,
        }
    }

    async fn attempt<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempts = 0;
        loop {
            match op().await {
                Ok(value) => {
                    if attempts > 0 {
                        info!(target: TARGET_WEB_REQUEST, "Loaded {} after {} retries", what, attempts);
                    }
                    return Ok(value);
                }
                Err(err) if attempts < self.max_retries => {
                    attempts += 1;
                    warn!(target: TARGET_WEB_REQUEST, "Loading {} failed ({:#}), retrying in {:?}", what, err, self.delay);
                    sleep(self.delay).await;
                }
                Err(err) => {
                    return Err(err.context(format!("Giving up on {} after {} attempts", what, attempts + 1)))
                }
            }
        }
    }
}

impl<S: DirectorySource> DirectorySource for Retrying<S> {
    async fn node_links(&self, url: &str) -> Result<Vec<DirectoryLink>> {
        self.attempt(url, move || self.inner.node_links(url)).await
    }

    async fn roster(&self, code: &MunicipalityCode, window: DayWindow) -> Result<Vec<RawEntry>> {
        let what = format!("municipality {} ({})", code, window);
        self.attempt(&what, move || self.inner.roster(code, window)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Fails a given number of times before answering.
    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl Flaky {
        fn new(failures: usize) -> Self {
            Flaky {
                failures_left: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl DirectorySource for Flaky {
        async fn node_links(&self, _url: &str) -> Result<Vec<DirectoryLink>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err(anyhow!("connection reset"));
            }
            Ok(Vec::new())
        }

        async fn roster(&self, _code: &MunicipalityCode, _window: DayWindow) -> Result<Vec<RawEntry>> {
            Err(anyhow!("always down"))
        }
    }

    #[test]
    fn test_roster_url() {
        let directory = HttpDirectory::new("https://www.farmaciediturno.org", "test").unwrap();
        let url = directory
            .roster_url(&MunicipalityCode::new("1272"), DayWindow::Tomorrow)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.farmaciediturno.org/comune.asp?cod=1272&domani=1"
        );
    }

    #[tokio::test]
    async fn test_no_retries_fails_fast() {
        let source = Retrying::new(Flaky::new(1), 0, Duration::ZERO);
        assert!(source.node_links("https://example.org").await.is_err());
        assert_eq!(source.inner.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let source = Retrying::new(Flaky::new(2), 3, Duration::ZERO);
        assert!(source.node_links("https://example.org").await.is_ok());
        assert_eq!(source.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let source = Retrying::new(Flaky::new(0), 2, Duration::ZERO);
        let err = source
            .roster(&MunicipalityCode::new("1"), DayWindow::Today)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("after 3 attempts"));
    }
}
