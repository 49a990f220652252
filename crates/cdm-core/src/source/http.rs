//! Source that fetches a whole chapter with one HTTP GET.
//!
//! The URL comes from a template with `{manga}` and `{chapter}` placeholders;
//! the response body is stored as a single page. Runs libcurl on the blocking
//! pool and aborts the transfer from the progress callback once cancelled.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{ChapterContent, ChapterSource};
use crate::chapter::{ChapterRef, SourceId};
use crate::config::FetchConfig;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct HttpSource {
    id: SourceId,
    url_template: String,
    headers: BTreeMap<String, String>,
    fetch: FetchConfig,
}

impl HttpSource {
    /// Fails if the template does not render to a valid http(s) URL.
    pub fn new(
        id: SourceId,
        url_template: &str,
        headers: BTreeMap<String, String>,
        fetch: FetchConfig,
    ) -> Result<Self> {
        let sample = render(url_template, &ChapterRef::new(0, 0));
        let parsed = url::Url::parse(&sample)
            .with_context(|| format!("source {id}: invalid url_template {url_template:?}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("source {id}: url_template must be http or https");
        }
        Ok(Self {
            id,
            url_template: url_template.to_string(),
            headers,
            fetch,
        })
    }

    pub fn chapter_url(&self, chapter: &ChapterRef) -> String {
        render(&self.url_template, chapter)
    }
}

fn render(template: &str, chapter: &ChapterRef) -> String {
    template
        .replace("{manga}", &chapter.manga_id.to_string())
        .replace("{chapter}", &chapter.chapter_id.to_string())
}

#[async_trait]
impl ChapterSource for HttpSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn fetch(
        &self,
        chapter: &ChapterRef,
        cancel: &CancellationToken,
    ) -> Result<ChapterContent, FetchError> {
        let url = self.chapter_url(chapter);
        let headers = self.headers.clone();
        let fetch = self.fetch.clone();
        let cancel = cancel.clone();

        let body = tokio::task::spawn_blocking(move || get(&url, &headers, &fetch, &cancel))
            .await
            .map_err(|e| FetchError::Unreachable(format!("fetch task join: {e}")))??;

        if body.is_empty() {
            return Err(FetchError::Malformed("empty response body".to_string()));
        }
        tracing::debug!(source = %self.id, %chapter, bytes = body.len(), "fetched chapter");
        Ok(ChapterContent::single(Bytes::from(body)))
    }
}

/// Blocking GET; call from `spawn_blocking`.
fn get(
    url: &str,
    headers: &BTreeMap<String, String>,
    fetch: &FetchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, FetchError> {
    let curl_err = |e: curl::Error| FetchError::Unreachable(e.to_string());

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(fetch.connect_timeout_secs))
        .map_err(curl_err)?;
    easy.timeout(Duration::from_secs(fetch.timeout_secs))
        .map_err(curl_err)?;
    if let Some(speed) = fetch.max_bytes_per_sec {
        easy.max_recv_speed(speed).map_err(curl_err)?;
    }
    if let Some(ua) = &fetch.user_agent {
        easy.useragent(ua).map_err(curl_err)?;
    }
    easy.progress(true).map_err(curl_err)?;

    let mut list = curl::easy::List::new();
    for (k, v) in headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))
            .map_err(curl_err)?;
    }
    if !headers.is_empty() {
        easy.http_headers(list).map_err(curl_err)?;
    }

    let mut body = Vec::new();
    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        // Returning false aborts the transfer.
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(curl_err)?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if e.is_aborted_by_callback() && cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        return Err(curl_err(e));
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(FetchError::Http(code));
    }
    Ok(body)
}
