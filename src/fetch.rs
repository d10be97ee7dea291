use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::FetchError;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// An opened remote document: its declared type plus the body as a chunk stream.
pub struct RemoteDocument {
    pub content_type: Option<String>,
    pub body: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl RemoteDocument {
    /// Builds a document from chunks already in memory.
    pub fn from_chunks<I>(content_type: Option<&str>, chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes, FetchError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            content_type: content_type.map(str::to_string),
            body: stream::iter(chunks).boxed(),
        }
    }

    /// Compares the media type, ignoring case and any parameters.
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
    }
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn open(&self, url: &Url) -> Result<RemoteDocument, FetchError>;
}

/// Fetches documents over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn open(&self, url: &Url) -> Result<RemoteDocument, FetchError> {
        info!("Fetching document from {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Open {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!("Content-Type of {}: {:?}", url, content_type);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| FetchError::Read(e.to_string())))
            .boxed();

        Ok(RemoteDocument { content_type, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(content_type: Option<&str>) -> RemoteDocument {
        RemoteDocument::from_chunks(content_type, Vec::new())
    }

    #[test]
    fn test_is_pdf() {
        assert!(doc(Some("application/pdf")).is_pdf());
        assert!(doc(Some("Application/PDF")).is_pdf());
        assert!(doc(Some("application/pdf; qs=0.001")).is_pdf());
        assert!(!doc(Some("application/octet-stream")).is_pdf());
        assert!(!doc(Some("text/plain")).is_pdf());
        assert!(!doc(None).is_pdf());
    }

    #[tokio::test]
    async fn test_from_chunks_streams_in_order() {
        let mut document = RemoteDocument::from_chunks(
            Some("text/plain"),
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))],
        );

        let mut collected = Vec::new();
        while let Some(chunk) = document.body.next().await {
            collected.extend_from_slice(&chunk.expect("chunk"));
        }
        assert_eq!(collected, b"abcd");
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new(Some(Duration::from_secs(5))).is_ok());
        assert!(HttpFetcher::new(None).is_ok());
    }
}
