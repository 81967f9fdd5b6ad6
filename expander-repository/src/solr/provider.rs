//! Solr provider implementation.
//!
//! Posts XML update documents to Solr's update handler with `reqwest`.

use async_trait::async_trait;
use expander_shared::FlattenedDocument;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::{SolrConfig, SOLR_UPDATE_PATH};
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::solr::document;

const CONTENT_TYPE_XML: &str = "text/xml";

/// Solr provider.
///
/// One `SolrProvider` is shared by every in-flight message; the underlying
/// HTTP client pools connections.
pub struct SolrProvider {
    client: Client,
    update_url: Url,
    timeout: Duration,
}

impl SolrProvider {
    /// Create a provider for the Solr server at `config.url`.
    ///
    /// # Returns
    ///
    /// * `Ok(SolrProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If the URL is invalid or the client cannot be built
    pub fn new(config: &SolrConfig) -> Result<Self, SearchIndexError> {
        let update_url = Self::update_url_for(&config.url)?;

        let client = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| SearchIndexError::configuration(e.to_string()))?;

        info!(
            update_url = %update_url,
            timeout_secs = config.timeout.as_secs(),
            "Created Solr provider"
        );

        Ok(Self {
            client,
            update_url,
            timeout: config.timeout,
        })
    }

    /// The endpoint documents are posted to.
    pub fn update_url(&self) -> &Url {
        &self.update_url
    }

    /// Resolve the update handler below the configured base URL.
    fn update_url_for(base: &str) -> Result<Url, SearchIndexError> {
        let mut base = Url::parse(base)
            .map_err(|e| SearchIndexError::configuration(format!("Invalid Solr URL {base}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(SOLR_UPDATE_PATH)
            .map_err(|e| SearchIndexError::configuration(e.to_string()))
    }

    async fn post(&self, body: String) -> Result<(), SearchIndexError> {
        debug!(update_url = %self.update_url, document = %body, "Posting document to Solr");

        let response = self
            .client
            .post(self.update_url.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_XML)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchIndexError::Timeout(self.timeout)
                } else {
                    SearchIndexError::connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SearchIndexError::rejected(status.as_u16(), body))
    }
}

#[async_trait]
impl SearchIndexProvider for SolrProvider {
    async fn add_document(&self, document: &FlattenedDocument) -> Result<(), SearchIndexError> {
        self.post(document::add_document(document)).await
    }

    async fn delete_document(&self, id: &str) -> Result<(), SearchIndexError> {
        self.post(document::delete_document(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accept one connection, capture the request, answer with `status_line`
    /// after `delay`.
    async fn spawn_responder(status_line: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            tokio::time::sleep(delay).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            );
            let _ = socket.write_all(response.as_bytes()).await;
            request
        });

        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn provider_for(url: &str, timeout: Duration) -> SolrProvider {
        SolrProvider::new(&SolrConfig::new(url, timeout)).unwrap()
    }

    #[test]
    fn test_update_url_resolution() {
        let provider = provider_for("http://localhost:8983", Duration::from_secs(1));
        assert_eq!(provider.update_url().as_str(), "http://localhost:8983/solr/update");

        let provider = provider_for("http://search.internal:8983/base", Duration::from_secs(1));
        assert_eq!(
            provider.update_url().as_str(),
            "http://search.internal:8983/base/solr/update"
        );
    }

    #[test]
    fn test_invalid_url_is_configuration_error() {
        let result = SolrProvider::new(&SolrConfig::new("not a url", Duration::from_secs(1)));
        assert!(matches!(result, Err(SearchIndexError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_add_posts_xml_document() {
        let (url, server) = spawn_responder("200 OK", Duration::ZERO).await;
        let provider = provider_for(&url, Duration::from_secs(5));

        let mut doc = FlattenedDocument::new();
        doc.push("run_list", "a & b");
        provider.add_document(&doc).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /solr/update HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: text/xml"));
        assert!(request.ends_with(
            "<add><doc><field name=\"run_list\">a &amp; b</field></doc></add>\n"
        ));
    }

    #[tokio::test]
    async fn test_delete_posts_id_only() {
        let (url, server) = spawn_responder("200 OK", Duration::ZERO).await;
        let provider = provider_for(&url, Duration::from_secs(5));

        provider.delete_document("42").await.unwrap();

        let request = server.await.unwrap();
        assert!(request.ends_with("<delete><id>42</id></delete>\n"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejection() {
        let (url, _server) = spawn_responder("500 Internal Server Error", Duration::ZERO).await;
        let provider = provider_for(&url, Duration::from_secs(5));

        let err = provider.delete_document("42").await.unwrap_err();
        assert!(matches!(err, SearchIndexError::Rejected { status: 500, .. }));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = provider_for(&format!("http://{addr}"), Duration::from_secs(5));
        let err = provider.delete_document("42").await.unwrap_err();
        assert!(matches!(err, SearchIndexError::ConnectionError(_)));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let (url, _server) = spawn_responder("200 OK", Duration::from_secs(5)).await;
        let provider = provider_for(&url, Duration::from_millis(100));

        let err = provider.delete_document("42").await.unwrap_err();
        assert!(matches!(err, SearchIndexError::Timeout(_)));
    }
}
