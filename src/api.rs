//! HTTP client for the garage backend.
//!
//! Collections live under `<base_url>/api/<collection>`:
//! - `GET` returns a JSON array of rows
//! - `POST` creates a row, `PUT /<id>` updates one
//!
//! Every failure is classified into a [`FetchError`] (network, HTTP status,
//! decode) so the poller and the CLI can report it uniformly.

use std::future::Future;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::Row;
use crate::poller::{CollectionSource, FetchError};

/// Longest error body excerpt kept in a log line
const ERROR_BODY_EXCERPT: usize = 200;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    /// Build a client for `base_url` with an optional bearer token.
    ///
    /// # Errors
    /// An empty or unparseable base URL, or an HTTP client that cannot be built.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("api.base_url must not be empty");
        }
        // Trailing slash so joins append instead of replacing the last segment
        let base_url = Url::parse(&format!("{}/", trimmed))
            .with_context(|| format!("invalid api.base_url '{}'", base_url))?;

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// URL of a collection, or of one row in it.
    ///
    /// Collection names may contain `/` to reach nested resources; the id is
    /// always a single percent-encoded path segment.
    pub fn collection_url(&self, collection: &str, id: Option<&str>) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                FetchError::Network(format!("invalid URL for '{}': base cannot hold a path", collection))
            })?;
            segments
                .pop_if_empty()
                .push("api")
                .extend(collection.split('/').filter(|s| !s.is_empty()));
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch a whole collection.
    pub async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, FetchError> {
        let url = self.collection_url(collection, None)?;
        tracing::debug!("GET {}", url);
        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(network_error)?;
        decode_json(response).await
    }

    /// Create a row; returns the backend's JSON reply, `Null` when it sends none.
    pub async fn create(&self, collection: &str, body: &Value) -> Result<Value, FetchError> {
        let url = self.collection_url(collection, None)?;
        tracing::debug!("POST {}", url);
        let response = self
            .authorize(self.http.post(url).json(body))
            .send()
            .await
            .map_err(network_error)?;
        decode_write(response).await
    }

    /// Update row `id`; returns the backend's JSON reply, `Null` when it sends none.
    pub async fn update(&self, collection: &str, id: &str, body: &Value) -> Result<Value, FetchError> {
        let url = self.collection_url(collection, Some(id))?;
        tracing::debug!("PUT {}", url);
        let response = self
            .authorize(self.http.put(url).json(body))
            .send()
            .await
            .map_err(network_error)?;
        decode_write(response).await
    }
}

impl CollectionSource for ApiClient {
    type Row = Row;

    fn fetch(&self, collection: &str) -> impl Future<Output = Result<Vec<Row>, FetchError>> + Send {
        self.list(collection)
    }
}

fn network_error(error: reqwest::Error) -> FetchError {
    FetchError::Network(error.to_string())
}

/// Check the status, then decode the body as JSON.
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let bytes = check_status(response).await?.bytes().await.map_err(network_error)?;
    parse_body(&bytes)
}

/// Like [`decode_json`], but a 2xx with no body (e.g. 204) is a success.
async fn decode_write(response: Response) -> Result<Value, FetchError> {
    let bytes = check_status(response).await?.bytes().await.map_err(network_error)?;
    parse_write_body(&bytes)
}

/// Pass a 2xx response through; anything else becomes `HttpStatus`.
async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(
            "HTTP {} body: {}",
            status.as_u16(),
            crate::formatting::truncate_string(body.trim(), ERROR_BODY_EXCERPT)
        );
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    Ok(response)
}

fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

fn parse_write_body(bytes: &[u8]) -> Result<Value, FetchError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    parse_body(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_collection_url() {
        let api = client("http://localhost:5000");
        assert_eq!(
            api.collection_url("movimientos", None).unwrap().as_str(),
            "http://localhost:5000/api/movimientos"
        );
        assert_eq!(
            api.collection_url("abonos", Some("65a1")).unwrap().as_str(),
            "http://localhost:5000/api/abonos/65a1"
        );
    }

    #[test]
    fn test_collection_url_keeps_base_path() {
        let api = client("https://example.com/garage/");
        assert_eq!(
            api.collection_url("/turnos/", None).unwrap().as_str(),
            "https://example.com/garage/api/turnos"
        );
    }

    #[test]
    fn test_collection_url_encodes_id() {
        let api = client("http://localhost:5000");
        assert_eq!(
            api.collection_url("abonos", Some("a/b?c#d")).unwrap().as_str(),
            "http://localhost:5000/api/abonos/a%2Fb%3Fc%23d"
        );
        assert_eq!(
            api.collection_url("tickets", Some("AB 123")).unwrap().as_str(),
            "http://localhost:5000/api/tickets/AB%20123"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(ApiClient::new("", None, Duration::from_secs(1)).is_err());
        assert!(ApiClient::new("not a url", None, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_token_flag() {
        let api = ApiClient::new("http://x", Some("t".to_string()), Duration::from_secs(1)).unwrap();
        assert!(api.has_token());
        assert!(!client("http://x").has_token());
    }

    #[test]
    fn test_parse_body_rows() {
        let rows: Vec<Row> =
            parse_body(br#"[{"_id":"a","patente":"ABC123"},{"_id":"b"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("patente").as_deref(), Some("ABC123"));
    }

    #[test]
    fn test_parse_body_classifies_decode_errors() {
        let err = parse_body::<Vec<Row>>(b"<html>login</html>").unwrap_err();
        assert_eq!(err.kind(), "decode");

        // An object where an array is expected
        let err = parse_body::<Vec<Row>>(br#"{"msg":"ok"}"#).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_parse_write_body_accepts_empty() {
        assert_eq!(parse_write_body(b"").unwrap(), Value::Null);
        assert_eq!(parse_write_body(b" \n").unwrap(), Value::Null);
        assert_eq!(parse_write_body(br#"{"_id":"x"}"#).unwrap()["_id"], "x");
        assert_eq!(parse_write_body(b"OK").unwrap_err().kind(), "decode");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let api = ApiClient::new("http://127.0.0.1:9", None, Duration::from_secs(2)).unwrap();
        let err = api.list::<Row>("movimientos").await.unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
