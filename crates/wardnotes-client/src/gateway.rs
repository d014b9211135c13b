//! Authenticated JSON transport for the hospital API.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, header::CONTENT_TYPE};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Every API path is mounted under this prefix.
pub const API_PREFIX: &str = "/api/v1";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the API.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
  pub base_url:     String,
  /// Bearer token. Requests fail with [`Error::MissingToken`] without one.
  pub access_token: Option<String>,
  pub timeout:      Duration,
}

impl GatewayConfig {
  pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
    Self { base_url: base_url.into(), access_token, timeout: DEFAULT_TIMEOUT }
  }
}

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct Gateway {
  client: Client,
  config: GatewayConfig,
}

impl Gateway {
  pub fn new(config: GatewayConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &GatewayConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}{API_PREFIX}{path}", self.config.base_url.trim_end_matches('/'))
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
    self.call::<(), T>(Method::GET, path, query, None).await
  }

  pub async fn post<B, T>(&self, path: &str, query: &[(&str, &str)], body: Option<&B>) -> Result<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self.call(Method::POST, path, query, body).await
  }

  pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    self.call(Method::PATCH, path, &[], Some(body)).await
  }

  async fn call<B, T>(
    &self,
    method: Method,
    path: &str,
    query: &[(&str, &str)],
    body: Option<&B>,
  ) -> Result<T>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let token = self
      .config
      .access_token
      .as_deref()
      .filter(|t| !t.is_empty())
      .ok_or(Error::MissingToken)?;

    debug!(%method, path, "api request");
    let mut req = self
      .client
      .request(method.clone(), self.url(path))
      .bearer_auth(token)
      .header(CONTENT_TYPE, "application/json");
    if !query.is_empty() {
      req = req.query(query);
    }
    if let Some(body) = body {
      req = req.json(body);
    }

    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let text = resp.text().await.unwrap_or_default();
      let message = error_message(&text);
      warn!(%method, path, %status, %message, "api request failed");
      return Err(Error::Status { method, path: path.to_string(), status, message });
    }

    let bytes = resp.bytes().await?;
    if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
      return empty_body();
    }
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// PUT `bytes` straight to a pre-signed blob storage URL. No bearer token
  /// is sent; the URL carries its own signature.
  pub async fn put_blob(&self, upload_url: &str, content_type: &str, bytes: Bytes) -> Result<()> {
    debug!(len = bytes.len(), content_type, "uploading blob");
    let resp = self
      .client
      .put(upload_url)
      .header("x-ms-blob-type", "BlockBlob")
      .header(CONTENT_TYPE, content_type)
      .body(bytes)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      warn!(%status, "blob upload rejected");
      return Err(Error::Upload { status });
    }
    Ok(())
  }
}

/// The value a body-less success stands for: `null`, `{}` or `[]`, whichever
/// `T` accepts.
fn empty_body<T: DeserializeOwned>() -> Result<T> {
  serde_json::from_value(Value::Null)
    .or_else(|_| serde_json::from_value(Value::Object(Default::default())))
    .or_else(|_| serde_json::from_value(Value::Array(Vec::new())))
    .map_err(Error::Json)
}

fn error_message(body: &str) -> String {
  let detail = serde_json::from_str::<Value>(body).ok().and_then(|v| match v.get("detail")? {
    Value::String(s) => Some(s.clone()),
    Value::Null => None,
    other => Some(other.to_string()),
  });
  detail.unwrap_or_else(|| body.trim().to_string())
}
