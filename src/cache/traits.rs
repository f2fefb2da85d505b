//! Core traits and types for the offline cache.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::future::Future;
use tokio::task::JoinHandle;

/// HTTP request method. Only `Get` is ever intercepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
  Options,
  Other(String),
}

impl Method {
  /// Parse a method name, case-insensitively.
  pub fn parse(s: &str) -> Self {
    match s.to_ascii_uppercase().as_str() {
      "GET" => Method::Get,
      "HEAD" => Method::Head,
      "POST" => Method::Post,
      "PUT" => Method::Put,
      "DELETE" => Method::Delete,
      "PATCH" => Method::Patch,
      "OPTIONS" => Method::Options,
      other => Method::Other(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
      Method::Options => "OPTIONS",
      Method::Other(m) => m,
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A request as seen at the network boundary. Identity is method + URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
  pub method: Method,
  pub url: String,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn is_get(&self) -> bool {
    self.method == Method::Get
  }

  /// Stable, fixed-length storage key for this request's identity.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Only status-200 responses are eligible for caching.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// The network side of the boundary.
///
/// A returned `Err` means the request never produced a response (DNS,
/// connection, TLS, bad URL). Non-200 statuses are still `Ok`.
pub trait Network: Send + Sync + 'static {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Served from a cache bucket
  Cache,
  /// Fresh from the network
  Network,
  /// Nothing cached and the network failed
  None,
}

/// Background network refresh that keeps running after a cached response
/// has been returned.
#[derive(Debug)]
pub struct Revalidation {
  handle: JoinHandle<Option<Response>>,
}

impl Revalidation {
  pub(crate) fn new(handle: JoinHandle<Option<Response>>) -> Self {
    Self { handle }
  }

  /// Wait for the refresh. Returns the network response if one arrived.
  pub async fn finish(self) -> Option<Response> {
    self.handle.await.ok().flatten()
  }
}

/// Result of intercepting a GET request.
#[derive(Debug)]
pub struct Intercepted {
  pub response: Option<Response>,
  pub source: ResponseSource,
  /// Set when the response came from cache and a refresh is still in flight
  pub revalidation: Option<Revalidation>,
}

/// What the host should do with a request.
#[derive(Debug)]
pub enum FetchDisposition {
  /// Not intercepted; send it straight to the network
  Bypass,
  /// Intercepted and resolved
  Respond(Intercepted),
}

/// Lifecycle hooks a host runtime invokes on an offline handler.
pub trait OfflineHandler: Send + Sync {
  /// Populate the current generation. Fails as a whole if any asset fails.
  fn on_install(&self) -> impl Future<Output = Result<()>> + Send;

  /// Remove every bucket from older generations. Returns the deleted names.
  fn on_activate(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

  /// Intercept one request.
  fn on_fetch(&self, request: Request) -> impl Future<Output = Result<FetchDisposition>> + Send;

  /// Whether activation should follow install without waiting for clients.
  fn skip_waiting(&self) -> bool {
    true
  }

  /// Generation identifier this handler installs and keeps.
  fn generation(&self) -> &str;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_method_parse_is_case_insensitive() {
    assert_eq!(Method::parse("get"), Method::Get);
    assert_eq!(Method::parse("Post"), Method::Post);
    assert_eq!(Method::parse("purge"), Method::Other("PURGE".to_string()));
  }

  #[test]
  fn test_cache_key_depends_on_method_and_url() {
    let a = Request::get("index.html");
    let b = Request::new(Method::Head, "index.html");
    let c = Request::get("/");
    assert_eq!(a.cache_key(), Request::get("index.html").cache_key());
    assert_ne!(a.cache_key(), b.cache_key());
    assert_ne!(a.cache_key(), c.cache_key());
    assert_eq!(a.cache_key().len(), 64);
  }

  #[test]
  fn test_only_status_200_is_cacheable() {
    assert!(Response::new(200, "ok").is_cacheable());
    assert!(!Response::new(204, "").is_cacheable());
    assert!(!Response::new(404, "missing").is_cacheable());
  }

  #[test]
  fn test_header_lookup_ignores_case() {
    let response = Response::new(200, "x").with_header("Content-Type", "text/html");
    assert_eq!(response.header("content-type"), Some("text/html"));
    assert_eq!(response.header("etag"), None);
  }
}
