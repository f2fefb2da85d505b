//! reqwest-backed network boundary.

use color_eyre::{eyre::eyre, Result};
use url::Url;

use super::traits::{Network, Request, Response};

/// HTTP client used for install-time and runtime fetches.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
  /// Base for relative identifiers such as `index.html`
  scope: Option<Url>,
}

impl HttpNetwork {
  pub fn new(scope: Option<&str>) -> Result<Self> {
    let scope = scope
      .map(|s| Url::parse(s).map_err(|e| eyre!("Invalid cache scope '{}': {}", s, e)))
      .transpose()?;

    let client = reqwest::Client::builder()
      .user_agent(concat!("lanerun/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, scope })
  }

  fn absolute_url(&self, raw: &str) -> Result<Url> {
    match Url::parse(raw) {
      Ok(url) => Ok(url),
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        let base = self
          .scope
          .as_ref()
          .ok_or_else(|| eyre!("Relative URL {} needs a cache scope", raw))?;
        base
          .join(raw)
          .map_err(|e| eyre!("Failed to resolve {}: {}", raw, e))
      }
      Err(e) => Err(eyre!("Invalid URL {}: {}", raw, e)),
    }
  }
}

impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = self.absolute_url(&request.url)?;
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
      .map_err(|e| eyre!("Invalid method {}: {}", request.method, e))?;

    let response = self
      .client
      .request(method, url)
      .send()
      .await
      .map_err(|e| eyre!("Request to {} failed: {}", request.url, e))?;

    let status = response.status().as_u16();
    let headers: Vec<(String, String)> = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

    Ok(
      headers
        .into_iter()
        .fold(Response::new(status, body.to_vec()), |r, (name, value)| {
          r.with_header(name, value)
        }),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_relative_url_resolves_against_scope() {
    let network = HttpNetwork::new(Some("https://game.example/app/")).unwrap();
    assert_eq!(
      network.absolute_url("index.html").unwrap().as_str(),
      "https://game.example/app/index.html"
    );
    assert_eq!(
      network.absolute_url("/").unwrap().as_str(),
      "https://game.example/"
    );
  }

  #[test]
  fn test_absolute_url_passes_through() {
    let network = HttpNetwork::new(None).unwrap();
    assert_eq!(
      network
        .absolute_url("https://cdn.example/three.module.js")
        .unwrap()
        .as_str(),
      "https://cdn.example/three.module.js"
    );
  }

  #[test]
  fn test_relative_url_without_scope_fails() {
    let network = HttpNetwork::new(None).unwrap();
    assert!(network.absolute_url("index.html").is_err());
  }

  #[tokio::test]
  async fn test_unreachable_host_is_a_network_error() {
    let network = HttpNetwork::new(None).unwrap();
    let result = network.fetch(&Request::get("http://127.0.0.1:9/asset.png")).await;
    assert!(result.is_err());
  }
}
