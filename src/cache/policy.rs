//! Cache-first policy: install a manifest, prune old generations, and serve
//! GET requests from cache while refreshing from the network.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::storage::{CacheStorage, CachedResponse};
use super::traits::{
  FetchDisposition, Intercepted, Network, OfflineHandler, Request, Response, ResponseSource,
  Revalidation,
};
use crate::config::CacheConfig;

/// The single cache policy, parameterized by generation and manifest.
pub struct CacheFirstPolicy<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: Arc<N>,
  generation: String,
  manifest: Vec<String>,
  /// Base URL relative identifiers resolve against
  scope: Option<Url>,
}

impl<S: CacheStorage, N: Network> CacheFirstPolicy<S, N> {
  pub fn new(config: &CacheConfig, storage: Arc<S>, network: Arc<N>) -> Result<Self> {
    let scope = config
      .scope
      .as_deref()
      .map(|s| Url::parse(s).map_err(|e| eyre!("Invalid cache scope '{}': {}", s, e)))
      .transpose()?;

    Ok(Self {
      storage,
      network,
      generation: config.generation.clone(),
      manifest: config.manifest.clone(),
      scope,
    })
  }

  /// Resolve an identifier against the scope. Absolute URLs pass through.
  pub fn resolve(&self, identifier: &str) -> String {
    match &self.scope {
      Some(base) => base
        .join(identifier)
        .map(String::from)
        .unwrap_or_else(|_| identifier.to_string()),
      None => identifier.to_string(),
    }
  }

  fn normalize(&self, request: Request) -> Request {
    Request {
      url: self.resolve(&request.url),
      ..request
    }
  }

  /// Stored response for a GET of `identifier`, from any bucket.
  pub fn lookup(&self, identifier: &str) -> Result<Option<CachedResponse>> {
    self
      .storage
      .match_request(&Request::get(self.resolve(identifier)))
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  pub fn manifest(&self) -> &[String] {
    &self.manifest
  }

  /// Spawn the network half of an interception. A status-200 response is
  /// written to the current generation before the task completes.
  fn spawn_network_fetch(&self, request: Request) -> tokio::task::JoinHandle<Option<Response>> {
    let storage = Arc::clone(&self.storage);
    let network = Arc::clone(&self.network);
    let bucket = self.generation.clone();

    tokio::spawn(async move {
      match network.fetch(&request).await {
        Ok(response) => {
          if response.is_cacheable() {
            if let Err(e) = storage.put(&bucket, &request, &response) {
              warn!("Failed to cache {}: {}", request.url, e);
            }
          }
          Some(response)
        }
        Err(e) => {
          debug!("Network fetch for {} failed: {}", request.url, e);
          None
        }
      }
    })
  }
}

impl<S: CacheStorage, N: Network> OfflineHandler for CacheFirstPolicy<S, N> {
  async fn on_install(&self) -> Result<()> {
    let requests: Vec<Request> = self
      .manifest
      .iter()
      .map(|id| Request::get(self.resolve(id)))
      .collect();

    info!(
      "Installing cache generation {} ({} assets)",
      self.generation,
      requests.len()
    );

    // Fetch everything before touching storage so a failure leaves no bucket
    let responses = try_join_all(requests.iter().map(|request| {
      let network = Arc::clone(&self.network);
      async move {
        let response = network
          .fetch(request)
          .await
          .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;
        if !response.is_cacheable() {
          return Err(eyre!(
            "Failed to fetch {}: status {}",
            request.url,
            response.status
          ));
        }
        Ok(response)
      }
    }))
    .await?;

    let entries: Vec<(Request, Response)> = requests.into_iter().zip(responses).collect();
    self.storage.put_all(&self.generation, &entries)?;

    info!("Installed cache generation {}", self.generation);
    Ok(())
  }

  async fn on_activate(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for name in self.storage.bucket_names()? {
      if name != self.generation {
        self.storage.delete_bucket(&name)?;
        info!("Deleted stale cache bucket {}", name);
        deleted.push(name);
      }
    }

    Ok(deleted)
  }

  async fn on_fetch(&self, request: Request) -> Result<FetchDisposition> {
    if !request.is_get() {
      return Ok(FetchDisposition::Bypass);
    }

    let request = self.normalize(request);
    let cached = self.storage.match_request(&request)?;

    // The network is always consulted, even on a cache hit
    let network_fetch = self.spawn_network_fetch(request.clone());

    let intercepted = match cached {
      Some(cached) => {
        debug!("Serving {} from cache bucket {}", request.url, cached.bucket);
        Intercepted {
          response: Some(cached.response),
          source: ResponseSource::Cache,
          revalidation: Some(Revalidation::new(network_fetch)),
        }
      }
      None => match network_fetch.await.ok().flatten() {
        Some(response) => Intercepted {
          response: Some(response),
          source: ResponseSource::Network,
          revalidation: None,
        },
        None => Intercepted {
          response: None,
          source: ResponseSource::None,
          revalidation: None,
        },
      },
    };

    Ok(FetchDisposition::Respond(intercepted))
  }

  fn generation(&self) -> &str {
    &self.generation
  }
}
