//! Host runtime that owns the request lifecycle for an offline handler.

use color_eyre::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::traits::{FetchDisposition, Intercepted, Network, OfflineHandler, Request, ResponseSource};

/// Lifecycle state of the handler this host is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Install failed; this generation will never take control
  Redundant,
}

/// Identifies an open client (page, game session, CLI invocation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

/// Drives install → activate and routes requests through the handler.
pub struct WorkerHost<H: OfflineHandler, N: Network> {
  handler: H,
  network: Arc<N>,
  state: WorkerState,
  /// Generation currently in control, if any
  active: Option<String>,
  /// Client → generation controlling it
  clients: BTreeMap<ClientId, Option<String>>,
  next_client: u64,
}

impl<H: OfflineHandler, N: Network> WorkerHost<H, N> {
  /// `active` is the generation already in control from an earlier run.
  /// When it is the handler's own generation the host resumes as activated.
  pub fn new(handler: H, network: Arc<N>, active: Option<String>) -> Self {
    let state = if active.as_deref() == Some(handler.generation()) {
      WorkerState::Activated
    } else {
      WorkerState::Parsed
    };

    Self {
      handler,
      network,
      state,
      active,
      clients: BTreeMap::new(),
      next_client: 0,
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn active_generation(&self) -> Option<&str> {
    self.active.as_deref()
  }

  pub fn handler(&self) -> &H {
    &self.handler
  }

  /// Open a new client. It is controlled right away if the handler is
  /// activated, otherwise it waits for the next activation to claim it.
  pub fn register_client(&mut self) -> ClientId {
    let id = ClientId(self.next_client);
    self.next_client += 1;
    let controller = match self.state {
      WorkerState::Activated => Some(self.handler.generation().to_string()),
      _ => None,
    };
    self.clients.insert(id, controller);
    id
  }

  /// Generation controlling a client, if any.
  pub fn controller(&self, client: ClientId) -> Option<&str> {
    self.clients.get(&client).and_then(|g| g.as_deref())
  }

  /// Install the handler's generation. When the handler skips waiting,
  /// activation follows immediately.
  ///
  /// On failure the handler becomes redundant and the previously active
  /// generation stays in control.
  pub async fn install(&mut self) -> Result<()> {
    self.state = WorkerState::Installing;

    if let Err(e) = self.handler.on_install().await {
      warn!(
        "Install of {} failed, keeping {:?}: {}",
        self.handler.generation(),
        self.active,
        e
      );
      self.state = WorkerState::Redundant;
      return Err(e);
    }

    self.state = WorkerState::Installed;

    if self.handler.skip_waiting() {
      self.activate().await?;
    }

    Ok(())
  }

  /// Activate the handler's generation and claim every open client.
  ///
  /// On failure the handler becomes redundant and nothing is claimed.
  pub async fn activate(&mut self) -> Result<Vec<String>> {
    self.state = WorkerState::Activating;
    let deleted = match self.handler.on_activate().await {
      Ok(deleted) => deleted,
      Err(e) => {
        warn!(
          "Activation of {} failed, keeping {:?}: {}",
          self.handler.generation(),
          self.active,
          e
        );
        self.state = WorkerState::Redundant;
        return Err(e);
      }
    };

    let generation = self.handler.generation().to_string();
    for controller in self.clients.values_mut() {
      *controller = Some(generation.clone());
    }
    info!(
      "Generation {} active, claimed {} client(s)",
      generation,
      self.clients.len()
    );

    self.active = Some(generation);
    self.state = WorkerState::Activated;
    Ok(deleted)
  }

  /// Route one request. Only an activated handler intercepts; bypassed
  /// requests go straight to the network and never touch the cache.
  pub async fn handle(&self, request: Request) -> Result<Intercepted> {
    let disposition = if self.state == WorkerState::Activated {
      self.handler.on_fetch(request.clone()).await?
    } else {
      FetchDisposition::Bypass
    };

    match disposition {
      FetchDisposition::Respond(intercepted) => Ok(intercepted),
      FetchDisposition::Bypass => {
        let response = match self.network.fetch(&request).await {
          Ok(response) => Some(response),
          Err(e) => {
            debug!("{} {} failed: {}", request.method, request.url, e);
            None
          }
        };
        let source = if response.is_some() {
          ResponseSource::Network
        } else {
          ResponseSource::None
        };
        Ok(Intercepted {
          response,
          source,
          revalidation: None,
        })
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::policy::tests::{config, FakeNetwork};
  use crate::cache::policy::CacheFirstPolicy;
  use crate::cache::storage::{CacheStorage, MemoryStorage};
  use crate::cache::traits::{Method, Response};

  type Host = WorkerHost<CacheFirstPolicy<MemoryStorage, FakeNetwork>, FakeNetwork>;

  fn host(
    generation: &str,
    manifest: &[&str],
    storage: &Arc<MemoryStorage>,
    network: &Arc<FakeNetwork>,
    active: Option<&str>,
  ) -> Host {
    let policy = CacheFirstPolicy::new(
      &config(generation, manifest),
      Arc::clone(storage),
      Arc::clone(network),
    )
    .unwrap();
    WorkerHost::new(policy, Arc::clone(network), active.map(String::from))
  }

  #[tokio::test]
  async fn test_install_activates_immediately_and_claims_clients() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    network.serve("/", Response::new(200, "root"));
    storage
      .put("v0", &Request::get("/"), &Response::new(200, "stale"))
      .unwrap();

    let mut host = host("v1", &["/"], &storage, &network, Some("v0"));
    let client = host.register_client();
    assert_eq!(host.controller(client), None);

    host.install().await.unwrap();

    assert_eq!(host.state(), WorkerState::Activated);
    assert_eq!(host.active_generation(), Some("v1"));
    assert_eq!(host.controller(client), Some("v1"));
    assert_eq!(storage.bucket_names().unwrap(), vec!["v1"]);
  }

  #[tokio::test]
  async fn test_failed_install_keeps_previous_generation() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    storage
      .put("v1", &Request::get("/"), &Response::new(200, "root"))
      .unwrap();

    let mut host = host("v2", &["/", "kenney3d_char_pedro.glb"], &storage, &network, Some("v1"));

    assert!(host.install().await.is_err());
    assert_eq!(host.state(), WorkerState::Redundant);
    assert_eq!(host.active_generation(), Some("v1"));
    assert_eq!(storage.bucket_names().unwrap(), vec!["v1"]);
  }

  #[tokio::test]
  async fn test_bypassed_request_goes_to_network() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    network.serve("submit", Response::new(201, "created"));
    let host = host("v1", &[], &storage, &network, None);

    let result = host
      .handle(Request::new(Method::Post, "submit"))
      .await
      .unwrap();

    assert_eq!(result.response.unwrap().status, 201);
    assert_eq!(result.source, ResponseSource::Network);
    assert!(result.revalidation.is_none());
    assert!(storage.bucket_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_bypassed_request_network_failure_is_empty() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    let host = host("v1", &[], &storage, &network, None);

    let result = host
      .handle(Request::new(Method::Post, "submit"))
      .await
      .unwrap();

    assert!(result.response.is_none());
    assert_eq!(result.source, ResponseSource::None);
  }

  #[tokio::test]
  async fn test_handle_serves_installed_assets_offline() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    network.serve("index.html", Response::new(200, "index"));
    let mut host = host("v1", &["index.html"], &storage, &network, None);
    host.install().await.unwrap();
    network.go_offline();

    let result = host.handle(Request::get("index.html")).await.unwrap();

    assert_eq!(result.response.unwrap().body, b"index");
    assert_eq!(result.source, ResponseSource::Cache);
    assert!(result.revalidation.unwrap().finish().await.is_none());
  }

  #[tokio::test]
  async fn test_redundant_handler_does_not_intercept() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    network.serve("/", Response::new(200, "root"));
    network.serve("level.ogg", Response::new(200, "music"));
    storage
      .put("v1", &Request::get("/"), &Response::new(200, "old root"))
      .unwrap();

    let mut host = host("v2", &["/", "missing.glb"], &storage, &network, Some("v1"));
    assert!(host.install().await.is_err());

    let result = host.handle(Request::get("level.ogg")).await.unwrap();

    assert_eq!(result.response.unwrap().body, b"music");
    assert_eq!(result.source, ResponseSource::Network);
    assert_eq!(storage.bucket_names().unwrap(), vec!["v1"]);
    assert!(storage.match_request(&Request::get("level.ogg")).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_uninstalled_generation_does_not_intercept() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    network.serve("index.html", Response::new(200, "index"));
    let mut host = host("v1", &["index.html"], &storage, &network, None);
    let client = host.register_client();

    let result = host.handle(Request::get("index.html")).await.unwrap();

    assert_eq!(host.state(), WorkerState::Parsed);
    assert_eq!(host.controller(client), None);
    assert_eq!(result.source, ResponseSource::Network);
    assert!(storage.bucket_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_resumed_generation_controls_new_clients() {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(FakeNetwork::default());
    storage
      .put("v1", &Request::get("index.html"), &Response::new(200, "index"))
      .unwrap();

    let mut host = host("v1", &["index.html"], &storage, &network, Some("v1"));
    let client = host.register_client();

    assert_eq!(host.state(), WorkerState::Activated);
    assert_eq!(host.controller(client), Some("v1"));
    let result = host.handle(Request::get("index.html")).await.unwrap();
    assert_eq!(result.source, ResponseSource::Cache);
  }

  /// Handler whose activation always fails.
  struct FailingActivation;

  impl OfflineHandler for FailingActivation {
    async fn on_install(&self) -> Result<()> {
      Ok(())
    }

    async fn on_activate(&self) -> Result<Vec<String>> {
      Err(color_eyre::eyre::eyre!("storage unavailable"))
    }

    async fn on_fetch(&self, _request: Request) -> Result<FetchDisposition> {
      Ok(FetchDisposition::Bypass)
    }

    fn generation(&self) -> &str {
      "v2"
    }
  }

  #[tokio::test]
  async fn test_failed_activation_marks_redundant() {
    let network = Arc::new(FakeNetwork::default());
    let mut host = WorkerHost::new(FailingActivation, network, Some("v1".to_string()));
    let client = host.register_client();

    assert!(host.install().await.is_err());

    assert_eq!(host.state(), WorkerState::Redundant);
    assert_eq!(host.active_generation(), Some("v1"));
    assert_eq!(host.controller(client), None);
  }
}
