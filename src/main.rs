mod app;
mod cache;
mod config;
mod event;
mod game;
mod logging;
mod ui;

use cache::{
  CacheFirstPolicy, CacheStorage, HttpNetwork, MemoryStorage, Method, Request, SqliteStorage,
  WorkerHost,
};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lanerun")]
#[command(about = "A terminal lane-runner game with an offline asset cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./lanerun.yaml, then $XDG_CONFIG_HOME/lanerun/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Log file (default: $XDG_STATE_HOME/lanerun/lanerun.log)
  #[arg(long, global = true)]
  log_file: Option<PathBuf>,

  /// Keep the asset cache in memory instead of on disk
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Play the game (default)
  Play {
    /// Fixed RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
  },
  /// Manage the offline asset cache
  #[command(subcommand)]
  Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
  /// Pre-cache the manifest into the configured generation and activate it
  Install,
  /// Delete every bucket except the configured generation
  Activate,
  /// Route a request through the cache
  Fetch {
    url: String,
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
  },
  /// Show the stored response for an identifier without touching the network
  Lookup { id: String },
  /// List buckets and their entries
  List,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_file.as_deref())?;

  let mut config = config::Config::load(args.config.as_deref())?;

  match args.command.unwrap_or(Command::Play { seed: None }) {
    Command::Play { seed } => {
      if seed.is_some() {
        config.game.seed = seed;
      }
      info!("Starting game (seed: {:?})", config.game.seed);
      let mut app = app::App::new(config.game);
      app.run().await?;
    }
    Command::Cache(command) => {
      if args.ephemeral {
        run_cache_command(command, &config.cache, MemoryStorage::new()).await?;
      } else {
        let storage = match &config.cache.db_path {
          Some(path) => SqliteStorage::open_at(path)?,
          None => SqliteStorage::open()?,
        };
        run_cache_command(command, &config.cache, storage).await?;
      }
    }
  }

  Ok(())
}

async fn run_cache_command<S: CacheStorage>(
  command: CacheCommand,
  config: &config::CacheConfig,
  storage: S,
) -> Result<()> {
  let storage = Arc::new(storage);
  let network = Arc::new(HttpNetwork::new(config.scope.as_deref())?);
  let policy = CacheFirstPolicy::new(config, Arc::clone(&storage), Arc::clone(&network))?;

  // The generation in control from an earlier run, if any
  let active = if storage.has_bucket(&config.generation)? {
    Some(config.generation.clone())
  } else {
    storage.bucket_names()?.pop()
  };

  let mut host = WorkerHost::new(policy, network, active);

  match command {
    CacheCommand::Install => {
      println!(
        "Installing {} ({} assets)",
        config.generation,
        host.handler().manifest().len()
      );
      host.install().await?;
      println!("{} is {:?}", config.generation, host.state());
    }
    CacheCommand::Activate => {
      let deleted = host.activate().await?;
      if deleted.is_empty() {
        println!("{} active, nothing to delete", config.generation);
      } else {
        println!("{} active, deleted: {}", config.generation, deleted.join(", "));
      }
    }
    CacheCommand::Fetch { url, method } => {
      let client = host.register_client();
      let result = host.handle(Request::new(Method::parse(&method), url)).await?;

      match &result.response {
        Some(response) => println!(
          "{} from {:?} ({} bytes, controller: {})",
          response.status,
          result.source,
          response.body.len(),
          host.controller(client).unwrap_or("none")
        ),
        None => println!("No response: not cached and the network failed"),
      }

      // Let the background refresh land before the runtime shuts down
      if let Some(revalidation) = result.revalidation {
        if let Some(fresh) = revalidation.finish().await {
          println!("Refreshed from network: {}", fresh.status);
        }
      }
    }
    CacheCommand::Lookup { id } => match host.handler().lookup(&id)? {
      Some(cached) => println!(
        "{} in {}: {} {} ({} bytes, cached {})",
        host.handler().resolve(&id),
        cached.bucket,
        cached.response.status,
        cached.response.header("content-type").unwrap_or("-"),
        cached.response.body.len(),
        cached.cached_at.format("%Y-%m-%d %H:%M:%S")
      ),
      None => println!("{} is not cached", host.handler().resolve(&id)),
    },
    CacheCommand::List => {
      let storage = host.handler().storage();
      for bucket in storage.bucket_names()? {
        let marker = if host.active_generation() == Some(bucket.as_str()) {
          " (active)"
        } else {
          ""
        };
        println!("{}{}", bucket, marker);
        for request in storage.keys(&bucket)? {
          if let Some(cached) = storage.match_in(&bucket, &request)? {
            println!(
              "  {} {} {} ({} bytes)",
              request.method,
              request.url,
              cached.response.status,
              cached.response.body.len()
            );
          }
        }
      }
    }
  }

  Ok(())
}
