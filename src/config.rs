use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Cache generation identifier. Bump it to invalidate every older bucket.
  pub generation: String,
  /// Assets pre-cached at install, in order
  pub manifest: Vec<String>,
  /// Base URL relative identifiers resolve against (e.g. "https://host/app/")
  pub scope: Option<String>,
  /// SQLite database path (defaults to $XDG_DATA_HOME/lanerun/cache.db)
  pub db_path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      generation: "lanerun-cache-v1".to_string(),
      manifest: vec!["/".to_string(), "index.html".to_string()],
      scope: None,
      db_path: None,
    }
  }
}

/// Game tunables. Defaults match the classic feel of the game.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
  /// Per-frame chance of spawning an obstacle
  pub obstacle_chance: f64,
  /// Per-frame chance of spawning a coin
  pub coin_chance: f64,
  pub initial_speed: f32,
  pub max_speed: f32,
  /// Speed gained per point of score
  pub acceleration: f32,
  pub jump_velocity: f32,
  pub gravity: f32,
  pub coin_value: u64,
  /// Fixed RNG seed for reproducible runs
  pub seed: Option<u64>,
  /// Frames per second of the simulation
  pub fps: u32,
}

impl Default for GameConfig {
  fn default() -> Self {
    Self {
      obstacle_chance: 0.02,
      coin_chance: 0.03,
      initial_speed: 0.1,
      max_speed: 0.2,
      acceleration: 0.00001,
      jump_velocity: 0.3,
      gravity: -0.02,
      coin_value: 10,
      seed: None,
      fps: 60,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./lanerun.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/lanerun/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("lanerun.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("lanerun").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.generation.trim().is_empty() {
      return Err(eyre!("cache.generation must not be empty"));
    }
    for (name, p) in [
      ("game.obstacle_chance", self.game.obstacle_chance),
      ("game.coin_chance", self.game.coin_chance),
    ] {
      if !(0.0..=1.0).contains(&p) {
        return Err(eyre!("{} must be between 0 and 1, got {}", name, p));
      }
    }
    if self.game.fps == 0 {
      return Err(eyre!("game.fps must be positive"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.cache.generation, "lanerun-cache-v1");
    assert_eq!(config.cache.manifest, vec!["/", "index.html"]);
    assert_eq!(config.game.coin_value, 10);
  }

  #[test]
  fn test_partial_sections_keep_other_defaults() {
    let yaml = r#"
cache:
  generation: fofr-pedro-cache-v2
  manifest:
    - /
    - index.html
    - kenney3d_char_pedro.glb
  scope: https://game.example/
game:
  seed: 7
  coin_chance: 0.5
"#;
    let config = Config::parse(yaml).unwrap();
    assert_eq!(config.cache.generation, "fofr-pedro-cache-v2");
    assert_eq!(config.cache.manifest.len(), 3);
    assert_eq!(config.cache.scope.as_deref(), Some("https://game.example/"));
    assert_eq!(config.game.seed, Some(7));
    assert_eq!(config.game.coin_chance, 0.5);
    assert_eq!(config.game.obstacle_chance, 0.02);
  }

  #[test]
  fn test_rejects_empty_generation() {
    assert!(Config::parse("cache:\n  generation: ''\n").is_err());
  }

  #[test]
  fn test_rejects_bad_probability() {
    assert!(Config::parse("game:\n  obstacle_chance: 1.5\n").is_err());
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/lanerun.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_load_from_explicit_path() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("lanerun.yaml");
    std::fs::write(&path, "cache:\n  generation: v9\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.cache.generation, "v9");
  }

  #[test]
  fn test_example_config_parses() {
    let config = Config::parse(include_str!("../lanerun.example.yaml")).unwrap();
    assert_eq!(config.cache.generation, "fofr-pedro-cache-v1");
    assert_eq!(config.cache.manifest.len(), 20);
    assert_eq!(config.cache.manifest[0], "/");
    assert_eq!(config.game.fps, 60);
  }
}
