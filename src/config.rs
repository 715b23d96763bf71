use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  pub content_types: Vec<ContentTypeConfig>,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Path of the SQLite cache (defaults to $XDG_DATA_HOME/wpcache/cache.db)
  pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the WordPress site; routes are passed as `?json_route=`
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Items per page for paginated listings
  #[serde(default = "default_per_page")]
  pub per_page: u32,
  /// Error codes meaning "this item does not exist", treated as a no-op
  #[serde(default = "default_invalid_response_codes")]
  pub invalid_response_codes: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentTypeConfig {
  pub name: String,
  /// Listing route (defaults to the pluralized name, e.g. "posts")
  pub route: Option<String>,
  #[serde(default)]
  pub paginated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Upper bound on pages fetched by one full sync
  #[serde(default = "default_max_pages")]
  pub max_pages: u32,
  /// Interval of the periodic full sync in `wpcache run`
  #[serde(default = "default_interval_secs")]
  pub interval_secs: u64,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_pages: default_max_pages(),
      interval_secs: default_interval_secs(),
    }
  }
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_per_page() -> u32 {
  10
}

fn default_max_pages() -> u32 {
  1000
}

fn default_interval_secs() -> u64 {
  900
}

pub fn default_invalid_response_codes() -> BTreeSet<String> {
  ["json_no_route", "json_post_invalid_type"]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./wpcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/wpcache/config.yaml
  ///
  /// `WPCACHE_URL` overrides `remote.url`.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/wpcache/config.yaml"
        ))
      }
    };

    if let Ok(url) = std::env::var("WPCACHE_URL") {
      config.remote.url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("wpcache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("wpcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }

  /// Reject configurations the engine cannot work with.
  pub fn validate(&self) -> Result<()> {
    Url::parse(&self.remote.url)
      .map_err(|e| eyre!("Invalid remote url '{}': {}", self.remote.url, e))?;

    if self.remote.per_page == 0 {
      return Err(eyre!("remote.per_page must be at least 1"));
    }

    if self.sync.max_pages == 0 {
      return Err(eyre!("sync.max_pages must be at least 1"));
    }

    if self.content_types.is_empty() {
      return Err(eyre!("At least one content type must be configured"));
    }

    let mut seen = BTreeSet::new();
    for ct in &self.content_types {
      if ct.name.trim().is_empty() {
        return Err(eyre!("Content type names must not be empty"));
      }
      if !seen.insert(ct.name.as_str()) {
        return Err(eyre!("Content type '{}' is configured twice", ct.name));
      }
    }

    Ok(())
  }

  /// Location of the cache database.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database {
      return Ok(path.clone());
    }
    Ok(data_dir()?.join("cache.db"))
  }
}

/// Directory for the cache database and log files.
pub fn data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?;

  Ok(data_dir.join("wpcache"))
}
