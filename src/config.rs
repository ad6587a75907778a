//! Service configuration: TOML file (QUIZ_CONFIG_PATH) plus environment overrides.
//!
//! Every section is optional; missing keys fall back to defaults.
//!
//! ```toml
//! [server]
//! port = 4005
//!
//! [store]
//! backend = "sqlite"   # or "memory"
//! path = "quiz.db"
//!
//! [auth]
//! bcrypt_cost = 12
//! min_password_len = 1
//!
//! [limits]
//! question_upload_bytes = 5242880
//! participant_upload_bytes = 10485760
//! questions_list_max = 5000
//! questions_by_level_max = 2000
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuizConfig {
  #[serde(default)] pub server: ServerConfig,
  #[serde(default)] pub store: StoreConfig,
  #[serde(default)] pub auth: AuthConfig,
  #[serde(default)] pub limits: Limits,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self { Self { port: 4005 } }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
  #[default]
  Sqlite,
  Memory,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub backend: StoreBackend,
  pub path: PathBuf,
}

impl Default for StoreConfig {
  fn default() -> Self { Self { backend: StoreBackend::Sqlite, path: PathBuf::from("quiz.db") } }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
  pub bcrypt_cost: u32,
  /// Single registration only; bulk uploads accept any non-empty password.
  pub min_password_len: usize,
}

impl Default for AuthConfig {
  fn default() -> Self { Self { bcrypt_cost: bcrypt::DEFAULT_COST, min_password_len: 1 } }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  pub question_upload_bytes: usize,
  pub participant_upload_bytes: usize,
  pub questions_list_max: usize,
  pub questions_by_level_max: usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      question_upload_bytes: 5 * 1024 * 1024,
      participant_upload_bytes: 10 * 1024 * 1024,
      questions_list_max: 5000,
      questions_by_level_max: 2000,
    }
  }
}

impl QuizConfig {
  /// File from QUIZ_CONFIG_PATH (if any), then PORT / QUIZ_DB_PATH / QUIZ_STORE / BCRYPT_COST.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    cfg.apply_overrides(|key| std::env::var(key).ok());
    cfg
  }

  /// Overrides read through `lookup` so tests need not touch the process environment.
  pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("PORT") {
      match v.parse::<u16>() {
        Ok(port) => self.server.port = port,
        Err(_) => warn!(target: "quiz_backend", value = %v, "Ignoring invalid PORT"),
      }
    }
    if let Some(v) = lookup("QUIZ_DB_PATH") {
      self.store.path = PathBuf::from(v);
    }
    if let Some(v) = lookup("QUIZ_STORE") {
      match v.to_ascii_lowercase().as_str() {
        "sqlite" => self.store.backend = StoreBackend::Sqlite,
        "memory" => self.store.backend = StoreBackend::Memory,
        _ => warn!(target: "quiz_backend", value = %v, "Ignoring unknown QUIZ_STORE"),
      }
    }
    if let Some(v) = lookup("BCRYPT_COST") {
      match v.parse::<u32>() {
        Ok(cost) => self.auth.bcrypt_cost = cost,
        Err(_) => warn!(target: "quiz_backend", value = %v, "Ignoring invalid BCRYPT_COST"),
      }
    }
  }
}

/// Attempt to load `QuizConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<QuizConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<QuizConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quiz_backend", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quiz_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quiz_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
