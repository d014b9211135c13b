//! Layered settings: defaults, then `wardnotes.toml`, then `WARDNOTES_*`
//! environment variables, then command-line flags.

use std::{path::Path, time::Duration};

use anyhow::{Context as _, Result};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use wardnotes_client::GatewayConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub api_url:         String,
  #[serde(default)]
  pub access_token:    Option<String>,
  #[serde(default)]
  pub organization_id: Option<String>,
  #[serde(default)]
  pub user_id:         Option<String>,
  pub timeout_secs:    u64,
  /// Public base of uploaded blobs, e.g. `https://acct.blob.core.windows.net/notes`.
  #[serde(default)]
  pub blob_base_url:   Option<String>,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub api_url:         Option<String>,
  pub access_token:    Option<String>,
  pub organization_id: Option<String>,
  pub user_id:         Option<String>,
}

impl Settings {
  pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
    let builder = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(Environment::with_prefix("WARDNOTES"));
    Self::build(builder, overrides)
  }

  fn build(builder: ConfigBuilder<DefaultState>, overrides: &Overrides) -> Result<Self> {
    builder
      .set_default("api_url", DEFAULT_API_URL)?
      .set_default("timeout_secs", 30)?
      .set_override_option("api_url", overrides.api_url.clone())?
      .set_override_option("access_token", overrides.access_token.clone())?
      .set_override_option("organization_id", overrides.organization_id.clone())?
      .set_override_option("user_id", overrides.user_id.clone())?
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("invalid configuration")
  }

  pub fn gateway(&self) -> GatewayConfig {
    GatewayConfig {
      base_url:     self.api_url.clone(),
      access_token: self.access_token.clone(),
      timeout:      Duration::from_secs(self.timeout_secs),
    }
  }

  pub fn organization(&self) -> Result<&str> {
    self
      .organization_id
      .as_deref()
      .filter(|o| !o.is_empty())
      .context("no organization id; set organization_id or pass --organization-id")
  }
}
