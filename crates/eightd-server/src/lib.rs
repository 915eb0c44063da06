//! HTTP server assembly for the 8D problem solving service.
//!
//! Wraps the [`eightd_api`] router with request tracing and CORS, mounted
//! under a configurable base path.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::{
  Router,
  http::{HeaderValue, Method, header},
};
use eightd_api::ApiError;
use eightd_core::store::{ProblemRepository, RootCauseRepository};
use serde::Deserialize;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};

/// Errors raised while assembling the application.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("invalid CORS origin {0:?}")]
  InvalidOrigin(String),
}

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `EIGHTD_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  /// Allowed CORS origins. A single `*` allows any origin.
  pub cors_origins:  Vec<String>,
  pub api_base_path: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:          "127.0.0.1".into(),
      port:          8080,
      store_path:    PathBuf::from("eightd.sqlite3"),
      cors_origins:  vec![
        "http://localhost:3000".into(),
        "http://127.0.0.1:3000".into(),
      ],
      api_base_path: "/api".into(),
    }
  }
}

impl ServerConfig {
  /// `host:port`, suitable for [`tokio::net::TcpListener::bind`].
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~` expanded to `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    expand_tilde(&self.store_path, std::env::var_os("HOME").map(PathBuf::from))
  }
}

/// Expand a leading `~` to `home`. Paths are returned as-is without a home.
fn expand_tilde(path: &Path, home: Option<PathBuf>) -> PathBuf {
  let Some(home) = home else {
    return path.to_path_buf();
  };
  match path.strip_prefix("~") {
    Ok(rest) => home.join(rest),
    Err(_) => path.to_path_buf(),
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application: the API nested under
/// `config.api_base_path`, plus tracing and CORS layers.
pub fn app<S>(store: Arc<S>, config: &ServerConfig) -> Result<Router, Error>
where
  S: ProblemRepository + RootCauseRepository + 'static,
{
  let api = eightd_api::api_router(store);
  let base = normalise_base_path(&config.api_base_path);

  let router = match base.as_deref() {
    Some(base) => Router::new().nest(base, api).fallback(not_found),
    None => api,
  };

  Ok(
    router
      .layer(cors_layer(&config.cors_origins)?)
      .layer(TraceLayer::new_for_http()),
  )
}

async fn not_found() -> ApiError {
  ApiError::NotFound("API endpoint not found".into())
}

/// `None` means the API is served from the root.
fn normalise_base_path(raw: &str) -> Option<String> {
  let trimmed = raw.trim().trim_matches('/');
  if trimmed.is_empty() {
    None
  } else {
    Some(format!("/{trimmed}"))
  }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, Error> {
  let allow_origin = if origins.iter().any(|o| o.trim() == "*") {
    AllowOrigin::any()
  } else {
    let list = origins
      .iter()
      .map(|o| o.trim())
      .filter(|o| !o.is_empty())
      .map(|o| {
        HeaderValue::from_str(o).map_err(|_| Error::InvalidOrigin(o.to_string()))
      })
      .collect::<Result<Vec<_>, _>>()?;
    AllowOrigin::list(list)
  };

  Ok(
    CorsLayer::new()
      .allow_origin(allow_origin)
      .allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
      ])
      .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
      .max_age(Duration::from_secs(86_400)),
  )
}
