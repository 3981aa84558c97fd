use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use http::HeaderValue;
use zeroize::Zeroizing;

/// Default upstream base URL (OpenAI-compatible).
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Model selected by the client when nothing else is chosen.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Model suggested when the requested one is unknown upstream.
pub const FALLBACK_MODEL: &str = "gpt-3.5-turbo";

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The credential for the completion API, if configured.
    pub openai_api_key: Option<Zeroizing<String>>,
    /// The base URL of the completion API.
    pub openai_base_url: String,
    /// The model used when a caller does not name one.
    pub default_model: String,
    /// The model recommended after a `model_not_found` error.
    pub fallback_model: String,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<HeaderValue>,
    /// Directory served as the static front-end bundle.
    pub static_dir: PathBuf,
    /// Deployment environment name, reported by `/api/debug`.
    pub app_env: String,
    /// Where the terminal client keeps its local store.
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// A missing `OPENAI_API_KEY` is not an error here: the gateway reports
    /// it per request instead.
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Zeroizing::new);

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .context("Invalid BIND_ADDR (expected host:port)")?;

        let allowed_origins = parse_origins(
            &env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string()),
        )?;

        Ok(Self {
            openai_api_key,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            fallback_model: env::var("FALLBACK_MODEL")
                .unwrap_or_else(|_| FALLBACK_MODEL.to_string()),
            bind_addr,
            allowed_origins,
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "files/public".to_string())
                .into(),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            data_dir: env::var("PIXEL_CHAT_DATA_DIR").ok().map(PathBuf::from),
        })
    }

    /// Whether the completion API credential is present.
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid origin in ALLOWED_ORIGINS: {origin}"))
        })
        .collect()
}
