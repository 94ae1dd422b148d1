use std::str::FromStr;

use anyhow::{Result, bail};
use tracing::warn;

use ideaboard_backend::BackendConfig;

pub const URL_VAR: &str = "SUPABASE_PROJECT_URL";
pub const KEY_VAR: &str = "SUPABASE_API_KEY";
pub const BACKEND_VAR: &str = "IDEABOARD_BACKEND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgrest,
    Memory,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "postgrest" | "supabase" => Ok(Self::Postgrest),
            "memory" => Ok(Self::Memory),
            other => bail!("{} must be `postgrest` or `memory`, got `{}`", BACKEND_VAR, other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub kind: BackendKind,
    pub backend: BackendConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// URL and key are read as given. A missing one is only logged; the
    /// first request will fail with the backend's own error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = lookup(BACKEND_VAR).unwrap_or_default().parse()?;
        let url = lookup(URL_VAR).unwrap_or_default();
        let key = lookup(KEY_VAR).unwrap_or_default();

        if kind == BackendKind::Postgrest {
            if url.is_empty() {
                warn!("{} is not set", URL_VAR);
            }
            if key.is_empty() {
                warn!("{} is not set", KEY_VAR);
            }
        }

        Ok(Self {
            kind,
            backend: BackendConfig { url, key },
        })
    }
}
