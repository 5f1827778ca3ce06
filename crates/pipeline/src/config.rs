//! Pipeline configuration (ambient stack): lookup cache location and
//! decrypt-key source, dedup view default, and logging.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EMISX_LOOKUP_CACHE_DIR` | `./cache` | Directory holding the encrypted lookup cache |
//! | `EMISX_LOOKUP_REMOTE_URL` | unset | Remote lookup source URL |
//! | `EMISX_DECRYPT_KEY_HEX` | unset | 32-byte decryption key, hex-encoded |
//! | `EMISX_DEDUP_VIEW` | `unique_codes` | Default `CodeStore` view (`unique_codes` or `per_source`) |
//! | `EMISX_LOG_LEVEL` | `info` | Log level |

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use clinxml_codestore::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupViewArg {
    UniqueCodes,
    PerSource,
}

impl DedupViewArg {
    pub fn as_view(&self) -> View {
        match self {
            DedupViewArg::UniqueCodes => View::UniqueCodes,
            DedupViewArg::PerSource => View::PerSource,
        }
    }
}

impl FromStr for DedupViewArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "unique_codes" | "unique" => Ok(DedupViewArg::UniqueCodes),
            "per_source" | "persource" => Ok(DedupViewArg::PerSource),
            _ => Err(format!(
                "invalid dedup view '{s}'. Valid values: unique_codes, per_source"
            )),
        }
    }
}

/// Runtime configuration for the parsing pipeline, constructible from the
/// CLI or from the environment alone via [`PipelineConfig::from_env`].
#[derive(Debug, Clone, Parser)]
#[command(name = "clinxml")]
#[command(about = "Parses an EMIS clinical-search XML document into code rows")]
pub struct PipelineConfig {
    /// Directory holding the encrypted SNOMED lookup cache.
    #[arg(long, env = "EMISX_LOOKUP_CACHE_DIR", default_value = "./cache")]
    pub lookup_cache_dir: PathBuf,

    /// Remote lookup source URL, used only when no local cache is present.
    #[arg(long, env = "EMISX_LOOKUP_REMOTE_URL")]
    pub lookup_remote_url: Option<String>,

    /// 32-byte lookup cache decryption key, hex-encoded.
    #[arg(long, env = "EMISX_DECRYPT_KEY_HEX")]
    pub decrypt_key_hex: Option<String>,

    /// Default `CodeStore` view used to serialise `ui_rows`.
    #[arg(long, env = "EMISX_DEDUP_VIEW", default_value = "unique_codes")]
    pub dedup_view: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "EMISX_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl PipelineConfig {
    pub fn dedup_view(&self) -> Result<DedupViewArg, String> {
        self.dedup_view.parse()
    }

    pub fn decrypt_key(&self) -> Option<[u8; 32]> {
        let hex_str = self.decrypt_key_hex.as_deref()?;
        let bytes = hex::decode(hex_str).ok()?;
        bytes.try_into().ok()
    }

    /// Builds a configuration from environment variables only, falling back
    /// to defaults when parsing command-line-only fields fails (library
    /// callers are never holding `argv`).
    pub fn from_env() -> Self {
        Self::try_parse_from(std::iter::once("clinxml")).unwrap_or_else(|_| PipelineConfig {
            lookup_cache_dir: PathBuf::from("./cache"),
            lookup_remote_url: std::env::var("EMISX_LOOKUP_REMOTE_URL").ok(),
            decrypt_key_hex: std::env::var("EMISX_DECRYPT_KEY_HEX").ok(),
            dedup_view: "unique_codes".to_string(),
            log_level: "info".to_string(),
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookup_cache_dir: PathBuf::from("./cache"),
            lookup_remote_url: None,
            decrypt_key_hex: None,
            dedup_view: "unique_codes".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_view_defaults_to_unique_codes() {
        let config = PipelineConfig::default();
        assert_eq!(config.dedup_view().unwrap(), DedupViewArg::UniqueCodes);
    }

    #[test]
    fn test_dedup_view_rejects_unknown_value() {
        let mut config = PipelineConfig::default();
        config.dedup_view = "bogus".to_string();
        assert!(config.dedup_view().is_err());
    }

    #[test]
    fn test_decrypt_key_parses_valid_hex() {
        let mut config = PipelineConfig::default();
        config.decrypt_key_hex = Some("00".repeat(32));
        assert_eq!(config.decrypt_key().unwrap(), [0u8; 32]);
    }

    #[test]
    fn test_decrypt_key_rejects_wrong_length() {
        let mut config = PipelineConfig::default();
        config.decrypt_key_hex = Some("00".repeat(16));
        assert!(config.decrypt_key().is_none());
    }
}
