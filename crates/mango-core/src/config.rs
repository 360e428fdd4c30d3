//! World configuration.
//!
//! Loaded from TOML, RON, or JSON (detected by file extension), or built in
//! code. Every field has a default, so an empty file is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::JoinError;

/// Which staged candidate is recruited when several could complete a tuple.
///
/// The chosen order is applied to every staging-queue scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnerOrder {
    /// Most recently staged first.
    #[default]
    Lifo,
    /// Earliest staged first.
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub partner_order: PartnerOrder,
    /// Check for dangling tuple, staging, and partial-static references after
    /// every removal flush.
    pub audit_removals: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            partner_order: PartnerOrder::default(),
            audit_removals: cfg!(debug_assertions),
        }
    }
}

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Ron,
    Json,
}

/// Detect the config format from a file's extension.
pub fn detect_format(path: &Path) -> Result<Format, JoinError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(Format::Toml),
        Some("ron") => Ok(Format::Ron),
        Some("json") => Ok(Format::Json),
        _ => Err(JoinError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

impl WorldConfig {
    /// Read a config file, choosing the parser from its extension.
    pub fn load(path: &Path) -> Result<Self, JoinError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::parse(format, &content).map_err(|detail| JoinError::ConfigParse {
            file: path.to_path_buf(),
            detail,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, JoinError> {
        Self::parse(Format::Toml, content).map_err(|detail| JoinError::ConfigParse {
            file: "<inline>".into(),
            detail,
        })
    }

    fn parse(format: Format, content: &str) -> Result<Self, String> {
        match format {
            Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_order_is_lifo() {
        assert_eq!(WorldConfig::default().partner_order, PartnerOrder::Lifo);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[test]
    fn toml_overrides_fields() {
        let config = WorldConfig::from_toml_str(
            r#"
            partner_order = "fifo"
            audit_removals = true
            "#,
        )
        .unwrap();
        assert_eq!(config.partner_order, PartnerOrder::Fifo);
        assert!(config.audit_removals);
    }

    #[test]
    fn bad_toml_reports_parse_error() {
        let err = WorldConfig::from_toml_str("partner_order = \"sideways\"").unwrap_err();
        assert!(matches!(err, JoinError::ConfigParse { .. }));
    }

    #[test]
    fn ron_and_json_parse() {
        let ron = WorldConfig::parse(Format::Ron, "(partner_order: fifo)").unwrap();
        assert_eq!(ron.partner_order, PartnerOrder::Fifo);
        let json = WorldConfig::parse(Format::Json, r#"{"audit_removals": false}"#).unwrap();
        assert!(!json.audit_removals);
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(detect_format(Path::new("world.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("world.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("world.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("world.yaml")),
            Err(JoinError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("mango_world_{}.toml", std::process::id()));
        std::fs::write(&path, "partner_order = \"fifo\"\n").unwrap();
        let config = WorldConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.partner_order, PartnerOrder::Fifo);
    }
}
