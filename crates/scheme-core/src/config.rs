//! scheme.toml configuration parser.
//!
//! Every section and field is optional; a missing value falls back to the
//! stock `client://tests/` setup (diagnostic page, bundled image, one
//! deferred stream).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeConfig {
    pub scheme: SchemeSection,
    pub content: ContentSection,
    pub deferred: DeferredSection,
}

/// Scheme registration data. The flags are passed to the host untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemeSection {
    pub name: String,
    pub domain: String,
    pub standard: bool,
    pub local: bool,
    pub display_isolated: bool,
}

impl Default for SchemeSection {
    fn default() -> Self {
        Self {
            name: "client".to_string(),
            domain: "tests".to_string(),
            standard: true,
            local: false,
            display_isolated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSection {
    /// Target substring that selects the request-dump page.
    pub diagnostic_target: String,
    /// Target substring that selects the bundled image.
    pub image_target: String,
    /// Directory holding bundled assets, relative to the config file.
    pub asset_dir: PathBuf,
    /// File name of the image inside `asset_dir`.
    pub image_file: String,
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            diagnostic_target: "handler.html".to_string(),
            image_target: "client.png".to_string(),
            asset_dir: PathBuf::from("assets"),
            image_file: "logo.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferredSection {
    /// Target substring served by the deferred responder.
    pub target: String,
    /// External stream backing the deferred target, relative to the config file.
    pub path: PathBuf,
    pub readiness: Readiness,
}

impl Default for DeferredSection {
    fn default() -> Self {
        Self {
            target: "small.webm".to_string(),
            path: PathBuf::from("small.webm"),
            readiness: Readiness::default(),
        }
    }
}

/// Which readiness policy the deferred responder runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// Pause on the first and third read, deliver on every other one.
    #[default]
    Alternating,
    /// Never pause.
    Immediate,
}

impl SchemeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SchemeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config for the given scheme name with stock content routes.
    pub fn scaffold(scheme: &str) -> Self {
        SchemeConfig {
            scheme: SchemeSection {
                name: scheme.to_string(),
                ..SchemeSection::default()
            },
            ..SchemeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: SchemeConfig = toml::from_str("").unwrap();
        assert_eq!(config, SchemeConfig::default());
        assert_eq!(config.scheme.name, "client");
        assert_eq!(config.scheme.domain, "tests");
        assert!(config.scheme.standard);
        assert!(!config.scheme.local);
        assert!(!config.scheme.display_isolated);
        assert_eq!(config.deferred.readiness, Readiness::Alternating);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let toml_str = r#"
[scheme]
name = "app"

[deferred]
path = "/var/media/clip.webm"
readiness = "immediate"
"#;
        let config: SchemeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheme.name, "app");
        assert_eq!(config.scheme.domain, "tests");
        assert_eq!(config.deferred.target, "small.webm");
        assert_eq!(config.deferred.path, PathBuf::from("/var/media/clip.webm"));
        assert_eq!(config.deferred.readiness, Readiness::Immediate);
        assert_eq!(config.content.image_file, "logo.png");
    }

    #[test]
    fn unknown_readiness_is_rejected() {
        let err = toml::from_str::<SchemeConfig>("[deferred]\nreadiness = \"sometimes\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn scaffold_round_trips() {
        let config = SchemeConfig::scaffold("app");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("name = \"app\""));
        assert!(toml_str.contains("handler.html"));

        let parsed: SchemeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheme.toml");
        std::fs::write(&path, "[content]\nasset_dir = \"res\"\n").unwrap();

        let config = SchemeConfig::from_file(&path).unwrap();
        assert_eq!(config.content.asset_dir, PathBuf::from("res"));
    }

    #[test]
    fn from_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SchemeConfig::from_file(&dir.path().join("absent.toml")).is_err());
    }
}
