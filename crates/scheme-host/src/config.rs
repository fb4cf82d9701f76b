//! Host-side configuration.
//!
//! [`HostConfig`] is the resolved form of `scheme.toml`: the registration
//! passed to the host, the content routes with every path made absolute
//! against the config file's directory, and the readiness policy for the
//! deferred target.

use std::path::Path;

use anyhow::Context;
use scheme_core::config::{Readiness, SchemeConfig};

use crate::content::ContentMap;
use crate::registry::SchemeRegistration;

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Scheme name, domain and the flags handed to the host.
    pub registration: SchemeRegistration,
    /// Target routes, in match order.
    pub content: ContentMap,
    /// Policy for the deferred responder.
    pub readiness: Readiness,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::from_scheme_config(&SchemeConfig::default(), Path::new("."))
    }
}

impl HostConfig {
    /// Build from a parsed `scheme.toml`, resolving relative paths against
    /// `base_dir`.
    pub fn from_scheme_config(config: &SchemeConfig, base_dir: &Path) -> Self {
        let image_path = base_dir
            .join(&config.content.asset_dir)
            .join(&config.content.image_file);
        let content = ContentMap::builder()
            .with_diagnostic(&config.content.diagnostic_target)
            .with_asset(&config.content.image_target, "image/png", image_path)
            .with_deferred(&config.deferred.target, base_dir.join(&config.deferred.path))
            .build();

        Self {
            registration: SchemeRegistration::from_section(&config.scheme),
            content,
            readiness: config.deferred.readiness,
        }
    }

    /// Load and resolve a `scheme.toml` file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = SchemeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        tracing::debug!(config = %path.display(), scheme = %config.scheme.name, "loaded scheme config");
        Ok(Self::from_scheme_config(&config, base_dir))
    }

    /// Builder method: replace the content routes.
    pub fn with_content(self, content: ContentMap) -> Self {
        Self { content, ..self }
    }

    /// Builder method: set the deferred readiness policy.
    pub fn with_readiness(self, readiness: Readiness) -> Self {
        Self { readiness, ..self }
    }
}
