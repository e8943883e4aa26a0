use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default capacity of the project lookup cache.
// SAFETY: 8 is not zero.
pub const DEFAULT_PROJECT_CACHE_SIZE: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(8) };

/// Service configuration consumed by identity resolution and autosave handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Whether callers without registered credentials may use the anonymous header.
    #[serde(default)]
    pub anonymous_sessions_enabled: bool,
    /// Git host settings.
    pub git: GitConfig,
    /// Where session workloads live in the cluster.
    #[serde(default)]
    pub sessions: SessionsConfig,
    /// Capacity of the project lookup cache.
    #[serde(default = "default_project_cache_size")]
    pub project_cache_size: NonZeroUsize,
}

impl Config {
    /// A configuration with anonymous sessions disabled, talking to the given git host.
    pub fn new(git_url: Url) -> Self {
        Self {
            anonymous_sessions_enabled: false,
            git: GitConfig { url: git_url },
            sessions: SessionsConfig::default(),
            project_cache_size: DEFAULT_PROJECT_CACHE_SIZE,
        }
    }

    /// Enable or disable anonymous sessions.
    pub fn with_anonymous_sessions(mut self, enabled: bool) -> Self {
        self.anonymous_sessions_enabled = enabled;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    /// Base URL of the git host. Anonymous callers get a client without credentials
    /// scoped to this URL.
    pub url: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    /// Namespace the session workloads are created in.
    #[serde(default)]
    pub namespace: String,
    /// Prefix of the labels attached to session workloads, eg. `renku.io/`.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
    /// The custom resource backing a session.
    #[serde(default)]
    pub resource: Resource,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            namespace: String::default(),
            label_prefix: default_label_prefix(),
            resource: Resource::default(),
        }
    }
}

/// A custom resource kind, identified by group, version and plural name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            group: String::from("amalthea.dev"),
            version: String::from("v1alpha1"),
            plural: String::from("jupyterservers"),
        }
    }
}

fn default_label_prefix() -> String {
    String::from("renku.io/")
}

fn default_project_cache_size() -> NonZeroUsize {
    DEFAULT_PROJECT_CACHE_SIZE
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_json::from_value(json!({
            "git": { "url": "https://gitlab.example.com" }
        }))
        .unwrap();

        assert!(!config.anonymous_sessions_enabled);
        assert_eq!(config.project_cache_size, DEFAULT_PROJECT_CACHE_SIZE);
        assert_eq!(config.sessions.label_prefix, "renku.io/");
        assert_eq!(config.sessions.resource.plural, "jupyterservers");
    }

    #[test]
    fn test_config_de() {
        let config: Config = serde_json::from_value(json!({
            "anonymousSessionsEnabled": true,
            "git": { "url": "https://gitlab.example.com" },
            "sessions": { "namespace": "renku", "labelPrefix": "example.org/" },
            "projectCacheSize": 2
        }))
        .unwrap();

        assert!(config.anonymous_sessions_enabled);
        assert_eq!(config.sessions.namespace, "renku");
        assert_eq!(config.sessions.label_prefix, "example.org/");
        assert_eq!(config.sessions.resource, Resource::default());
        assert_eq!(config.project_cache_size.get(), 2);
    }

    #[test]
    fn test_config_rejects_zero_cache() {
        let result = serde_json::from_value::<Config>(json!({
            "git": { "url": "https://gitlab.example.com" },
            "projectCacheSize": 0
        }));
        assert!(result.is_err());
    }
}
