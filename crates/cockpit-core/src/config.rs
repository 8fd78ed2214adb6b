//! Settings: `.cockpit/config.toml` in the project and a per-user file.
//!
//! Both files are optional. A missing file yields defaults, a present but
//! unparseable one is an error naming the path.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::feed::FeedFormat;
use crate::model::ticket::{DEFAULT_PROJECT_TAG, DEFAULT_TICKET_COLOR, TicketTimelineOptions};
use crate::normalize::{DEFAULT_REFERENCE_URL_KEY, Normalizer};

/// Directory holding project-level cockpit settings.
pub const PROJECT_DIR: &str = ".cockpit";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
}

impl ProjectConfig {
    /// Normalizer honouring the configured reference-URL key.
    #[must_use]
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.timeline.reference_url_key.clone())
    }

    /// Ticket derivation settings. An empty project tag keeps every ticket.
    #[must_use]
    pub fn ticket_options(&self) -> TicketTimelineOptions {
        let tag = self.timeline.project_tag.trim();
        TicketTimelineOptions {
            project_tag: (!tag.is_empty()).then(|| tag.to_string()),
            color: self.timeline.ticket_color.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "default_reference_url_key")]
    pub reference_url_key: String,
    #[serde(default = "default_ticket_color")]
    pub ticket_color: String,
    #[serde(default = "default_project_tag")]
    pub project_tag: String,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            reference_url_key: default_reference_url_key(),
            ticket_color: default_ticket_color(),
            project_tag: default_project_tag(),
        }
    }
}

/// Feed file locations, relative to the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedsConfig {
    #[serde(default)]
    pub contracts: Option<PathBuf>,
    #[serde(default)]
    pub contracts_format: FeedFormat,
    #[serde(default)]
    pub tickets: Option<PathBuf>,
    #[serde(default)]
    pub tickets_format: FeedFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

fn read_toml_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `.cockpit/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    read_toml_or_default(&project_root.join(PROJECT_DIR).join("config.toml"))
}

/// Load `cockpit/config.toml` from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    dirs::config_dir().map_or_else(
        || Ok(UserConfig::default()),
        |dir| read_toml_or_default(&dir.join("cockpit").join("config.toml")),
    )
}

/// Normalize an output-mode name, accepting a couple of aliases.
#[must_use]
pub fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "table" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn default_reference_url_key() -> String {
    DEFAULT_REFERENCE_URL_KEY.to_string()
}

fn default_ticket_color() -> String {
    DEFAULT_TICKET_COLOR.to_string()
}

fn default_project_tag() -> String {
    DEFAULT_PROJECT_TAG.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project_with_config(contents: &str) -> TempDir {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(root.path().join(PROJECT_DIR)).expect("mkdir .cockpit");
        fs::write(root.path().join(".cockpit/config.toml"), contents).expect("write config");
        root
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(root.path()).expect("load defaults");
        assert_eq!(cfg.timeline.reference_url_key, "sharepoint_url");
        assert_eq!(cfg.timeline.ticket_color, "#3B82F6");
        assert_eq!(cfg.timeline.project_tag, "#Projet");
        assert!(cfg.feeds.contracts.is_none());
        assert_eq!(cfg.feeds.tickets_format, FeedFormat::Items);
    }

    #[test]
    fn project_config_reads_overrides() {
        let root = project_with_config(
            r#"
[timeline]
reference_url_key = "doc_url"
project_tag = ""

[feeds]
contracts = "data/contracts.json"
contracts_format = "records"
"#,
        );

        let cfg = load_project_config(root.path()).expect("load config");
        assert_eq!(cfg.normalizer().reference_url_key(), "doc_url");
        assert_eq!(cfg.timeline.ticket_color, "#3B82F6");
        assert_eq!(cfg.feeds.contracts, Some(PathBuf::from("data/contracts.json")));
        assert_eq!(cfg.feeds.contracts_format, FeedFormat::Records);
        assert_eq!(cfg.ticket_options().project_tag, None);
    }

    #[test]
    fn default_ticket_options_filter_on_project_tag() {
        let options = ProjectConfig::default().ticket_options();
        assert_eq!(options.project_tag.as_deref(), Some("#Projet"));
        assert_eq!(options, TicketTimelineOptions::default());
    }

    #[test]
    fn broken_project_config_is_an_error() {
        let root = project_with_config("[timeline\n");
        let err = load_project_config(root.path()).expect_err("must fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn output_mode_aliases() {
        assert_eq!(normalize_output_mode(" JSON "), Some("json"));
        assert_eq!(normalize_output_mode("human"), Some("pretty"));
        assert_eq!(normalize_output_mode("table"), Some("text"));
        assert_eq!(normalize_output_mode("yaml"), None);
    }
}
