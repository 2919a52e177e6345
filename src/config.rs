use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use anyhow::bail;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

// -----------------------------------------------------------------------------
// MergeMethod

/// Merge strategy sent to the GitHub merge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Squash,
    Merge,
    Rebase,
}

impl std::fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Squash => f.write_str("squash"),
            Self::Merge => f.write_str("merge"),
            Self::Rebase => f.write_str("rebase"),
        }
    }
}

// -----------------------------------------------------------------------------
// Config

/// Effective configuration for a run.
///
/// Built from three layers: built-in defaults, keys read from the JSON config
/// file, and environment variables for a fixed set of keys. Later layers win
/// key-by-key. The value is immutable once loaded and handed to the app.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target contribution frequency. Documented for operators; the linear
    /// workflow itself performs exactly one commit per invocation.
    pub commits_per_day: u32,
    /// Path to the repository checkout the workflow operates on.
    pub repo_path: PathBuf,
    /// Template for standalone commits. Carried for operators; the PR
    /// workflow uses its own fixed message.
    pub commit_message_template: String,
    /// Committer name written to the repo's git config.
    pub git_user_name: String,
    /// Committer email written to the repo's git config.
    pub git_user_email: String,
    pub auto_push: bool,
    /// Advisory only; timestamps use the host's local time.
    pub timezone: String,
    pub use_pr_workflow: bool,
    /// How the pull request is merged.
    pub merge_method: MergeMethod,
    /// Delete the feature branch (locally and on the remote) after merging.
    pub auto_cleanup_branch: bool,
    /// GitHub personal access token. Required; validated at startup.
    pub github_token: Option<String>,
    /// Repository owner. Derived from the remote URL when absent.
    pub github_repo_owner: Option<String>,
    /// Repository name. Derived from the remote URL when absent.
    pub github_repo_name: Option<String>,
    /// Unknown file keys, preserved but not interpreted.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            commits_per_day: 1,
            repo_path: PathBuf::from("/repo"),
            commit_message_template: "Automated commit for {date}".to_string(),
            git_user_name: "PR Bot".to_string(),
            git_user_email: "bot@example.com".to_string(),
            auto_push: true,
            timezone: "America/Bogota".to_string(),
            use_pr_workflow: true,
            merge_method: MergeMethod::Squash,
            auto_cleanup_branch: true,
            github_token: None,
            github_repo_owner: None,
            github_repo_name: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from a JSON file and the process environment.
    ///
    /// A missing or malformed file is advisory: a notice is logged and the
    /// defaults are kept. Environment overrides are applied last.
    pub fn load(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!("Failed to parse config file {}: {}", path.display(), err);
                    info!("Using default configuration and environment variables");
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file not found: {}", path.display());
                info!("Using default configuration and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides(std::env::vars());
        config
    }

    /// Overlay environment variables onto the config.
    ///
    /// Only `GIT_USER_NAME`, `GIT_USER_EMAIL`, `GITHUB_TOKEN` and
    /// `GENERIC_TIMEZONE` are honored; set-but-empty values are ignored.
    pub fn apply_env_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (name, value) in vars {
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                "GIT_USER_NAME" => self.git_user_name = value,
                "GIT_USER_EMAIL" => self.git_user_email = value,
                "GITHUB_TOKEN" => self.github_token = Some(value),
                "GENERIC_TIMEZONE" => self.timezone = value,
                _ => continue,
            }
            info!("Environment variable {} loaded", name);
        }
    }

    /// The GitHub token, or an error if it was never configured.
    pub fn token(&self) -> Result<&str> {
        match self.github_token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!(
                "GitHub token not configured. Set 'github_token' in the config file or the GITHUB_TOKEN environment variable."
            ),
        }
    }

    /// Create a config with explicit values (useful for tests)
    pub fn new(repo_path: PathBuf, github_token: String) -> Self {
        Self {
            repo_path,
            github_token: Some(github_token),
            ..Self::default()
        }
    }

    /// Default config for tests
    pub fn default_for_tests() -> Self {
        Self::new(PathBuf::from("/repo"), "test-token".to_string())
    }
}
