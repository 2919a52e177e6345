use anyhow::Result;
use anyhow::anyhow;

use crate::config::Config;
use crate::ops::git::GitOps;
use crate::ops::github::GithubOps;
use crate::ops::github::RepoId;
use crate::ops::github::parse_github_remote;

pub struct App<G, H> {
    pub config: Config,
    pub git: G,
    pub gh: H,
}

impl<G: GitOps, H: GithubOps> App<G, H> {
    pub fn new(config: Config, git: G, gh: H) -> Self {
        Self { config, git, gh }
    }
}

/// Shared helper methods for App
impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Resolve the branch pull requests target.
    ///
    /// Probes `main` then `master`. When neither resolves, falls back to
    /// `main` without verifying it exists, so a later checkout may still
    /// fail. Callers cache the result for the whole run.
    pub(crate) async fn base_branch(&self) -> String {
        for candidate in ["main", "master"] {
            if self.git.branch_exists(candidate).await.unwrap_or(false) {
                return candidate.to_string();
            }
        }

        "main".to_string()
    }

    /// Resolve the repository coordinate, preferring configured values and
    /// falling back to the `origin` remote URL.
    pub(crate) async fn repo_id(&self) -> Result<RepoId> {
        if let (Some(owner), Some(name)) = (
            self.config.github_repo_owner.clone(),
            self.config.github_repo_name.clone(),
        ) {
            return Ok(RepoId { owner, name });
        }

        let url = self.git.remote_url().await?;
        parse_github_remote(url.trim()).ok_or_else(|| {
            anyhow!(
                "Could not determine owner/repo from remote '{}'. Configure 'github_repo_owner' and 'github_repo_name'.",
                url.trim()
            )
        })
    }
}
