#![allow(async_fn_in_trait)]

use anyhow::Result;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;

use super::github_curl::GithubCurlClient;
use crate::config::MergeMethod;

// -----------------------------------------------------------------------------
// Types

/// A GitHub repository coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The fields of a freshly created pull request the workflow uses.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPr {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest {
    title: String,
    body: String,
    head: String,
    base: String,
}

#[derive(Debug, Serialize)]
struct MergePullRequest {
    commit_title: String,
    commit_message: String,
    merge_method: MergeMethod,
}

// -----------------------------------------------------------------------------
// Remote URL parsing

/// Derive the repository coordinate from a GitHub remote URL.
///
/// Recognizes `https://github.com/<owner>/<repo>.git` and
/// `git@github.com:<owner>/<repo>.git`, with or without the `.git` suffix.
/// Any other shape (different host, malformed URL, too few segments) yields
/// `None`.
pub fn parse_github_remote(url: &str) -> Option<RepoId> {
    let rest = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("git@github.com:"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let name = segments.next()?;

    Some(RepoId {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

// -----------------------------------------------------------------------------
// GithubOps trait

/// Operations for interacting with the GitHub API
#[cfg_attr(test, automock)]
pub trait GithubOps {
    /// Create a pull request and return its number and URL.
    async fn pr_create(
        &self,
        repo: &RepoId,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPr>;

    /// Merge a pull request.
    async fn pr_merge(
        &self,
        repo: &RepoId,
        number: u64,
        commit_title: &str,
        commit_message: &str,
        method: MergeMethod,
    ) -> Result<()>;
}

// -----------------------------------------------------------------------------
// RealGithub

/// Real implementation that calls the GitHub REST API.
pub struct RealGithub {
    http_client: GithubCurlClient,
}

impl RealGithub {
    pub fn new(token: String) -> Self {
        Self {
            http_client: GithubCurlClient::new(token),
        }
    }
}

impl GithubOps for RealGithub {
    #[instrument(skip_all)]
    async fn pr_create(
        &self,
        repo: &RepoId,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<CreatedPr> {
        let url = format!("https://api.github.com/repos/{}/{}/pulls", repo.owner, repo.name);

        let request_body = CreatePullRequest {
            title: title.to_string(),
            body: body.to_string(),
            head: head.to_string(),
            base: base.to_string(),
        };

        let json_data = serde_json::to_string(&request_body)?;
        let response = self.http_client.post(&url, &json_data).await?;
        let pr: CreatedPr = serde_json::from_str(&response)?;
        Ok(pr)
    }

    #[instrument(skip_all)]
    async fn pr_merge(
        &self,
        repo: &RepoId,
        number: u64,
        commit_title: &str,
        commit_message: &str,
        method: MergeMethod,
    ) -> Result<()> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/pulls/{}/merge",
            repo.owner, repo.name, number
        );

        let request_body = MergePullRequest {
            commit_title: commit_title.to_string(),
            commit_message: commit_message.to_string(),
            merge_method: method,
        };

        let json_data = serde_json::to_string(&request_body)?;
        self.http_client.put(&url, &json_data).await?;
        Ok(())
    }
}
