#![allow(async_fn_in_trait)]

use std::path::PathBuf;
use std::process::Output;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::instrument;

// -----------------------------------------------------------------------------
// GitOps trait

/// Operations for interacting with Git
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Set the committer identity in the repo's git config.
    async fn configure_user(&self, name: &str, email: &str) -> Result<()>;

    /// Check whether `branch` resolves to a ref in the repo.
    async fn branch_exists(&self, branch: &str) -> Result<bool>;

    async fn checkout(&self, branch: &str) -> Result<()>;
    async fn checkout_new(&self, branch: &str) -> Result<()>;
    async fn pull(&self, branch: &str) -> Result<()>;
    async fn add_all(&self) -> Result<()>;
    async fn commit(&self, message: &str) -> Result<()>;

    /// Push `branch` to origin, setting upstream tracking.
    async fn push_upstream(&self, branch: &str) -> Result<()>;

    /// The URL of the `origin` remote.
    async fn remote_url(&self) -> Result<String>;

    async fn delete_local_branch(&self, branch: &str) -> Result<()>;
    async fn delete_remote_branch(&self, branch: &str) -> Result<()>;
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI in the configured checkout.
pub struct RealGit {
    path: PathBuf,
}

impl RealGit {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Spawn git with the given arguments and wait for it to finish,
    /// capturing stdout and stderr.
    ///
    /// There is no timeout: a hung git process hangs the run.
    async fn output(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.path)
            .args(args)
            .output()
            .await
            .context("Failed to execute git command")
    }

    /// Run git, returning stdout on success and stderr in the error otherwise.
    async fn git(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;

        if !output.status.success() {
            return Err(anyhow!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }
}

impl GitOps for RealGit {
    #[instrument(skip_all)]
    async fn configure_user(&self, name: &str, email: &str) -> Result<()> {
        self.git(&["config", "user.name", name]).await?;
        self.git(&["config", "user.email", email]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn branch_exists(&self, branch: &str) -> Result<bool> {
        let output = self.output(&["rev-parse", "--verify", branch]).await?;

        // Exit code 0 means the ref resolves, non-zero means it doesn't
        Ok(output.status.success())
    }

    #[instrument(skip_all)]
    async fn checkout(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", branch]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn checkout_new(&self, branch: &str) -> Result<()> {
        self.git(&["checkout", "-b", branch]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn pull(&self, branch: &str) -> Result<()> {
        self.git(&["pull", "origin", branch]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn add_all(&self) -> Result<()> {
        self.git(&["add", "."]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "-m", message]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn push_upstream(&self, branch: &str) -> Result<()> {
        self.git(&["push", "-u", "origin", branch]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn remote_url(&self) -> Result<String> {
        self.git(&["remote", "get-url", "origin"]).await
    }

    #[instrument(skip_all)]
    async fn delete_local_branch(&self, branch: &str) -> Result<()> {
        self.git(&["branch", "-D", branch]).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn delete_remote_branch(&self, branch: &str) -> Result<()> {
        self.git(&["push", "origin", "--delete", branch]).await?;
        Ok(())
    }
}
