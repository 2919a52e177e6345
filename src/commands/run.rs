use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use tracing::warn;

use crate::App;
use crate::ops::git::GitOps;
use crate::ops::github::CreatedPr;
use crate::ops::github::GithubOps;
use crate::ops::github::RepoId;

/// Pause between PR creation and merge so remote checks can register.
const MERGE_DELAY: Duration = Duration::from_secs(5);

impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Run the full contribution workflow once.
    ///
    /// Stages run strictly in order:
    ///
    /// 1. Configure the git identity.
    /// 2. Resolve the base branch (cached for the rest of the run).
    /// 3. Create a timestamped feature branch off the base branch.
    /// 4. Write the generated artifact and commit it.
    /// 5. Push the feature branch with upstream tracking.
    /// 6. Open a pull request.
    /// 7. Wait a fixed delay.
    /// 8. Merge the pull request.
    /// 9. Optionally delete the feature branch locally and remotely.
    ///
    /// The first failing mandatory stage aborts the run; branch cleanup is
    /// best-effort and never changes the outcome.
    pub async fn cmd_run(&self, stdout: &mut impl std::io::Write) -> Result<()> {
        writeln!(stdout, "{}", "Starting pull request automation".bold())?;

        self.git
            .configure_user(&self.config.git_user_name, &self.config.git_user_email)
            .await
            .context("Failed to configure git identity")?;
        writeln!(
            stdout,
            "Configured git identity ({} <{}>)",
            self.config.git_user_name, self.config.git_user_email
        )?;

        let base_branch = self.base_branch().await;
        writeln!(stdout, "Base branch: {}", base_branch)?;

        let feature_branch = self.create_feature_branch(&base_branch, stdout).await?;

        self.create_commit(&feature_branch, stdout).await?;

        self.git
            .push_upstream(&feature_branch)
            .await
            .context("Failed to push feature branch")?;
        writeln!(stdout, "Pushed branch {}", feature_branch)?;

        let repo = self.repo_id().await?;
        let pr = self
            .create_pull_request(&repo, &feature_branch, &base_branch, stdout)
            .await?;

        writeln!(
            stdout,
            "Waiting {} seconds before merge...",
            MERGE_DELAY.as_secs()
        )?;
        tokio::time::sleep(MERGE_DELAY).await;

        self.merge_pull_request(&repo, pr.number, stdout).await?;

        if self.config.auto_cleanup_branch {
            self.cleanup_branch(&base_branch, &feature_branch, stdout)
                .await?;
        }

        writeln!(stdout, "{}", "Pull request workflow completed".bold())?;

        Ok(())
    }

    /// Create and switch to a fresh timestamped branch off the base branch.
    async fn create_feature_branch(
        &self,
        base_branch: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<String> {
        let branch_name = format!("auto-contribution-{}", Local::now().format("%Y%m%d-%H%M%S"));
        writeln!(stdout, "Creating branch {}", branch_name)?;

        // Make sure we start from the base branch; if it cannot be checked
        // out, try to create it from the current state and carry on.
        if let Err(err) = self.git.checkout(base_branch).await {
            warn!(
                "Could not switch to {}, attempting to create it: {}",
                base_branch, err
            );
            if let Err(err) = self.git.checkout_new(base_branch).await {
                warn!("Could not create {}: {}", base_branch, err);
            }
        }

        // Refresh the base branch; a failed pull is not fatal
        if let Err(err) = self.git.pull(base_branch).await {
            warn!("Could not pull {}: {}", base_branch, err);
        }

        self.git
            .checkout_new(&branch_name)
            .await
            .context("Failed to create feature branch")?;
        writeln!(stdout, "Created branch {}", branch_name)?;

        Ok(branch_name)
    }

    /// Write the generated artifact into the repo root and commit everything
    /// in the working tree.
    async fn create_commit(
        &self,
        branch_name: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let now = Local::now();
        let file_name = format!("feature_{}.md", now.format("%Y%m%d_%H%M%S"));
        let file_path = self.config.repo_path.join(&file_name);

        let content = format!(
            "# Feature Update\n\
             \n\
             **Date:** {date}\n\
             **Branch:** {branch}\n\
             **Timestamp:** {timestamp}\n\
             \n\
             ## Changes\n\
             \n\
             This is an automated contribution generated by the PR automation system.\n\
             \n\
             ## Details\n\
             \n\
             - Type: Automated feature\n\
             - Purpose: GitHub contribution tracking\n\
             - Status: Ready for review\n",
            date = now.format("%Y-%m-%d %H:%M:%S"),
            branch = branch_name,
            timestamp = now.to_rfc3339(),
        );

        tokio::fs::write(&file_path, content)
            .await
            .with_context(|| format!("Failed to write {}", file_path.display()))?;

        self.git.add_all().await.context("Failed to stage changes")?;

        let commit_message = format!("feat: automated contribution {}", now.format("%Y-%m-%d"));
        self.git
            .commit(&commit_message)
            .await
            .context("Failed to commit changes")?;
        writeln!(stdout, "Created commit: {}", commit_message)?;

        Ok(())
    }

    /// Open the pull request for the pushed feature branch.
    async fn create_pull_request(
        &self,
        repo: &RepoId,
        head: &str,
        base: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<CreatedPr> {
        let now = Local::now();
        let title = format!("Automated Contribution - {}", now.format("%Y-%m-%d"));
        let body = format!(
            "## Automated Contribution\n\
             \n\
             This is an automated pull request created by the contribution automation system.\n\
             \n\
             ### Details\n\
             - **Branch:** `{branch}`\n\
             - **Date:** {date}\n\
             - **Type:** Automated feature update\n\
             \n\
             ### Changes\n\
             - Added automated feature documentation\n\
             - Updated contribution tracking\n\
             \n\
             ---\n\
             *This PR was automatically generated and will be merged automatically.*\n",
            branch = head,
            date = now.format("%Y-%m-%d %H:%M:%S"),
        );

        writeln!(stdout, "Creating pull request in {}...", repo)?;
        let pr = self
            .gh
            .pr_create(repo, head, base, &title, &body)
            .await
            .context("Failed to create pull request")?;

        writeln!(stdout, "Created PR #{}", pr.number)?;
        let url_line = format!("  {}", pr.html_url);
        writeln!(stdout, "{}", url_line.dimmed())?;

        Ok(pr)
    }

    /// Merge the pull request with the configured strategy.
    async fn merge_pull_request(
        &self,
        repo: &RepoId,
        number: u64,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        writeln!(stdout, "Merging PR #{}...", number)?;

        self.gh
            .pr_merge(
                repo,
                number,
                &format!("Merge automated contribution #{}", number),
                "Automated merge of daily contribution PR",
                self.config.merge_method,
            )
            .await
            .context("Failed to merge pull request")?;
        writeln!(stdout, "Merged PR #{}", number)?;

        Ok(())
    }

    /// Delete the merged feature branch locally and on the remote.
    ///
    /// Best-effort: any step may fail without affecting the run's verdict.
    async fn cleanup_branch(
        &self,
        base_branch: &str,
        branch_name: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        if let Err(err) = self.git.checkout(base_branch).await {
            warn!("Could not switch back to {}: {}", base_branch, err);
        }
        if let Err(err) = self.git.pull(base_branch).await {
            warn!("Could not pull {}: {}", base_branch, err);
        }

        let local = self.git.delete_local_branch(branch_name).await;
        let remote = self.git.delete_remote_branch(branch_name).await;

        if local.is_ok() && remote.is_ok() {
            writeln!(stdout, "Deleted branch {}", branch_name)?;
        } else {
            if let Err(err) = &local {
                warn!("Could not delete local branch {}: {}", branch_name, err);
            }
            if let Err(err) = &remote {
                warn!("Could not delete remote branch {}: {}", branch_name, err);
            }
            writeln!(stdout, "Branch {} only partially deleted", branch_name)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::predicate::eq;

    use crate::App;
    use crate::config::Config;
    use crate::config::MergeMethod;
    use crate::ops::git::MockGitOps;
    use crate::ops::github::CreatedPr;
    use crate::ops::github::MockGithubOps;

    // Normalize timestamped names
    fn filters() -> Vec<(&'static str, &'static str)> {
        vec![
            (r"auto-contribution-\d{8}-\d{6}", "[BRANCH]"),
            (r"\d{4}-\d{2}-\d{2}", "[DATE]"),
        ]
    }

    fn config_for(dir: &tempfile::TempDir) -> Config {
        let mut config = Config::new(dir.path().to_path_buf(), "test-token".to_string());
        config.github_repo_owner = Some("acme".to_string());
        config.github_repo_name = Some("widgets".to_string());
        config
    }

    fn git_through_push() -> MockGitOps {
        let mut git = MockGitOps::new();
        git.expect_configure_user()
            .with(eq("PR Bot"), eq("bot@example.com"))
            .times(1)
            .returning(|_, _| Ok(()));
        git.expect_branch_exists()
            .with(eq("main"))
            .times(1)
            .returning(|_| Ok(true));
        git.expect_checkout()
            .with(eq("main"))
            .returning(|_| Ok(()));
        git.expect_pull().with(eq("main")).returning(|_| Ok(()));
        git.expect_checkout_new()
            .withf(|branch| branch.starts_with("auto-contribution-"))
            .times(1)
            .returning(|_| Ok(()));
        git.expect_add_all().times(1).returning(|| Ok(()));
        git.expect_commit()
            .withf(|message| message.starts_with("feat: automated contribution "))
            .times(1)
            .returning(|_| Ok(()));
        git.expect_push_upstream()
            .withf(|branch| branch.starts_with("auto-contribution-"))
            .times(1)
            .returning(|_| Ok(()));
        git
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_workflow_with_cleanup() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let mut git = git_through_push();
        git.expect_delete_local_branch()
            .times(1)
            .returning(|_| Ok(()));
        git.expect_delete_remote_branch()
            .times(1)
            .returning(|_| Ok(()));

        let mut gh = MockGithubOps::new();
        gh.expect_pr_create()
            .withf(|repo, head, base, title, _| {
                repo.to_string() == "acme/widgets"
                    && head.starts_with("auto-contribution-")
                    && base == "main"
                    && title.starts_with("Automated Contribution - ")
            })
            .times(1)
            .returning(|_, _, _, _, _| {
                Ok(CreatedPr {
                    number: 7,
                    html_url: "https://github.com/acme/widgets/pull/7".to_string(),
                })
            });
        gh.expect_pr_merge()
            .withf(|_, number, title, _, method| {
                *number == 7
                    && title == "Merge automated contribution #7"
                    && *method == MergeMethod::Squash
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));

        let app = App::new(config_for(&dir), git, gh);

        let mut out = Vec::new();
        app.cmd_run(&mut out).await?;
        let out = String::from_utf8(out)?;

        insta::with_settings!({filters => filters()}, {
            insta::assert_snapshot!(out, @r"
            Starting pull request automation
            Configured git identity (PR Bot <bot@example.com>)
            Base branch: main
            Creating branch [BRANCH]
            Created branch [BRANCH]
            Created commit: feat: automated contribution [DATE]
            Pushed branch [BRANCH]
            Creating pull request in acme/widgets...
            Created PR #7
              https://github.com/acme/widgets/pull/7
            Waiting 5 seconds before merge...
            Merging PR #7...
            Merged PR #7
            Deleted branch [BRANCH]
            Pull request workflow completed
            ");
        });

        // One artifact was generated in the repo root
        let artifacts: Vec<_> = std::fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("feature_")
            })
            .collect();
        assert_eq!(artifacts.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_identity_failure_aborts_immediately() {
        let mut git = MockGitOps::new();
        git.expect_configure_user()
            .returning(|_, _| Err(anyhow!("git command failed: no repo")));
        git.expect_branch_exists().times(0);

        let app = App::new(
            Config::default_for_tests(),
            git,
            MockGithubOps::new(),
        );

        let mut out = Vec::new();
        let err = app.cmd_run(&mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to configure git identity"));
    }

    #[tokio::test]
    async fn test_branch_creation_failure_aborts_before_commit() {
        let mut git = MockGitOps::new();
        git.expect_configure_user().returning(|_, _| Ok(()));
        git.expect_branch_exists()
            .with(eq("main"))
            .returning(|_| Ok(true));
        git.expect_checkout()
            .with(eq("main"))
            .returning(|_| Ok(()));
        git.expect_pull().returning(|_| Ok(()));
        git.expect_checkout_new()
            .returning(|_| Err(anyhow!("git command failed: cannot create branch")));
        git.expect_add_all().times(0);
        git.expect_commit().times(0);
        git.expect_push_upstream().times(0);

        let mut gh = MockGithubOps::new();
        gh.expect_pr_create().times(0);
        gh.expect_pr_merge().times(0);

        let app = App::new(Config::default_for_tests(), git, gh);

        let mut out = Vec::new();
        let err = app.cmd_run(&mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to create feature branch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_base_checkout_failure_falls_back_to_creating_it() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let mut git = MockGitOps::new();
        git.expect_configure_user().returning(|_, _| Ok(()));
        git.expect_branch_exists()
            .with(eq("main"))
            .returning(|_| Ok(true));
        git.expect_checkout()
            .with(eq("main"))
            .times(1)
            .returning(|_| Err(anyhow!("git command failed: pathspec 'main'")));
        git.expect_checkout_new()
            .with(eq("main"))
            .times(1)
            .returning(|_| Ok(()));
        git.expect_pull().with(eq("main")).returning(|_| Ok(()));
        git.expect_checkout_new()
            .withf(|branch| branch.starts_with("auto-contribution-"))
            .times(1)
            .returning(|_| Ok(()));
        git.expect_add_all().returning(|| Ok(()));
        git.expect_commit().returning(|_| Ok(()));
        git.expect_push_upstream().returning(|_| Ok(()));

        let mut gh = MockGithubOps::new();
        gh.expect_pr_create().returning(|_, _, _, _, _| {
            Ok(CreatedPr {
                number: 3,
                html_url: "https://github.com/acme/widgets/pull/3".to_string(),
            })
        });
        gh.expect_pr_merge().returning(|_, _, _, _, _| Ok(()));

        let mut config = config_for(&dir);
        config.auto_cleanup_branch = false;

        let app = App::new(config, git, gh);

        let mut out = Vec::new();
        app.cmd_run(&mut out).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_pr_creation_failure_skips_merge() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let git = git_through_push();

        let mut gh = MockGithubOps::new();
        gh.expect_pr_create()
            .times(1)
            .returning(|_, _, _, _, _| Err(anyhow!("GitHub API error: Validation Failed")));
        gh.expect_pr_merge().times(0);

        let app = App::new(config_for(&dir), git, gh);

        let mut out = Vec::new();
        let err = app.cmd_run(&mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to create pull request"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_failure_does_not_fail_the_run() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        let mut git = git_through_push();
        git.expect_delete_local_branch().returning(|_| Ok(()));
        git.expect_delete_remote_branch()
            .returning(|_| Err(anyhow!("git command failed: remote rejected")));

        let mut gh = MockGithubOps::new();
        gh.expect_pr_create().returning(|_, _, _, _, _| {
            Ok(CreatedPr {
                number: 9,
                html_url: "https://github.com/acme/widgets/pull/9".to_string(),
            })
        });
        gh.expect_pr_merge().returning(|_, _, _, _, _| Ok(()));

        let app = App::new(config_for(&dir), git, gh);

        let mut out = Vec::new();
        app.cmd_run(&mut out).await?;
        let out = String::from_utf8(out)?;
        assert!(out.contains("only partially deleted"));
        assert!(out.contains("Pull request workflow completed"));
        Ok(())
    }
}
