use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

/// Run a git command in `dir`, discarding output.
async fn git(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    anyhow::ensure!(status.success(), "git {:?} failed in {}", args, dir.display());

    Ok(())
}

/// Creates a git repository on a `main` branch with one seed commit.
///
/// The directory should already exist.
pub async fn create_git_repo(dir: &Path) -> anyhow::Result<()> {
    git(dir, &["init", "--initial-branch=main"]).await?;
    git(dir, &["config", "user.name", "Test User"]).await?;
    git(dir, &["config", "user.email", "test@example.com"]).await?;

    tokio::fs::write(dir.join("README.md"), "seed\n").await?;
    git(dir, &["add", "."]).await?;
    git(dir, &["commit", "-m", "seed"]).await?;

    Ok(())
}

/// Creates a bare repository at `bare` and wires it up as `origin` of `repo`,
/// pushing `main` so the remote has content.
pub async fn setup_file_remote(repo: &Path, bare: &Path) -> anyhow::Result<()> {
    let status = Command::new("git")
        .arg("init")
        .arg("--bare")
        .arg(bare)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    anyhow::ensure!(status.success(), "git init --bare failed");

    let bare_url = bare.display().to_string();
    git(repo, &["remote", "add", "origin", &bare_url]).await?;
    git(repo, &["push", "-u", "origin", "main"]).await?;

    Ok(())
}
