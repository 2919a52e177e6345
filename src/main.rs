use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use prbot::App;
use prbot::Config;
use prbot::ops::git::RealGit;
use prbot::ops::github::RealGithub;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

#[derive(Parser)]
#[command(name = "prbot")]
#[command(about = "Automate a contribution pull request: branch, commit, push, open, merge", long_about = None)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "/config/config.json")]
    pub config: PathBuf,
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();
    let config = Config::load(&cli.config);

    // A missing token is fatal before any stage runs
    let token = config.token()?.to_string();

    let git = RealGit::new(config.repo_path.clone());
    let gh = RealGithub::new(token);
    let app = App::new(config, git, gh);

    app.cmd_run(&mut std::io::stdout()).await
}
