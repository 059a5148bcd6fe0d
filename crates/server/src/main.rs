use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use taskpulse_core::{Config, JobStatus};
use taskpulse_server::{build_router, AppState};

/// taskpulse: project-tracker status reports.
#[derive(Parser, Debug)]
#[command(name = "taskpulse", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Generate one report in-process and copy it to `--out`.
    Generate {
        #[arg(long)]
        platform: String,

        #[arg(long, default_value = "standard")]
        template: String,

        /// Upstream project id or key.
        #[arg(long)]
        project: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        out: PathBuf,

        #[arg(long, env = "TASKPULSE_OWNER", default_value = "cli")]
        owner: String,
    },
}

fn load_config() -> Config {
    taskpulse_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let port = config.server.port;
    let state = Arc::new(AppState::from_config(config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://localhost:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn generate(
    config: Config,
    platform: String,
    template: String,
    project: String,
    title: Option<String>,
    out: PathBuf,
    owner: String,
) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let mut configuration = json!({ "projectId": project });
    if let Some(title) = title {
        configuration["title"] = json!(title);
    }

    let job = state
        .runner
        .run_inline(&owner, &platform, &template, configuration)
        .await?;

    if job.status != JobStatus::Completed {
        bail!(
            "report job {} {}: {}",
            job.id,
            job.status,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    let artifact = job
        .file_path
        .as_deref()
        .context("completed job has no artifact path")?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(artifact, &out)
        .await
        .with_context(|| format!("failed to copy {artifact} to {}", out.display()))?;

    info!(job_id = %job.id, out = %out.display(), "Report written");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    config.log_summary();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Generate {
            platform,
            template,
            project,
            title,
            out,
            owner,
        } => generate(config, platform, template, project, title, out, owner).await,
    }
}
