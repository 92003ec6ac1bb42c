#![forbid(unsafe_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tekdash_api::{ApiResponse, Body, HttpRunnerApi};
use tekdash_core::JobSpec;
use tekdash_sync::{Session, SessionConfig};
use tokio::signal;
use tracing::info;

mod render;

#[derive(Parser, Debug)]
#[command(name = "tekdashctl", version, about = "Tekdash runner control")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Runner base URL
    #[arg(long = "runner-url", env = "TEKDASH_RUNNER_URL", global = true, default_value = "http://127.0.0.1:8088")]
    runner_url: String,

    /// Path prefix in front of every runner route (e.g. "/api" behind the dashboard proxy)
    #[arg(long = "api-prefix", env = "TEKDASH_API_PREFIX", global = true, default_value = "")]
    api_prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe runner health
    Health,
    /// List workspaces
    Workspaces,
    /// Show the status of one workspace with its derived apps
    Status { workspace: String },
    /// Live dashboard: poll a workspace and re-render on every change
    Watch {
        /// Workspace to focus
        workspace: Option<String>,
    },
    /// Resolve the endpoint of an app
    Endpoint { workspace: String, app: String },
    /// Scale an app
    Scale { workspace: String, app: String, replicas: u32 },
    /// Restart a workspace, or one app with --app
    Restart {
        workspace: String,
        #[arg(long)]
        app: Option<String>,
    },
    /// Delete a workspace, or one app with --app
    Delete {
        workspace: String,
        #[arg(long)]
        app: Option<String>,
    },
    /// Per-app status as reported by the runner
    AppStatus { workspace: String, app: String },
    /// Show the external port map
    ExternalMap,
    /// Map an external port to an app
    SetExternal { workspace: String, app: String, port: u16 },
    /// Submit a build/deploy job
    Run {
        #[command(subcommand)]
        source: RunSource,
    },
}

#[derive(Args, Debug)]
struct JobTarget {
    #[arg(long = "app")]
    app: String,
    #[arg(long = "workspace")]
    workspace: String,
    /// Image project (default: app name)
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    registry: Option<String>,
    /// Container port (default: 3000, or 8080 for zip sources)
    #[arg(long = "container-port")]
    container_port: Option<u16>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum SampleKind { Git, Zip, Local }

#[derive(Subcommand, Debug)]
enum RunSource {
    /// Build from a git repository
    Git {
        #[command(flatten)]
        target: JobTarget,
        #[arg(long = "repo")]
        repo_url: String,
        #[arg(long)]
        revision: Option<String>,
        #[arg(long = "git-username", env = "TEKDASH_GIT_USERNAME")]
        git_username: Option<String>,
        #[arg(long = "git-token", env = "TEKDASH_GIT_TOKEN", hide_env_values = true)]
        git_token: Option<String>,
    },
    /// Build from a zip archive URL
    Zip {
        #[command(flatten)]
        target: JobTarget,
        #[arg(long = "url")]
        zip_url: String,
    },
    /// Build from a path on the runner host
    Local {
        #[command(flatten)]
        target: JobTarget,
        #[arg(long = "path")]
        local_path: String,
    },
    /// Submit one of the built-in sample payloads
    Sample {
        #[arg(value_enum)]
        kind: SampleKind,
    },
    /// Submit a JSON payload from a file
    File { path: std::path::PathBuf },
}

impl RunSource {
    fn into_job(self) -> Result<JobSpec> {
        let apply = |job: JobSpec, t: &JobTarget| {
            job.with_image(t.project.as_deref(), t.tag.as_deref(), t.registry.as_deref())
                .with_container_port(t.container_port)
        };
        Ok(match self {
            RunSource::Git { target, repo_url, revision, git_username, git_token } => {
                let job = JobSpec::git(&target.app, &target.workspace, &repo_url, revision.as_deref())
                    .with_git_credentials(git_username.as_deref(), git_token.as_deref());
                apply(job, &target)
            }
            RunSource::Zip { target, zip_url } => apply(JobSpec::zip(&target.app, &target.workspace, &zip_url), &target),
            RunSource::Local { target, local_path } => {
                apply(JobSpec::local(&target.app, &target.workspace, &local_path), &target)
            }
            RunSource::Sample { kind } => match kind {
                SampleKind::Git => JobSpec::sample_git(),
                SampleKind::Zip => JobSpec::sample_zip(),
                SampleKind::Local => JobSpec::sample_local(),
            },
            RunSource::File { path } => {
                let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing job payload {}", path.display()))?
            }
        })
    }
}

fn init_tracing() {
    let env = std::env::var("TEKDASH_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("TEKDASH_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid TEKDASH_METRICS_ADDR; expected host:port");
        }
    }
}

/// Print a logged action's outcome. Transport failures and non-2xx answers
/// become errors carrying the activity log message.
fn report(session: &Session, out: Output, res: Option<ApiResponse>) -> Result<()> {
    let Some(r) = res else {
        let msg = session.activity().first().map(|e| e.message.clone()).unwrap_or_default();
        bail!("request failed: {}", msg);
    };
    match out {
        Output::Human => println!("{} {}", r.status, r.message()),
        Output::Json => match &r.body {
            Body::Json(v) => println!("{}", serde_json::to_string_pretty(v)?),
            Body::Text(s) => println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "status": r.status, "message": s }))?),
        },
    }
    if !(200..300).contains(&r.status) {
        bail!("runner answered {}", r.status);
    }
    Ok(())
}

/// Wait for background endpoint resolution and port claims of the focused
/// workspace, bounded so a slow runner cannot hang a one-shot command.
async fn settle(session: &Session, workspace: &str) {
    let apps: Vec<String> = session
        .view()
        .detail
        .map(|d| d.apps.into_iter().map(|a| a.name).collect())
        .unwrap_or_default();
    let busy = || apps.iter().any(|a| session.endpoint_in_flight(workspace, a) || session.claim_in_flight(workspace, a));
    let mut rev = session.subscribe();
    let wait = async {
        while busy() {
            if rev.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(3), wait).await.is_err() {
        tracing::warn!(workspace = %workspace, "background lookups still pending");
    }
}

async fn watch(session: &Session, workspace: Option<String>, out: Output) -> Result<()> {
    session.bootstrap().await;
    if let Some(ws) = workspace.as_deref() {
        session.open_workspace(ws).await;
    }
    let mut rev = session.subscribe();
    loop {
        let view = session.view();
        match out {
            Output::Human => {
                print!("\x1b[2J\x1b[H");
                println!("{}", render::dashboard(&view));
            }
            Output::Json => println!("{}", serde_json::to_string(&view)?),
        }
        tokio::select! {
            changed = rev.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("watch interrupted");
                break;
            }
        }
    }
    session.dispose();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let cfg = SessionConfig::from_env();
    let api = HttpRunnerApi::new(&cli.runner_url, &cli.api_prefix, cfg.request_timeout)
        .map_err(|e| anyhow!("runner client: {}", e))?;
    info!(url = %api.url(""), "runner client ready");
    let session = Session::create(Arc::new(api), cfg);
    let out = cli.output;

    match cli.command {
        Commands::Health => {
            let health = session.check_health().await;
            match out {
                Output::Human => println!("{}", health),
                Output::Json => println!("{}", serde_json::to_string_pretty(&health)?),
            }
            if !health.is_healthy() {
                bail!("runner unhealthy");
            }
        }
        Commands::Workspaces => {
            session.list_workspaces().await;
            if let Some(err) = session.list_error() {
                bail!("{}", err);
            }
            let view = session.view();
            match out {
                Output::Human => print!("{}", render::workspaces(&view.workspaces)),
                Output::Json => println!("{}", serde_json::to_string_pretty(&view.workspaces)?),
            }
        }
        Commands::Status { workspace } => {
            session.load_host_info().await;
            session.load_external_map().await;
            session.list_workspaces().await;
            session.open_workspace(&workspace).await;
            settle(&session, &workspace).await;
            let view = session.view();
            let detail = view.detail.ok_or_else(|| anyhow!("no status for {}", workspace))?;
            match out {
                Output::Human => print!("{}", render::detail(&detail)),
                Output::Json => println!("{}", serde_json::to_string_pretty(&detail)?),
            }
        }
        Commands::Watch { workspace } => watch(&session, workspace, out).await?,
        Commands::Endpoint { workspace, app } => {
            let ep = session.query_endpoint(&workspace, &app).await;
            match (out, ep) {
                (Output::Human, Some(ep)) => println!("{}", ep),
                (Output::Json, Some(ep)) => println!("{}", serde_json::json!({ "workspace": workspace, "app": app, "endpoint": ep })),
                (_, None) => {
                    let msg = session.activity().first().map(|e| format!("{} {}", e.status, e.message)).unwrap_or_default();
                    bail!("endpoint not resolved: {}", msg);
                }
            }
        }
        Commands::Scale { workspace, app, replicas } => {
            let res = session.scale_app(&workspace, &app, replicas).await;
            report(&session, out, res)?;
        }
        Commands::Restart { workspace, app } => {
            let res = match app {
                Some(app) => session.restart_app(&workspace, &app).await,
                None => session.restart_workspace(&workspace).await,
            };
            report(&session, out, res)?;
        }
        Commands::Delete { workspace, app } => {
            let res = match app {
                Some(app) => session.delete_app(&workspace, &app).await,
                None => session.delete_workspace(&workspace).await,
            };
            report(&session, out, res)?;
        }
        Commands::AppStatus { workspace, app } => {
            let res = session.app_status(&workspace, &app).await;
            report(&session, out, res)?;
        }
        Commands::ExternalMap => {
            if !session.load_external_map().await {
                bail!("external map unavailable");
            }
            let map = session.external_map();
            match out {
                Output::Human => print!("{}", render::external_map(map.entries())),
                Output::Json => println!("{}", serde_json::to_string_pretty(map.entries())?),
            }
        }
        Commands::SetExternal { workspace, app, port } => {
            session.load_external_map().await;
            if !session.set_external_port(&workspace, &app, port).await {
                let msg = session.activity().first().map(|e| format!("{} {}", e.status, e.message)).unwrap_or_default();
                bail!("external port {} not assigned: {}", port, msg);
            }
            let url = session.load_host_info().await.external_url(port);
            match out {
                Output::Human => println!("{}/{} -> {}", workspace, app, url.unwrap_or_else(|| port.to_string())),
                Output::Json => println!("{}", serde_json::json!({ "workspace": workspace, "app": app, "external_port": port, "url": url })),
            }
        }
        Commands::Run { source } => {
            let job = source.into_job()?;
            info!(app = %job.app_name, workspace = %job.workspace, kind = job.source.kind(), "run invoked");
            let res = session.submit_job(&job).await;
            report(&session, out, res)?;
        }
    }
    session.dispose();
    Ok(())
}
