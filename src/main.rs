use anyhow::{bail, Context, Result};
use celpip_practice::api::PromptListing;
use celpip_practice::{
    create_router, AccessPolicy, AppState, AudioBackend, AudioBackendFactory, AudioFile,
    CaptureKind, Config, EvaluationService, FileBackend, HttpEvaluationClient, Identity,
    IdentityPolicy, MicrophoneCapture, Phase, SessionConfig, SessionController, SessionError,
    TextCapture,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "celpip-practice")]
#[command(about = "CELPIP speaking and writing practice sessions")]
#[command(version)]
struct Args {
    /// Configuration file (toml, yaml or json; the extension may be omitted)
    #[arg(short, long, default_value = "config/celpip-practice", env = "CELPIP_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local HTTP control API
    Serve,

    /// List prompts of one kind
    Prompts {
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Record a spoken response (or replay a WAV file) and submit it
    Speak {
        /// Prompt UUID
        #[arg(short, long)]
        prompt: String,

        /// Replay this WAV file instead of the configured audio source
        #[arg(long)]
        wav: Option<PathBuf>,
    },

    /// Submit a written response read from a file
    Write {
        /// Prompt UUID
        #[arg(short, long)]
        prompt: String,

        #[arg(long)]
        text_file: PathBuf,
    },

    /// Show the scored result for a prompt
    Result {
        /// Prompt UUID
        prompt: String,

        /// A specific evaluation instead of the latest
        #[arg(long)]
        evaluation: Option<String>,
    },

    /// List past scored attempts of one kind
    History {
        #[arg(value_enum)]
        kind: KindArg,
    },

    /// Show score analytics for the signed-in customer
    Analytics,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Speaking,
    Writing,
}

impl From<KindArg> for CaptureKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Speaking => CaptureKind::Speaking,
            KindArg::Writing => CaptureKind::Writing,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "celpip_practice=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;
    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let client = Arc::new(HttpEvaluationClient::new(&cfg.api)?);

    match args.command {
        Command::Serve => serve(&cfg, client).await,
        Command::Prompts { kind } => {
            let prompts = client.prompts(kind.into()).await?;
            print_json(&prompts)
        }
        Command::Speak { prompt, wav } => speak(&cfg, client, &prompt, wav).await,
        Command::Write { prompt, text_file } => write(&cfg, client, &prompt, text_file).await,
        Command::Result { prompt, evaluation } => {
            let result = client.fetch_result(&prompt, evaluation.as_deref()).await?;
            print_json(&result)
        }
        Command::History { kind } => {
            let attempts = client.history(kind.into()).await?;
            print_json(&attempts)
        }
        Command::Analytics => {
            let analytics = client.analytics().await?;
            print_json(&analytics)
        }
    }
}

async fn serve(cfg: &Config, client: Arc<HttpEvaluationClient>) -> Result<()> {
    let access = access_policy(&client).await;
    let state = AppState::new(
        client.clone(),
        client,
        access,
        SessionConfig::from_api(&cfg.api),
        cfg.audio.clone(),
    );

    let app = create_router(state);
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn speak(
    cfg: &Config,
    client: Arc<HttpEvaluationClient>,
    prompt_id: &str,
    wav: Option<PathBuf>,
) -> Result<()> {
    let listing = find_prompt(&client, CaptureKind::Speaking, prompt_id).await?;

    let (backend, replay): (Box<dyn AudioBackend>, Option<Duration>) = match wav {
        Some(path) => {
            let length = AudioFile::open(&path)?.duration_seconds;
            (
                Box::new(FileBackend::new(path, cfg.audio.backend_config())),
                Some(Duration::from_secs_f64(length)),
            )
        }
        None => (
            AudioBackendFactory::create(cfg.audio.source(), cfg.audio.backend_config())?,
            None,
        ),
    };

    let controller = SessionController::new(
        Box::new(MicrophoneCapture::new(backend)),
        client.clone(),
        access_policy(&client).await,
        SessionConfig::from_api(&cfg.api),
    );

    let snapshot = controller
        .begin(&listing.prompt, &listing.question)
        .await?;
    info!(
        "{}: speak now, {}s available. Press Enter to stop early.",
        listing.question.name, snapshot.remaining_secs
    );

    wait_for_capture(&controller, replay).await?;
    submit_and_report(&controller, client.as_ref(), prompt_id).await
}

async fn write(
    cfg: &Config,
    client: Arc<HttpEvaluationClient>,
    prompt_id: &str,
    text_file: PathBuf,
) -> Result<()> {
    let listing = find_prompt(&client, CaptureKind::Writing, prompt_id).await?;
    let text = tokio::fs::read_to_string(&text_file)
        .await
        .with_context(|| format!("Failed to read {}", text_file.display()))?;

    let (capture, input) = TextCapture::new();
    let controller = SessionController::new(
        Box::new(capture),
        client.clone(),
        access_policy(&client).await,
        SessionConfig::from_api(&cfg.api),
    );

    controller
        .begin(&listing.prompt, &listing.question)
        .await?;
    if !input.set(text) {
        bail!("Writing session closed before the response was entered");
    }
    info!("Response entered ({} words)", input.word_count());

    stop_if_capturing(&controller).await?;
    submit_and_report(&controller, client.as_ref(), prompt_id).await
}

/// Block until capture ends by time limit, Enter on stdin, or the end of a replayed file
async fn wait_for_capture(controller: &SessionController, replay: Option<Duration>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let deadline = replay.map(|length| Instant::now() + length + Duration::from_millis(200));
    let mut poll = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => break,
                _ => stdin_open = false,
            },
            _ = poll.tick() => {
                if controller.phase().await != Phase::Capturing {
                    return Ok(());
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    break;
                }
            }
        }
    }

    stop_if_capturing(controller).await
}

async fn stop_if_capturing(controller: &SessionController) -> Result<()> {
    match controller.stop_capture().await {
        Ok(_) | Err(SessionError::InvalidPhase { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn submit_and_report(
    controller: &SessionController,
    client: &HttpEvaluationClient,
    prompt_id: &str,
) -> Result<()> {
    let snapshot = controller.submit().await?;
    let evaluation_id = snapshot
        .evaluation_id
        .context("Submission confirmed without an evaluation id")?;
    info!("Submitted as evaluation {}", evaluation_id);

    let result = client.fetch_result(prompt_id, Some(&evaluation_id)).await?;
    print_json(&result)
}

async fn find_prompt(
    client: &HttpEvaluationClient,
    kind: CaptureKind,
    prompt_id: &str,
) -> Result<PromptListing> {
    let listings = client.prompts(kind).await?;
    match listings
        .into_iter()
        .find(|listing| listing.prompt.prompt_uuid == prompt_id)
    {
        Some(listing) => Ok(listing),
        None => bail!("No {} prompt with id {}", kind, prompt_id),
    }
}

/// Access follows the identity behind the configured token
async fn access_policy(client: &HttpEvaluationClient) -> Arc<dyn AccessPolicy> {
    let identity = Identity::anonymous();
    if let Err(e) = identity.refresh(client).await {
        warn!("Could not load the current customer, continuing anonymously: {}", e);
    }
    Arc::new(IdentityPolicy::new(identity))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_config_path_from_flag_or_environment() {
        let args = Args::try_parse_from(["celpip-practice", "--config", "a.toml", "serve"]).unwrap();
        assert_eq!(args.config, "a.toml");

        std::env::set_var("CELPIP_CONFIG", "from-env.toml");
        let args = Args::try_parse_from(["celpip-practice", "history", "writing"]).unwrap();
        std::env::remove_var("CELPIP_CONFIG");

        assert_eq!(args.config, "from-env.toml");
        assert!(matches!(
            args.command,
            Command::History {
                kind: KindArg::Writing
            }
        ));
    }
}
