//! docsort: sandboxed file-operation gateway for document sorting agents

mod classifier;
mod daemon;
mod dispatcher;
mod filesystem;
mod organize;
mod organizer;
mod protocol;
mod session;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use classifier::ollama::{self, OllamaClient, OllamaConfig};
use classifier::{Classifier, ThemeNamer, Unavailable};
use dispatcher::{ToolDispatcher, ToolKind};
use filesystem::config::{GatewayConfig, DEFAULT_ROOT};
use filesystem::FileSystemService;
use organizer::MoveOutcome;
use session::Session;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "docsort", version, about = "Sandboxed file gateway that sorts documents into type/theme folders")]
struct Cli {
    /// Directory the gateway is confined to
    #[arg(long, env = "CONTAINER_ROOT", default_value = DEFAULT_ROOT, global = true)]
    root: PathBuf,

    /// Ollama-compatible endpoint used for classification and naming
    #[arg(long, env = "OLLAMA_HOST", default_value = ollama::DEFAULT_HOST, global = true)]
    ollama_host: String,

    /// Model name sent to the endpoint
    #[arg(long, env = "DOCSORT_MODEL", default_value = ollama::DEFAULT_MODEL, global = true)]
    model: String,

    /// Request timeout for the model, in seconds
    #[arg(long, default_value_t = 60, global = true)]
    timeout_secs: u64,

    /// Never call the model; use deterministic fallbacks
    #[arg(long, global = true)]
    no_llm: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebSocket gateway
    Serve {
        #[arg(long, default_value = daemon::DEFAULT_BIND)]
        bind: String,

        #[arg(short, long, default_value_t = daemon::DEFAULT_PORT)]
        port: u16,
    },

    /// Print the operation catalog
    Tools,

    /// Run one operation against a fresh session
    Call {
        /// Operation name
        name: String,

        /// Arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Classify, group and move the files of one folder
    Organize {
        /// Folder relative to the root (root by default)
        #[arg(default_value = "")]
        path: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docsort=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Tools => {
            print_catalog();
            Ok(())
        }
        Commands::Serve { bind, port } => {
            let dispatcher = build_dispatcher(&cli)?;
            daemon::run(bind, *port, dispatcher).await?;
            Ok(())
        }
        Commands::Call { name, arguments } => {
            let dispatcher = build_dispatcher(&cli)?;
            let arguments = match serde_json::from_str::<serde_json::Value>(arguments)? {
                serde_json::Value::Object(map) => map,
                other => return Err(format!("arguments must be a JSON object, got {}", other).into()),
            };

            let mut session = Session::new();
            let output = dispatcher.call_named(&mut session, name, arguments).await;
            println!("{}", output.to_text());
            if output.is_error() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Organize { path, json } => {
            let dispatcher = build_dispatcher(&cli)?;
            let session = Session::new();
            let report = organize::organize(&dispatcher, &session, path).await?;

            if *json {
                let mut value = serde_json::to_value(&report)?;
                value["moved"] = serde_json::Value::Array(dispatcher.outcomes_to_json(&report.outcomes));
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                print_report(&dispatcher, &report);
            }
            Ok(())
        }
    }
}

fn build_dispatcher(cli: &Cli) -> Result<ToolDispatcher, BoxError> {
    let config = GatewayConfig::with_root(&cli.root);
    let fs = FileSystemService::new(config)
        .map_err(|e| format!("cannot open root '{}': {}", cli.root.display(), e))?;
    tracing::info!("Root: {}", fs.validator().root().display());

    let classifier: Arc<dyn Classifier>;
    let namer: Arc<dyn ThemeNamer>;
    if cli.no_llm {
        tracing::info!("Model disabled, using fallback classification");
        classifier = Arc::new(Unavailable);
        namer = Arc::new(Unavailable);
    } else {
        let client = Arc::new(OllamaClient::new(OllamaConfig {
            host: cli.ollama_host.clone(),
            model: cli.model.clone(),
            timeout: Duration::from_secs(cli.timeout_secs),
        })?);
        tracing::info!("Model {} at {}", cli.model, cli.ollama_host);
        classifier = client.clone();
        namer = client;
    }

    Ok(ToolDispatcher::new(Arc::new(fs), classifier, namer))
}

fn print_catalog() {
    for kind in ToolKind::ALL {
        println!(
            "{}({})",
            kind.name().bold(),
            kind.parameters().join(", ").dimmed()
        );
        println!("    {}", kind.description());
    }
}

fn print_report(dispatcher: &ToolDispatcher, report: &organize::OrganizeReport) {
    let folder = if report.folder.is_empty() {
        "<root>"
    } else {
        report.folder.as_str()
    };
    println!(
        "{} {} file(s) in {}, {} group(s)",
        "●".cyan(),
        report.files_info.len(),
        folder.bold(),
        report.groups.len()
    );

    for outcome in &report.outcomes {
        match outcome {
            MoveOutcome::Moved { from, to } => println!(
                "  {} {} -> {}",
                "✓".green(),
                from,
                dispatcher.fs().validator().display_relative(to)
            ),
            MoveOutcome::Failed { from, error } => {
                println!("  {} {}: {}", "✗".red(), from, error.red())
            }
        }
    }

    println!(
        "{} {}/{} moved",
        "●".cyan(),
        report.moved_count(),
        report.outcomes.len()
    );
}
