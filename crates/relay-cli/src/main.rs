use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use relay_agent::Agent;
use relay_core::config::{Config, ResponseMode, ServerConfig};
use relay_runtime::RuntimeState;

mod client;
mod logging;

#[derive(Parser)]
#[command(
    name = "agent-relay",
    about = "Host a tool-using agent behind /invocations, /ping and /ws",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ./agent-relay.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the runtime host
    Serve {
        /// Port to listen on (default: 8080)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,

        /// Response mode for /invocations: buffered or streaming
        #[arg(long)]
        mode: Option<ResponseMode>,
    },

    /// Send one prompt to a running host's /invocations endpoint
    Invoke {
        /// Host base URL
        #[arg(default_value = "http://localhost:8080")]
        url: String,

        #[arg(short, long, default_value = client::DEFAULT_INVOKE_PROMPT)]
        prompt: String,

        /// Session id (default: generated test-session id)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Send one message to a running host's /ws endpoint
    Ws {
        /// Host or WebSocket URL
        #[arg(default_value = "ws://localhost:8080/ws")]
        url: String,

        #[arg(short, long, default_value = client::DEFAULT_WS_MESSAGE)]
        message: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a config value by dotted path (e.g. server.port)
    Get { key: String },
    /// Check the configuration for problems
    Validate,
}

/// Fold `serve` flags into the loaded config.
fn apply_serve_overrides(
    config: &mut Config,
    port: Option<u16>,
    bind: Option<String>,
    mode: Option<ResponseMode>,
) {
    let mut server = config.server.clone().unwrap_or_else(|| ServerConfig {
        port: config.port(),
        bind: None,
        response_mode: ResponseMode::default(),
    });
    if let Some(port) = port {
        server.port = port;
    }
    if bind.is_some() {
        server.bind = bind;
    }
    if let Some(mode) = mode {
        server.response_mode = mode;
    }
    config.server = Some(server);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config
    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)?;

    logging::init_logging(&config.logging(), cli.verbose)?;

    match cli.command {
        Commands::Serve { port, bind, mode } => {
            apply_serve_overrides(&mut config, port, bind, mode);

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                tracing::warn!("{warning}");
            }
            if !errors.is_empty() {
                anyhow::bail!("invalid configuration: {}", errors.join("; "));
            }

            let agent = Agent::from_config(&config)?;
            tracing::info!(
                "Starting agent-relay on {}:{}",
                config.bind(),
                config.port()
            );
            let state = Arc::new(RuntimeState::new(Arc::new(config), Arc::new(agent)));
            relay_runtime::start_runtime(state).await?;
        }
        Commands::Invoke {
            url,
            prompt,
            session,
        } => {
            client::invoke(&url, &prompt, session).await?;
        }
        Commands::Ws { url, message } => {
            client::ws(&url, &message).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("no config value at '{key}'"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                println!("Config: {}", config_path.display());
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s)", errors.len());
                }
                println!("Config OK");
            }
        },
    }

    Ok(())
}
