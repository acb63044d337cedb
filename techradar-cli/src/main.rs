//! Techradar CLI: build a technology radar for a topic from the terminal.

mod commands;
mod progress;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use techradar_core::config::{ConfigOverrides, RadarConfig};
use techradar_core::persistence::write_report;
use techradar_core::radar::{RadarController, RadarRequest};
use techradar_core::{GeminiProvider, RadarError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Techradar: build a technology radar with search-grounded research
#[derive(Parser, Debug)]
#[command(name = "techradar", version, about, long_about = None)]
struct Cli {
    /// Topic to research (required unless a subcommand is given)
    topic: Option<String>,

    /// Number of initial search queries
    #[arg(long)]
    initial_queries: Option<usize>,

    /// Maximum number of research loops
    #[arg(long)]
    max_loops: Option<usize>,

    /// Target number of radar elements
    #[arg(long)]
    target: Option<usize>,

    /// Model used for extraction, reflection and the narrative
    #[arg(long)]
    reasoning_model: Option<String>,

    /// Where to write the radar JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

impl Cli {
    /// Per-run flags as config overrides. Only flags that were given are set.
    fn config_overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(n) = self.initial_queries {
            overrides = overrides.set("research.number_of_initial_queries", n);
        }
        if let Some(n) = self.max_loops {
            overrides = overrides.set("research.max_research_loops", n);
        }
        if let Some(n) = self.target {
            overrides = overrides.set("research.target_element_count", n);
        }
        if let Some(model) = &self.reasoning_model {
            overrides = overrides.set("models.reasoning_model", model);
        }
        if let Some(output) = &self.output {
            overrides = overrides.set("output.path", output);
        }
        overrides
    }
}

/// Describe a failed run, pointing at the key variable only when no key was found.
fn describe_failure(err: &RadarError, api_key_env: &str) -> String {
    if err.is_missing_credential() {
        format!("{err}. Set {api_key_env} (or llm.api_key in the config file)")
    } else {
        format!("Radar research failed: {err}")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let mut cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "techradar", "techradar")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "techradar.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if let Some(command) = cli.command.take() {
        return commands::handle_command(command, &workspace);
    }

    let topic = cli
        .topic
        .clone()
        .filter(|t| !t.trim().is_empty())
        .context("A topic is required, e.g. `techradar \"Caching\"`")?;

    let overrides = cli.config_overrides();
    let config = techradar_core::config::load_config(Some(&workspace), Some(&overrides))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    run_radar(topic, config, cli.quiet).await
}

async fn run_radar(topic: String, config: RadarConfig, quiet: bool) -> anyhow::Result<()> {
    let provider = Arc::new(
        GeminiProvider::new(&config.llm).context("Failed to initialize the Gemini client")?,
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current round");
            ctrl_c.cancel();
        }
    });

    let controller = RadarController::new(provider.clone(), provider, &config)
        .with_callback(Arc::new(progress::ConsoleCallback::new(quiet)))
        .with_cancellation(cancel);

    let mut request = RadarRequest::from_config(topic, &config.research);
    request.reasoning_model = config.models.reasoning_model.clone();

    let outcome = controller
        .run_request(request)
        .await
        .map_err(|e| anyhow::anyhow!(describe_failure(&e, &config.llm.api_key_env)))?;

    write_report(&config.output.path, &outcome.report).with_context(|| {
        format!(
            "Failed to write the radar to {}",
            config.output.path.display()
        )
    })?;

    println!("{}", outcome.final_message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use techradar_core::LlmError;
    use techradar_core::config::load_config_file;

    fn load_with(cli: &Cli, file_contents: &str) -> RadarConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, file_contents).unwrap();
        load_config_file(&path, Some(&cli.config_overrides())).unwrap()
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "techradar",
            "Caching",
            "--initial-queries",
            "2",
            "--max-loops",
            "1",
            "--target",
            "10",
            "--reasoning-model",
            "gemini-2.5-pro",
            "--output",
            "out/radar.json",
        ])
        .unwrap();
        let config = load_with(&cli, "");

        assert_eq!(cli.topic.as_deref(), Some("Caching"));
        assert_eq!(config.research.number_of_initial_queries, 2);
        assert_eq!(config.research.max_research_loops, 1);
        assert_eq!(config.research.target_element_count, 10);
        assert_eq!(config.models.extraction_model(), "gemini-2.5-pro");
        assert_eq!(config.output.path, PathBuf::from("out/radar.json"));
    }

    #[test]
    fn test_unset_flags_keep_file_values() {
        let cli = Cli::try_parse_from(["techradar", "Observability", "--target", "12"]).unwrap();
        let config = load_with(
            &cli,
            "[research]\nmax_research_loops = 9\ntarget_element_count = 40\n",
        );
        assert_eq!(config.research.target_element_count, 12);
        assert_eq!(config.research.max_research_loops, 9);
        assert!(config.models.reasoning_model.is_none());
    }

    #[test]
    fn test_key_hint_only_for_missing_credential() {
        let missing: RadarError = LlmError::MissingCredential {
            provider: "Gemini".into(),
            env_var: "GEMINI_API_KEY".into(),
        }
        .into();
        assert!(describe_failure(&missing, "GEMINI_API_KEY").contains("Set GEMINI_API_KEY"));

        let rejected: RadarError = LlmError::AuthFailed {
            provider: "Gemini".into(),
        }
        .into();
        let message = describe_failure(&rejected, "GEMINI_API_KEY");
        assert!(!message.contains("Set GEMINI_API_KEY"));
        assert!(message.contains("Authentication failed"));
    }

    #[test]
    fn test_config_subcommand_parses() {
        let cli = Cli::try_parse_from(["techradar", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
    }
}
