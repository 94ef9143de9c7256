use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use toolcall_core::{agent, config, providers, tools};
use tracing_subscriber::EnvFilter;

mod onboard;
mod render;

use render::TerminalRenderer;

#[derive(Parser)]
#[command(name = "toolcall")]
#[command(about = "toolcall - chat with a model that can call real-world tools", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Onboard,
    Chat {
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the built-in tools
    Tools,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_registry(config: &config::Config) -> Result<agent::ToolRegistry> {
    let mut registry = agent::ToolRegistry::new();
    for tool in tools::builtin_tools(&config.tools) {
        registry.register(tool)?;
    }
    Ok(registry)
}

async fn run_message(
    agent_loop: &agent::AgentLoop,
    renderer: &mut TerminalRenderer<std::io::Stdout>,
    input: &str,
) -> Result<()> {
    let report = agent_loop.run_turn(input, renderer).await?;
    tracing::debug!(messages = report.history.len(), "Turn history");
    if let Some(country) = report.context.get(tools::weather::LAST_COUNTRY_NOTE) {
        tracing::debug!(country, "Last country looked up");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Chat { message: None }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Tools => {
            let config = config::Config::load_or_init()?;
            let registry = build_registry(&config)?;
            for spec in registry.specs() {
                println!("{}", style(&spec.name).cyan().bold());
                println!("    {}", spec.description);
            }
        }
        Commands::Chat { message } => {
            let config = config::load_config()?;

            let provider = providers::create_provider(&config)?;
            let tool_registry = Arc::new(build_registry(&config)?);
            tracing::debug!(
                provider = provider.name(),
                model = %config.model,
                tools = tool_registry.len(),
                "Starting chat"
            );

            let gateway = agent::ModelGateway::new(provider);
            let agent_loop = agent::AgentLoop::new(gateway, tool_registry)
                .with_termination_token(config.termination_token.clone())
                .with_streaming(config.stream.enabled);

            let mut renderer = TerminalRenderer::stdout();

            if let Some(msg) = message {
                if let Err(e) = run_message(&agent_loop, &mut renderer, &msg).await {
                    eprintln!("❌ Error: {:#}", e);
                    anyhow::bail!("Agent processing failed: {}", e);
                }
            } else {
                println!("🔧 toolcall");
                println!("Ask about weather, stocks, news, movies and more (Ctrl+D to exit):\n");

                let mut editor = DefaultEditor::new()?;
                loop {
                    match editor.readline("> ") {
                        Ok(line) => {
                            let input = line.trim();
                            if input.is_empty() {
                                continue;
                            }
                            let _ = editor.add_history_entry(input);

                            println!();
                            if let Err(e) = run_message(&agent_loop, &mut renderer, input).await {
                                eprintln!("❌ Error: {:#}", e);
                            }
                            println!();
                        }
                        Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                            println!("\n👋 Goodbye!");
                            break;
                        }
                        Err(e) => {
                            eprintln!("❌ Error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
