use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relief_agent::ReliefPipeline;
use relief_core::config::AppConfig;
use relief_core::event::EventBus;
use relief_core::plan::{InputBundle, CLI_TOPIC_LABEL};
use relief_core::traits::{CrewLauncher, LlmClient};
use relief_core::types::CrewEvent;
use relief_gateway::GatewayServer;
use relief_tools::ToolRegistry;

const DETAILS_PROMPT: &str =
    "Please enter specific aspects or areas you are focusing on for the relief efforts";

#[derive(Parser)]
#[command(name = "relief", version, about = "Disaster relief planning crew: collect, analyze, decide")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "relief.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crew once on the given details and exit
    Run {
        /// Relief details; read from stdin when omitted
        #[arg(trailing_var_arg = true)]
        details: Vec<String>,
    },
    /// Start the web form
    Serve,
    /// Show current configuration (secrets masked)
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relief=info,warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "relief", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    if let Some(Commands::Config) = &cli.command {
        println!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    // Missing secrets stop the process here, before any run
    config.validate()?;

    let llm: Arc<dyn LlmClient> = Arc::from(relief_llm::create_client(
        &config.model,
        &config.credentials,
    )?);
    let tools = Arc::new(ToolRegistry::with_research_tools(&config.credentials)?);
    info!(tools = ?tools.list(), "Tool registry ready");

    let event_bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();
    let pipeline = ReliefPipeline::new(
        llm,
        config.model.clone(),
        config.agent.clone(),
        config.crew.clone(),
        tools,
    )
    .with_event_bus(event_bus.clone())
    .with_cancel_token(cancel.clone());

    match cli.command {
        Some(Commands::Run { details }) => {
            let details = if details.is_empty() {
                read_stdin()?
            } else {
                details.join(" ")
            };
            let bundle = InputBundle::compose(CLI_TOPIC_LABEL, &config.crew.topic, &details);
            let result = run_once(&pipeline, &event_bus, config.crew.verbose, bundle).await?;
            print_results(&result);
        }
        Some(Commands::Serve) => {
            let gateway_config = config.gateway.clone().unwrap_or_default();
            info!(bind = %gateway_config.bind, "Starting relief web form");
            let server = GatewayServer::new(
                gateway_config,
                Arc::new(pipeline),
                config.crew.topic.clone(),
            );

            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        None => {
            println!("Welcome to the Disaster Relief Crew Setup");
            println!("---------------------------------------");
            let details = prompt_details()?;
            let bundle = InputBundle::compose(CLI_TOPIC_LABEL, &config.crew.topic, &details);
            let result = run_once(&pipeline, &event_bus, config.crew.verbose, bundle).await?;
            print_results(&result);
        }
        Some(Commands::Config) => unreachable!("handled before validation"),
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
    }

    Ok(())
}

/// `--config` if it exists, then `~/.relief/config.toml`, then the environment.
fn load_config(path: &PathBuf) -> anyhow::Result<AppConfig> {
    if path.exists() {
        info!(path = %path.display(), "Loading config");
        return Ok(AppConfig::load(path)?);
    }

    if let Some(home) = AppConfig::home_config_path().filter(|p| p.exists()) {
        info!(path = %home.display(), "Loading config from home directory");
        return Ok(AppConfig::load(&home)?);
    }

    info!("No config file found, reading OPENAI_API_KEY, GROQ_API_KEY and SERPER_API_KEY from the environment");
    Ok(AppConfig::from_env()?)
}

fn prompt_details() -> anyhow::Result<String> {
    if !io::stdin().is_terminal() {
        print!("{}: ", DETAILS_PROMPT);
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }

    let details: String = dialoguer::Input::new()
        .with_prompt(DETAILS_PROMPT)
        .allow_empty(true)
        .interact_text()?;
    Ok(details)
}

fn read_stdin() -> anyhow::Result<String> {
    let lines: Vec<String> = io::stdin()
        .lock()
        .lines()
        .collect::<Result<_, _>>()?;
    Ok(lines.join("\n"))
}

fn print_results(result: &str) {
    println!("\n\n##############################");
    println!("## Here are the results of your disaster relief project:");
    println!("##############################\n");
    println!("{}", result);
}

/// Run the crew once, echoing progress to stderr when `verbose`.
async fn run_once(
    pipeline: &ReliefPipeline,
    event_bus: &EventBus,
    verbose: bool,
    bundle: InputBundle,
) -> anyhow::Result<String> {
    let done = CancellationToken::new();
    let printer = verbose.then(|| spawn_event_printer(event_bus, done.clone(), print_event));

    let result = pipeline.launch(bundle).await;

    done.cancel();
    if let Some(handle) = printer {
        handle.await.ok();
    }

    match result {
        Ok(text) => Ok(text),
        Err(e) => {
            error!(error = %e, "Relief run failed");
            Err(e.into())
        }
    }
}

/// Forward bus events to `on_event` until `done` fires, then flush what is still queued.
fn spawn_event_printer<F>(event_bus: &EventBus, done: CancellationToken, mut on_event: F) -> JoinHandle<()>
where
    F: FnMut(CrewEvent) + Send + 'static,
{
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => on_event(event),
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "Event printer lagged"),
                    Err(RecvError::Closed) => return,
                },
                _ = done.cancelled() => break,
            }
        }

        // Events published before the run returned are already queued
        loop {
            match rx.try_recv() {
                Ok(event) => on_event(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    })
}

fn print_event(event: CrewEvent) {
    match event {
        CrewEvent::TaskStarted {
            index,
            name,
            agent_role,
        } => {
            eprintln!("\n== [{}] {} ({}) ==", index + 1, name, agent_role);
        }
        CrewEvent::TextDelta(text) => {
            eprint!("{}", text);
            io::stderr().flush().ok();
        }
        CrewEvent::ToolStart { name, input } => {
            eprintln!("\n[tool: {}] {}", name, truncate(&input.to_string(), 200));
        }
        CrewEvent::ToolEnd { name, result } => {
            let status = if result.is_error { "ERROR" } else { "ok" };
            eprintln!("[{}: {}] {}", name, status, truncate(&result.content, 200));
        }
        CrewEvent::TaskCompleted {
            name, output_chars, ..
        } => {
            eprintln!("\n[{} done: {} chars]", name, output_chars);
        }
        CrewEvent::TaskFailed { name, error, .. } => {
            eprintln!("\n[{} failed: {}]", name, error);
        }
        CrewEvent::RunComplete {
            input_tokens,
            output_tokens,
            ..
        } => {
            eprintln!("[tokens: {} in / {} out]", input_tokens, output_tokens);
        }
        CrewEvent::RunStarted { tasks, .. } => {
            eprintln!("[starting {} tasks]", tasks);
        }
        CrewEvent::UsageUpdate { .. } => {}
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &s[..cut].replace('\n', " ")),
        None => s.replace('\n', " "),
    }
}
