use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use omni::agent::{AgentFactory, Runtime};
use omni::cli::{Cli, Commands};
use omni::codegen;
use omni::config::{self, AppConfig, env_profile};
use omni::orchestration::delegate_task;
use omni::repl::{COORDINATOR, Repl, display, mentions};
use omni::tools::approval::{ApprovalPrompter, StdinPrompter};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level and LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::early_log_level(&cli)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("omni starting");

    // The profile switch only touches files and must work without a valid config.
    if let Commands::Env { profile } = cli.command() {
        let dir = cli.workspace.clone().unwrap_or_else(|| PathBuf::from("."));
        return Ok(switch_env(&dir, profile.as_deref()));
    }

    let config = config::load_config(&cli)?;
    tracing::info!(
        default_model = %config.default_model,
        workspace = %config.workspace.display(),
        "Config loaded"
    );

    match cli.command() {
        Commands::Agents => {
            let specs = AgentFactory::new(&config).list()?;
            print!("{}", display::agents_table(&specs));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", display::config_summary(&config));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Repl { agent } => {
            let runtime = start_runtime(config)?;
            let mut session = Repl::new(runtime.clone(), agent)?;
            session.run().await?;
            runtime.shutdown();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { agent, prompt } => {
            let runtime = start_runtime(config)?;
            let code = run_once(&runtime, agent, &prompt.join(" ")).await;
            runtime.shutdown();
            Ok(code)
        }
        Commands::Generate {
            description,
            language,
            output,
            style_guide,
        } => {
            let runtime = start_runtime(config)?;
            let code = generate(&runtime, &description.join(" "), &language, output, style_guide).await;
            runtime.shutdown();
            Ok(code)
        }
        Commands::Env { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn start_runtime(config: AppConfig) -> anyhow::Result<Arc<Runtime>> {
    let prompter: Option<Arc<dyn ApprovalPrompter>> = if config.auto_approve {
        None
    } else {
        Some(Arc::new(StdinPrompter))
    };
    Runtime::new(config, prompter)
}

/// Cancel everything in `runtime` on Ctrl+C.
fn cancel_on_interrupt(runtime: &Arc<Runtime>) -> tokio::task::JoinHandle<()> {
    let runtime = Arc::clone(runtime);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cancelling...");
            runtime.shutdown();
        }
    })
}

async fn run_once(runtime: &Arc<Runtime>, agent: Option<String>, input: &str) -> ExitCode {
    let workspace = runtime.safety().workspace_root().to_path_buf();
    let (cleaned, context) = mentions::process_mentions(input, &workspace);
    let prompt = mentions::with_context(&cleaned, &context);

    let watcher = cancel_on_interrupt(runtime);
    let agent = agent.unwrap_or_else(|| COORDINATOR.to_string());

    let code = if agent == COORDINATOR {
        let result = delegate_task(runtime, &prompt, None, runtime.run_token(), false).await;
        print!("{}", display::delegation_result(&result));
        if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    } else {
        match runtime.run(&agent, &prompt, runtime.run_token(), true).await {
            Ok(output) => {
                println!();
                tracing::info!(turns = output.turns, model = %output.model, "Run finished");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        }
    };
    watcher.abort();
    code
}

async fn generate(
    runtime: &Arc<Runtime>,
    description: &str,
    language: &str,
    output: Option<PathBuf>,
    style_guide: Option<String>,
) -> ExitCode {
    let watcher = cancel_on_interrupt(runtime);
    let outcome = codegen::generate_to_workspace(
        runtime,
        description,
        language,
        output,
        style_guide.as_deref(),
        runtime.run_token(),
    )
    .await;
    watcher.abort();

    match outcome {
        Ok(files) => {
            let mut critical = false;
            for file in &files {
                println!(
                    "wrote {} ({} bytes, quality {:.1})",
                    file.path.display(),
                    file.bytes,
                    file.report.quality_score
                );
                for issue in &file.report.issues {
                    let line = issue.line_number.map(|n| format!(" line {n}")).unwrap_or_default();
                    println!("  [{:?}]{line} {}", issue.severity, issue.description);
                }
                critical |= file.report.has_critical_issues();
            }
            if critical {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Always exits 0: bad input falls through to the usage text.
fn switch_env(dir: &std::path::Path, profile: Option<&str>) -> ExitCode {
    match env_profile::switch_profile(dir, profile) {
        Ok(outcome) => println!("{}", env_profile::report(&outcome)),
        Err(e) => eprintln!("Error: {e}"),
    }
    ExitCode::SUCCESS
}
