use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "omni", version, about = "Model-agnostic CLI agent")]
pub struct Cli {
    /// Workspace directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Path to an omni.toml config file (replaces the workspace config)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model for the active agent, e.g. "ollama:llama3.1:8b" or "gpt-4o"
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Approve every tool call without prompting
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive session (default)
    Repl {
        /// Agent to start with
        #[arg(short, long)]
        agent: Option<String>,
    },
    /// Run a single prompt and print the answer
    Run {
        /// Agent to run the prompt with
        #[arg(short, long)]
        agent: Option<String>,

        /// Prompt text
        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// List available agents
    Agents,
    /// Show the resolved configuration
    Config,
    /// Switch the .env profile (granite, optimized, generic)
    Env {
        /// Profile name; omit to show usage and the current file editor model
        profile: Option<String>,
    },
    /// Generate code and write the extracted files into the workspace
    Generate {
        /// What to build
        #[arg(required = true, trailing_var_arg = true)]
        description: Vec<String>,

        /// Target language
        #[arg(short, long, default_value = "html")]
        language: String,

        /// Output path for the primary file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional style guide to follow
        #[arg(long)]
        style_guide: Option<String>,
    },
}

impl Cli {
    /// The effective subcommand, falling back to the REPL.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Repl { agent: None })
    }
}
