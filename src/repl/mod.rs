//! Interactive session: line editing, slash commands and `@file` mentions.

pub mod display;
pub mod mentions;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::agent::Runtime;
use crate::orchestration::delegate_task;

pub const COORDINATOR: &str = "coordinator";
const HISTORY_SHOWN: usize = 20;

const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help message"),
    ("/agents", "List available agents"),
    ("/use <agent>", "Switch the active agent"),
    ("/clear", "Clear the screen"),
    ("/history", "Show recent inputs"),
    ("/config", "Show the resolved configuration"),
    ("/exit", "Exit"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Agents,
    Use(Option<String>),
    Clear,
    History,
    Config,
    Exit,
    Unknown(String),
}

impl ReplCommand {
    /// Parse a slash command. Input without a leading `/` is not a command.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }
        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_ascii_lowercase();
        Some(match cmd.as_str() {
            "/help" => Self::Help,
            "/agents" => Self::Agents,
            "/use" => Self::Use(parts.next().map(str::to_string)),
            "/clear" => Self::Clear,
            "/history" => Self::History,
            "/config" => Self::Config,
            "/exit" | "/quit" => Self::Exit,
            _ => Self::Unknown(cmd),
        })
    }
}

pub fn help_text() -> String {
    let mut out = String::from("Commands:\n");
    for (cmd, about) in COMMANDS {
        out.push_str(&format!("  {cmd:<14} {about}\n"));
    }
    out.push_str(
        "\nAnything else is sent to the active agent. Mention files with @path, e.g.\n  explain @src/main.rs\n",
    );
    out
}

/// Where input history is kept for a workspace.
pub fn history_path(workspace: &Path) -> PathBuf {
    workspace.join(".omni").join("history")
}

/// The last `n` entries of a rustyline history file.
pub fn recent_history(path: &Path, n: usize) -> Vec<String> {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let entries: Vec<String> = contents
        .lines()
        .filter(|l| !l.starts_with("#V"))
        .map(str::to_string)
        .collect();
    let skip = entries.len().saturating_sub(n);
    entries.into_iter().skip(skip).collect()
}

/// One interactive session over a [`Runtime`].
pub struct Repl {
    runtime: Arc<Runtime>,
    active: String,
    history: PathBuf,
}

impl Repl {
    pub fn new(runtime: Arc<Runtime>, agent: Option<String>) -> anyhow::Result<Self> {
        let active = agent.unwrap_or_else(|| COORDINATOR.to_string());
        runtime.agents().get(&active)?;
        let history = history_path(runtime.safety().workspace_root());
        Ok(Self {
            runtime,
            active,
            history,
        })
    }

    pub fn active_agent(&self) -> &str {
        &self.active
    }

    fn prompt(&self) -> String {
        format!("{}> ", self.active)
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut editor = DefaultEditor::new()?;
        if let Some(parent) = self.history.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        if editor.load_history(&self.history).is_err() {
            tracing::debug!(path = %self.history.display(), "No history loaded");
        }

        println!("omni interactive session");
        println!(
            "Active agent: {}. Type /help for commands, /exit to quit.\n",
            self.active
        );

        loop {
            match editor.readline(&self.prompt()) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(line).ok();
                    if let Err(e) = editor.save_history(&self.history) {
                        tracing::warn!(error = %e, "Failed to save history");
                    }

                    if self.process_input(line).await {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Use /exit to quit");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Readline failed");
                    eprintln!("Error: {e}");
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Handle one line. Returns true when the session should end.
    pub async fn process_input(&mut self, input: &str) -> bool {
        match ReplCommand::parse(input) {
            Some(command) => self.handle_command(command),
            None => {
                self.send(input).await;
                false
            }
        }
    }

    fn handle_command(&mut self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Help => print!("{}", help_text()),
            ReplCommand::Agents => {
                print!("{}", display::agents_table(self.runtime.agents().specs()));
                println!("\nActive: {}", self.active);
            }
            ReplCommand::Use(Some(name)) => match self.runtime.agents().get(&name) {
                Ok(_) => {
                    self.active = name;
                    println!("Switched to {}", self.active);
                }
                Err(e) => println!("{e}"),
            },
            ReplCommand::Use(None) => println!("Usage: /use <agent_name>"),
            ReplCommand::Clear => {
                print!("\x1b[2J\x1b[H");
                std::io::Write::flush(&mut std::io::stdout()).ok();
            }
            ReplCommand::History => {
                let entries = recent_history(&self.history, HISTORY_SHOWN);
                if entries.is_empty() {
                    println!("No command history yet");
                }
                for (i, entry) in entries.iter().enumerate() {
                    println!("{}. {entry}", i + 1);
                }
            }
            ReplCommand::Config => print!("{}", display::config_summary(self.runtime.config())),
            ReplCommand::Exit => return true,
            ReplCommand::Unknown(cmd) => {
                println!("Unknown command: {cmd}");
                println!("Type /help for available commands");
            }
        }
        false
    }

    /// Send input to the active agent. Ctrl+C cancels the run.
    async fn send(&self, input: &str) {
        let workspace = self.runtime.safety().workspace_root().to_path_buf();
        let (cleaned, context) = mentions::process_mentions(input, &workspace);
        let prompt = mentions::with_context(&cleaned, &context);

        let token = self.runtime.run_token();
        let cancel = token.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        if self.active == COORDINATOR {
            let result = delegate_task(&self.runtime, &prompt, None, token, false).await;
            println!("{}", display::delegation_result(&result));
        } else {
            match self.runtime.run(&self.active, &prompt, token, true).await {
                Ok(output) => {
                    if output.text.is_empty() {
                        println!("(no answer)");
                    }
                    println!();
                }
                Err(e) => println!("\nError: {e}"),
            }
        }
        watcher.abort();
    }
}
