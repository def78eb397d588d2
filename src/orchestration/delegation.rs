//! Coordinator delegation: specialist agents exposed as tools.
//!
//! Each delegation tool turns its arguments into a prompt for one specialist
//! and runs it through the [`Delegator`] in the tool context. The run is
//! recorded in the session's [`super::DelegationManager`] as a child of the
//! calling agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::types::DelegationResult;
use crate::agent::Runtime;
use crate::error::AgentError;
use crate::tools::{Delegator, Tool, ToolContext, ToolResult, str_arg};

const SUMMARY_CHARS: usize = 200;

struct Param {
    name: &'static str,
    description: &'static str,
    required: bool,
}

const fn required(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        description,
        required: true,
    }
}

const fn optional(name: &'static str, description: &'static str) -> Param {
    Param {
        name,
        description,
        required: false,
    }
}

/// A specialist agent as the coordinator sees it.
pub struct DelegateSpec {
    name: &'static str,
    agent: &'static str,
    description: &'static str,
    params: &'static [Param],
    /// Prefix of a successful result.
    heading: &'static str,
    /// What failed, as in "Analysis failed: ...".
    failure: &'static str,
    prompt: fn(&Value) -> String,
}

fn arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    str_arg(args, key).map(str::trim).filter(|s| !s.is_empty())
}

fn with_line(mut prompt: String, label: &str, value: Option<&str>) -> String {
    if let Some(value) = value {
        prompt.push_str(&format!("\n{label}: {value}"));
    }
    prompt
}

static DELEGATE_TOOLS: &[DelegateSpec] = &[
    DelegateSpec {
        name: "analyze_codebase",
        agent: "codebase_investigator",
        description: "Analyze code structure, patterns and quality. Use for \"what\", \"how\" and \"explain\" questions.",
        params: &[
            required("request", "What to analyze"),
            optional("focus", "Optional focus area, e.g. security or performance"),
        ],
        heading: "Code Analysis:",
        failure: "Analysis",
        prompt: analyze_prompt,
    },
    DelegateSpec {
        name: "search_code",
        agent: "codebase_investigator",
        description: "Find specific code, files or usages. Use for \"find\", \"search\" and \"locate\" requests.",
        params: &[
            required("query", "What to search for"),
            optional("file_pattern", "File pattern to search, e.g. *.rs"),
        ],
        heading: "Search results:",
        failure: "Search",
        prompt: search_prompt,
    },
    DelegateSpec {
        name: "edit_files",
        agent: "file_editor",
        description: "Make precise changes to existing files. Use for \"change\", \"update\" and \"modify\" requests.",
        params: &[
            required("instructions", "What changes to make"),
            optional("file_context", "Which files are involved and anything else the editor should know"),
        ],
        heading: "Edit results:",
        failure: "Edit",
        prompt: edit_prompt,
    },
    DelegateSpec {
        name: "generate_code",
        agent: "code_generator",
        description: "Generate new code from a description. Returns the code as text.",
        params: &[
            required("description", "What the code should do"),
            optional("language", "Target language (default python)"),
            optional("style_guide", "Style conventions to follow"),
        ],
        heading: "Generated code:",
        failure: "Code generation",
        prompt: generate_prompt,
    },
    DelegateSpec {
        name: "write_tests",
        agent: "testing",
        description: "Write and run tests for a file or module.",
        params: &[
            required("target", "File or module to test"),
            optional("instructions", "What to cover"),
        ],
        heading: "Testing results:",
        failure: "Testing",
        prompt: tests_prompt,
    },
    DelegateSpec {
        name: "write_docs",
        agent: "documentation",
        description: "Write documentation (README, API docs, docstrings) for a file or project.",
        params: &[
            required("target", "File, module or project to document"),
            optional("instructions", "What kind of documentation to write"),
        ],
        heading: "Documentation results:",
        failure: "Documentation",
        prompt: docs_prompt,
    },
    DelegateSpec {
        name: "refactor_code",
        agent: "refactoring",
        description: "Refactor existing code without changing its behavior.",
        params: &[
            required("target", "File or module to refactor"),
            optional("goals", "What to improve"),
        ],
        heading: "Refactoring results:",
        failure: "Refactoring",
        prompt: refactor_prompt,
    },
];

fn analyze_prompt(args: &Value) -> String {
    let prompt = format!("Analyze: {}", arg(args, "request").unwrap_or_default());
    with_line(prompt, "Focus on", arg(args, "focus"))
}

fn search_prompt(args: &Value) -> String {
    format!(
        "Search for: {} in files matching {}",
        arg(args, "query").unwrap_or_default(),
        arg(args, "file_pattern").unwrap_or("*")
    )
}

fn edit_prompt(args: &Value) -> String {
    let prompt = format!(
        "Make these changes: {}",
        arg(args, "instructions").unwrap_or_default()
    );
    with_line(prompt, "Context", arg(args, "file_context"))
}

fn generate_prompt(args: &Value) -> String {
    let prompt = format!(
        "Generate {} code for: {}",
        arg(args, "language").unwrap_or("python"),
        arg(args, "description").unwrap_or_default()
    );
    with_line(prompt, "Style guide", arg(args, "style_guide"))
}

fn tests_prompt(args: &Value) -> String {
    let prompt = format!("Write tests for: {}", arg(args, "target").unwrap_or_default());
    with_line(prompt, "Instructions", arg(args, "instructions"))
}

fn docs_prompt(args: &Value) -> String {
    let prompt = format!(
        "Write documentation for: {}",
        arg(args, "target").unwrap_or_default()
    );
    with_line(prompt, "Instructions", arg(args, "instructions"))
}

fn refactor_prompt(args: &Value) -> String {
    let prompt = format!(
        "Refactor the code in: {}",
        arg(args, "target").unwrap_or_default()
    );
    with_line(prompt, "Focus on", arg(args, "goals"))
}

/// Every delegation tool, for registration in the tool registry.
pub fn delegation_tools() -> Vec<Arc<dyn Tool>> {
    DELEGATE_TOOLS
        .iter()
        .map(|spec| Arc::new(DelegateTool(spec)) as Arc<dyn Tool>)
        .collect()
}

/// Specialist agent behind a delegation tool name.
pub fn agent_for_tool(tool: &str) -> Option<&'static str> {
    DELEGATE_TOOLS
        .iter()
        .find(|t| t.name == tool)
        .map(|t| t.agent)
}

impl DelegateSpec {
    pub fn build_prompt(&self, args: &Value) -> Result<String, ToolResult> {
        for param in self.params.iter().filter(|p| p.required) {
            if arg(args, param.name).is_none() {
                return Err(ToolResult::missing(param.name));
            }
        }
        Ok((self.prompt)(args))
    }
}

/// A specialist agent exposed to the coordinator as a tool.
pub struct DelegateTool(&'static DelegateSpec);

#[async_trait]
impl Tool for DelegateTool {
    fn name(&self) -> &str {
        self.0.name
    }

    fn description(&self) -> &str {
        self.0.description
    }

    fn parameters(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for param in self.0.params {
            properties.insert(
                param.name.to_string(),
                json!({ "type": "string", "description": param.description }),
            );
        }
        let required: Vec<&str> = self
            .0
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: Value) -> ToolResult {
        let tool = self.0;
        let prompt = match tool.build_prompt(&args) {
            Ok(prompt) => prompt,
            Err(result) => return result,
        };

        let Some(delegator) = ctx.delegator.clone() else {
            return ToolResult::err(format!(
                "{} failed: delegation is not available here",
                tool.failure
            ));
        };

        tracing::info!(from = %ctx.agent, to = tool.agent, tool = tool.name, "Delegating");
        match delegator.delegate(ctx, tool.agent, prompt).await {
            Ok(text) => ToolResult::ok(format!("{}\n{text}", tool.heading))
                .with_meta("agent", tool.agent),
            Err(e) => {
                tracing::warn!(to = tool.agent, error = %e, "Delegation failed");
                ToolResult::err(format!("{} failed: {e}", tool.failure)).with_meta("agent", tool.agent)
            }
        }
    }
}

#[async_trait]
impl Delegator for Runtime {
    async fn delegate(
        &self,
        ctx: &ToolContext,
        agent: &str,
        prompt: String,
    ) -> Result<String, AgentError> {
        let spec = self.agents().get(agent)?.clone();
        let (id, token) = self
            .delegations()
            .register(agent, &prompt, ctx.delegation_id.as_deref())?;

        let child_ctx = ToolContext {
            agent: agent.to_string(),
            delegation_id: Some(id.clone()),
            cancel: token,
            ..ctx.clone()
        };

        let outcome = tokio::select! {
            _ = ctx.cancel.cancelled() => Err(AgentError::Cancelled(agent.to_string())),
            res = self.run_spec(&spec, &prompt, &child_ctx, false) => res,
        };

        match outcome {
            Ok(output) => {
                self.delegations().complete(&id, output.text.clone());
                Ok(output.text)
            }
            Err(AgentError::Cancelled(name)) => {
                self.delegations().cancel(&id);
                Err(AgentError::Cancelled(name))
            }
            Err(e) => {
                self.delegations().fail(&id, e.to_string());
                Err(e)
            }
        }
    }
}

/// First 200 characters of `text`, with `...` when it was longer.
pub fn summarize(text: &str) -> String {
    if text.chars().count() > SUMMARY_CHARS {
        format!("{}...", text.chars().take(SUMMARY_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Hand a request to the coordinator and collect what it did.
///
/// Run failures are reported in the result rather than as errors so the
/// caller can always display something.
pub async fn delegate_task(
    runtime: &Arc<Runtime>,
    request: &str,
    context: Option<&str>,
    cancel: tokio_util::sync::CancellationToken,
    print_stream: bool,
) -> DelegationResult {
    let mut prompt = request.to_string();
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\n\nContext: {context}"));
    }

    tracing::info!(request, "Delegating task to coordinator");
    match runtime.run("coordinator", &prompt, cancel, print_stream).await {
        Ok(output) => {
            let mut agents_used: Vec<String> = Vec::new();
            for agent in output.tools_used.iter().filter_map(|t| agent_for_tool(t)) {
                if !agents_used.iter().any(|a| a == agent) {
                    agents_used.push(agent.to_string());
                }
            }
            DelegationResult {
                success: true,
                task_summary: summarize(&output.text),
                result: output.text,
                agents_used,
            }
        }
        Err(e) => {
            let message = e.to_string();
            DelegationResult {
                success: false,
                task_summary: summarize(&message),
                result: message,
                agents_used: Vec::new(),
            }
        }
    }
}
