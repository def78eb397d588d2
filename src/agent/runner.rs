//! The tool-calling loop for one agent run.
//!
//! A run walks the agent's model chain (primary, then fallbacks). Each model
//! gets `retries + 1` attempts; each attempt is a fresh conversation bounded
//! by the agent timeout and by the caller's cancellation token. Within an
//! attempt the loop:
//!
//! 1. Streams the model response (printing chunks when asked to)
//! 2. Dispatches any tool calls through the [`ToolRegistry`]
//! 3. Appends the tool responses and re-prompts
//! 4. Stops at the first text-only answer, or fails after `max_turns`
//!
//! Every attempt, tool call and fallback is written to the session log.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use genai::Client;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatStreamEvent, ToolCall, ToolResponse};
use tracing::Instrument;

use super::factory::AgentSpec;
use super::logging::SessionLogger;
use super::system_prompt::build_system_prompt;
use crate::error::AgentError;
use crate::provider::{self, ModelSpec, ProviderSettings};
use crate::tools::{ToolContext, ToolRegistry};

/// Result of a successful agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    /// Final text answer.
    pub text: String,
    /// Model that produced the answer (`provider:name`).
    pub model: String,
    /// Turns taken by the successful attempt.
    pub turns: u32,
    /// Tools the successful attempt called, in first-use order.
    pub tools_used: Vec<String>,
}

/// Borrowed view of everything a run needs.
pub struct AgentRunner<'a> {
    pub client: &'a Client,
    pub tools: &'a ToolRegistry,
    pub providers: &'a ProviderSettings,
    pub log_dir: &'a Path,
    /// Stream model text to stdout while it arrives.
    pub print_stream: bool,
}

fn log_err(e: anyhow::Error) -> AgentError {
    AgentError::LoggingError(e.to_string())
}

impl AgentRunner<'_> {
    /// Run `spec` on `prompt` and return its final answer.
    pub async fn run(
        &self,
        spec: &AgentSpec,
        prompt: &str,
        ctx: &ToolContext,
    ) -> Result<AgentOutput, AgentError> {
        let mut logger = SessionLogger::new(self.log_dir, &spec.name).map_err(log_err)?;
        logger
            .log_session_start(
                &spec.name,
                &spec.model.to_string(),
                ctx.workspace(),
                ctx.delegation_id.as_deref(),
            )
            .map_err(log_err)?;

        let tool_names: Vec<String> = spec
            .tools
            .iter()
            .filter(|name| {
                let known = self.tools.has(name);
                if !known {
                    tracing::warn!(agent = %spec.name, tool = %name, "Agent lists unknown tool");
                }
                known
            })
            .cloned()
            .collect();

        let plan: Vec<(&ModelSpec, u32)> = spec
            .model_chain()
            .flat_map(|model| (1..=spec.retries + 1).map(move |attempt| (model, attempt)))
            .collect();

        let mut failures: Vec<String> = Vec::new();
        let mut last_turn = 0;
        // A model whose provider is unusable is skipped for its remaining attempts.
        let mut skip: Option<&ModelSpec> = None;

        for (index, (model, attempt)) in plan.iter().enumerate() {
            if skip == Some(*model) {
                continue;
            }
            let model_id = model.to_string();
            let span = tracing::info_span!(
                "agent",
                agent = %spec.name,
                provider = %model.provider,
                model = %model.name,
                attempt
            );

            let outcome = self
                .attempt(spec, model, prompt, &tool_names, ctx, &mut logger)
                .instrument(span)
                .await;

            let e = match outcome {
                Ok(output) => {
                    logger
                        .log_session_end(output.turns, "completed")
                        .map_err(log_err)?;
                    return Ok(output);
                }
                Err(AgentError::Cancelled(agent)) => {
                    logger.log_session_end(last_turn, "cancelled").map_err(log_err)?;
                    return Err(AgentError::Cancelled(agent));
                }
                Err(e) => e,
            };

            let message = e.to_string();
            tracing::warn!(agent = %spec.name, model = %model_id, attempt, error = %message, "Model attempt failed");
            if let AgentError::MaxTurns { turns, .. } = &e {
                last_turn = *turns;
            }
            if matches!(
                e,
                AgentError::MissingApiKey { .. }
                    | AgentError::ProviderUnavailable { .. }
                    | AgentError::ModelNotAvailable { .. }
            ) {
                skip = Some(*model);
            }
            failures.push(format!("{model_id} (attempt {attempt}): {message}"));

            let next = plan[index + 1..]
                .iter()
                .find(|(m, _)| skip != Some(*m))
                .map(|(m, _)| m.to_string());
            logger
                .log_model_fallback(&model_id, next.as_deref(), *attempt, &message)
                .map_err(log_err)?;
        }

        logger.log_session_end(last_turn, "all_models_failed").map_err(log_err)?;
        Err(AgentError::AllModelsFailed {
            agent: spec.name.clone(),
            attempts: failures.join("; "),
        })
    }

    /// One bounded, cancellable attempt with one model.
    async fn attempt(
        &self,
        spec: &AgentSpec,
        model: &ModelSpec,
        prompt: &str,
        tool_names: &[String],
        ctx: &ToolContext,
        logger: &mut SessionLogger,
    ) -> Result<AgentOutput, AgentError> {
        if ctx.cancel.is_cancelled() {
            return Err(AgentError::Cancelled(spec.name.clone()));
        }
        provider::check_ready(model, self.providers).await?;

        let limit = Duration::from_secs(spec.timeout_secs);
        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(AgentError::Cancelled(spec.name.clone())),
            res = tokio::time::timeout(limit, self.converse(spec, model, prompt, tool_names, ctx, logger)) => {
                match res {
                    Ok(inner) => inner,
                    Err(_) => Err(AgentError::Timeout {
                        agent: spec.name.clone(),
                        timeout_secs: spec.timeout_secs,
                    }),
                }
            }
        }
    }

    async fn converse(
        &self,
        spec: &AgentSpec,
        model: &ModelSpec,
        prompt: &str,
        tool_names: &[String],
        ctx: &ToolContext,
        logger: &mut SessionLogger,
    ) -> Result<AgentOutput, AgentError> {
        let model_id = model.to_string();
        let system_prompt = build_system_prompt(
            &spec.system_prompt,
            ctx.workspace(),
            &model_id,
            &self.tools.descriptions(tool_names),
        );

        let mut chat_req =
            ChatRequest::from_system(system_prompt).append_message(ChatMessage::user(prompt));
        let genai_tools = self.tools.genai_tools(tool_names);
        if !genai_tools.is_empty() {
            chat_req = chat_req.with_tools(genai_tools);
        }

        let chat_options = ChatOptions::default()
            .with_capture_content(true)
            .with_capture_tool_calls(true)
            .with_temperature(f64::from(spec.temperature))
            .with_max_tokens(spec.max_tokens);

        let mut tools_used: Vec<String> = Vec::new();

        for turn in 1..=spec.max_turns {
            let stream_res = self
                .client
                .exec_chat_stream(&model_id, chat_req.clone(), Some(&chat_options))
                .await
                .map_err(|e| {
                    let message = format!("LLM stream error: {e}");
                    let _ = logger.log_error(turn, &message);
                    AgentError::LlmError(message)
                })?;

            let mut stream = stream_res.stream;
            let mut captured_text: Option<String> = None;
            let mut captured_tool_calls: Vec<ToolCall> = Vec::new();
            let mut printed = false;

            while let Some(event) = stream.next().await {
                match event {
                    Ok(ChatStreamEvent::Chunk(chunk)) => {
                        if self.print_stream {
                            print!("{}", chunk.content);
                            std::io::stdout().flush().ok();
                            printed = true;
                        }
                    }
                    Ok(ChatStreamEvent::End(end)) => {
                        if let Some(text) = end.captured_first_text() {
                            captured_text = Some(text.to_string());
                        }
                        if let Some(calls) = end.captured_tool_calls() {
                            captured_tool_calls = calls.into_iter().cloned().collect();
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let message = format!("LLM stream error: {e}");
                        logger.log_error(turn, &message).map_err(log_err)?;
                        return Err(AgentError::LlmError(message));
                    }
                }
            }
            if printed {
                println!();
            }

            if let Some(text) = &captured_text {
                logger.log_assistant_text(turn, text).map_err(log_err)?;
            }

            if captured_tool_calls.is_empty() {
                return Ok(AgentOutput {
                    text: captured_text.unwrap_or_default(),
                    model: model_id,
                    turns: turn,
                    tools_used,
                });
            }

            chat_req = chat_req.append_message(ChatMessage::from(captured_tool_calls.clone()));

            for call in &captured_tool_calls {
                logger
                    .log_tool_call(turn, &call.call_id, &call.fn_name, &call.fn_arguments)
                    .map_err(log_err)?;
                tracing::info!(tool = %call.fn_name, call_id = %call.call_id, "Tool call");
                if self.print_stream {
                    let args = call.fn_arguments.to_string();
                    let args: String = if args.chars().count() > 100 {
                        format!("{}...", args.chars().take(100).collect::<String>())
                    } else {
                        args
                    };
                    eprintln!("[tool] {}({args})", call.fn_name);
                }

                let result = if tool_names.iter().any(|n| n == &call.fn_name) {
                    if !tools_used.contains(&call.fn_name) {
                        tools_used.push(call.fn_name.clone());
                    }
                    self.tools
                        .dispatch(&call.fn_name, call.fn_arguments.clone(), ctx)
                        .await
                } else {
                    crate::tools::ToolResult::err(format!("Unknown tool: {}", call.fn_name))
                };

                logger
                    .log_tool_result(turn, &call.call_id, &call.fn_name, &result)
                    .map_err(log_err)?;
                if !result.success {
                    tracing::debug!(tool = %call.fn_name, error = ?result.error, "Tool returned an error");
                }

                chat_req = chat_req
                    .append_message(ToolResponse::new(call.call_id.clone(), result.to_model_content()));
            }
        }

        Err(AgentError::MaxTurns {
            agent: spec.name.clone(),
            turns: spec.max_turns,
        })
    }
}
