//! One end-to-end chat request against the demo engine.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::application::AgentServer;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{CallerIdentity, ChatFilter, ChatRequest, Config};

use super::demo_server;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Agent network to talk to
    pub agent: String,

    /// User message
    pub text: String,

    /// Which messages to show: minimal or maximal
    #[arg(short, long, default_value = "maximal")]
    pub filter: ChatFilter,

    /// Caller identity passed to authorization
    #[arg(long, default_value = "cli")]
    pub caller: String,
}

#[derive(Debug, Serialize)]
pub struct ChatOutput {
    pub request_id: Uuid,
    pub version: u64,
    pub responses: Vec<Value>,
}

impl CommandOutput for ChatOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Request {} (registry version {}):",
            self.request_id, self.version
        )];
        for response in &self.responses {
            let kind = response["type"].as_str().unwrap_or("?");
            let tool = response["origin"]
                .as_array()
                .and_then(|origin| origin.last())
                .and_then(|last| last["tool"].as_str());
            let text = response["text"].as_str().unwrap_or("");
            match tool {
                Some(tool) => lines.push(format!("  [{kind}] {tool}: {text}")),
                None => lines.push(format!("  [{kind}] {text}")),
            }
        }
        lines.join("\n")
    }
}

pub async fn execute(args: ChatArgs, config: &Config, json_mode: bool) -> Result<()> {
    let server = demo_server(config);
    server
        .start()
        .await
        .with_context(|| format!("Failed to load registry {}", config.registry.manifest_path))?;

    let result = chat(&server, args).await;
    server.shutdown().await;

    output(&result?, json_mode);
    Ok(())
}

/// Run one request and collect every shaped response.
pub async fn chat(server: &AgentServer, args: ChatArgs) -> Result<ChatOutput> {
    let request = ChatRequest::new(args.agent.clone(), args.text)
        .with_caller(CallerIdentity::new(args.caller))
        .with_filter(args.filter);

    let mut stream = server
        .requests()
        .streaming_chat(request)
        .await
        .with_context(|| format!("Chat with '{}' was not started", args.agent))?;

    let mut responses = Vec::new();
    while let Some(response) = stream.next().await {
        let response = response.with_context(|| format!("Chat with '{}' failed", args.agent))?;
        responses.push(response.response);
    }

    Ok(ChatOutput {
        request_id: stream.request_id(),
        version: stream.version(),
        responses,
    })
}
