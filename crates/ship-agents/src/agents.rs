//! Built-in agents for issues, reviews, security scans, and feedback.

use crate::backends::ModelGateway;
use crate::prompts::{CODE_REVIEW_PROMPT, ISSUE_ANALYSIS_PROMPT, SECURITY_SCAN_PROMPT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ship_core::{Payload, ShipError, ShipResult};
use ship_orchestrator::{Agent, AgentDescriptor, TaskKind};
use std::sync::Arc;
use tracing::info;

/// Outcome of a code review, parsed from the review text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    /// Merge as is.
    Approved,
    /// Needs another round before merging.
    ChangesRequested,
}

impl ReviewVerdict {
    /// Reads the last `Verdict:` line; approves when there is none.
    pub fn parse(review: &str) -> Self {
        let verdict = review.lines().rev().find_map(|line| {
            let line = line.trim().trim_matches('*').trim();
            let (label, value) = line.split_once(':')?;
            label
                .trim()
                .eq_ignore_ascii_case("verdict")
                .then(|| value.trim().to_ascii_lowercase())
        });

        match verdict {
            Some(v) if v.contains("changes") => ReviewVerdict::ChangesRequested,
            _ => ReviewVerdict::Approved,
        }
    }
}

fn required_str<'a>(input: &'a Payload, key: &str, agent: &str) -> ShipResult<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ShipError::execution(format!("{agent}: missing required string field '{key}'")))
}

fn optional(input: &Payload, key: &str) -> Value {
    input.get(key).cloned().unwrap_or(Value::Null)
}

/// `" #12"` for numbers and non-empty strings, empty for anything else.
fn reference(value: &Value) -> String {
    match value {
        Value::Number(n) => format!(" #{n}"),
        Value::String(s) if !s.is_empty() => format!(" #{s}"),
        _ => String::new(),
    }
}

fn timestamp() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

/// Plans an implementation for an issue.
///
/// Input: `issue_body` (required), `issue_number`.
/// Output: `issue_number`, `analysis`, `timestamp`.
pub struct IssueProcessorAgent {
    descriptor: AgentDescriptor,
    gateway: Arc<dyn ModelGateway>,
}

impl IssueProcessorAgent {
    /// Agent that prompts through `gateway`.
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            descriptor: Self::describe(),
            gateway,
        }
    }

    /// Registration metadata for this agent.
    pub fn describe() -> AgentDescriptor {
        AgentDescriptor::new(
            "Issue Processor",
            TaskKind::Issue,
            "Analyzes GitHub issues and creates implementation plans",
        )
    }
}

#[async_trait]
impl Agent for IssueProcessorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Payload) -> ShipResult<Payload> {
        let body = required_str(&input, "issue_body", &self.descriptor.name)?;
        let issue_number = optional(&input, "issue_number");
        let prompt = format!(
            "Analyze this GitHub issue:\n\nIssue{}\n{body}",
            reference(&issue_number)
        );

        info!(model = self.gateway.name(), "Analyzing issue");
        let analysis = self
            .gateway
            .generate(Some(ISSUE_ANALYSIS_PROMPT), &prompt)
            .await?;

        let mut output = Payload::new();
        output.insert("issue_number".to_string(), issue_number);
        output.insert("analysis".to_string(), Value::String(analysis));
        output.insert("timestamp".to_string(), timestamp());
        Ok(output)
    }
}

/// Reviews a pull request diff.
///
/// Input: `diff` (required), `pr_number`.
/// Output: `pr_number`, `review`, `verdict`, `timestamp`.
pub struct CodeReviewAgent {
    descriptor: AgentDescriptor,
    gateway: Arc<dyn ModelGateway>,
}

impl CodeReviewAgent {
    /// Agent that prompts through `gateway`.
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            descriptor: Self::describe(),
            gateway,
        }
    }

    /// Registration metadata for this agent.
    pub fn describe() -> AgentDescriptor {
        AgentDescriptor::new(
            "Code Reviewer",
            TaskKind::Review,
            "Performs AI-powered code review on pull requests",
        )
    }
}

#[async_trait]
impl Agent for CodeReviewAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Payload) -> ShipResult<Payload> {
        let diff = required_str(&input, "diff", &self.descriptor.name)?;
        let pr_number = optional(&input, "pr_number");
        let prompt = format!(
            "Review this pull request:\n\nPR{}\n\n{diff}",
            reference(&pr_number)
        );

        info!(model = self.gateway.name(), "Reviewing pull request");
        let review = self
            .gateway
            .generate(Some(CODE_REVIEW_PROMPT), &prompt)
            .await?;
        let verdict = ReviewVerdict::parse(&review);

        let mut output = Payload::new();
        output.insert("pr_number".to_string(), pr_number);
        output.insert("review".to_string(), Value::String(review));
        output.insert("verdict".to_string(), serde_json::to_value(verdict)?);
        output.insert("timestamp".to_string(), timestamp());
        Ok(output)
    }
}

/// Scans one file for vulnerabilities.
pub struct SecurityScannerAgent {
    descriptor: AgentDescriptor,
    gateway: Arc<dyn ModelGateway>,
}

impl SecurityScannerAgent {
    /// Agent that prompts through `gateway`.
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            descriptor: Self::describe(),
            gateway,
        }
    }

    /// Registration metadata for this agent.
    pub fn describe() -> AgentDescriptor {
        AgentDescriptor::new(
            "Security Scanner",
            TaskKind::Security,
            "Scans code for security vulnerabilities",
        )
    }
}

#[async_trait]
impl Agent for SecurityScannerAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Payload) -> ShipResult<Payload> {
        let code = required_str(&input, "code", &self.descriptor.name)?;
        let file_path = optional(&input, "file_path");
        let file_label = file_path.as_str().unwrap_or("<unnamed>");
        let prompt = format!(
            "Scan this code for security vulnerabilities:\n\nFile: {file_label}\n\n{code}"
        );

        info!(model = self.gateway.name(), file = file_label, "Scanning code");
        let findings = self
            .gateway
            .generate(Some(SECURITY_SCAN_PROMPT), &prompt)
            .await?;

        let mut output = Payload::new();
        output.insert("file_path".to_string(), file_path);
        output.insert("findings".to_string(), Value::String(findings));
        output.insert("timestamp".to_string(), timestamp());
        Ok(output)
    }
}

/// Drafts replies to review comments.
pub struct FeedbackHandlerAgent {
    descriptor: AgentDescriptor,
    gateway: Arc<dyn ModelGateway>,
}

impl FeedbackHandlerAgent {
    /// Agent that prompts through `gateway`.
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            descriptor: Self::describe(),
            gateway,
        }
    }

    /// Registration metadata for this agent.
    pub fn describe() -> AgentDescriptor {
        AgentDescriptor::new(
            "Feedback Handler",
            TaskKind::Feedback,
            "Responds to PR review comments and feedback",
        )
    }
}

#[async_trait]
impl Agent for FeedbackHandlerAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Payload) -> ShipResult<Payload> {
        let comment = required_str(&input, "comment", &self.descriptor.name)?;
        let pr_number = optional(&input, "pr_number");
        let context = input.get("context").and_then(Value::as_str).unwrap_or("");
        let prompt = format!(
            "Generate a helpful response to this code review comment:\n\nPR{}\nComment: {comment}\nContext: {context}",
            reference(&pr_number)
        );

        let response = self.gateway.generate(None, &prompt).await?;

        let mut output = Payload::new();
        output.insert("pr_number".to_string(), pr_number);
        output.insert("response".to_string(), Value::String(response));
        output.insert("timestamp".to_string(), timestamp());
        Ok(output)
    }
}

/// The built-in agents, all sharing one gateway. There is none for `deploy`.
pub fn builtin_agents(gateway: Arc<dyn ModelGateway>) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(IssueProcessorAgent::new(gateway.clone())),
        Arc::new(CodeReviewAgent::new(gateway.clone())),
        Arc::new(SecurityScannerAgent::new(gateway.clone())),
        Arc::new(FeedbackHandlerAgent::new(gateway)),
    ]
}

/// Descriptors of [`builtin_agents`], without needing a gateway.
pub fn builtin_descriptors() -> Vec<AgentDescriptor> {
    vec![
        IssueProcessorAgent::describe(),
        CodeReviewAgent::describe(),
        SecurityScannerAgent::describe(),
        FeedbackHandlerAgent::describe(),
    ]
}
