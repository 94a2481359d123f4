//! System and user prompts for the generative backend.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// System prompt used when a request does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant in a multi-agent collaboration platform.";

/// System prompt for the health probe.
pub const HEALTH_CHECK_SYSTEM_PROMPT: &str = r#"Respond with "OK" only."#;

/// Section headers requested by [`TASK_ANALYSIS_SYSTEM_PROMPT`].
pub const SECTION_SUMMARY: &str = "Task Summary:";
pub const SECTION_REQUIREMENTS: &str = "Key Requirements:";
pub const SECTION_COMPLEXITY: &str = "Estimated Complexity:";
pub const SECTION_SKILLS: &str = "Required Skills:";
pub const SECTION_CHALLENGES: &str = "Potential Challenges:";
pub const SECTION_APPROACH: &str = "Recommended Approach:";

/// Line prefixes requested by [`ASSIGNMENT_SYSTEM_PROMPT`].
pub const FIELD_AGENT: &str = "- Agent:";
pub const FIELD_REASON: &str = "- Reason:";
pub const FIELD_CONFIDENCE: &str = "- Confidence:";
pub const FIELD_ALTERNATIVE: &str = "- Alternative:";
pub const FIELD_SUCCESS_RATE: &str = "- Estimated Success Rate:";

/// System prompt for task analysis.
pub const TASK_ANALYSIS_SYSTEM_PROMPT: &str = r"You are a task analysis AI assistant. Analyze the task you are given.

Respond using exactly these six labelled sections, each header at the start of its own line:

Task Summary: <one or two sentences>
Key Requirements:
- <requirement>
Estimated Complexity: <simple, medium or complex>
Required Skills:
- <skill>
Potential Challenges:
- <challenge>
Recommended Approach: <one paragraph>

Keep your response concise and structured.";

/// System prompt for assignment suggestions.
pub const ASSIGNMENT_SYSTEM_PROMPT: &str = r"You are a task assignment AI assistant. Based on the task description and available agents, recommend the best agent for this task.

Consider:
1. Agent capabilities and how they match task requirements
2. Agent current status (prefer 'active' agents)
3. Task complexity and agent expertise

Respond with exactly this block:

Recommendation:
- Agent: <agent name> (<agent id>)
- Reason: <reasoning>
- Confidence: <high, medium or low>
- Alternative: <alternative agent or none>
- Estimated Success Rate: <percentage>";

/// An earlier turn quoted into an agent prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousMessage {
    pub sender_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl PreviousMessage {
    #[must_use]
    pub fn new(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Input for an agent reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub agent_id: String,
    pub content: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub previous_messages: Vec<PreviousMessage>,
}

/// An agent offered to the assignment helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateAgent {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
    pub status: String,
}

/// Identity prompt for an AI agent, optionally bound to a task.
#[must_use]
pub fn agent_system_prompt(agent_id: &str, task_id: Option<&str>) -> String {
    let task_line = task_id
        .map(|id| format!("You are working on task ID: {id}"))
        .unwrap_or_default();
    format!(
        r"You are an AI agent in a multi-agent collaboration platform. Your agent ID is {agent_id}.

Your role is to:
1. Communicate professionally and helpfully with other agents
2. Provide insightful responses based on the task context
3. Collaborate effectively to achieve common goals
4. Ask clarifying questions when needed
5. Share relevant information and expertise

{task_line}
Keep your responses focused, professional, and actionable."
    )
}

/// The new content followed by any earlier turns as `sender: content` lines.
#[must_use]
pub fn agent_user_prompt(message: &AgentMessage) -> String {
    let mut prompt = message.content.clone();
    if !message.previous_messages.is_empty() {
        prompt.push_str("\n\nPrevious conversation:\n");
        for previous in &message.previous_messages {
            let _ = writeln!(prompt, "{}: {}", previous.sender_id, previous.content);
        }
    }
    prompt
}

/// User prompt for task analysis.
#[must_use]
pub fn task_analysis_prompt(title: &str, description: &str) -> String {
    format!("Task Title: {title}\n\nTask Description: {description}\n\nPlease analyze this task.")
}

/// User prompt listing the candidate agents for an assignment.
#[must_use]
pub fn assignment_prompt(description: &str, candidates: &[CandidateAgent]) -> String {
    let agents = candidates
        .iter()
        .map(|a| {
            format!(
                "- {} ({}): {} - Status: {}",
                a.name,
                a.id,
                a.capabilities.join(", "),
                a.status
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Task Description: {description}\n\nAvailable Agents:\n{agents}\n\nRecommend the best agent for this task."
    )
}
