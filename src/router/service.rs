//! Agent conversation router.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::{
    AgentMessage, AiClient, AiError, CandidateAgent, Completion, CompletionRequest,
    PreviousMessage, UsageStats,
};
use crate::cost::{CostTracker, NewCostEvent, RequestType};
use crate::directory::{AgentStatus, Directory, TaskPatch};
use crate::templates::{
    TemplateRegistry, AGENT_COLLABORATION_REQUEST, AGENT_INTRODUCTION, AGENT_STATUS_UPDATE,
};

use super::{
    parse_recommendation, parse_task_analysis, AgentRecommendation, ConversationMessage,
    ConversationStore, Notifier, NoopNotifier, RouterError, RouterEvent, TaskAnalysis,
};

/// History entries quoted into an AI receiver's prompt.
const ROUTING_CONTEXT_MESSAGES: usize = 5;
/// History entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;
/// Sender recorded for direct messages with no named sender.
const DEFAULT_SENDER: &str = "user";

/// Context for [`AgentRouter::send_ai_message`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub previous_messages: Vec<PreviousMessage>,
    /// Recorded as the sender of the inbound turn. Defaults to `user`.
    /// A sender that is not a directory agent is billed as a user.
    #[serde(default)]
    pub sender_id: Option<String>,
}

/// Context for [`AgentRouter::generate_agent_introduction`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroductionContext {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysisOutcome {
    pub task_id: String,
    pub analysis: TaskAnalysis,
    pub raw_response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSuggestion {
    pub task_id: String,
    pub recommendation: AgentRecommendation,
    pub raw_response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStats {
    pub agents_with_history: usize,
    pub total_messages_queued: usize,
    pub usage: UsageStats,
}

/// Routes messages between agents and drives the AI-backed operations.
pub struct AgentRouter {
    ai: Arc<AiClient>,
    costs: Arc<CostTracker>,
    templates: Arc<TemplateRegistry>,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    conversations: ConversationStore,
}

impl AgentRouter {
    /// Create a router that discards outbound events.
    #[must_use]
    pub fn new(
        ai: Arc<AiClient>,
        costs: Arc<CostTracker>,
        templates: Arc<TemplateRegistry>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            ai,
            costs,
            templates,
            directory,
            notifier: Arc::new(NoopNotifier),
            conversations: ConversationStore::new(),
        }
    }

    /// Send outbound events to `notifier`.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn costs(&self) -> &CostTracker {
        &self.costs
    }

    #[must_use]
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    /// Generate a reply from an AI agent and record the exchange in its history.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AiGenerationFailed` wrapping the backend error,
    /// or a directory error while resolving the sender.
    /// Nothing is recorded when generation fails.
    pub async fn send_ai_message(
        &self,
        agent_id: &str,
        content: &str,
        context: MessageContext,
    ) -> Result<String, RouterError> {
        tracing::info!(
            agent_id,
            has_task_context = context.task_id.is_some(),
            message_length = content.len(),
            "Processing AI agent message"
        );

        let user_id = match &context.sender_id {
            Some(sender) => self.billable_user(sender).await?,
            None => None,
        };
        let sender = context
            .sender_id
            .clone()
            .unwrap_or_else(|| DEFAULT_SENDER.to_string());
        let task_id = context.task_id.clone();
        let completion = self
            .generate_reply(agent_id, content, context, user_id.as_deref())
            .await?;

        let mut inbound = ConversationMessage::new(sender, agent_id, content)
            .with_metadata("role", serde_json::json!("user"));
        if let Some(task_id) = task_id {
            inbound = inbound.with_metadata("taskId", serde_json::json!(task_id));
        }
        let reply = inbound
            .reply(completion.text.clone())
            .with_metadata("role", serde_json::json!("assistant"));
        self.conversations.append(agent_id, [inbound, reply]);

        Ok(completion.text)
    }

    /// Deliver one message, generating at most one reply.
    ///
    /// Step one delivers `message`: an AI receiver gets exactly one generated
    /// reply and the inbound message plus reply are appended to its queue;
    /// a human or bot receiver is forwarded and appended. Step two delivers
    /// the synthesized reply to the original sender without generating again.
    /// A sender unknown to the directory is treated as an external user channel
    /// and the reply's spend is tracked against that user.
    ///
    /// Returns the synthesized reply, if one was generated.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AgentNotFound` if the receiver is unknown and
    /// `RouterError::RoutingFailed` wrapping any lower-layer failure.
    pub async fn handle_message_routing(
        &self,
        message: ConversationMessage,
    ) -> Result<Option<ConversationMessage>, RouterError> {
        tracing::info!(
            from = %message.sender_id,
            to = %message.receiver_id,
            message_type = ?message.message_type,
            priority = ?message.priority,
            "Routing agent message"
        );

        let receiver = match self.directory.get_agent(&message.receiver_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => return Err(RouterError::AgentNotFound(message.receiver_id.clone())),
            Err(e) => return Err(routing_failed(&message, e.into())),
        };

        if !receiver.is_ai() {
            self.deliver(message);
            return Ok(None);
        }

        let context = MessageContext {
            task_id: message.task_id().map(String::from),
            previous_messages: self
                .conversations
                .history(&receiver.id, ROUTING_CONTEXT_MESSAGES)
                .iter()
                .map(PreviousMessage::from)
                .collect(),
            sender_id: Some(message.sender_id.clone()),
        };
        let user_id = self
            .billable_user(&message.sender_id)
            .await
            .map_err(|e| routing_failed(&message, e))?;
        let completion = self
            .generate_reply(&receiver.id, &message.content, context, user_id.as_deref())
            .await
            .map_err(|e| routing_failed(&message, e))?;

        let reply = message.reply(completion.text);
        self.conversations
            .append(&receiver.id, [message, reply.clone()]);

        self.deliver(reply.clone());
        Ok(Some(reply))
    }

    /// Render the introduction template for an agent.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AgentNotFound` if the agent is unknown.
    pub async fn generate_agent_introduction(
        &self,
        agent_id: &str,
        context: &IntroductionContext,
    ) -> Result<String, RouterError> {
        render_introduction(self.directory.as_ref(), &self.templates, agent_id, context).await
    }

    /// Ask `target_id` to collaborate, seeding its context with the request
    /// as the requester's own words.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AgentNotFound` if the target is unknown, a
    /// template error, or `RouterError::AiGenerationFailed`.
    pub async fn request_agent_collaboration(
        &self,
        requester_id: &str,
        target_id: &str,
        task_description: &str,
        required_capability: &str,
        task_details: &str,
    ) -> Result<String, RouterError> {
        let target = self
            .directory
            .get_agent(target_id)
            .await?
            .ok_or_else(|| RouterError::AgentNotFound(target_id.to_string()))?;

        let bindings = HashMap::from([
            ("targetAgent".to_string(), target.name),
            ("taskDescription".to_string(), task_description.to_string()),
            (
                "requiredCapability".to_string(),
                required_capability.to_string(),
            ),
            ("taskDetails".to_string(), task_details.to_string()),
        ]);
        let request = self
            .templates
            .render(AGENT_COLLABORATION_REQUEST, &bindings)?;

        let context = MessageContext {
            task_id: None,
            previous_messages: vec![PreviousMessage::new(requester_id, request.clone())],
            sender_id: Some(requester_id.to_string()),
        };
        self.send_ai_message(target_id, &request, context).await
    }

    /// Send a rendered status update to an AI agent.
    ///
    /// # Errors
    ///
    /// Returns a template error or `RouterError::AiGenerationFailed`.
    pub async fn provide_status_update(
        &self,
        agent_id: &str,
        task_name: &str,
        progress: &str,
        status: &str,
        next_steps: &str,
    ) -> Result<String, RouterError> {
        let bindings = HashMap::from([
            ("taskName".to_string(), task_name.to_string()),
            ("progressDescription".to_string(), progress.to_string()),
            ("currentStatus".to_string(), status.to_string()),
            ("nextSteps".to_string(), next_steps.to_string()),
        ]);
        let update = self.templates.render(AGENT_STATUS_UPDATE, &bindings)?;
        self.send_ai_message(agent_id, &update, MessageContext::default())
            .await
    }

    /// Analyze a task and store the result in its metadata under `aiAnalysis`.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::TaskNotFound`, a directory error, or
    /// `RouterError::AiGenerationFailed`. A response that does not follow the
    /// requested format is not an error.
    pub async fn analyze_task_with_ai(
        &self,
        task_id: &str,
    ) -> Result<TaskAnalysisOutcome, RouterError> {
        let task = self
            .directory
            .get_task(task_id)
            .await?
            .ok_or_else(|| RouterError::TaskNotFound(task_id.to_string()))?;

        let completion = self
            .ai
            .analyze_task(&task.title, &task.description)
            .await
            .map_err(|e| ai_failed(task_id, e))?;
        self.track(
            RequestType::TaskAnalysis,
            &completion,
            None,
            Some(task_id),
            None,
        );

        let analysis = parse_task_analysis(&completion.text);
        let patch = TaskPatch::default()
            .with_metadata(
                "aiAnalysis",
                serde_json::json!({
                    "summary": analysis.summary,
                    "requirements": analysis.requirements,
                    "complexity": analysis.complexity,
                    "skills": analysis.skills,
                    "challenges": analysis.challenges,
                    "approach": analysis.approach,
                }),
            )
            .with_metadata(
                "aiAnalysisTimestamp",
                serde_json::json!(Utc::now().to_rfc3339()),
            );
        self.directory
            .update_task(task_id, patch)
            .await?
            .ok_or_else(|| RouterError::TaskNotFound(task_id.to_string()))?;

        tracing::info!(task_id, complexity = %analysis.complexity, "Task analyzed");
        Ok(TaskAnalysisOutcome {
            task_id: task_id.to_string(),
            analysis,
            raw_response: completion.text,
        })
    }

    /// Recommend an active agent for a task.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::TaskNotFound`, a directory error, or
    /// `RouterError::AiGenerationFailed`.
    pub async fn suggest_agent_for_task(
        &self,
        task_id: &str,
    ) -> Result<AssignmentSuggestion, RouterError> {
        let task = self
            .directory
            .get_task(task_id)
            .await?
            .ok_or_else(|| RouterError::TaskNotFound(task_id.to_string()))?;

        let candidates: Vec<CandidateAgent> = self
            .directory
            .get_agents_by_status(AgentStatus::Active)
            .await?
            .iter()
            .map(CandidateAgent::from)
            .collect();

        let completion = self
            .ai
            .suggest_assignment(&task.description, &candidates)
            .await
            .map_err(|e| ai_failed(task_id, e))?;
        self.track(
            RequestType::AgentSuggestion,
            &completion,
            None,
            Some(task_id),
            None,
        );

        let recommendation = parse_recommendation(&completion.text);
        tracing::info!(
            task_id,
            candidates = candidates.len(),
            agent_id = %recommendation.agent_id,
            "Agent suggested"
        );
        Ok(AssignmentSuggestion {
            task_id: task_id.to_string(),
            recommendation,
            raw_response: completion.text,
            timestamp: Utc::now(),
        })
    }

    /// Plain completion, tracked as chat spend for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RouterError::AiGenerationFailed`.
    pub async fn chat(
        &self,
        request: CompletionRequest,
        user_id: Option<&str>,
    ) -> Result<Completion, RouterError> {
        let completion = self
            .ai
            .complete(request)
            .await
            .map_err(|e| ai_failed("chat", e))?;
        self.track(RequestType::Chat, &completion, None, None, user_id);
        Ok(completion)
    }

    /// The last `limit` messages queued for an agent (default 50), oldest first.
    #[must_use]
    pub fn history(&self, agent_id: &str, limit: Option<usize>) -> Vec<ConversationMessage> {
        self.conversations
            .history(agent_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
    }

    pub fn clear_history(&self, agent_id: &str) {
        if self.conversations.clear(agent_id) {
            tracing::info!(agent_id, "Agent message queue cleared");
        }
    }

    /// Append a message to an agent's queue without delivering it.
    pub fn queue(&self, agent_id: &str, message: ConversationMessage) {
        self.conversations.queue(agent_id, message);
    }

    /// Probe the generative backend.
    pub async fn health(&self) -> bool {
        self.ai.health_check().await
    }

    #[must_use]
    pub fn stats(&self) -> RouterStats {
        let (agents_with_history, total_messages_queued) = self.conversations.counts();
        RouterStats {
            agents_with_history,
            total_messages_queued,
            usage: self.ai.usage_stats(),
        }
    }

    /// The sender as a budget user, unless it is a directory agent.
    async fn billable_user(&self, sender_id: &str) -> Result<Option<String>, RouterError> {
        Ok(match self.directory.get_agent(sender_id).await? {
            Some(_) => None,
            None => Some(sender_id.to_string()),
        })
    }

    /// One agent-reply generation: backend call, cost tracking and event.
    async fn generate_reply(
        &self,
        agent_id: &str,
        content: &str,
        context: MessageContext,
        user_id: Option<&str>,
    ) -> Result<Completion, RouterError> {
        let message = AgentMessage {
            agent_id: agent_id.to_string(),
            content: content.to_string(),
            task_id: context.task_id,
            previous_messages: context.previous_messages,
        };
        let completion = self.ai.agent_reply(&message).await.map_err(|e| {
            tracing::error!(agent_id, error = %e, "AI message processing failed");
            ai_failed(agent_id, e)
        })?;

        self.track(
            RequestType::AgentCommunication,
            &completion,
            Some(agent_id),
            message.task_id.as_deref(),
            user_id,
        );
        self.notifier.notify(RouterEvent::AiReplyGenerated {
            agent_id: agent_id.to_string(),
            content: completion.text.clone(),
            timestamp: Utc::now(),
        });
        Ok(completion)
    }

    /// Forward to the receiver's channel and append to its queue.
    fn deliver(&self, message: ConversationMessage) {
        let agent_id = message.receiver_id.clone();
        tracing::info!(
            agent_id = %agent_id,
            message_id = %message.id,
            message_type = ?message.message_type,
            "Message sent to agent"
        );
        self.notifier.notify(RouterEvent::MessageDelivered {
            agent_id: agent_id.clone(),
            message: message.clone(),
        });
        self.conversations.queue(&agent_id, message);
    }

    fn track(
        &self,
        request_type: RequestType,
        completion: &Completion,
        agent_id: Option<&str>,
        task_id: Option<&str>,
        user_id: Option<&str>,
    ) {
        let mut event = NewCostEvent::new(
            request_type,
            completion.model.clone(),
            completion.usage,
            completion.cost,
        );
        event.agent_id = agent_id.map(String::from);
        event.task_id = task_id.map(String::from);
        event.user_id = user_id.map(String::from);
        self.costs.track(event);
    }
}

/// Render an agent's introduction from the directory alone. No backend call is made.
///
/// # Errors
///
/// Returns `RouterError::AgentNotFound` if the agent is unknown, a directory
/// error, or a template error.
pub async fn render_introduction(
    directory: &dyn Directory,
    templates: &TemplateRegistry,
    agent_id: &str,
    context: &IntroductionContext,
) -> Result<String, RouterError> {
    let agent = directory
        .get_agent(agent_id)
        .await?
        .ok_or_else(|| RouterError::AgentNotFound(agent_id.to_string()))?;

    let mut task_context = match &context.task_id {
        Some(task_id) => format!("working on task {task_id}"),
        None => "available to assist".to_string(),
    };
    if let Some(team) = &context.team_name {
        task_context.push_str(&format!(" with the {team} team"));
    }

    let bindings = HashMap::from([
        ("agentName".to_string(), agent.name),
        ("capabilities".to_string(), agent.capabilities.join(", ")),
        ("taskContext".to_string(), task_context),
    ]);
    Ok(templates.render(AGENT_INTRODUCTION, &bindings)?)
}

fn ai_failed(target: &str, source: AiError) -> RouterError {
    RouterError::AiGenerationFailed {
        target: target.to_string(),
        source,
    }
}

fn routing_failed(message: &ConversationMessage, source: RouterError) -> RouterError {
    tracing::error!(
        from = %message.sender_id,
        to = %message.receiver_id,
        error = %source,
        "Message routing failed"
    );
    RouterError::RoutingFailed {
        sender: message.sender_id.clone(),
        receiver: message.receiver_id.clone(),
        source: Box::new(source),
    }
}
