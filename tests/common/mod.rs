//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use collab_orchestrator::ai::{
    AiClient, AiError, AiProvider, ProviderReply, ProviderRequest, TokenUsage,
};
use collab_orchestrator::config::PlatformConfig;
use collab_orchestrator::cost::CostTracker;
use collab_orchestrator::directory::{Agent, AgentKind, AgentStatus, InMemoryDirectory, Task};
use collab_orchestrator::router::AgentRouter;
use collab_orchestrator::templates::TemplateRegistry;

pub const AI_AGENT: &str = "agent-a";
pub const HUMAN_AGENT: &str = "human-h";
pub const BOT_AGENT: &str = "bot-b";
pub const IDLE_AGENT: &str = "agent-idle";
pub const TASK_ID: &str = "task-1";

/// Provider that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, AiError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_reply(&self, text: &str) {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_error(&self, error: AiError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn complete(&self, request: &ProviderRequest) -> Result<ProviderReply, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("OK".to_string()));
        next.map(|text| ProviderReply {
            text,
            usage: TokenUsage::new(100, 50),
        })
    }
}

/// Directory with one agent of each kind, one inactive AI agent and one task.
pub fn seeded_directory() -> Arc<InMemoryDirectory> {
    let directory = InMemoryDirectory::new();
    directory.insert_agent(
        Agent::new(AI_AGENT, "Code Helper", AgentKind::Ai).with_capabilities(["coding", "review"]),
    );
    directory.insert_agent(Agent::new(HUMAN_AGENT, "Hana", AgentKind::Human));
    directory.insert_agent(Agent::new(BOT_AGENT, "Build Bot", AgentKind::Bot));
    directory.insert_agent(
        Agent::new(IDLE_AGENT, "Sleepy", AgentKind::Ai).with_status(AgentStatus::Inactive),
    );
    directory.insert_task(Task::new(
        TASK_ID,
        "Fix login bug",
        "Users are logged out after every page refresh.",
    ));
    Arc::new(directory)
}

pub struct Harness {
    pub router: AgentRouter,
    pub provider: Arc<ScriptedProvider>,
    pub directory: Arc<InMemoryDirectory>,
    pub costs: Arc<CostTracker>,
}

pub fn harness() -> Harness {
    harness_with_config(&PlatformConfig::default())
}

pub fn harness_with_config(config: &PlatformConfig) -> Harness {
    let provider = ScriptedProvider::new();
    let directory = seeded_directory();
    let costs = Arc::new(CostTracker::new(&config.budget));
    let ai = Arc::new(AiClient::new(provider.clone(), config));
    let router = AgentRouter::new(
        ai,
        Arc::clone(&costs),
        Arc::new(TemplateRegistry::new()),
        directory.clone(),
    );
    Harness {
        router,
        provider,
        directory,
        costs,
    }
}
