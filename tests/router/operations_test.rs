//! Integration tests for the AI-backed router operations.

use collab_orchestrator::ai::{AiError, CompletionRequest, RateWindow};
use collab_orchestrator::config::PlatformConfig;
use collab_orchestrator::cost::RequestType;
use collab_orchestrator::directory::Directory;
use collab_orchestrator::router::{IntroductionContext, MessageContext, RouterError};

use crate::common::{harness, harness_with_config, AI_AGENT, TASK_ID};

const ANALYSIS: &str = "Task Summary: Session cookie is dropped on refresh.
Key Requirements:
- Persist the session cookie
- Cover refresh in tests
Estimated Complexity: high
Required Skills:
- Rust
- HTTP
Potential Challenges:
- Browser caching
Recommended Approach: Trace the cookie through the middleware.";

const RECOMMENDATION: &str = "Recommendation:
- Agent: Code Helper (agent-a)
- Reason: Has coding and review capabilities
- Confidence: high
- Alternative: Hana
- Estimated Success Rate: 90%";

#[tokio::test]
async fn analysis_is_parsed_and_persisted() {
    let h = harness();
    h.provider.push_reply(ANALYSIS);

    let outcome = h.router.analyze_task_with_ai(TASK_ID).await.unwrap();

    assert_eq!(outcome.task_id, TASK_ID);
    assert_eq!(outcome.raw_response, ANALYSIS);
    assert_eq!(
        outcome.analysis.summary,
        "Session cookie is dropped on refresh."
    );
    assert_eq!(outcome.analysis.complexity, "high");
    assert_eq!(outcome.analysis.skills, vec!["Rust", "HTTP"]);
    assert_eq!(outcome.analysis.requirements.len(), 2);

    let request = &h.provider.requests()[0];
    assert!(request.prompt.contains("Task Title: Fix login bug"));
    assert_eq!(request.max_tokens, 800);

    let task = h.directory.get_task(TASK_ID).await.unwrap().unwrap();
    assert_eq!(task.metadata["aiAnalysis"]["complexity"], "high");
    assert_eq!(task.metadata["aiAnalysis"]["challenges"][0], "Browser caching");
    assert!(task.metadata["aiAnalysisTimestamp"].is_string());

    let events = h.costs.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_type, RequestType::TaskAnalysis);
    assert_eq!(events[0].task_id.as_deref(), Some(TASK_ID));
}

#[tokio::test]
async fn malformed_analysis_yields_empty_fields() {
    let h = harness();
    h.provider.push_reply("Honestly, it depends.");

    let outcome = h.router.analyze_task_with_ai(TASK_ID).await.unwrap();

    assert!(outcome.analysis.summary.is_empty());
    assert!(outcome.analysis.complexity.is_empty());
    assert!(outcome.analysis.requirements.is_empty());
    assert_eq!(outcome.raw_response, "Honestly, it depends.");

    let task = h.directory.get_task(TASK_ID).await.unwrap().unwrap();
    assert_eq!(task.metadata["aiAnalysis"]["summary"], "");
}

#[tokio::test]
async fn analysis_of_unknown_task_fails_before_generation() {
    let h = harness();
    let err = h.router.analyze_task_with_ai("task-404").await.unwrap_err();
    assert!(matches!(err, RouterError::TaskNotFound(ref id) if id == "task-404"));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn suggestion_lists_only_active_agents() {
    let h = harness();
    h.provider.push_reply(RECOMMENDATION);

    let suggestion = h.router.suggest_agent_for_task(TASK_ID).await.unwrap();

    assert_eq!(suggestion.recommendation.agent_id, AI_AGENT);
    assert_eq!(suggestion.recommendation.agent_name, "Code Helper");
    assert_eq!(suggestion.recommendation.success_rate, "90%");

    let prompt = &h.provider.requests()[0].prompt;
    assert!(prompt.contains("- Code Helper (agent-a): coding, review - Status: active"));
    assert!(prompt.contains("Hana (human-h)"));
    assert!(!prompt.contains("Sleepy"));

    let events = h.costs.events();
    assert_eq!(events[0].request_type, RequestType::AgentSuggestion);
}

#[tokio::test]
async fn introduction_is_rendered_without_generation() {
    let h = harness();
    let context = IntroductionContext {
        task_id: Some(TASK_ID.to_string()),
        team_name: Some("Platform".to_string()),
    };

    let intro = h
        .router
        .generate_agent_introduction(AI_AGENT, &context)
        .await
        .unwrap();

    assert!(intro.starts_with("Hello! I'm Code Helper"));
    assert!(intro.contains("expertise in coding, review"));
    assert!(intro.contains("working on task task-1 with the Platform team"));
    assert_eq!(h.provider.calls(), 0);

    let idle = h
        .router
        .generate_agent_introduction(AI_AGENT, &IntroductionContext::default())
        .await
        .unwrap();
    assert!(idle.contains("help you with available to assist"));
}

#[tokio::test]
async fn introduction_of_unknown_agent_fails() {
    let h = harness();
    let err = h
        .router
        .generate_agent_introduction("ghost", &IntroductionContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::AgentNotFound(_)));
}

#[tokio::test]
async fn collaboration_request_is_sent_in_requester_voice() {
    let h = harness();
    h.provider.push_reply("Happy to help.");

    let reply = h
        .router
        .request_agent_collaboration(
            "agent-lead",
            AI_AGENT,
            "the login fix",
            "session handling",
            "a cookie regression",
        )
        .await
        .unwrap();

    assert_eq!(reply, "Happy to help.");
    let prompt = &h.provider.requests()[0].prompt;
    assert!(prompt.starts_with("Hi Code Helper, I'm working on the login fix"));
    assert!(prompt.contains("Previous conversation:\nagent-lead: Hi Code Helper"));

    let history = h.router.history(AI_AGENT, None);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_id, "agent-lead");
}

#[tokio::test]
async fn collaboration_with_unknown_target_fails() {
    let h = harness();
    let err = h
        .router
        .request_agent_collaboration("agent-lead", "ghost", "x", "y", "z")
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::AgentNotFound(ref id) if id == "ghost"));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn status_update_is_rendered_and_sent() {
    let h = harness();
    h.provider.push_reply("Thanks for the update.");

    h.router
        .provide_status_update(
            AI_AGENT,
            "Login fix",
            "cookie persisted",
            "in review",
            "merge after approval",
        )
        .await
        .unwrap();

    let prompt = &h.provider.requests()[0].prompt;
    assert!(prompt.starts_with("Status update for Login fix: cookie persisted."));
    assert!(prompt.contains("Next steps: merge after approval."));
}

#[tokio::test]
async fn chat_is_tracked_for_user() {
    let h = harness();
    h.provider.push_reply("42");

    let completion = h
        .router
        .chat(CompletionRequest::new("What is the answer?"), Some("user-u"))
        .await
        .unwrap();

    assert_eq!(completion.text, "42");
    let events = h.costs.events();
    assert_eq!(events[0].request_type, RequestType::Chat);
    assert_eq!(events[0].user_id.as_deref(), Some("user-u"));
}

#[tokio::test]
async fn health_check_is_not_tracked() {
    let h = harness();
    h.provider.push_reply("OK");
    assert!(h.router.health().await);

    h.provider.push_error(AiError::Timeout);
    assert!(!h.router.health().await);

    assert!(h.costs.events().is_empty());
}

#[tokio::test]
async fn rate_limit_rejects_before_backend_call() {
    let mut config = PlatformConfig::default();
    config.rate_limit.requests_per_minute = 2;
    let h = harness_with_config(&config);

    for _ in 0..2 {
        h.router
            .send_ai_message(AI_AGENT, "ping", MessageContext::default())
            .await
            .unwrap();
    }
    let err = tokio_test::assert_err!(
        h.router
            .send_ai_message(AI_AGENT, "ping", MessageContext::default())
            .await
    );

    assert_eq!(
        err.ai_error(),
        Some(&AiError::RateLimited {
            window: RateWindow::Minute,
            limit: 2,
        })
    );
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.router.history(AI_AGENT, None).len(), 4);
    assert_eq!(h.router.stats().usage.total_requests, 2);
}
