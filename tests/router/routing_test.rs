//! Integration tests for message routing and history.

use std::sync::Arc;

use collab_orchestrator::ai::AiError;
use collab_orchestrator::cost::{BudgetPeriod, CostFilter, RequestType};
use collab_orchestrator::router::{
    BroadcastNotifier, ConversationMessage, MessageContext, MessageType, RouterError, RouterEvent,
};
use serde_json::json;

use crate::common::{harness, AI_AGENT, BOT_AGENT, HUMAN_AGENT, TASK_ID};

#[tokio::test]
async fn human_receiver_is_forwarded_without_generation() {
    let h = harness();
    let message = ConversationMessage::new("user-u", HUMAN_AGENT, "Lunch at noon?");

    let reply = h.router.handle_message_routing(message.clone()).await.unwrap();

    assert!(reply.is_none());
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(h.router.history(HUMAN_AGENT, None), vec![message]);
    assert!(h.router.history("user-u", None).is_empty());
    assert!(h.costs.events().is_empty());
}

#[tokio::test]
async fn ai_receiver_gets_exactly_one_reply() {
    let h = harness();
    h.provider.push_reply("Looks good, one nit on error handling.");
    let message = ConversationMessage::new("user-u", AI_AGENT, "Please review PR #42")
        .with_metadata("taskId", json!(TASK_ID));

    let reply = h
        .router
        .handle_message_routing(message.clone())
        .await
        .unwrap()
        .expect("AI receiver should reply");

    assert_eq!(h.provider.calls(), 1);
    assert_eq!(reply.sender_id, AI_AGENT);
    assert_eq!(reply.receiver_id, "user-u");
    assert_eq!(reply.message_type, MessageType::Response);
    assert_eq!(reply.content, "Looks good, one nit on error handling.");
    assert_eq!(reply.metadata["responseTo"], json!(message.id));

    let agent_history = h.router.history(AI_AGENT, None);
    assert_eq!(agent_history.len(), 2);
    assert_eq!(agent_history[0], message);
    assert_eq!(agent_history[1], reply);

    let sender_history = h.router.history("user-u", None);
    assert_eq!(sender_history, vec![reply]);

    let request = &h.provider.requests()[0];
    assert!(request.prompt.starts_with("Please review PR #42"));
    assert!(request.system.contains("task ID: task-1"));
    assert!(request.system.contains(AI_AGENT));
}

#[tokio::test]
async fn ai_reply_is_tracked_as_agent_communication() {
    let h = harness();
    h.provider.push_reply("On it.");
    let message = ConversationMessage::new("user-u", AI_AGENT, "Status?")
        .with_metadata("taskId", json!(TASK_ID));

    h.router.handle_message_routing(message).await.unwrap();

    let events = h.costs.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_type, RequestType::AgentCommunication);
    assert_eq!(events[0].agent_id.as_deref(), Some(AI_AGENT));
    assert_eq!(events[0].task_id.as_deref(), Some(TASK_ID));
    assert_eq!(events[0].model, "gpt-4");
    assert_eq!(events[0].usage.total_tokens, 150);

    let summary = h.costs.summary(&CostFilter::default());
    assert_eq!(summary.total_requests, 1);
}

#[tokio::test]
async fn routing_quotes_the_last_five_history_entries() {
    let h = harness();
    for i in 0..6 {
        h.router.queue(
            AI_AGENT,
            ConversationMessage::new("user-u", AI_AGENT, format!("earlier-{i}")),
        );
    }
    h.provider.push_reply("Noted.");

    h.router
        .handle_message_routing(ConversationMessage::new("user-u", AI_AGENT, "And now?"))
        .await
        .unwrap();

    let prompt = &h.provider.requests()[0].prompt;
    assert!(prompt.contains("Previous conversation:"));
    assert!(!prompt.contains("earlier-0"));
    for i in 1..6 {
        assert!(prompt.contains(&format!("user-u: earlier-{i}")));
    }
    assert_eq!(h.router.history(AI_AGENT, None).len(), 8);
}

#[tokio::test]
async fn unknown_receiver_is_rejected() {
    let h = harness();
    let err = h
        .router
        .handle_message_routing(ConversationMessage::new("user-u", "ghost", "hello?"))
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::AgentNotFound(ref id) if id == "ghost"));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn backend_failure_records_nothing() {
    let h = harness();
    h.provider.push_error(AiError::Backend("HTTP 500: boom".to_string()));

    let err = h
        .router
        .handle_message_routing(ConversationMessage::new("user-u", AI_AGENT, "Ping"))
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::RoutingFailed { .. }));
    assert_eq!(
        err.ai_error(),
        Some(&AiError::Backend("HTTP 500: boom".to_string()))
    );
    assert!(h.router.history(AI_AGENT, None).is_empty());
    assert!(h.router.history("user-u", None).is_empty());
    assert!(h.costs.events().is_empty());
}

#[tokio::test]
async fn routing_emits_reply_then_delivery_events() {
    let h = harness();
    let notifier = BroadcastNotifier::new(16);
    let mut rx = notifier.subscribe();
    let router = h.router.with_notifier(Arc::new(notifier));
    h.provider.push_reply("Hi there");

    router
        .handle_message_routing(ConversationMessage::new("user-u", AI_AGENT, "Hello"))
        .await
        .unwrap();

    match rx.try_recv().unwrap() {
        RouterEvent::AiReplyGenerated {
            agent_id, content, ..
        } => {
            assert_eq!(agent_id, AI_AGENT);
            assert_eq!(content, "Hi there");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    match rx.try_recv().unwrap() {
        RouterEvent::MessageDelivered { agent_id, message } => {
            assert_eq!(agent_id, "user-u");
            assert_eq!(message.content, "Hi there");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn bot_receiver_gets_delivery_event() {
    let h = harness();
    let notifier = BroadcastNotifier::new(16);
    let mut rx = notifier.subscribe();
    let router = h.router.with_notifier(Arc::new(notifier));

    router
        .handle_message_routing(
            ConversationMessage::new(AI_AGENT, BOT_AGENT, "deploy").with_type(MessageType::Action),
        )
        .await
        .unwrap();

    let event = rx.try_recv().unwrap();
    assert_eq!(event.agent_id(), BOT_AGENT);
    assert!(matches!(event, RouterEvent::MessageDelivered { .. }));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn direct_message_records_user_and_assistant_turns() {
    let h = harness();
    h.provider.push_reply("Sure, sending the diff.");

    let text = h
        .router
        .send_ai_message(
            AI_AGENT,
            "Can you share the diff?",
            MessageContext {
                task_id: Some(TASK_ID.to_string()),
                ..MessageContext::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(text, "Sure, sending the diff.");
    let history = h.router.history(AI_AGENT, None);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender_id, "user");
    assert_eq!(history[0].metadata["role"], json!("user"));
    assert_eq!(history[0].task_id(), Some(TASK_ID));
    assert_eq!(history[1].sender_id, AI_AGENT);
    assert_eq!(history[1].metadata["role"], json!("assistant"));
}

#[tokio::test]
async fn history_limit_and_clear() {
    let h = harness();
    for i in 0..60 {
        h.router.queue(
            HUMAN_AGENT,
            ConversationMessage::new("user-u", HUMAN_AGENT, format!("note {i}")),
        );
    }

    let recent = h.router.history(HUMAN_AGENT, None);
    assert_eq!(recent.len(), 50);
    assert_eq!(recent[0].content, "note 10");
    assert_eq!(h.router.history(HUMAN_AGENT, Some(3)).len(), 3);

    let stats = h.router.stats();
    assert_eq!(stats.agents_with_history, 1);
    assert_eq!(stats.total_messages_queued, 60);

    h.router.clear_history(HUMAN_AGENT);
    assert!(h.router.history(HUMAN_AGENT, None).is_empty());
}

#[tokio::test]
async fn external_sender_spend_counts_against_user_budget() {
    let h = harness();
    h.costs
        .set_budget("daily", 5.0, BudgetPeriod::Daily, Some("user-u"));
    h.provider.push_reply("first");
    h.provider.push_reply("second");

    h.router
        .handle_message_routing(ConversationMessage::new("user-u", AI_AGENT, "hi"))
        .await
        .unwrap();
    h.router
        .send_ai_message(
            AI_AGENT,
            "again",
            MessageContext {
                sender_id: Some("user-u".to_string()),
                ..MessageContext::default()
            },
        )
        .await
        .unwrap();

    let events = h.costs.events();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.user_id.as_deref() == Some("user-u")));
    let budget = h.costs.budget_status("daily", Some("user-u")).unwrap();
    assert!((budget.spent - events[0].cost - events[1].cost).abs() < 1e-12);
}

#[tokio::test]
async fn agent_sender_is_not_billed_as_user() {
    let h = harness();
    h.provider.push_reply("ack");

    h.router
        .handle_message_routing(ConversationMessage::new(HUMAN_AGENT, AI_AGENT, "ping"))
        .await
        .unwrap();
    h.router
        .send_ai_message(AI_AGENT, "anonymous", MessageContext::default())
        .await
        .unwrap();

    assert!(h.costs.events().iter().all(|e| e.user_id.is_none()));
}
