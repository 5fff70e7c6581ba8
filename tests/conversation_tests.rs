//! Integration tests for the conversation state machine

mod common;

use common::{FakeService, drain, store_with, transport};
use parley::events::{self, EventReceiver};
use parley::{
    ChatError, ChatMessage, Conversation, ConfigStore, RequestState, Role, SendOutcome, UiEvent,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

fn conversation(
    service: FakeService,
    store: ConfigStore,
) -> (Conversation<FakeService>, Arc<FakeService>, EventReceiver) {
    let service = Arc::new(service);
    let (tx, rx) = events::channel();
    (Conversation::new(Arc::clone(&service), store, tx), service, rx)
}

fn streaming(mode: &str) -> ConfigStore {
    store_with(json!({"streaming": {"enabled": true, "mode": mode, "smoothSpeed": 50}}))
}

fn updated(index: usize, content: &str) -> UiEvent {
    UiEvent::MessageUpdated {
        index,
        content: content.to_string(),
    }
}

mod single_shot {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_reply_appended_after_user_message() {
        let (chat, _, mut rx) = conversation(
            FakeService::new().with_reply(Ok("hi there".into())),
            ConfigStore::default(),
        );

        assert_eq!(chat.send("hello").await, SendOutcome::Completed);
        assert_eq!(
            chat.messages(),
            vec![ChatMessage::user("hello"), ChatMessage::assistant("hi there")]
        );
        assert_eq!(chat.state(), RequestState::Idle);
        assert_eq!(
            drain(&mut rx),
            vec![UiEvent::Render { busy: true }, UiEvent::Render { busy: false }]
        );
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let (chat, _, _rx) = conversation(
            FakeService::new().with_reply(Ok("ok".into())),
            ConfigStore::default(),
        );
        chat.send("  hello \n").await;
        assert_eq!(chat.messages()[0].content, "hello");
    }

    #[tokio::test]
    async fn test_http_failure_becomes_error_message() {
        let (chat, _, _rx) = conversation(
            FakeService::new().with_reply(Err(ChatError::Http {
                status: 500,
                reason: "Internal Server Error".into(),
            })),
            ConfigStore::default(),
        );

        assert_eq!(chat.send("hello").await, SendOutcome::Completed);
        assert_eq!(
            chat.messages(),
            vec![
                ChatMessage::user("hello"),
                ChatMessage::assistant("Error: HTTP 500: Internal Server Error"),
            ]
        );
        assert!(!chat.is_busy());
    }

    #[tokio::test]
    async fn test_alternating_log_after_several_exchanges() {
        let (chat, service, _rx) = conversation(
            FakeService::new().with_reply(Ok("pong".into())),
            ConfigStore::default(),
        );

        for i in 0..3 {
            chat.send(&format!("ping {i}")).await;
        }

        let messages = chat.messages();
        assert_eq!(messages.len(), 6);
        for (i, message) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected);
        }
        assert_eq!(service.chat_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}

mod streaming {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_raw_fragments_append_in_order() {
        let (chat, _, mut rx) = conversation(
            FakeService::new().with_fragments(vec![Ok("He".into()), Ok("llo".into())]),
            streaming("raw"),
        );

        chat.send("hi").await;

        assert_eq!(
            chat.messages(),
            vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello")]
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                UiEvent::Render { busy: true },
                UiEvent::Render { busy: true },
                updated(1, "He"),
                updated(1, "Hello"),
                UiEvent::Render { busy: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_without_fragments_leaves_empty_reply() {
        let (chat, _, _rx) = conversation(FakeService::new(), streaming("raw"));
        chat.send("hi").await;
        assert_eq!(chat.messages()[1], ChatMessage::assistant(""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_smooth_mode_paces_three_char_slices() {
        let (chat, _, mut rx) = conversation(
            FakeService::new().with_fragments(vec![Ok("Hello".into())]),
            streaming("smooth"),
        );

        let started = tokio::time::Instant::now();
        chat.send("hi").await;
        let elapsed = started.elapsed();

        assert_eq!(chat.messages()[1].content, "Hello");
        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, UiEvent::MessageUpdated { .. }))
            .collect();
        assert_eq!(updates, vec![updated(1, "Hel"), updated(1, "Hello")]);
        assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_swap_during_send_keeps_raw_delivery() {
        let gate = Arc::new(Notify::new());
        let store = streaming("raw");
        let (chat, _, mut rx) = conversation(
            FakeService::new()
                .with_fragments(vec![Ok("Hello world".into()), Ok("!".into())])
                .with_gate(Arc::clone(&gate)),
            store.clone(),
        );

        let started = tokio::time::Instant::now();
        let (outcome, ()) = tokio::join!(chat.send("hi"), async {
            store.replace(
                parley::Config::from_value(
                    &json!({"streaming": {"enabled": true, "mode": "smooth", "smoothSpeed": 50}}),
                )
                .unwrap(),
            );
            gate.notify_one();
        });

        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(started.elapsed(), Duration::ZERO);
        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, UiEvent::MessageUpdated { .. }))
            .collect();
        assert_eq!(updates, vec![updated(1, "Hello world"), updated(1, "Hello world!")]);
    }

    #[tokio::test]
    async fn test_disabling_streaming_during_send_keeps_stream_path() {
        let gate = Arc::new(Notify::new());
        let store = streaming("raw");
        let (chat, service, _rx) = conversation(
            FakeService::new()
                .with_reply(Ok("single".into()))
                .with_fragments(vec![Ok("streamed".into())])
                .with_gate(Arc::clone(&gate)),
            store.clone(),
        );

        tokio::join!(chat.send("hi"), async {
            store.replace(parley::Config::default());
            gate.notify_one();
        });

        assert_eq!(chat.messages()[1], ChatMessage::assistant("streamed"));
        assert_eq!(service.chat_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!store.snapshot().streaming_enabled());
    }

    #[tokio::test]
    async fn test_open_failure_replaces_placeholder() {
        let (chat, _, mut rx) = conversation(
            FakeService::new().with_stream_error(transport("connection refused")),
            streaming("raw"),
        );

        chat.send("hi").await;

        assert_eq!(
            chat.messages(),
            vec![
                ChatMessage::user("hi"),
                ChatMessage::assistant("Error: connection refused"),
            ]
        );
        assert!(drain(&mut rx).contains(&updated(1, "Error: connection refused")));
        assert_eq!(chat.state(), RequestState::Idle);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_discards_partial_text() {
        let (chat, _, _rx) = conversation(
            FakeService::new()
                .with_fragments(vec![Ok("Hel".into()), Err(transport("connection reset"))]),
            streaming("raw"),
        );

        chat.send("hi").await;

        assert_eq!(chat.len(), 2);
        assert_eq!(chat.messages()[1].content, "Error: connection reset");
    }

    #[tokio::test]
    async fn test_http_status_on_stream_open() {
        let (chat, _, _rx) = conversation(
            FakeService::new().with_stream_error(ChatError::Http {
                status: 404,
                reason: "Not Found".into(),
            }),
            streaming("smooth"),
        );

        chat.send("hi").await;
        assert_eq!(chat.messages()[1].content, "Error: HTTP 404: Not Found");
    }
}

mod guard {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_empty_input_has_no_effect() {
        let (chat, service, mut rx) = conversation(FakeService::new(), ConfigStore::default());

        assert_eq!(chat.send("   ").await, SendOutcome::IgnoredEmpty);
        assert_eq!(chat.send("").await, SendOutcome::IgnoredEmpty);
        assert!(chat.is_empty());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(service.chat_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_while_busy_is_ignored() {
        let gate = Arc::new(Notify::new());
        let (chat, service, _rx) = conversation(
            FakeService::new()
                .with_reply(Ok("first reply".into()))
                .with_gate(Arc::clone(&gate)),
            ConfigStore::default(),
        );
        let other = chat.clone();

        let (first, second) = tokio::join!(chat.send("one"), async {
            assert!(other.is_busy());
            let outcome = other.send("two").await;
            gate.notify_one();
            outcome
        });

        assert_eq!(first, SendOutcome::Completed);
        assert_eq!(second, SendOutcome::IgnoredBusy);
        assert_eq!(
            chat.messages(),
            vec![ChatMessage::user("one"), ChatMessage::assistant("first reply")]
        );
        assert_eq!(service.chat_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_released_after_failure() {
        let (chat, _, _rx) = conversation(
            FakeService::new().with_stream_error(transport("down")),
            streaming("raw"),
        );

        chat.send("first").await;
        assert_eq!(chat.send("second").await, SendOutcome::Completed);
        assert_eq!(chat.len(), 4);
    }

    #[tokio::test]
    async fn test_next_send_follows_replaced_config() {
        let store = ConfigStore::default();
        let (chat, _, _rx) = conversation(
            FakeService::new()
                .with_reply(Ok("single".into()))
                .with_fragments(vec![Ok("streamed".into())]),
            store.clone(),
        );

        chat.send("a").await;
        store.replace(parley::Config::from_value(&json!({"streaming": {"enabled": true}})).unwrap());
        chat.send("b").await;

        let contents: Vec<_> = chat.messages().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, vec!["a", "single", "b", "streamed"]);
    }
}
