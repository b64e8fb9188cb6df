mod common;

use std::time::Duration;

use common::ScriptedTransport;
use llm_connectors::config::{ProviderKind, Settings};
use llm_connectors::{
    AnthropicClient, ChatOptions, EmbeddingOptions, FinishReason, LLMError, LLMProvider, Message,
};
use serde_json::{Value, json};

fn settings(max_retries: u32) -> Settings {
    Settings::builder(ProviderKind::Anthropic, "sk-ant-test")
        .max_retries(max_retries)
        .build()
        .expect("valid settings")
}

fn message_reply(text: &str) -> Value {
    json!({
        "id": "msg_013Zva2CMHLNnXjNJJKqJ2EF",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-5-20250929",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "stop_sequence": null,
        "usage": {"input_tokens": 2095, "output_tokens": 503}
    })
}

#[tokio::test]
async fn system_prompt_and_headers_follow_messages_api() {
    let transport = ScriptedTransport::new();
    transport.push_json(200, message_reply("Bonjour!"));
    let mut client = AnthropicClient::with_transport(settings(0), transport.clone())
        .expect("client")
        .with_system_prompt("Reply in French.")
        .with_beta("prompt-caching-2024-07-31");

    let output = client
        .chat_completion("Hello", ChatOptions::default())
        .await
        .expect("chat should succeed");
    let result = output.into_result().expect("full result");
    assert_eq!(result.answer, "Bonjour!");
    assert_eq!(result.finish_reason, Some(FinishReason::Stop));
    assert_eq!(result.usage.and_then(|usage| usage.total_tokens), Some(2598));
    assert_eq!(result.provider.provider, "anthropic");

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
    assert_eq!(request.header("x-api-key"), Some("sk-ant-test"));
    assert_eq!(request.header("anthropic-version"), Some("2023-06-01"));
    assert_eq!(request.header("anthropic-beta"), Some("prompt-caching-2024-07-31"));
    assert_eq!(request.header("authorization"), None);

    let body = transport.body_of(0);
    assert_eq!(body["system"], json!("Reply in French."));
    assert_eq!(body["messages"], json!([{"role": "user", "content": "Hello"}]));
    assert_eq!(body["max_tokens"], json!(4096));
    assert_eq!(body["model"], json!("claude-sonnet-4-5-20250929"));
}

#[tokio::test]
async fn history_accumulates_and_stop_sequences_are_renamed() {
    let transport = ScriptedTransport::new();
    transport
        .push_json(200, message_reply("1, 2, 3"))
        .push_json(200, message_reply("4, 5, 6"));
    let mut client = AnthropicClient::with_transport(settings(0), transport.clone())
        .expect("client")
        .with_version("2024-10-22");

    client
        .chat_completion("Count to three", ChatOptions::answer_only())
        .await
        .expect("first turn");
    let options = ChatOptions {
        stop_sequences: vec!["7".to_string()],
        temperature: Some(1.0),
        ..ChatOptions::answer_only()
    };
    let output = client
        .chat_completion("Continue", options)
        .await
        .expect("second turn");
    assert_eq!(output.text(), "4, 5, 6");

    let body = transport.body_of(1);
    assert_eq!(body["stop_sequences"], json!(["7"]));
    assert!(body.get("stop").is_none());
    assert_eq!(
        body["messages"],
        json!([
            {"role": "user", "content": "Count to three"},
            {"role": "assistant", "content": "1, 2, 3"},
            {"role": "user", "content": "Continue"}
        ])
    );
    assert_eq!(transport.requests()[1].header("anthropic-version"), Some("2024-10-22"));
    assert_eq!(
        client.conversation().last(),
        Some(&Message::assistant("4, 5, 6"))
    );
}

#[tokio::test]
async fn temperature_above_one_is_rejected() {
    let transport = ScriptedTransport::new();
    let mut client = AnthropicClient::with_transport(settings(0), transport.clone()).expect("client");

    let options = ChatOptions {
        temperature: Some(1.5),
        ..ChatOptions::default()
    };
    let err = client
        .chat_completion("Hello", options)
        .await
        .expect_err("anthropic caps temperature at 1");
    assert!(matches!(err, LLMError::Validation { .. }));

    let mut options = ChatOptions::default();
    options.extra.insert("system".to_string(), json!("override"));
    let err = client
        .chat_completion("Hello", options)
        .await
        .expect_err("system is client managed");
    assert!(matches!(err, LLMError::Validation { .. }));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn embeddings_are_not_supported() {
    let transport = ScriptedTransport::new();
    let client = AnthropicClient::with_transport(settings(0), transport.clone()).expect("client");

    let err = client
        .embeddings("what is your name?", EmbeddingOptions::default())
        .await
        .expect_err("anthropic has no embeddings");
    assert!(matches!(
        err,
        LLMError::NotSupported {
            provider: "anthropic",
            feature: "embeddings"
        }
    ));
    assert_eq!(transport.request_count(), 0);
    assert!(!client.capabilities().supports_embeddings);
}

#[tokio::test(start_paused = true)]
async fn overloaded_errors_honor_retry_after() {
    let transport = ScriptedTransport::new();
    let overloaded = r#"{"type":"error","error":{"type":"rate_limit_error","message":"Number of request tokens has exceeded your per-minute rate limit"}}"#;
    transport
        .push_with_headers(429, &[("retry-after", "7")], overloaded)
        .push_json(200, message_reply("ok"));
    let mut client = AnthropicClient::with_transport(settings(1), transport.clone()).expect("client");

    client
        .chat_completion("Hello", ChatOptions::answer_only())
        .await
        .expect("second attempt succeeds");
    let times = transport.request_times();
    let gap = times[1] - times[0];
    assert!(gap >= Duration::from_secs(7) && gap < Duration::from_millis(7_100));
}

#[tokio::test]
async fn terminal_error_carries_vendor_message() {
    let transport = ScriptedTransport::new();
    transport.push_with_headers(
        401,
        &[],
        r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
    );
    let mut client = AnthropicClient::with_transport(settings(3), transport.clone()).expect("client");

    let err = client
        .chat_completion("Hello", ChatOptions::default())
        .await
        .expect_err("401 is terminal");
    assert_eq!(err.status(), Some(401));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("invalid x-api-key (authentication_error)"));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn empty_content_reply_is_not_replayed_as_assistant_turn() {
    let transport = ScriptedTransport::new();
    let mut empty = message_reply("");
    empty["content"] = json!([]);
    transport
        .push_json(200, empty)
        .push_json(200, message_reply("Here I am."));
    let mut client = AnthropicClient::with_transport(settings(0), transport.clone())
        .expect("client")
        .without_system_prompt();

    let output = client
        .chat_completion("Hello", ChatOptions::answer_only())
        .await
        .expect("empty reply is still a reply");
    assert_eq!(output.text(), "");
    assert_eq!(client.conversation().history(), &[Message::user("Hello")]);

    client
        .chat_completion("Again", ChatOptions::answer_only())
        .await
        .expect("second turn");
    assert_eq!(
        transport.body_of(1)["messages"],
        json!([
            {"role": "user", "content": "Hello"},
            {"role": "user", "content": "Again"}
        ])
    );
    assert_eq!(
        client.conversation().history(),
        &[
            Message::user("Hello"),
            Message::user("Again"),
            Message::assistant("Here I am.")
        ]
    );
}
