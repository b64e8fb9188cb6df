mod common;

use common::ScriptedTransport;
use llm_connectors::config::{ProviderKind, Settings};
use llm_connectors::{
    ChatOptions, EmbeddingOptions, LLMError, LLMProvider, MENTOR_SYSTEM_PROMPT, PerplexityClient,
};
use serde_json::json;

fn settings() -> Settings {
    Settings::builder(ProviderKind::Perplexity, "pplx-test")
        .max_retries(0)
        .build()
        .expect("valid settings")
}

#[tokio::test]
async fn citations_are_returned_with_the_answer() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({
            "id": "9f3a2b1c",
            "model": "sonar",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "Rayleigh scattering makes the sky blue [1]."}
            }],
            "citations": ["https://en.wikipedia.org/wiki/Rayleigh_scattering"],
            "usage": {"prompt_tokens": 10, "completion_tokens": 12, "total_tokens": 22}
        }),
    );
    let mut client = PerplexityClient::with_transport(settings(), transport.clone()).expect("client");

    let result = client
        .chat_completion("Why is the sky blue?", ChatOptions::default())
        .await
        .expect("chat should succeed")
        .into_result()
        .expect("full result");
    assert_eq!(result.answer, "Rayleigh scattering makes the sky blue [1].");
    assert_eq!(
        result.citations,
        vec!["https://en.wikipedia.org/wiki/Rayleigh_scattering".to_string()]
    );

    let request = &transport.requests()[0];
    assert_eq!(request.url, "https://api.perplexity.ai/chat/completions");
    assert_eq!(request.header("Authorization"), Some("Bearer pplx-test"));

    let body = transport.body_of(0);
    assert_eq!(body["model"], json!("sonar"));
    assert_eq!(
        body["messages"],
        json!([
            {"role": "system", "content": MENTOR_SYSTEM_PROMPT},
            {"role": "user", "content": "Why is the sky blue?"}
        ])
    );
    assert!(body.get("temperature").is_none());
}

#[tokio::test]
async fn max_tokens_uses_the_legacy_field_name() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        200,
        json!({
            "model": "sonar-pro",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "short"}, "finish_reason": "length"}],
            "search_results": [{"title": "Docs", "url": "https://docs.perplexity.ai"}]
        }),
    );
    let mut client = PerplexityClient::with_transport(settings(), transport.clone())
        .expect("client")
        .with_default_model("sonar-pro");

    let options = ChatOptions {
        max_tokens: Some(16),
        stop_sequences: vec!["###".to_string()],
        ..ChatOptions::default()
    };
    let result = client
        .chat_completion("Summarize", options)
        .await
        .expect("chat")
        .into_result()
        .expect("full result");
    assert_eq!(result.citations, vec!["https://docs.perplexity.ai".to_string()]);

    let body = transport.body_of(0);
    assert_eq!(body["model"], json!("sonar-pro"));
    assert_eq!(body["max_tokens"], json!(16));
    assert!(body.get("max_completion_tokens").is_none());
    assert_eq!(body["stop"], json!(["###"]));
}

#[tokio::test]
async fn temperature_two_is_outside_the_exclusive_range() {
    let transport = ScriptedTransport::new();
    let mut client = PerplexityClient::with_transport(settings(), transport.clone()).expect("client");

    let options = ChatOptions {
        temperature: Some(2.0),
        ..ChatOptions::default()
    };
    let err = client
        .chat_completion("Hello", options)
        .await
        .expect_err("perplexity requires temperature < 2");
    assert!(matches!(err, LLMError::Validation { .. }));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn detail_errors_and_missing_embeddings() {
    let transport = ScriptedTransport::new();
    transport.push_json(401, json!({"detail": "Invalid API key"}));
    let mut client = PerplexityClient::with_transport(settings(), transport.clone()).expect("client");

    let err = client
        .chat_completion("Hello", ChatOptions::default())
        .await
        .expect_err("unauthorized");
    match err {
        LLMError::Provider { status, message, .. } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("expected provider error, got {other:?}"),
    }

    let err = client
        .embeddings("text", EmbeddingOptions::default())
        .await
        .expect_err("no embeddings");
    assert!(matches!(err, LLMError::NotSupported { provider: "perplexity", .. }));

    client.close();
    let err = client
        .embeddings("text", EmbeddingOptions::default())
        .await
        .expect_err("still unsupported after close");
    assert!(matches!(err, LLMError::NotSupported { .. }));
    assert_eq!(transport.request_count(), 1);
}
