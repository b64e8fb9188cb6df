use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::config::{ProviderKind, Settings};
use crate::conversation::Conversation;
use crate::error::LLMError;
use crate::http::{DynHttpTransport, HttpResponse, json_request};
use crate::retry::{Attempt, classify_response};
use crate::types::{ChatOptions, Message, OptionSchema, ProviderMetadata};

/// 各 Provider 共享的执行核心
///
/// Owns the settings, the transport handle, and the conversation log of one client
/// instance. Provider clients only translate payloads; everything that touches the
/// network goes through [`ClientCore::post_json`].
pub(crate) struct ClientCore {
    kind: ProviderKind,
    settings: Settings,
    transport: Option<DynHttpTransport>,
    conversation: Conversation,
    system_prompt: Option<String>,
}

/// Parsed JSON body of a successful call plus the metadata needed for normalization.
#[derive(Debug)]
pub(crate) struct JsonResponse {
    pub(crate) status: u16,
    pub(crate) body: Value,
    pub(crate) request_id: Option<String>,
    pub(crate) endpoint: String,
    pub(crate) attempts: u32,
}

impl JsonResponse {
    /// Error for a 2xx body whose shape the client does not understand.
    pub(crate) fn malformed(&self, provider: &'static str, reason: impl Into<String>) -> LLMError {
        LLMError::Provider {
            provider,
            status: self.status,
            message: reason.into(),
            body: self.body.to_string(),
            attempts: self.attempts,
        }
    }

    pub(crate) fn metadata(&self, provider: &'static str) -> ProviderMetadata {
        ProviderMetadata {
            provider: provider.to_string(),
            endpoint: Some(self.endpoint.clone()),
            request_id: self.request_id.clone(),
            raw: self.body.clone(),
        }
    }
}

impl ClientCore {
    pub(crate) fn new(
        kind: ProviderKind,
        settings: Settings,
        transport: DynHttpTransport,
        system_prompt: Option<String>,
    ) -> Result<Self, LLMError> {
        if settings.provider() != kind {
            return Err(LLMError::configuration(
                "provider",
                format!(
                    "settings for {} cannot configure a {} client",
                    settings.provider().name(),
                    kind.name()
                ),
            ));
        }
        Ok(Self {
            kind,
            settings,
            transport: Some(transport),
            conversation: Conversation::new(),
            system_prompt,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub(crate) fn reset_conversation(&mut self) {
        self.conversation.reset();
    }

    pub(crate) fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub(crate) fn set_system_prompt(&mut self, prompt: Option<String>) {
        self.system_prompt = prompt;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.transport.is_none()
    }

    /// 释放 transport 句柄 重复调用无副作用
    pub(crate) fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!(provider = self.name(), "client closed");
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<DynHttpTransport, LLMError> {
        self.transport.clone().ok_or(LLMError::ClientClosed {
            provider: self.name(),
        })
    }

    /// Validates a chat call and appends the user turn.
    ///
    /// Nothing is appended when validation fails.
    pub(crate) fn begin_turn(
        &mut self,
        query: &str,
        options: &ChatOptions,
        schema: &OptionSchema,
    ) -> Result<(), LLMError> {
        self.ensure_open()?;
        if query.trim().is_empty() {
            return Err(LLMError::validation("query must not be empty"));
        }
        options.validate(schema)?;
        self.conversation.append(Message::user(query));
        debug!(
            provider = self.name(),
            history_len = self.conversation.len(),
            "user turn appended"
        );
        Ok(())
    }

    /// 记录 assistant 回答；空白回答不进入历史，否则后续请求会带上空 content
    pub(crate) fn record_answer(&mut self, answer: &str) {
        if answer.trim().is_empty() {
            debug!(provider = self.name(), "blank answer not recorded");
            return;
        }
        self.conversation.append(Message::assistant(answer));
    }

    /// POSTs `body` to `path` under the retry policy and parses the JSON reply.
    ///
    /// `extract_message` pulls a readable message out of vendor error bodies.
    pub(crate) async fn post_json(
        &self,
        path: &str,
        headers: HashMap<String, String>,
        body: &Value,
        extract_message: fn(&str) -> Option<String>,
    ) -> Result<JsonResponse, LLMError> {
        let transport = self.ensure_open()?;
        let endpoint = self.settings.endpoint(path)?;
        let request = json_request(endpoint.clone(), headers, body, self.settings.timeout())?;
        let provider = self.name();

        debug!(provider, endpoint = %endpoint, "sending request");
        let mut attempts = 0u32;
        let response = self
            .settings
            .retry()
            .execute(|| {
                attempts += 1;
                let transport = transport.clone();
                let request = request.clone();
                async move {
                    let result = transport.send(request).await;
                    classify_response(provider, result, extract_message)
                        .and_then(|response| parse_json(provider, response))
                }
            })
            .await?;

        let (status, request_id, body) = response;
        Ok(JsonResponse {
            status,
            body,
            request_id,
            endpoint,
            attempts,
        })
    }
}

fn parse_json(
    provider: &'static str,
    response: HttpResponse,
) -> Attempt<(u16, Option<String>, Value)> {
    let request_id = response
        .header("x-request-id")
        .or_else(|| response.header("request-id"))
        .map(str::to_string);
    let status = response.status;
    match serde_json::from_slice::<Value>(&response.body) {
        Ok(body) => Attempt::Success((status, request_id, body)),
        Err(err) => Attempt::Terminal(LLMError::Provider {
            provider,
            status,
            message: format!("failed to parse {provider} response: {err}"),
            body: String::from_utf8_lossy(&response.body).into_owned(),
            attempts: 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::http::{HttpRequest, HttpTransport};

    const SCHEMA: OptionSchema = OptionSchema {
        provider: "openai",
        max_temperature: 2.0,
        temperature_max_inclusive: true,
        reserved: &["model", "messages"],
    };

    /// Replays canned responses in order.
    struct CannedTransport {
        responses: Mutex<Vec<HttpResponse>>,
    }

    #[async_trait]
    impl HttpTransport for CannedTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, LLMError> {
            let mut responses = self.responses.lock().expect("lock");
            Ok(responses.remove(0))
        }
    }

    fn core_with(responses: Vec<HttpResponse>) -> ClientCore {
        let settings = Settings::builder(ProviderKind::OpenAi, "key")
            .max_retries(0)
            .build()
            .expect("settings");
        let transport = Arc::new(CannedTransport {
            responses: Mutex::new(responses),
        });
        ClientCore::new(ProviderKind::OpenAi, settings, transport, None).expect("core")
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: HashMap::from([("x-request-id".to_string(), "req_1".to_string())]),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn new_rejects_settings_for_another_provider() {
        let settings = Settings::builder(ProviderKind::Anthropic, "key")
            .build()
            .expect("settings");
        let transport = Arc::new(CannedTransport {
            responses: Mutex::new(Vec::new()),
        });
        let err = ClientCore::new(ProviderKind::OpenAi, settings, transport, None)
            .err()
            .expect("mismatched provider");
        assert!(matches!(err, LLMError::Configuration { ref field, .. } if field == "provider"));
    }

    #[test]
    fn begin_turn_leaves_history_untouched_on_validation_error() {
        let mut core = core_with(Vec::new());
        let err = core
            .begin_turn("   ", &ChatOptions::default(), &SCHEMA)
            .expect_err("blank query");
        assert!(matches!(err, LLMError::Validation { .. }));

        let options = ChatOptions {
            temperature: Some(3.0),
            ..ChatOptions::default()
        };
        assert!(core.begin_turn("hi", &options, &SCHEMA).is_err());
        assert!(core.conversation().is_empty());

        core.begin_turn("hi", &ChatOptions::default(), &SCHEMA)
            .expect("valid turn");
        assert_eq!(core.conversation().history(), &[Message::user("hi")]);
    }

    #[test]
    fn blank_answers_are_not_recorded() {
        let mut core = core_with(Vec::new());
        core.begin_turn("hi", &ChatOptions::default(), &SCHEMA)
            .expect("valid turn");
        core.record_answer("");
        core.record_answer(" \n");
        assert_eq!(core.conversation().history(), &[Message::user("hi")]);

        core.record_answer("hello");
        assert_eq!(
            core.conversation().history(),
            &[Message::user("hi"), Message::assistant("hello")]
        );
    }

    #[tokio::test]
    async fn post_json_parses_body_and_request_id() {
        let core = core_with(vec![ok(r#"{"answer": 42}"#)]);
        let response = core
            .post_json("chat/completions", HashMap::new(), &json!({}), |_| None)
            .await
            .expect("response");
        assert_eq!(response.body, json!({"answer": 42}));
        assert_eq!(response.request_id.as_deref(), Some("req_1"));
        assert_eq!(response.endpoint, "https://api.openai.com/v1/chat/completions");
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test]
    async fn post_json_reports_unparseable_success_body() {
        let core = core_with(vec![ok("<html>gateway</html>")]);
        let err = core
            .post_json("chat/completions", HashMap::new(), &json!({}), |_| None)
            .await
            .expect_err("invalid json");
        match err {
            LLMError::Provider {
                status,
                message,
                body,
                ..
            } => {
                assert_eq!(status, 200);
                assert!(message.contains("failed to parse openai response"));
                assert_eq!(body, "<html>gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_requests() {
        let mut core = core_with(Vec::new());
        core.close();
        core.close();
        assert!(core.is_closed());

        let err = core
            .post_json("chat/completions", HashMap::new(), &json!({}), |_| None)
            .await
            .expect_err("closed");
        assert!(matches!(err, LLMError::ClientClosed { provider: "openai" }));
    }
}
