use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{LLMError, TransportErrorKind};

use super::{DynHttpTransport, HttpRequest, HttpResponse, HttpTransport};

/// 基于 reqwest 的默认 HttpTransport
///
/// The wrapped [`Client`] owns the connection pool; it is released when the last
/// handle to the transport is dropped.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 使用自定义 reqwest::Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 创建默认配置
    pub fn default_client() -> Result<Self, LLMError> {
        Client::builder().build().map(Self::new).map_err(|err| {
            LLMError::transport(
                TransportErrorKind::InvalidRequest,
                format!("failed to create reqwest client: {err}"),
            )
        })
    }

    fn build_request(&self, mut request: HttpRequest) -> Result<reqwest::RequestBuilder, LLMError> {
        let mut builder = self.client.post(&request.url);

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        for (name, value) in request.headers.drain() {
            let header_name =
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                    LLMError::transport(
                        TransportErrorKind::InvalidRequest,
                        format!("invalid header name: {err}"),
                    )
                })?;
            let header_value = reqwest::header::HeaderValue::from_str(&value).map_err(|err| {
                LLMError::transport(
                    TransportErrorKind::InvalidRequest,
                    format!("invalid header value for {header_name}: {err}"),
                )
            })?;
            builder = builder.header(header_name, header_value);
        }

        Ok(builder.body(request.body))
    }

    fn headers_to_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

/// Maps a reqwest failure onto the transport taxonomy used by the retry policy.
fn classify_reqwest_error(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_builder() {
        TransportErrorKind::InvalidRequest
    } else {
        TransportErrorKind::Network
    }
}

fn map_reqwest_error(err: reqwest::Error) -> LLMError {
    LLMError::transport(classify_reqwest_error(&err), err.to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, LLMError> {
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = Self::headers_to_map(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(map_reqwest_error)?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// 便捷构造线程安全 Transport
pub fn default_dyn_transport() -> Result<DynHttpTransport, LLMError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_is_reported_as_invalid_request() {
        let transport = ReqwestTransport::default_client().expect("transport");
        let request = HttpRequest::post_json("https://example.com", Vec::new()).with_headers(
            HashMap::from([("Authorization".to_string(), "Bearer bad\nkey".to_string())]),
        );

        let err = transport
            .build_request(request)
            .err()
            .expect("header with newline must be rejected");
        match err {
            LLMError::Transport { kind, .. } => {
                assert_eq!(kind, TransportErrorKind::InvalidRequest);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
