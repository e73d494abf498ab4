//! Purpose: Issue NSQ admin HTTP API requests and decode v1-negotiated JSON responses.
//! Exports: `ApiClient`, `api_request_negotiate_v1`, `api_request_negotiate_v1_into`.
//! Role: Blocking request/decode layer over a deadline-enforcing `ureq` agent.
//! Invariants: Every request carries `Accept: application/vnd.nsq; version=1.0`.
//! Invariants: Any status other than 200 fails with the status line and raw body text.
//! Invariants: The response body is read fully and dropped before decoding.
//! Invariants: Nothing is retried; the first failure is returned to the caller.
#![allow(clippy::result_large_err)]

use crate::core::envelope::{
    ACCEPT_V1, CONTENT_TYPE_HEADER, ResponseFormat, decode_body, decode_body_into,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::transport::{TransportConfig, deadline_agent};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

pub type ApiResult<T> = Result<T, Error>;

const DEFAULT_USER_AGENT: &str = concat!("nsq-http-api/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    agent: ureq::Agent,
    config: TransportConfig,
    user_agent: String,
}

struct RawResponse {
    format: ResponseFormat,
    body: Vec<u8>,
}

/// One-shot request with the default 2 second transport.
///
/// Builds a fresh agent per call, so concurrent callers share nothing.
pub fn api_request_negotiate_v1<T>(
    method: &str,
    endpoint: &str,
    body: Option<&mut dyn Read>,
) -> ApiResult<T>
where
    T: DeserializeOwned + Default,
{
    ApiClient::new(TransportConfig::default()).request_v1(method, endpoint, body)
}

/// Like [`api_request_negotiate_v1`], decoding over a caller-owned value.
pub fn api_request_negotiate_v1_into<T>(
    target: &mut T,
    method: &str,
    endpoint: &str,
    body: Option<&mut dyn Read>,
) -> ApiResult<()>
where
    T: DeserializeOwned,
{
    ApiClient::new(TransportConfig::default()).request_v1_into(target, method, endpoint, body)
}

impl ApiClient {
    pub fn new(config: TransportConfig) -> Self {
        let agent = deadline_agent(&config);
        Self {
            inner: Arc::new(ApiClientInner {
                agent,
                config,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            }),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.user_agent = user_agent.into();
        } else {
            self.inner = Arc::new(ApiClientInner {
                agent: self.inner.agent.clone(),
                config: self.inner.config.clone(),
                user_agent: user_agent.into(),
            });
        }
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    pub fn request_v1<T>(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&mut dyn Read>,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.exchange(method, endpoint, body)?;
        decode_body(response.format, &response.body).map_err(|err| err.with_url(endpoint))
    }

    pub fn request_v1_into<T>(
        &self,
        target: &mut T,
        method: &str,
        endpoint: &str,
        body: Option<&mut dyn Read>,
    ) -> ApiResult<()>
    where
        T: DeserializeOwned,
    {
        let response = self.exchange(method, endpoint, body)?;
        decode_body_into(response.format, &response.body, target)
            .map_err(|err| err.with_url(endpoint))
    }

    pub fn get_v1<T>(&self, endpoint: &str) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
    {
        self.request_v1("GET", endpoint, None)
    }

    /// POSTs `body` and checks for a 200; the response payload is not decoded.
    pub fn post_v1(&self, endpoint: &str, body: Option<&mut dyn Read>) -> ApiResult<()> {
        self.exchange("POST", endpoint, body).map(|_| ())
    }

    /// Returns the body of a 200 response as text, for plain-text endpoints like `/ping`.
    pub fn request_text(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&mut dyn Read>,
    ) -> ApiResult<String> {
        let response = self.exchange(method, endpoint, body)?;
        String::from_utf8(response.body).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("response body is not valid utf-8")
                .with_url(endpoint)
                .with_source(err)
        })
    }

    fn exchange(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&mut dyn Read>,
    ) -> ApiResult<RawResponse> {
        ensure_method(method)?;
        let url = parse_endpoint(endpoint)?;
        let payload = match body {
            Some(reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message("failed to read request body")
                        .with_url(url.as_str())
                        .with_source(err)
                })?;
                Some(bytes)
            }
            None => None,
        };

        let request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", ACCEPT_V1)
            .set("User-Agent", &self.inner.user_agent);
        let started = Instant::now();
        let result = match &payload {
            Some(bytes) => request.send_bytes(bytes),
            None => request.call(),
        };
        let response = match result {
            Ok(resp) => resp,
            // Status is checked below against 200 exactly, not the 4xx/5xx split.
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => {
                tracing::debug!(method, url = %url, error = %err, "nsq api request failed");
                return Err(Error::from_transport(err).with_url(url.as_str()));
            }
        };

        let status = response.status();
        let status_text = response.status_text().to_string();
        let format = ResponseFormat::from_header(response.header(CONTENT_TYPE_HEADER));
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|err| Error::from_transport(err).with_url(url.as_str()))?;
        tracing::debug!(
            method,
            url = %url,
            status,
            ?format,
            body_bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "nsq api response"
        );

        if status != 200 {
            let text = String::from_utf8_lossy(&body).into_owned();
            return Err(Error::new(ErrorKind::Status)
                .with_message(format!("got response {status} {status_text} {text:?}"))
                .with_url(url.as_str())
                .with_status(status)
                .with_body(text));
        }

        Ok(RawResponse { format, body })
    }
}

fn parse_endpoint(endpoint: &str) -> ApiResult<Url> {
    let url = Url::parse(endpoint).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid endpoint url")
            .with_url(endpoint)
            .with_source(err)
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint url must use http or https scheme")
            .with_url(endpoint)),
    }
}

fn ensure_method(method: &str) -> ApiResult<()> {
    let is_token = !method.is_empty()
        && method
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !is_token {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid http method {method:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ApiClient, DEFAULT_USER_AGENT, ensure_method, parse_endpoint};
    use crate::core::error::ErrorKind;
    use crate::core::transport::TransportConfig;
    use std::time::Duration;

    #[test]
    fn ensure_method_accepts_tokens() {
        for method in ["GET", "POST", "DELETE", "PATCH", "X-CUSTOM"] {
            assert!(ensure_method(method).is_ok(), "{method}");
        }
    }

    #[test]
    fn ensure_method_rejects_malformed() {
        for method in ["", "GE T", "GET\r\n", "P(OST)"] {
            let err = ensure_method(method).expect_err("err");
            assert_eq!(err.kind(), ErrorKind::Usage);
        }
    }

    #[test]
    fn parse_endpoint_rejects_relative_and_foreign_urls() {
        let err = parse_endpoint("/stats").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.url(), Some("/stats"));

        let err = parse_endpoint("ftp://127.0.0.1/stats").expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn invalid_url_fails_before_any_io() {
        let client = ApiClient::new(TransportConfig::default());
        let err = client
            .get_v1::<serde_json::Value>("not a url")
            .expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn with_user_agent_keeps_config() {
        let client = ApiClient::new(TransportConfig::new().with_timeout(Duration::from_secs(5)));
        assert_eq!(client.user_agent(), DEFAULT_USER_AGENT);
        let shared = client.clone();
        let client = client.with_user_agent("nsqadmin/1.3.0");
        assert_eq!(client.user_agent(), "nsqadmin/1.3.0");
        assert_eq!(shared.user_agent(), DEFAULT_USER_AGENT);
        assert_eq!(client.config().io_timeout, Duration::from_secs(5));
    }

    #[test]
    fn api_client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiClient>();
    }
}
