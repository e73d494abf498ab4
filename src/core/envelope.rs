//! Purpose: Decode NSQ HTTP API response bodies (raw v1 or legacy envelope).
//! Exports: `ResponseFormat`, `Envelope`, `decode_body(_into)`, header constants.
//! Role: Pure decoding layer; knows nothing about sockets or status codes.
//! Invariants: An empty body decodes exactly like the JSON literal `{}`.
//! Invariants: Envelope status fields never influence the decoded result.

use crate::core::error::{Error, ErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Request header value that negotiates the v1 response format.
pub const ACCEPT_V1: &str = "application/vnd.nsq; version=1.0";
/// Response header that marks a raw (unwrapped) v1 body.
pub const CONTENT_TYPE_HEADER: &str = "X-NSQ-Content-Type";
pub const CONTENT_TYPE_V1: &str = "nsq; version=1.0";

const EMPTY_BODY: &[u8] = b"{}";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResponseFormat {
    /// Body is the payload itself.
    Raw,
    /// Body is `{"status_txt", "status_code", "data"}`.
    Enveloped,
}

impl ResponseFormat {
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            Some(CONTENT_TYPE_V1) => ResponseFormat::Raw,
            _ => ResponseFormat::Enveloped,
        }
    }
}

/// Legacy wire wrapper. Every field is `None` when absent or null.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status_txt: Option<String>,
    #[serde(default)]
    pub status_code: Option<i64>,
    pub data: Option<T>,
}

/// Decodes `body` by value. A `null` payload (raw body or envelope `data`)
/// yields `T::default()`.
pub fn decode_body<T>(format: ResponseFormat, body: &[u8]) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    let mut target = T::default();
    decode_body_into(format, body, &mut target)?;
    Ok(target)
}

/// Decodes `body` over `target`. A `null` payload (raw body or missing
/// envelope `data`) leaves `target` untouched.
pub fn decode_body_into<T>(
    format: ResponseFormat,
    body: &[u8],
    target: &mut T,
) -> Result<(), Error>
where
    T: DeserializeOwned,
{
    let body = if body.is_empty() { EMPTY_BODY } else { body };
    match format {
        ResponseFormat::Raw => {
            let payload: Option<T> = serde_json::from_slice(body).map_err(|err| {
                Error::new(ErrorKind::Decode)
                    .with_message("invalid response json")
                    .with_source(err)
            })?;
            if let Some(payload) = payload {
                *target = payload;
            }
        }
        ResponseFormat::Enveloped => {
            let envelope: Envelope<T> = serde_json::from_slice(body).map_err(|err| {
                Error::new(ErrorKind::Decode)
                    .with_message("invalid response envelope json")
                    .with_source(err)
            })?;
            if let Some(data) = envelope.data {
                *target = data;
            }
        }
    }
    Ok(())
}
