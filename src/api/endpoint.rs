//! Purpose: Build absolute endpoint URLs for nsqd / nsqlookupd HTTP APIs.
//! Exports: `endpoint`.
//! Role: Turns `host:port` or `http(s)://host:port` plus a path into a `Url`.
//! Invariants: Only http/https schemes are accepted.
//! Invariants: Base addresses must not carry a path; `path` replaces it wholesale.

use crate::core::error::{Error, ErrorKind};
use url::Url;

type ApiResult<T> = Result<T, Error>;

pub fn endpoint(address: &str, path: &str, query: &[(&str, &str)]) -> ApiResult<Url> {
    let mut url = normalize_base_url(address)?;
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage)
                .with_message("endpoint address cannot be a base")
                .with_url(address)
        })?;
        segments.clear();
        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            segments.push(segment);
        }
    }
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

fn normalize_base_url(address: &str) -> ApiResult<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("empty endpoint address")
            .with_hint("Use host:port or http://host:port (e.g. 127.0.0.1:4151)."));
    }
    let raw = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid endpoint address")
            .with_url(address)
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint address must use http or https scheme")
            .with_url(address));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("endpoint address must not include a path")
            .with_url(address));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
