//! Storage locations the backend reads asynchronous inputs from.

use crate::error::ExtractError;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An object in S3-compatible storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLocation {
    pub bucket: String,
    pub key: String,
}

// `bucket.s3.amazonaws.com`, `bucket.s3.eu-west-1.amazonaws.com`,
// `bucket.s3-eu-west-1.amazonaws.com`. The bucket must come before `s3`, so
// a path-style host such as `s3.eu-west-1.amazonaws.com` does not match.
static RE_VIRTUAL_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<bucket>[^.]+(?:\.[^.]+)*?)\.s3[.-]").unwrap());

static RE_PATH_STYLE_HOST: Lazy<Regex> = Lazy::new(|| Regex::new(r"^s3[.-]").unwrap());

impl DocumentLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse `s3://bucket/key`, a virtual-hosted S3 URL or a path-style S3 URL.
    pub fn parse(input: &str) -> Result<Self, ExtractError> {
        let invalid = |reason: &str| ExtractError::InvalidInput {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input).map_err(|e| invalid(&e.to_string()))?;
        let host = url.host_str().unwrap_or_default();
        let path = url.path().trim_start_matches('/');

        let (bucket, key) = match url.scheme() {
            "s3" => (host.to_string(), path.to_string()),
            "http" | "https" => {
                if let Some(caps) = RE_VIRTUAL_HOST.captures(host) {
                    (caps["bucket"].to_string(), path.to_string())
                } else if RE_PATH_STYLE_HOST.is_match(host) {
                    match path.split_once('/') {
                        Some((bucket, key)) => (bucket.to_string(), key.to_string()),
                        None => return Err(invalid("S3 URL has no object key")),
                    }
                } else {
                    return Err(invalid("not an S3 URL"));
                }
            }
            _ => return Err(invalid("expected s3:// or an S3 HTTPS URL")),
        };

        if bucket.is_empty() {
            return Err(invalid("S3 URL has no bucket"));
        }
        if key.is_empty() {
            return Err(invalid("S3 URL has no object key"));
        }
        Ok(Self::new(bucket, decode_key(&key)))
    }

    /// The final path component of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// Whether `input` looks like something [`parse`](Self::parse) accepts.
    pub fn is_s3_url(input: &str) -> bool {
        if input.starts_with("s3://") {
            return true;
        }
        Url::parse(input)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .map(|h| h.ends_with(".amazonaws.com") && h.contains("s3"))
            .unwrap_or(false)
    }
}

impl fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Undo percent-encoding in object keys (`my%20file.pdf` → `my file.pdf`).
fn decode_key(key: &str) -> String {
    percent_decode_str(key).decode_utf8_lossy().into_owned()
}
