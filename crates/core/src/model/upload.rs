//! Persisted upload queue record.
//!
//! This is the one on-disk format that has to stay readable across upgrades:
//! fields added after the first release are optional on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::request::InterceptedRequest;
use crate::Error;

/// A write request waiting to be replayed against the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQueueItem {
    pub id: String,
    pub url: String,
    pub method: String,
    /// Opaque request body (multipart as sent by the client).
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    pub enqueued_at: DateTime<Utc>,

    /// Carries the multipart boundary, so replays need it verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl UploadQueueItem {
    /// Capture a failed write request under a fresh UUID v4 id.
    pub fn from_request(req: &InterceptedRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            url: req.url.to_string(),
            method: req.method.clone(),
            payload: req.body.to_vec(),
            enqueued_at: now,
            content_type: req.header("content-type").map(str::to_string),
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
        }
    }

    /// Whether the retry delay has elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Rebuild the original request for replay.
    pub fn to_request(&self) -> Result<InterceptedRequest, Error> {
        let url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.url)))?;
        let mut req = InterceptedRequest::new(&self.method, url).with_body(self.payload.clone());
        if let Some(ct) = &self.content_type {
            req = req.with_header("Content-Type", ct.clone());
        }
        Ok(req)
    }
}

mod payload_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
