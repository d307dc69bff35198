//! Wire types and validation for presence-daemon.
//!
//! Shared by the daemon and whatever delivers presence updates to it, so both
//! sides agree on one schema. The daemon stays the authority on validation.
//!
//! Every line on the daemon's stdin is one [`Request`]; every line it writes to
//! stdout is one [`Response`].

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;
const MAX_IDENTITY_REF_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    Event,
    Report,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

/// One reply line. `data` is set when `ok`, `error` otherwise.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Response {
    /// Builds the reply to request `id` from the outcome of handling it.
    pub fn reply(id: Option<String>, outcome: Result<Value, ErrorInfo>) -> Self {
        match outcome {
            Ok(data) => Self {
                ok: true,
                id,
                data: Some(data),
                error: None,
            },
            Err(error) => Self {
                ok: false,
                id,
                data: None,
                error: Some(error),
            },
        }
    }

    pub fn failure(id: Option<String>, error: ErrorInfo) -> Self {
        Self::reply(id, Err(error))
    }
}

/// Stable error codes carried in [`ErrorInfo::code`].
pub mod codes {
    pub const PROTOCOL_MISMATCH: &str = "protocol_mismatch";
    pub const INVALID_JSON: &str = "invalid_json";
    pub const REQUEST_TOO_LARGE: &str = "request_too_large";
    pub const INVALID_PARAMS: &str = "invalid_params";
    pub const INVALID_IDENTITY: &str = "invalid_identity";
    pub const INVALID_TIMESTAMP: &str = "invalid_timestamp";
    pub const SERIALIZATION_ERROR: &str = "serialization_error";
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A single presence change for one identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceEvent {
    pub identity_id: u64,
    pub status: PresenceStatus,
    /// RFC3339 instant of the change. The daemon stamps its own clock when absent.
    #[serde(default)]
    pub observed_at: Option<String>,
}

impl PresenceEvent {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.identity_id == 0 {
            return Err(ErrorInfo::new(
                codes::INVALID_IDENTITY,
                "identity_id must be non-zero",
            ));
        }
        if let Some(value) = self.observed_at.as_deref() {
            if DateTime::parse_from_rfc3339(value).is_err() {
                return Err(ErrorInfo::new(
                    codes::INVALID_TIMESTAMP,
                    "observed_at must be RFC3339",
                ));
            }
        }
        Ok(())
    }

    pub fn observed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.observed_at
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(6))
    }
}

/// Report request. `identity` is a name reference (leading `@` allowed);
/// absent means the aggregate report.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportRequest {
    #[serde(default)]
    pub identity: Option<String>,
}

impl ReportRequest {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if let Some(identity) = self.identity.as_deref() {
            let trimmed = identity.trim().trim_start_matches('@');
            if trimmed.is_empty() {
                return Err(ErrorInfo::new(
                    codes::INVALID_IDENTITY,
                    "identity must not be empty",
                ));
            }
            if trimmed.chars().count() > MAX_IDENTITY_REF_LEN {
                return Err(ErrorInfo::new(
                    codes::INVALID_IDENTITY,
                    format!(
                        "identity must be {} characters or fewer",
                        MAX_IDENTITY_REF_LEN
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Outcome kind carried in a report response, so callers can tell the
/// sentinel texts apart without matching on wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Identity,
    Aggregate,
    NoData,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub kind: ReportKind,
    pub text: String,
}

pub fn parse_event(params: Value) -> Result<PresenceEvent, ErrorInfo> {
    let event: PresenceEvent = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::invalid_params(format!("event payload is invalid JSON: {}", err))
    })?;
    event.validate()?;
    Ok(event)
}

pub fn parse_report_request(params: Option<Value>) -> Result<ReportRequest, ErrorInfo> {
    let request = match params {
        None | Some(Value::Null) => ReportRequest::default(),
        Some(value) => serde_json::from_value(value).map_err(|err| {
            ErrorInfo::invalid_params(format!("report payload is invalid JSON: {}", err))
        })?,
    };
    request.validate()?;
    Ok(request)
}
