//! Mappers between domain types and control-protocol envelopes
//!
//! Bodies are JSON documents carried in `google.protobuf.Any.value`.

use crate::constants::protocol::JSON_TYPE_URL;
use crate::domain::{DomainError, ProgramSnapshot};
use crate::proto::{Metadata, Payload};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Body of `startProgram`, `stopProgram` and `restartProgram`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramCommandBody {
    #[serde(default, alias = "Name")]
    pub name: String,
}

/// Body of a `commandError` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandErrorBody {
    pub command: String,
    pub name: String,
    pub message: String,
}

/// One program in an outbound `subscriptionProgram` push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProgramStatus {
    pub name: String,
    pub directory: String,
    pub command: String,
    pub args: Vec<String>,
    pub is_auto_start: bool,
    pub is_auto_restart: bool,
    pub max_restart_count: u32,
    /// 0 when not running
    pub pid: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    /// Integer state code
    pub state: i32,
    pub stop_by_user: bool,
    pub exit_code: Option<i32>,
    pub retry_count: u32,
}

fn to_utc(time: Option<SystemTime>) -> Option<DateTime<Utc>> {
    time.map(DateTime::<Utc>::from)
}

impl From<&ProgramSnapshot> for ProgramStatus {
    fn from(snapshot: &ProgramSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            directory: snapshot.directory.clone(),
            command: snapshot.command.clone(),
            args: snapshot.args.clone(),
            is_auto_start: snapshot.is_auto_start,
            is_auto_restart: snapshot.is_auto_restart,
            max_restart_count: snapshot.max_restart_count,
            pid: snapshot.pid.unwrap_or(0),
            start_time: to_utc(snapshot.start_time),
            stop_time: to_utc(snapshot.stop_time),
            state: snapshot.state.code(),
            stop_by_user: snapshot.stop_by_user,
            exit_code: snapshot.exit_code,
            retry_count: snapshot.retry_count,
        }
    }
}

pub fn encode_body<T: Serialize>(value: &T) -> Result<prost_types::Any, serde_json::Error> {
    Ok(prost_types::Any {
        type_url: JSON_TYPE_URL.to_string(),
        value: serde_json::to_vec(value)?,
    })
}

/// Decode a JSON body; `type_url` is not checked
pub fn decode_body<T: DeserializeOwned>(body: Option<&prost_types::Any>) -> Result<T, DomainError> {
    let body = body.ok_or_else(|| DomainError::InvalidBody("missing body".to_string()))?;
    serde_json::from_slice(&body.value).map_err(|e| DomainError::InvalidBody(e.to_string()))
}

pub fn envelope(
    kind: &str,
    client_ip: &str,
    headers: HashMap<String, String>,
    body: prost_types::Any,
) -> Payload {
    Payload {
        metadata: Some(Metadata {
            r#type: kind.to_string(),
            client_ip: client_ip.to_string(),
            headers,
        }),
        body: Some(body),
    }
}

/// Declared type of an envelope, empty when metadata is absent
pub fn payload_type(payload: &Payload) -> &str {
    payload
        .metadata
        .as_ref()
        .map(|m| m.r#type.as_str())
        .unwrap_or_default()
}

pub fn payload_header<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload
        .metadata
        .as_ref()
        .and_then(|m| m.headers.get(key))
        .map(String::as_str)
}
