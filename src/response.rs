//! Wire types shared by both handlers: the Lambda response envelope and the
//! structured report bodies it carries.

use std::fmt;

use serde::{Deserialize, Serialize};

const ACTION_UPSERT: &str = "UPSERT";
const ACTION_SKIPPED: &str = "skipped";
const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";
const STATUS_SKIPPED: &str = "skipped";

/// Response envelope returned to the trigger dispatcher. The body is always
/// a JSON document serialized to a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub fn new(status_code: u16, payload: &impl Serialize) -> Self {
        Self {
            status_code,
            body: serde_json::to_string(payload).expect("response payload should serialize"),
        }
    }
}

/// Bulk power operation requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Start,
    Stop,
}

impl Operation {
    /// Parse the wire value. Only the exact lowercase forms are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start" => Some(Operation::Start),
            "stop" => Some(Operation::Stop),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate body returned by the PowerCycle handler.
#[derive(Debug, Clone, Serialize)]
pub struct PowerCycleReport {
    pub message: String,
    pub operation: Operation,
    pub successful_instances: Vec<String>,
    pub failed_instances: Vec<FailedInstance>,
    pub region: String,
}

/// Per-instance failure entry with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedInstance {
    pub instance_id: String,
    pub reason: String,
}

/// Aggregate body returned by the DNS-Sync handler.
#[derive(Debug, Clone, Serialize)]
pub struct DnsSyncReport {
    pub status: String,
    pub message: String,
    pub instance_id: String,
    pub region: String,
    pub updates: Vec<UpdateRecord>,
}

/// One entry in the DNS-Sync `updates` list: an UPSERT attempt or a skipped
/// instance.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UpdateRecord {
    Upsert(DnsUpdateResult),
    Skipped(SkippedUpdate),
}

impl UpdateRecord {
    /// True for a failed UPSERT. Skipped instances are not errors.
    pub fn is_error(&self) -> bool {
        matches!(self, UpdateRecord::Upsert(result) if result.status == STATUS_ERROR)
    }
}

/// Outcome of one DNS UPSERT attempt. Success carries the change-tracking
/// info; failure carries the upstream error code and message instead.
#[derive(Debug, Clone, Serialize)]
pub struct DnsUpdateResult {
    pub dns_name: String,
    pub ip_address: String,
    pub action: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_info: Option<ChangeInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DnsUpdateResult {
    pub fn success(dns_name: &str, ip_address: &str, change_info: ChangeInfo) -> Self {
        Self {
            dns_name: dns_name.to_string(),
            ip_address: ip_address.to_string(),
            action: ACTION_UPSERT.to_string(),
            status: STATUS_SUCCESS.to_string(),
            change_info: Some(change_info),
            error_code: None,
            error_message: None,
        }
    }

    pub fn api_error(dns_name: &str, ip_address: &str, code: String, message: String) -> Self {
        Self {
            dns_name: dns_name.to_string(),
            ip_address: ip_address.to_string(),
            action: ACTION_UPSERT.to_string(),
            status: STATUS_ERROR.to_string(),
            change_info: None,
            error_code: Some(code),
            error_message: Some(message),
        }
    }

    pub fn unexpected_error(dns_name: &str, ip_address: &str, message: String) -> Self {
        Self {
            dns_name: dns_name.to_string(),
            ip_address: ip_address.to_string(),
            action: ACTION_UPSERT.to_string(),
            status: STATUS_ERROR.to_string(),
            change_info: None,
            error_code: None,
            error_message: Some(message),
        }
    }
}

/// Change-tracking identifier returned by a successful Route 53 UPSERT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeInfo {
    pub id: String,
    pub status: String,
}

/// Instance skipped because its DNS name or public IP was unavailable.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedUpdate {
    pub instance_id: String,
    pub action: String,
    pub reason: String,
    pub status: String,
}

impl SkippedUpdate {
    pub fn new(instance_id: &str, reason: String) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            action: ACTION_SKIPPED.to_string(),
            reason,
            status: STATUS_SKIPPED.to_string(),
        }
    }
}
