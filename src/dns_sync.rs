//! DNS-Sync handler: state-change event parsing, instance lookup, and the
//! per-instance upsert loop.

use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::config::DnsSettings;
use crate::ec2::Ec2Api;
use crate::ec2::tags::{ResolvedName, resolve_dns_name};
use crate::error::Error;
use crate::response::{DnsSyncReport, HandlerResponse, SkippedUpdate, UpdateRecord};
use crate::route53::{DnsApi, upsert_record};

/// Fields of an EC2 state-change notification the handler acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeEvent {
    pub instance_id: String,
    pub region: String,
}

/// Extract the instance ID and region from a state-change notification.
/// Both fields are mandatory; the Err side carries the ready 400 response
/// with the offending event echoed back.
pub fn parse_event(event: &Value) -> Result<StateChangeEvent, HandlerResponse> {
    let instance_id = event
        .get("detail")
        .and_then(|detail| detail.get("instance-id"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let region = event.get("region").and_then(Value::as_str).unwrap_or_default();

    if instance_id.is_empty() || region.is_empty() {
        error!(
            event = %event,
            "Validation Error: Missing 'instance-id' or 'region' in the EC2 state-change event detail"
        );
        return Err(HandlerResponse::new(
            400,
            &json!({
                "status": "error",
                "message": "Missing 'instance-id' or 'region' in the EC2 state-change event detail.",
                "event": event,
            }),
        ));
    }

    Ok(StateChangeEvent {
        instance_id: instance_id.to_string(),
        region: region.to_string(),
    })
}

/// Process a parsed state-change event end to end. Never returns an error:
/// anything the lookup/update pipeline cannot handle itself becomes a 500
/// response with the original event echoed back.
pub async fn run(
    ec2: &impl Ec2Api,
    dns: &impl DnsApi,
    settings: &DnsSettings,
    event: &StateChangeEvent,
    raw_event: &Value,
) -> HandlerResponse {
    info!(
        instance_id = %event.instance_id,
        region = %event.region,
        "Processing EC2 instance for DNS update"
    );

    match lookup_and_update(ec2, dns, settings, event).await {
        Ok(response) => response,
        Err(err) => {
            error!(
                error = %err,
                instance_id = %event.instance_id,
                region = %event.region,
                "Unhandled error during DNS update"
            );
            HandlerResponse::new(
                500,
                &json!({
                    "status": "error",
                    "message": format!("An unexpected error occurred during execution: {err}"),
                    "instance_id": event.instance_id,
                    "region": event.region,
                    "event": raw_event,
                }),
            )
        }
    }
}

async fn lookup_and_update(
    ec2: &impl Ec2Api,
    dns: &impl DnsApi,
    settings: &DnsSettings,
    event: &StateChangeEvent,
) -> Result<HandlerResponse, Error> {
    let details = match ec2.describe_instance(&event.instance_id).await {
        Ok(details) => details,
        Err(Error::Api { code, message, .. }) => {
            error!(
                instance_id = %event.instance_id,
                error_code = %code,
                error_message = %message,
                "AWS API Error describing instance"
            );
            return Ok(HandlerResponse::new(
                404,
                &json!({
                    "status": "error",
                    "message": format!(
                        "Failed to describe instance {}: {}",
                        event.instance_id, message
                    ),
                }),
            ));
        }
        Err(other) => return Err(other),
    };

    if details.is_empty() {
        error!(
            instance_id = %event.instance_id,
            region = %event.region,
            "Instance not found or could not be described"
        );
        return Ok(HandlerResponse::new(
            404,
            &json!({
                "status": "error",
                "message": format!(
                    "Instance with ID '{}' not found or could not be described.",
                    event.instance_id
                ),
                "instance_id": event.instance_id,
                "region": event.region,
            }),
        ));
    }

    let mut updates = Vec::with_capacity(details.len());
    for instance in &details {
        let Some(resolved) = resolve_dns_name(&instance.tags) else {
            warn!(
                instance_id = %instance.instance_id,
                "Neither 'PublicDNS' nor 'Name' tags found for instance"
            );
            return Ok(HandlerResponse::new(
                400,
                &json!({
                    "status": "error",
                    "message": format!(
                        "Cannot determine DNS name for instance '{}': No tags found on the instance.",
                        instance.instance_id
                    ),
                }),
            ));
        };

        if let ResolvedName::NameFallback(name) = &resolved {
            info!(
                instance_id = %instance.instance_id,
                name = %name,
                "'PublicDNS' tag was missing or empty, falling back to 'Name' tag"
            );
        }

        match instance.public_ip.as_deref() {
            Some(ip_address) => {
                info!(
                    instance_id = %instance.instance_id,
                    dns_name = %resolved.as_str(),
                    public_ip = %ip_address,
                    "Attempting DNS update for instance"
                );
                updates.push(UpdateRecord::Upsert(
                    upsert_record(dns, settings, resolved.as_str(), ip_address).await,
                ));
            }
            None => {
                let reason =
                    skip_reason(&instance.instance_id, Some(resolved.as_str()), None);
                warn!(instance_id = %instance.instance_id, reason = %reason, "Skipping DNS update");
                updates.push(UpdateRecord::Skipped(SkippedUpdate::new(
                    &instance.instance_id,
                    reason,
                )));
            }
        }
    }

    let report = build_report(event, updates);
    info!(
        status = %report.status,
        instance_id = %event.instance_id,
        "Function execution completed"
    );
    Ok(HandlerResponse::new(200, &report))
}

/// Build the reason string for an instance that could not be updated,
/// naming each missing piece.
fn skip_reason(instance_id: &str, dns_name: Option<&str>, public_ip: Option<&str>) -> String {
    let mut parts = Vec::new();
    if dns_name.is_none() {
        parts.push("Missing or empty 'PublicDNS' and no usable 'Name' tag.");
    }
    if public_ip.is_none() {
        parts.push("missing 'PublicIpAddress'.");
    }
    format!("Skipping instance '{}': {}", instance_id, parts.join(" And "))
}

/// Fold the per-instance records into the aggregate report. Any failed
/// UPSERT downgrades the overall status; an empty record list is reported
/// as a no-op, not an error.
fn build_report(event: &StateChangeEvent, updates: Vec<UpdateRecord>) -> DnsSyncReport {
    let any_error = updates.iter().any(UpdateRecord::is_error);

    let message = if updates.is_empty() {
        format!("No DNS updates were attempted for instance {}.", event.instance_id)
    } else if any_error {
        "Some DNS updates failed. Check 'updates' for details.".to_string()
    } else {
        "DNS update process completed successfully.".to_string()
    };

    DnsSyncReport {
        status: if any_error {
            "partial_success_with_errors"
        } else {
            "success"
        }
        .to_string(),
        message,
        instance_id: event.instance_id.clone(),
        region: event.region.clone(),
        updates,
    }
}
