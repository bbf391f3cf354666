//! Route 53 record management: DNS API trait, SDK client wrapper, and the
//! UPSERT helper shared by the DNS-Sync handler.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use tracing::{error, info};

use crate::config::DnsSettings;
use crate::error::{Error, Result};
use crate::response::{ChangeInfo, DnsUpdateResult};

/// Comment attached to every submitted change batch.
const CHANGE_COMMENT: &str = "Updated by Lambda upon EC2 state change";

/// Route 53 operations the DNS-Sync handler depends on.
#[async_trait]
pub trait DnsApi: Send + Sync {
    /// UPSERT a single "A" record pointing `dns_name` at `ip_address`.
    async fn upsert_a_record(
        &self,
        hosted_zone_id: &str,
        dns_name: &str,
        ip_address: &str,
        ttl: i64,
    ) -> Result<ChangeInfo>;
}

pub struct Route53Client {
    client: aws_sdk_route53::Client,
}

impl Route53Client {
    /// Route 53 is a global service; no per-region client is needed.
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_route53::Client::new(config),
        }
    }
}

#[async_trait]
impl DnsApi for Route53Client {
    async fn upsert_a_record(
        &self,
        hosted_zone_id: &str,
        dns_name: &str,
        ip_address: &str,
        ttl: i64,
    ) -> Result<ChangeInfo> {
        let change_batch = build_change_batch(dns_name, ip_address, ttl)?;

        let response = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(hosted_zone_id)
            .change_batch(change_batch)
            .send()
            .await
            .map_err(|e| Error::aws(module_path!(), e))?;

        let change_info = match response.change_info() {
            Some(info) => ChangeInfo {
                id: info.id().to_string(),
                status: info.status().as_str().to_string(),
            },
            None => ChangeInfo {
                id: "unknown".to_string(),
                status: "unknown".to_string(),
            },
        };

        Ok(change_info)
    }
}

/// Assemble the single-change UPSERT batch for one "A" record.
fn build_change_batch(dns_name: &str, ip_address: &str, ttl: i64) -> Result<ChangeBatch> {
    let record = ResourceRecord::builder()
        .value(ip_address)
        .build()
        .map_err(|e| Error::aws(module_path!(), e))?;

    let record_set = ResourceRecordSet::builder()
        .name(dns_name)
        .r#type(RrType::A)
        .ttl(ttl)
        .resource_records(record)
        .build()
        .map_err(|e| Error::aws(module_path!(), e))?;

    let change = Change::builder()
        .action(ChangeAction::Upsert)
        .resource_record_set(record_set)
        .build()
        .map_err(|e| Error::aws(module_path!(), e))?;

    ChangeBatch::builder()
        .comment(CHANGE_COMMENT)
        .changes(change)
        .build()
        .map_err(|e| Error::aws(module_path!(), e))
}

/// UPSERT one "A" record and fold the outcome into a structured result.
/// Never fails: API errors come back as `status: "error"` records so one
/// bad update cannot abort the batch.
pub async fn upsert_record(
    dns: &impl DnsApi,
    settings: &DnsSettings,
    dns_name: &str,
    ip_address: &str,
) -> DnsUpdateResult {
    info!(
        dns_name = %dns_name,
        record_type = "A",
        ip_address = %ip_address,
        ttl = settings.record_ttl,
        hosted_zone_id = %settings.hosted_zone_id,
        "Attempting UPSERT for DNS record"
    );

    match dns
        .upsert_a_record(&settings.hosted_zone_id, dns_name, ip_address, settings.record_ttl)
        .await
    {
        Ok(change_info) => {
            info!(
                dns_name = %dns_name,
                ip_address = %ip_address,
                change_id = %change_info.id,
                change_status = %change_info.status,
                "Successfully UPSERTed DNS record"
            );
            DnsUpdateResult::success(dns_name, ip_address, change_info)
        }
        Err(Error::Api {
            code, message, ..
        }) => {
            error!(
                dns_name = %dns_name,
                ip_address = %ip_address,
                error_code = %code,
                error_message = %message,
                "AWS API Error updating DNS record"
            );
            DnsUpdateResult::api_error(dns_name, ip_address, code, message)
        }
        Err(other) => {
            error!(
                dns_name = %dns_name,
                ip_address = %ip_address,
                error = %other,
                "Unexpected error updating DNS record"
            );
            DnsUpdateResult::unexpected_error(
                dns_name,
                ip_address,
                format!("Unexpected error updating DNS record for {dns_name} to {ip_address}: {other}"),
            )
        }
    }
}
