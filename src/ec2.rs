//! EC2 instance discovery and power control.

pub mod client;
pub mod tags;

pub use client::Ec2Client;

use async_trait::async_trait;

use crate::error::Result;

/// Compact listing row produced by the paginated instance scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub state: String,
}

/// One tag on an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceTag {
    pub key: String,
    pub value: String,
}

/// Detail row for a described instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDetail {
    pub instance_id: String,
    pub tags: Vec<InstanceTag>,
    pub public_ip: Option<String>,
}

/// EC2 control-plane operations the handlers depend on.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// List every instance in the region with its current state.
    async fn list_instances(&self) -> Result<Vec<InstanceSummary>>;

    /// Describe one instance. Returns every instance the API reports for the
    /// ID; the happy path is a single entry.
    async fn describe_instance(&self, instance_id: &str) -> Result<Vec<InstanceDetail>>;

    async fn start_instance(&self, instance_id: &str) -> Result<()>;

    async fn stop_instance(&self, instance_id: &str) -> Result<()>;
}
