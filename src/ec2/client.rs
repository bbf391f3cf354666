//! AWS EC2 SDK client wrapper.

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use tracing::{debug, info};

use super::{Ec2Api, InstanceDetail, InstanceSummary, InstanceTag};
use crate::error::{Error, Result};

pub struct Ec2Client {
    client: aws_sdk_ec2::Client,
    region: String,
}

impl Ec2Client {
    /// Derive a region-scoped client from the shared SDK config. The region
    /// comes from the inbound event, not from the deployment environment.
    pub fn new(config: &SdkConfig, region: &str) -> Self {
        let regional_config = aws_sdk_ec2::config::Builder::from(config)
            .region(Region::new(region.to_string()))
            .build();

        Self {
            client: aws_sdk_ec2::Client::from_conf(regional_config),
            region: region.to_string(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl Ec2Api for Ec2Client {
    async fn list_instances(&self) -> Result<Vec<InstanceSummary>> {
        debug!(region = %self.region, "Listing all EC2 instances");

        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self.client.describe_instances();
            if let Some(token) = next_token.take() {
                request = request.next_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::aws(module_path!(), e))?;

            for reservation in response.reservations() {
                for instance in reservation.instances() {
                    let Some(instance_id) = instance.instance_id() else {
                        continue;
                    };
                    let state = instance
                        .state()
                        .and_then(|state| state.name())
                        .map(|name| name.as_str())
                        .unwrap_or("unknown");

                    instances.push(InstanceSummary {
                        instance_id: instance_id.to_string(),
                        state: state.to_string(),
                    });
                }
            }

            next_token = response.next_token().map(|token| token.to_string());
            if next_token.is_none() {
                break;
            }
        }

        debug!(
            region = %self.region,
            instance_count = instances.len(),
            "Listed EC2 instances"
        );
        Ok(instances)
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<Vec<InstanceDetail>> {
        debug!(instance_id = %instance_id, region = %self.region, "Describing EC2 instance");

        let response = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Error::aws(module_path!(), e))?;

        let mut details = Vec::new();
        for reservation in response.reservations() {
            for instance in reservation.instances() {
                details.push(InstanceDetail {
                    instance_id: instance.instance_id().unwrap_or_default().to_string(),
                    tags: instance
                        .tags()
                        .iter()
                        .map(|tag| InstanceTag {
                            key: tag.key().unwrap_or_default().to_string(),
                            value: tag.value().unwrap_or_default().to_string(),
                        })
                        .collect(),
                    public_ip: instance.public_ip_address().map(|ip| ip.to_string()),
                });
            }
        }

        Ok(details)
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        info!(
            instance_id = %instance_id,
            region = %self.region,
            api_action = "StartInstances",
            "Sending start request to AWS EC2 API"
        );

        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Error::aws(module_path!(), e))?;

        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        info!(
            instance_id = %instance_id,
            region = %self.region,
            api_action = "StopInstances",
            "Sending stop request to AWS EC2 API"
        );

        self.client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| Error::aws(module_path!(), e))?;

        Ok(())
    }
}
