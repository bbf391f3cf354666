//! Event-driven EC2 power management with Route 53 DNS synchronization.
//!
//! Two Lambda handlers share this library. The `powercycle` handler bulk
//! starts or stops instances, selected either by an explicit ID list or by
//! their current state. The `dns-sync` handler reacts to EC2 state-change
//! notifications by upserting a Route 53 "A" record pointing the instance's
//! DNS name at its public IP.

pub mod config;
pub mod dns_sync;
pub mod ec2;
pub mod error;
pub mod logging;
pub mod power_cycle;
pub mod response;
pub mod route53;
