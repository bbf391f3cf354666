use clap::Parser;
use tracing::info;

/// Runtime configuration for the PowerCycle handler.
#[derive(Parser, Debug, Clone)]
#[command(name = "powercycle", version, about = "Bulk start/stop handler for EC2 instances")]
pub struct PowerCycleConfig {
    /// Log output format (json, pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level filter (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl PowerCycleConfig {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn display(&self) {
        info!(
            log_format = %self.log_format,
            log_level = %self.log_level,
            "Configuration initialized"
        );
    }
}

/// Runtime configuration for the DNS-Sync handler.
#[derive(Parser, Debug, Clone)]
#[command(name = "dns-sync", version, about = "Route 53 record sync on EC2 state changes")]
pub struct DnsSyncConfig {
    /// Route 53 hosted zone that receives the A record upserts
    #[arg(long, env = "HOSTED_ZONE_ID")]
    pub hosted_zone_id: String,

    /// TTL in seconds for upserted records
    #[arg(long, env = "DNS_RECORD_TTL", default_value = "30")]
    pub record_ttl: i64,

    /// Log output format (json, pretty)
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level filter (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl DnsSyncConfig {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn dns_settings(&self) -> DnsSettings {
        DnsSettings {
            hosted_zone_id: self.hosted_zone_id.clone(),
            record_ttl: self.record_ttl,
        }
    }

    pub fn display(&self) {
        info!(
            hosted_zone_id = %self.hosted_zone_id,
            record_ttl = self.record_ttl,
            log_format = %self.log_format,
            log_level = %self.log_level,
            "Configuration initialized"
        );
    }
}

/// DNS target settings threaded into the upsert path.
#[derive(Debug, Clone)]
pub struct DnsSettings {
    pub hosted_zone_id: String,
    pub record_ttl: i64,
}
