use aws_config::BehaviorVersion;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::info;

use ec2_powercycle::config::{DnsSettings, DnsSyncConfig};
use ec2_powercycle::dns_sync;
use ec2_powercycle::ec2::Ec2Client;
use ec2_powercycle::logging;
use ec2_powercycle::response::HandlerResponse;
use ec2_powercycle::route53::Route53Client;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = DnsSyncConfig::from_args();
    logging::init(&config.log_format, &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT"),
        build_date = env!("BUILD_DATE"),
        "EC2 DNS-Sync handler starting"
    );
    config.display();

    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let sdk_config = &sdk_config;
    let settings = config.dns_settings();
    let settings = &settings;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle(sdk_config, settings, event).await
    }))
    .await
}

async fn handle(
    sdk_config: &aws_config::SdkConfig,
    settings: &DnsSettings,
    event: LambdaEvent<Value>,
) -> Result<HandlerResponse, Error> {
    let payload = event.payload;
    info!(event = %payload, "Received event");

    let parsed = match dns_sync::parse_event(&payload) {
        Ok(parsed) => parsed,
        Err(response) => return Ok(response),
    };

    // The instance region comes from the notification; Route 53 is global.
    let ec2 = Ec2Client::new(sdk_config, &parsed.region);
    let dns = Route53Client::new(sdk_config);
    Ok(dns_sync::run(&ec2, &dns, settings, &parsed, &payload).await)
}
