use aws_config::BehaviorVersion;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::info;

use ec2_powercycle::config::PowerCycleConfig;
use ec2_powercycle::ec2::Ec2Client;
use ec2_powercycle::logging;
use ec2_powercycle::power_cycle;
use ec2_powercycle::response::HandlerResponse;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = PowerCycleConfig::from_args();
    logging::init(&config.log_format, &config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT"),
        build_date = env!("BUILD_DATE"),
        "EC2 PowerCycle handler starting"
    );
    config.display();

    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let sdk_config = &sdk_config;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| async move {
        handle(sdk_config, event).await
    }))
    .await
}

async fn handle(
    sdk_config: &aws_config::SdkConfig,
    event: LambdaEvent<Value>,
) -> Result<HandlerResponse, Error> {
    let payload = event.payload;
    info!(event = %payload, "Received event");

    let request = match power_cycle::parse_request(&payload) {
        Ok(request) => request,
        Err(response) => return Ok(response),
    };

    // The target region comes from the event, so the client is derived per
    // invocation rather than at startup.
    let ec2 = Ec2Client::new(sdk_config, &request.region);
    Ok(power_cycle::run(&ec2, &request).await)
}
