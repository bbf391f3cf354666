//! PowerCycle handler: request validation, selector resolution, and the
//! start/stop fan-out with per-instance failure tracking.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::ec2::Ec2Api;
use crate::error::Error;
use crate::response::{FailedInstance, HandlerResponse, Operation, PowerCycleReport};

static INSTANCE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^i-[0-9a-f]{17}$").expect("instance ID pattern compiles"));

const INVALID_FORMAT_REASON: &str =
    "Invalid EC2 instance ID format (must be i-xxxxxxxxxxxxxxxxx)";

/// Instance states eligible for each operation when the selector is "all".
const START_ELIGIBLE_STATES: &[&str] = &["stopped", "stopping"];
const STOP_ELIGIBLE_STATES: &[&str] = &["running", "pending"];

/// Validated bulk power request. `instances` holds the raw selector: the
/// literal "all" or a comma-separated ID list, trimmed but not yet split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerRequest {
    pub region: String,
    pub operation: Operation,
    pub instances: String,
}

/// Field-by-field validation of the inbound event. Checks run in order and
/// fail fast, so the first violated rule determines the 400 message.
pub fn parse_request(event: &Value) -> Result<PowerRequest, HandlerResponse> {
    let region = match event.get("region").and_then(Value::as_str).map(str::trim) {
        Some(region) if !region.is_empty() => region.to_string(),
        _ => return Err(validation_error("Missing or invalid 'region' in event.")),
    };

    let operation = match event
        .get("operation")
        .and_then(Value::as_str)
        .and_then(Operation::parse)
    {
        Some(operation) => operation,
        None => {
            return Err(validation_error(
                "Missing or invalid 'operation' in event. Must be 'start' or 'stop'.",
            ));
        }
    };

    let instances = match event.get("instances").and_then(Value::as_str).map(str::trim) {
        Some(instances) if !instances.is_empty() => instances.to_string(),
        _ => {
            return Err(validation_error(
                "Missing or invalid 'instances' in event. Must be 'all' or a comma-separated list of EC2 instance IDs.",
            ));
        }
    };

    Ok(PowerRequest {
        region,
        operation,
        instances,
    })
}

/// Execute a validated request: resolve the selector, fan out the start or
/// stop calls strictly in sequence, and fold the outcomes into a response.
pub async fn run(ec2: &impl Ec2Api, request: &PowerRequest) -> HandlerResponse {
    let (to_process, format_failures) = if request.instances.eq_ignore_ascii_case("all") {
        match select_by_state(ec2, request.operation, &request.region).await {
            Ok(selected) if selected.is_empty() => {
                warn!(
                    operation = %request.operation,
                    region = %request.region,
                    "No instances found in a suitable state for operation"
                );
                return HandlerResponse::new(
                    200,
                    &PowerCycleReport {
                        message: format!(
                            "No instances found in suitable state for '{}' operation in region '{}'.",
                            request.operation, request.region
                        ),
                        operation: request.operation,
                        successful_instances: Vec::new(),
                        failed_instances: Vec::new(),
                        region: request.region.clone(),
                    },
                );
            }
            Ok(selected) => (selected, Vec::new()),
            Err(Error::Api { code, message, .. }) => {
                error!(
                    region = %request.region,
                    error_code = %code,
                    error_message = %message,
                    "AWS API Error listing all instances"
                );
                return HandlerResponse::new(
                    500,
                    &json!({
                        "message": format!(
                            "Failed to list all instances in {}: {}",
                            request.region, message
                        ),
                    }),
                );
            }
            Err(other) => {
                error!(
                    region = %request.region,
                    error = %other,
                    "Unexpected error listing all instances"
                );
                return HandlerResponse::new(
                    500,
                    &json!({
                        "message": format!(
                            "Unexpected error listing all instances in {}: {}",
                            request.region, other
                        ),
                    }),
                );
            }
        }
    } else {
        let (valid, invalid) = partition_instance_ids(&request.instances);
        if valid.is_empty() && invalid.is_empty() {
            return validation_error("No valid EC2 instance IDs provided for processing.");
        }
        if valid.is_empty() {
            error!(
                invalid_count = invalid.len(),
                "Validation Error: All provided EC2 instance IDs had an invalid format"
            );
            return HandlerResponse::new(
                400,
                &json!({
                    "message": "All provided EC2 instance IDs had an invalid format.",
                    "invalid_instances": invalid,
                }),
            );
        }
        (valid, invalid)
    };

    info!(
        instance_count = to_process.len(),
        operation = %request.operation,
        region = %request.region,
        "Attempting operation for validated instances"
    );

    let mut successful = Vec::new();
    let mut failed = format_failures;

    for instance_id in &to_process {
        let outcome = match request.operation {
            Operation::Start => ec2.start_instance(instance_id).await,
            Operation::Stop => ec2.stop_instance(instance_id).await,
        };

        match outcome {
            Ok(()) => {
                info!(
                    instance_id = %instance_id,
                    operation = %request.operation,
                    "Successfully initiated operation for instance"
                );
                successful.push(instance_id.clone());
            }
            Err(err) => {
                error!(
                    instance_id = %instance_id,
                    operation = %request.operation,
                    error = %err,
                    "Failed to initiate operation for instance"
                );
                failed.push(FailedInstance {
                    instance_id: instance_id.clone(),
                    reason: failure_reason(&err),
                });
            }
        }
    }

    let (status_code, message) =
        aggregate_outcome(request.operation, successful.len(), failed.len());
    info!(status_code, message = %message, "Function execution completed");

    HandlerResponse::new(
        status_code,
        &PowerCycleReport {
            message,
            operation: request.operation,
            successful_instances: successful,
            failed_instances: failed,
            region: request.region.clone(),
        },
    )
}

/// Resolve the "all" selector: list every instance in the region and keep
/// those whose current state is eligible for the operation.
async fn select_by_state(
    ec2: &impl Ec2Api,
    operation: Operation,
    region: &str,
) -> Result<Vec<String>, Error> {
    info!(
        operation = %operation,
        region = %region,
        "Operation requested for ALL EC2 instances in region"
    );

    let mut selected = Vec::new();
    for instance in ec2.list_instances().await? {
        if eligible_states(operation).contains(&instance.state.as_str()) {
            selected.push(instance.instance_id);
        } else {
            info!(
                instance_id = %instance.instance_id,
                state = %instance.state,
                operation = %operation,
                "Skipping instance in unsuitable state for operation"
            );
        }
    }

    Ok(selected)
}

const fn eligible_states(operation: Operation) -> &'static [&'static str] {
    match operation {
        Operation::Start => START_ELIGIBLE_STATES,
        Operation::Stop => STOP_ELIGIBLE_STATES,
    }
}

/// Split a comma-separated selector into valid IDs and per-token format
/// failures. Empty tokens are dropped silently.
fn partition_instance_ids(input: &str) -> (Vec<String>, Vec<FailedInstance>) {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for token in input.split(',') {
        let candidate = token.trim();
        if candidate.is_empty() {
            continue;
        }

        if INSTANCE_ID_PATTERN.is_match(candidate) {
            valid.push(candidate.to_string());
        } else {
            warn!(instance_id = %candidate, "Skipping instance ID with invalid format");
            invalid.push(FailedInstance {
                instance_id: candidate.to_string(),
                reason: INVALID_FORMAT_REASON.to_string(),
            });
        }
    }

    (valid, invalid)
}

fn failure_reason(err: &Error) -> String {
    match err {
        Error::Api { code, message, .. } => format!("AWS API Error: [{code}] {message}"),
        other => format!("Unexpected error: {other}"),
    }
}

/// Decision table for the final status code and message. Zero successes
/// with at least one failure is a total failure (500); every other mix is
/// a 200, with the message distinguishing full from partial success.
fn aggregate_outcome(operation: Operation, successes: usize, failures: usize) -> (u16, String) {
    match (successes, failures) {
        (0, failures) if failures > 0 => (
            500,
            format!(
                "Failed to {operation} any of the specified instances. Check 'failed_instances' for details."
            ),
        ),
        (successes, failures) if successes > 0 && failures > 0 => (
            200,
            format!(
                "Successfully initiated {operation} for some instances, others failed. Check results for details."
            ),
        ),
        _ => (
            200,
            format!("Successfully initiated {operation} for all specified instances."),
        ),
    }
}

fn validation_error(message: &str) -> HandlerResponse {
    error!("Validation Error: {message}");
    HandlerResponse::new(400, &json!({ "message": message }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::ec2::{InstanceDetail, InstanceSummary};
    use crate::error::Result;

    #[derive(Default)]
    struct FakeEc2 {
        instances: Vec<InstanceSummary>,
        list_fails: bool,
        list_fails_untyped: bool,
        failing_instances: Vec<(String, String, String)>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeEc2 {
        fn with_instances(states: &[(&str, &str)]) -> Self {
            Self {
                instances: states
                    .iter()
                    .map(|(instance_id, state)| InstanceSummary {
                        instance_id: instance_id.to_string(),
                        state: state.to_string(),
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn failing_for(mut self, instance_id: &str, code: &str, message: &str) -> Self {
            self.failing_instances.push((
                instance_id.to_string(),
                code.to_string(),
                message.to_string(),
            ));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("poisoned mutex").clone()
        }

        fn power_call(&self, action: &str, instance_id: &str) -> Result<()> {
            self.calls
                .lock()
                .expect("poisoned mutex")
                .push(format!("{action}:{instance_id}"));

            if let Some((_, code, message)) = self
                .failing_instances
                .iter()
                .find(|(failing_id, _, _)| failing_id == instance_id)
            {
                return Err(Error::Api {
                    component: "test".to_string(),
                    code: code.clone(),
                    message: message.clone(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Ec2Api for FakeEc2 {
        async fn list_instances(&self) -> Result<Vec<InstanceSummary>> {
            self.calls.lock().expect("poisoned mutex").push("list".to_string());

            if self.list_fails {
                return Err(Error::Api {
                    component: "test".to_string(),
                    code: "UnauthorizedOperation".to_string(),
                    message: "You are not authorized to perform this operation.".to_string(),
                });
            }
            if self.list_fails_untyped {
                return Err(Error::Sdk("test".to_string(), "request has timed out".to_string()));
            }
            Ok(self.instances.clone())
        }

        async fn describe_instance(&self, _instance_id: &str) -> Result<Vec<InstanceDetail>> {
            Ok(Vec::new())
        }

        async fn start_instance(&self, instance_id: &str) -> Result<()> {
            self.power_call("start", instance_id)
        }

        async fn stop_instance(&self, instance_id: &str) -> Result<()> {
            self.power_call("stop", instance_id)
        }
    }

    fn request(region: &str, operation: Operation, instances: &str) -> PowerRequest {
        PowerRequest {
            region: region.to_string(),
            operation,
            instances: instances.to_string(),
        }
    }

    fn body(response: &HandlerResponse) -> Value {
        serde_json::from_str(&response.body).expect("body should be valid JSON")
    }

    mod parse {
        use super::*;

        #[test]
        fn test_missing_region_returns_400() {
            let response = parse_request(&json!({ "operation": "start", "instances": "all" }))
                .expect_err("missing region must fail validation");

            assert_eq!(response.status_code, 400);
            assert_eq!(body(&response)["message"], "Missing or invalid 'region' in event.");
        }

        #[test]
        fn test_blank_or_non_string_region_returns_400() {
            for region in [json!("   "), json!(42), json!(null)] {
                let event = json!({ "region": region.clone(), "operation": "start", "instances": "all" });
                let response =
                    parse_request(&event).expect_err("unusable region must fail validation");
                assert_eq!(response.status_code, 400, "rejected region: {region}");
            }
        }

        #[test]
        fn test_unknown_operation_returns_400() {
            let event =
                json!({ "region": "eu-west-1", "operation": "reboot", "instances": "all" });
            let response = parse_request(&event).expect_err("unknown operation must fail");

            assert_eq!(response.status_code, 400);
            assert_eq!(
                body(&response)["message"],
                "Missing or invalid 'operation' in event. Must be 'start' or 'stop'."
            );
        }

        #[test]
        fn test_operation_is_case_sensitive() {
            let event = json!({ "region": "eu-west-1", "operation": "Start", "instances": "all" });
            parse_request(&event).expect_err("capitalized operation must be rejected");
        }

        #[test]
        fn test_blank_instances_returns_400_before_any_api_call() {
            let event = json!({ "region": "eu-west-1", "operation": "stop", "instances": "  " });
            let response = parse_request(&event).expect_err("blank instances must fail");

            assert_eq!(response.status_code, 400);
            assert_eq!(
                body(&response)["message"],
                "Missing or invalid 'instances' in event. Must be 'all' or a comma-separated list of EC2 instance IDs."
            );
        }

        #[test]
        fn test_valid_request_is_trimmed() {
            let event = json!({
                "region": " eu-west-1 ",
                "operation": "stop",
                "instances": " i-0123456789abcdef0 ",
            });

            let parsed = parse_request(&event).expect("valid request should parse");
            assert_eq!(
                parsed,
                request("eu-west-1", Operation::Stop, "i-0123456789abcdef0")
            );
        }
    }

    mod selectors {
        use super::*;

        #[test]
        fn test_partition_mixed_list() {
            let (valid, invalid) = partition_instance_ids(
                "i-0123456789abcdef0, bad-id, ,i-00000000000000000",
            );

            assert_eq!(valid, vec!["i-0123456789abcdef0", "i-00000000000000000"]);
            assert_eq!(invalid.len(), 1, "empty tokens are dropped, not failed");
            assert_eq!(invalid[0].instance_id, "bad-id");
            assert_eq!(invalid[0].reason, INVALID_FORMAT_REASON);
        }

        #[test]
        fn test_partition_rejects_malformed_ids() {
            let malformed = [
                "i-0123456789ABCDEF0",
                "i-0123456789abcdef",
                "i-0123456789abcdef01",
                "0123456789abcdef0",
                "i-0123456789abcdeg0",
            ];

            for candidate in malformed {
                let (valid, invalid) = partition_instance_ids(candidate);
                assert!(valid.is_empty(), "{candidate} must not validate");
                assert_eq!(invalid.len(), 1);
            }
        }

        #[test]
        fn test_eligible_states_per_operation() {
            assert_eq!(eligible_states(Operation::Start), &["stopped", "stopping"]);
            assert_eq!(eligible_states(Operation::Stop), &["running", "pending"]);
        }
    }

    mod aggregation {
        use super::*;

        #[test]
        fn test_decision_table() {
            let (code, message) = aggregate_outcome(Operation::Stop, 0, 2);
            assert_eq!(code, 500, "zero successes with failures is a total failure");
            assert_eq!(
                message,
                "Failed to stop any of the specified instances. Check 'failed_instances' for details."
            );

            let (code, message) = aggregate_outcome(Operation::Start, 1, 1);
            assert_eq!(code, 200, "partial success still reports 200");
            assert_eq!(
                message,
                "Successfully initiated start for some instances, others failed. Check results for details."
            );

            let (code, message) = aggregate_outcome(Operation::Start, 3, 0);
            assert_eq!(code, 200);
            assert_eq!(message, "Successfully initiated start for all specified instances.");
        }
    }

    mod handler {
        use super::*;

        #[tokio::test]
        async fn test_start_all_selects_only_stopped_and_stopping() {
            let ec2 = FakeEc2::with_instances(&[
                ("i-aaaaaaaaaaaaaaaaa", "running"),
                ("i-bbbbbbbbbbbbbbbbb", "stopped"),
                ("i-ccccccccccccccccc", "stopping"),
                ("i-ddddddddddddddddd", "pending"),
                ("i-eeeeeeeeeeeeeeeee", "terminated"),
            ]);

            let response = run(&ec2, &request("eu-west-1", Operation::Start, "all")).await;

            assert_eq!(response.status_code, 200);
            assert_eq!(
                ec2.calls(),
                vec!["list", "start:i-bbbbbbbbbbbbbbbbb", "start:i-ccccccccccccccccc"],
                "only stopped and stopping instances may be started"
            );
            let body = body(&response);
            assert_eq!(
                body["successful_instances"],
                json!(["i-bbbbbbbbbbbbbbbbb", "i-ccccccccccccccccc"])
            );
            assert_eq!(body["failed_instances"], json!([]));
        }

        #[tokio::test]
        async fn test_stop_all_selects_only_running_and_pending() {
            let ec2 = FakeEc2::with_instances(&[
                ("i-aaaaaaaaaaaaaaaaa", "running"),
                ("i-bbbbbbbbbbbbbbbbb", "stopped"),
                ("i-ddddddddddddddddd", "pending"),
            ]);

            let response = run(&ec2, &request("eu-west-1", Operation::Stop, "all")).await;

            assert_eq!(response.status_code, 200);
            assert_eq!(
                ec2.calls(),
                vec!["list", "stop:i-aaaaaaaaaaaaaaaaa", "stop:i-ddddddddddddddddd"]
            );
        }

        #[tokio::test]
        async fn test_all_selector_is_case_insensitive() {
            let ec2 = FakeEc2::with_instances(&[("i-aaaaaaaaaaaaaaaaa", "running")]);

            let response = run(&ec2, &request("eu-west-1", Operation::Stop, "ALL")).await;

            assert_eq!(response.status_code, 200);
            assert!(
                ec2.calls().contains(&"list".to_string()),
                "'ALL' must resolve through the state filter"
            );
        }

        #[tokio::test]
        async fn test_all_with_empty_selection_returns_200_noop() {
            let ec2 = FakeEc2::with_instances(&[("i-aaaaaaaaaaaaaaaaa", "terminated")]);

            let response = run(&ec2, &request("eu-west-1", Operation::Start, "all")).await;

            assert_eq!(response.status_code, 200, "an empty selection is not an error");
            let body = body(&response);
            assert_eq!(
                body["message"],
                "No instances found in suitable state for 'start' operation in region 'eu-west-1'."
            );
            assert_eq!(body["successful_instances"], json!([]));
            assert_eq!(body["failed_instances"], json!([]));
            assert_eq!(body["region"], "eu-west-1");
            assert_eq!(ec2.calls(), vec!["list"], "no power calls on an empty selection");
        }

        #[tokio::test]
        async fn test_all_with_empty_account_returns_200() {
            let ec2 = FakeEc2::default();

            let response = run(&ec2, &request("eu-west-1", Operation::Start, "all")).await;

            assert_eq!(response.status_code, 200);
            let body = body(&response);
            assert_eq!(body["successful_instances"], json!([]));
            assert_eq!(body["failed_instances"], json!([]));
        }

        #[tokio::test]
        async fn test_listing_failure_returns_500() {
            let ec2 = FakeEc2 {
                list_fails: true,
                ..FakeEc2::default()
            };

            let response = run(&ec2, &request("eu-west-1", Operation::Stop, "all")).await;

            assert_eq!(response.status_code, 500);
            assert_eq!(
                body(&response)["message"],
                "Failed to list all instances in eu-west-1: You are not authorized to perform this operation."
            );
            assert_eq!(ec2.calls(), vec!["list"]);
        }

        #[tokio::test]
        async fn test_untyped_listing_failure_returns_500() {
            let ec2 = FakeEc2 {
                list_fails_untyped: true,
                ..FakeEc2::default()
            };

            let response = run(&ec2, &request("eu-west-1", Operation::Stop, "all")).await;

            assert_eq!(response.status_code, 500);
            let message = body(&response)["message"]
                .as_str()
                .expect("message should be a string")
                .to_string();
            assert!(
                message.starts_with("Unexpected error listing all instances in eu-west-1:"),
                "got: {message}"
            );
        }

        #[tokio::test]
        async fn test_mixed_valid_and_invalid_ids() {
            let ec2 = FakeEc2::default();

            let response = run(
                &ec2,
                &request("eu-west-1", Operation::Stop, "i-0123456789abcdef0,bad-id"),
            )
            .await;

            assert_eq!(
                ec2.calls(),
                vec!["stop:i-0123456789abcdef0"],
                "exactly one stop call for the single valid ID"
            );
            assert_eq!(response.status_code, 200);
            let body = body(&response);
            assert_eq!(body["successful_instances"], json!(["i-0123456789abcdef0"]));
            assert_eq!(body["failed_instances"][0]["instance_id"], "bad-id");
            assert_eq!(body["failed_instances"][0]["reason"], INVALID_FORMAT_REASON);
            assert_eq!(
                body["message"],
                "Successfully initiated stop for some instances, others failed. Check results for details."
            );
        }

        #[tokio::test]
        async fn test_all_ids_invalid_returns_400() {
            let ec2 = FakeEc2::default();

            let response =
                run(&ec2, &request("eu-west-1", Operation::Start, "bad-id,also-bad")).await;

            assert_eq!(response.status_code, 400);
            let body = body(&response);
            assert_eq!(body["message"], "All provided EC2 instance IDs had an invalid format.");
            assert_eq!(
                body["invalid_instances"].as_array().map(Vec::len),
                Some(2),
                "every rejected ID must be reported"
            );
            assert!(ec2.calls().is_empty(), "no API calls for an all-invalid list");
        }

        #[tokio::test]
        async fn test_only_separators_returns_400() {
            let ec2 = FakeEc2::default();

            let response = run(&ec2, &request("eu-west-1", Operation::Start, ",,,")).await;

            assert_eq!(response.status_code, 400);
            assert_eq!(
                body(&response)["message"],
                "No valid EC2 instance IDs provided for processing."
            );
            assert!(ec2.calls().is_empty());
        }

        #[tokio::test]
        async fn test_every_call_failing_returns_500() {
            let ec2 = FakeEc2::default()
                .failing_for("i-0123456789abcdef0", "IncorrectInstanceState", "not in a state")
                .failing_for("i-0123456789abcdef1", "IncorrectInstanceState", "not in a state");

            let response = run(
                &ec2,
                &request(
                    "eu-west-1",
                    Operation::Start,
                    "i-0123456789abcdef0,i-0123456789abcdef1",
                ),
            )
            .await;

            assert_eq!(response.status_code, 500);
            assert_eq!(
                ec2.calls().len(),
                2,
                "execution must continue past a failed instance"
            );
            let body = body(&response);
            assert_eq!(
                body["message"],
                "Failed to start any of the specified instances. Check 'failed_instances' for details."
            );
            assert_eq!(
                body["failed_instances"][0]["reason"],
                "AWS API Error: [IncorrectInstanceState] not in a state"
            );
        }

        #[tokio::test]
        async fn test_every_call_succeeding_returns_200() {
            let ec2 = FakeEc2::default();

            let response = run(
                &ec2,
                &request(
                    "eu-west-1",
                    Operation::Stop,
                    "i-0123456789abcdef0,i-0123456789abcdef1",
                ),
            )
            .await;

            assert_eq!(response.status_code, 200);
            let body = body(&response);
            assert_eq!(
                body["message"],
                "Successfully initiated stop for all specified instances."
            );
            assert_eq!(body["operation"], "stop");
            assert_eq!(body["region"], "eu-west-1");
            assert_eq!(body["failed_instances"], json!([]));
        }
    }
}
