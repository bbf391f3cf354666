//! Custom error types for the PowerCycle and DNS-Sync handlers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the EC2 and Route 53 client wrappers.
#[derive(Error, Debug)]
pub enum Error {
    /// The service rejected the call with a typed error code.
    #[error("[{component}] AWS API error [{code}]: {message}")]
    Api {
        component: String,
        code: String,
        message: String,
    },

    /// The call failed without a typed service response (connect, timeout,
    /// request construction).
    #[error("[{0}] {1}")]
    Sdk(String, String),
}

impl Error {
    /// Classify an AWS SDK error. Errors carrying a service error code become
    /// [`Error::Api`] with the upstream code and message; everything else is
    /// folded into [`Error::Sdk`] with the best message available.
    pub fn aws<E: std::fmt::Debug + std::fmt::Display>(component: &str, err: E) -> Self {
        let debug_str = format!("{err:?}");
        let message = extract_error_message(&debug_str, &err.to_string());

        match extract_quoted_field(&debug_str, "code") {
            Some(code) => Error::Api {
                component: component.to_string(),
                code,
                message,
            },
            None => Error::Sdk(component.to_string(), message),
        }
    }
}

/// Pull the human-readable message out of an SDK error. The Debug rendering
/// carries `message: Some("...")` for service errors, while the Display
/// rendering of the wrapper types is often just "service error".
fn extract_error_message(debug_str: &str, display_str: &str) -> String {
    if let Some(message) = extract_quoted_field(debug_str, "message") {
        return message;
    }

    if !display_str.to_lowercase().contains("service error") {
        return display_str.to_string();
    }

    "AWS API request failed".to_string()
}

fn extract_quoted_field(debug_str: &str, field: &str) -> Option<String> {
    let marker = format!("{field}: Some(\"");
    let start = debug_str.find(&marker)? + marker.len();
    let end = debug_str[start..].find('"')?;
    Some(debug_str[start..start + end].to_string())
}
