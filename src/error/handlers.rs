//! Standardized classification of HTTP and network failures

use crate::error::RegistryError;
use reqwest::StatusCode;

/// Maximum number of body characters carried into an error message
const MAX_ERROR_BODY: usize = 200;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Map a non-2xx registry response to a transport error
    pub fn handle_registry_error(
        status: StatusCode,
        error_text: &str,
        operation: &str,
    ) -> RegistryError {
        let error_text = truncate_body(error_text);
        let error_msg = match status.as_u16() {
            401 => format!(
                "Unauthorized to perform {} operation: {}",
                operation, error_text
            ),
            403 => format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            ),
            404 => format!("Resource not found for {}: {}", operation, error_text),
            429 => format!("Rate limited during {}: {}", operation, error_text),
            500 => format!("Registry server error during {}: {}", operation, error_text),
            502 | 503 => format!("Registry unavailable for {}: {}", operation, error_text),
            504 => format!("Registry gateway timeout during {}: {}", operation, error_text),
            _ => format!("{} failed (status {}): {}", operation, status, error_text),
        };

        RegistryError::Transport(error_msg)
    }

    /// Map a non-2xx token endpoint response to an auth error
    pub fn handle_auth_error(status: StatusCode, error_text: &str) -> RegistryError {
        let error_msg = match status.as_u16() {
            400 => "Invalid token request parameters".to_string(),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!(
                "Token request failed (status {}): {}",
                status,
                truncate_body(error_text)
            ),
        };

        RegistryError::Auth(error_msg)
    }
}

/// Network error handler for reqwest failures
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    pub fn handle_network_error(err: &reqwest::Error, context: &str) -> RegistryError {
        let error_msg = if err.is_timeout() {
            format!("Request timed out during {}: {}", context, err)
        } else if err.is_connect() {
            format!("Failed to connect to registry during {}: {}", context, err)
        } else if err.is_body() || err.is_decode() {
            format!("Failed to read response body during {}: {}", context, err)
        } else {
            format!("Network error during {}: {}", context, err)
        };

        RegistryError::Transport(error_msg)
    }
}

fn truncate_body(body: &str) -> &str {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &trimmed[..idx],
        None => trimmed,
    }
}
