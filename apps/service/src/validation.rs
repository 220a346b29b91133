use anyhow::{Result, anyhow};
use std::net::IpAddr;
use url::Url;

/// Validation results with specific error messages
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { is_valid: true, error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(msg.into()) }
    }

    pub fn to_result(&self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(anyhow!(self.error.clone().unwrap_or_else(|| "Validation failed".to_string())))
        }
    }
}

/// Validate a diagnostic target (IP address or hostname).
///
/// The value ends up as an argument to `ping`/`traceroute`, so anything that
/// could be read as a flag is refused.
pub fn validate_host(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("Target cannot be empty");
    }

    if target.parse::<IpAddr>().is_ok() {
        return ValidationResult::ok();
    }

    if target.chars().any(char::is_whitespace) {
        return ValidationResult::err("Target cannot contain spaces");
    }

    if target.starts_with('-') || target.ends_with('-') {
        return ValidationResult::err("Hostname cannot start or end with hyphen");
    }

    if target.len() > 253 {
        return ValidationResult::err("Hostname too long (max 253 characters)");
    }

    // a single trailing dot is the fully-qualified form
    let name = target.strip_suffix('.').unwrap_or(target);
    if name.split('.').any(|label| label.is_empty() || label.len() > 63) {
        return ValidationResult::err("Hostname labels must be 1 to 63 characters");
    }

    if target.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        ValidationResult::ok()
    } else {
        ValidationResult::err("Invalid hostname. Use IP address or valid hostname")
    }
}

/// Validate an HTTP/HTTPS URL used by the speed probe
pub fn validate_probe_url(target: &str) -> ValidationResult {
    if target.trim().is_empty() {
        return ValidationResult::err("URL cannot be empty");
    }

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return ValidationResult::err(format!(
                    "Invalid scheme '{scheme}'. Must be http or https"
                ));
            }

            if url.host_str().is_none() {
                return ValidationResult::err("URL must have a valid host");
            }

            ValidationResult::ok()
        }
        Err(e) => {
            if !target.contains("://") {
                ValidationResult::err("URL must include scheme (http:// or https://)")
            } else {
                ValidationResult::err(format!("Invalid URL: {e}"))
            }
        }
    }
}

/// Validate the sampling interval
pub fn validate_interval(interval: i64) -> ValidationResult {
    if interval <= 0 {
        return ValidationResult::err("Interval must be a positive number of seconds");
    }

    ValidationResult::ok()
}
