//! # Kubernetes Validation
//!
//! Validates Kubernetes resource names, namespaces and Secret data keys.

use anyhow::Result;
use regex::Regex;

/// Validate Kubernetes resource name (RFC 1123 subdomain)
/// Format: lowercase alphanumeric, hyphens, dots
/// Length: 1-253 characters
pub fn validate_kubernetes_name(name: &str, field_name: &str) -> Result<()> {
    let name_trimmed = name.trim();

    if name_trimmed.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    if name_trimmed.len() > 253 {
        return Err(anyhow::anyhow!(
            "{field_name} '{name_trimmed}' exceeds maximum length of 253 characters (got {})",
            name_trimmed.len()
        ));
    }

    let name_regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !name_regex.is_match(name_trimmed) {
        return Err(anyhow::anyhow!(
            "{field_name} '{name_trimmed}' must be a valid Kubernetes name (lowercase alphanumeric, hyphens, dots; cannot start/end with hyphen or dot)"
        ));
    }

    Ok(())
}

/// Validate Kubernetes namespace (RFC 1123 label)
/// Length: 1-63 characters
pub fn validate_kubernetes_namespace(namespace: &str, field_name: &str) -> Result<()> {
    let namespace_trimmed = namespace.trim();

    if namespace_trimmed.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    if namespace_trimmed.len() > 63 {
        return Err(anyhow::anyhow!(
            "{field_name} '{namespace_trimmed}' exceeds maximum length of 63 characters (got {})",
            namespace_trimmed.len()
        ));
    }

    let namespace_regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !namespace_regex.is_match(namespace_trimmed) {
        return Err(anyhow::anyhow!(
            "{field_name} '{namespace_trimmed}' must be a valid Kubernetes namespace (lowercase alphanumeric, hyphens; cannot start/end with hyphen)"
        ));
    }

    Ok(())
}

/// Validate a Secret data key
/// Format: alphanumeric, '-', '_', '.'
/// Length: 1-253 characters
pub fn validate_secret_data_key(key: &str, field_name: &str) -> Result<()> {
    if key.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    if key.len() > 253 {
        return Err(anyhow::anyhow!(
            "{field_name} exceeds maximum length of 253 characters (got {})",
            key.len()
        ));
    }

    let key_regex = Regex::new(r"^[-._a-zA-Z0-9]+$")
        .map_err(|e| anyhow::anyhow!("Failed to compile regex: {e}"))?;

    if !key_regex.is_match(key) {
        return Err(anyhow::anyhow!(
            "{field_name} '{key}' must contain only alphanumeric characters, '-', '_' or '.'"
        ));
    }

    Ok(())
}
