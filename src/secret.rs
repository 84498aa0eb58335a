//! 1Password secret reference resolution.
//!
//! Auth values of the form `op://vault/item/field` are resolved at start-up
//! by shelling out to the 1Password CLI. Anything else passes through
//! untouched, so the caller never needs to know whether a value was a
//! reference.

use tokio::process::Command;
use tracing::debug;

use crate::error::SecretError;

/// Prefix marking a 1Password secret reference.
pub const SECRET_PREFIX: &str = "op://";

/// Resolves a possible secret reference.
///
/// Returns the resolved value and whether it actually was a reference.
///
/// # Errors
///
/// Returns an error when the value is a reference and the `op` CLI is
/// missing or the read fails.
pub async fn resolve_secret_reference(value: &str) -> Result<(String, bool), SecretError> {
    if !value.starts_with(SECRET_PREFIX) {
        return Ok((value.to_string(), false));
    }

    let output = Command::new("op")
        .arg("read")
        .arg(value)
        .output()
        .await
        .map_err(|source| SecretError::CliUnavailable { source })?;

    if !output.status.success() {
        return Err(SecretError::ReadFailed {
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!("resolved secret reference via 1Password CLI");
    Ok((
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
        true,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_value_passes_through() {
        let (value, was_secret) = resolve_secret_reference("my-token").await.unwrap();
        assert_eq!(value, "my-token");
        assert!(!was_secret);
    }

    #[tokio::test]
    async fn empty_value_passes_through() {
        let (value, was_secret) = resolve_secret_reference("").await.unwrap();
        assert_eq!(value, "");
        assert!(!was_secret);
    }
}
