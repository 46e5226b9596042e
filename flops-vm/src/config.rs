//! Credentials and tunables for a reconciliation pass.

use std::fmt;
use std::time::Duration;

/// Default provider endpoint.
pub const DEFAULT_API_URL: &str = "https://api.flops.ru/api/v1";

/// Ubuntu 16.04 x64.
pub const DEFAULT_DISTRIBUTION_ID: u64 = 316;

/// The "custom VM" tariff, which allows arbitrary sizing.
pub const DEFAULT_TARIFF_ID: u64 = 1;

/// Interval used both for operation polling and the post-shrink settle pause.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Account credentials for the provider API.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub client_id: String,
    pub tenant_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// Values the create call needs that the desired spec does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateDefaults {
    pub distribution_id: u64,
    pub tariff_id: u64,
}

impl Default for CreateDefaults {
    fn default() -> Self {
        Self {
            distribution_id: DEFAULT_DISTRIBUTION_ID,
            tariff_id: DEFAULT_TARIFF_ID,
        }
    }
}

/// Knobs for [`crate::reconciler::vm::VmReconciler`].
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Delay between polls of a pending operation.
    pub poll_interval: Duration,
    /// Pause after a memory shrink that may reboot the VM.
    pub settle_pause: Duration,
    /// Public keys to resolve and install on create.
    pub public_key_names: Vec<String>,
    pub create: CreateDefaults,
    /// Compute and report changes without issuing any mutation.
    pub check_mode: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_WAIT,
            settle_pause: DEFAULT_WAIT,
            public_key_names: Vec::new(),
            create: CreateDefaults::default(),
            check_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_api_key() {
        let creds = Credentials {
            api_key: "s3cr3t".to_string(),
            client_id: "42".to_string(),
            tenant_id: "7".to_string(),
        };
        let out = format!("{:?}", creds);
        assert!(!out.contains("s3cr3t"));
        assert!(out.contains("<redacted>"));
        assert!(out.contains("42"));
    }
}
