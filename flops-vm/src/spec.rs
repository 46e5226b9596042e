//! Desired VM spec as declared by the caller.
//!
//! Sizes are declared in gigabytes and normalised to mebibytes here, once,
//! so everything downstream compares provider-native MiB values.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SpecError;

pub const MAX_MEMORY_GB: f64 = 16.0;
pub const MAX_DISK_GB: u32 = 512;
pub const MAX_CPU_CORES: u32 = 12;
pub const MAX_PUBLIC_IPS: u32 = 2;

/// Convert gigabytes to mebibytes, truncating any fraction.
pub fn gb_to_mb(gb: f64) -> u64 {
    (gb * 1024.0) as u64
}

/// Lifecycle state the VM should end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl FromStr for DesiredState {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            other => Err(SpecError::InvalidState(other.to_string())),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

/// Declared VM. The name is the identity key on the provider side.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredSpec {
    pub name: String,
    pub state: DesiredState,
    pub memory_gb: f64,
    pub disk_gb: u32,
    pub cpu_cores: u32,
    pub public_ip_count: u32,
}

impl DesiredSpec {
    /// A spec with the provider defaults: 0.5 GB memory, 8 GB disk, 1 core, no public IP.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: DesiredState::Present,
            memory_gb: 0.5,
            disk_gb: 8,
            cpu_cores: 1,
            public_ip_count: 0,
        }
    }

    pub fn memory_mb(&self) -> u64 {
        gb_to_mb(self.memory_gb)
    }

    pub fn disk_mb(&self) -> u64 {
        gb_to_mb(f64::from(self.disk_gb))
    }

    /// Check the provider-imposed bounds.
    ///
    /// The reconciler never calls this. The host validates before handing a `DesiredSpec` over.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }

        let limits = [
            ("memory", self.memory_gb, MAX_MEMORY_GB),
            ("disk", f64::from(self.disk_gb), f64::from(MAX_DISK_GB)),
            ("cpu", f64::from(self.cpu_cores), f64::from(MAX_CPU_CORES)),
        ];
        for (field, value, max) in limits {
            if value <= 0.0 {
                return Err(SpecError::NotPositive { field, value });
            }
            if value > max {
                return Err(SpecError::TooLarge { field, max, value });
            }
        }

        if self.public_ip_count > MAX_PUBLIC_IPS {
            return Err(SpecError::TooLarge {
                field: "ip_count",
                max: f64::from(MAX_PUBLIC_IPS),
                value: f64::from(self.public_ip_count),
            });
        }

        Ok(())
    }
}
