//! Per-field outcomes and the aggregated pass result.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::clients::RemoteVm;

/// Converged value of a field, or the provider's rejection message.
///
/// Serialises as the bare value or the bare message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue<T> {
    Value(T),
    Error(String),
}

impl<T> FieldValue<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, FieldValue::Error(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FieldValue::Value(v) => Some(v),
            FieldValue::Error(_) => None,
        }
    }
}

/// Result of converging one mutable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome<T> {
    pub changed: bool,
    pub value: FieldValue<T>,
}

impl<T> FieldOutcome<T> {
    pub fn unchanged(value: T) -> Self {
        Self {
            changed: false,
            value: FieldValue::Value(value),
        }
    }

    pub fn applied(value: T) -> Self {
        Self {
            changed: true,
            value: FieldValue::Value(value),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            changed: false,
            value: FieldValue::Error(message.into()),
        }
    }
}

/// Outcomes of the four mutable fields of an existing VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcomes {
    pub cpu: FieldOutcome<u32>,
    pub disk: FieldOutcome<u64>,
    pub memory: FieldOutcome<u64>,
    /// Reported as the converged list of public addresses.
    pub ip_count: FieldOutcome<Vec<String>>,
}

impl FieldOutcomes {
    pub fn changed(&self) -> bool {
        self.cpu.changed || self.disk.changed || self.memory.changed || self.ip_count.changed
    }

    pub fn failed(&self) -> bool {
        self.cpu.value.is_error()
            || self.disk.value.is_error()
            || self.memory.value.is_error()
            || self.ip_count.value.is_error()
    }

    /// Fold into the pass result for a VM that already existed.
    pub fn aggregate(self, vm: &RemoteVm) -> ReconcileResult {
        let changed = self.changed();
        let failed = self.failed();
        ReconcileResult {
            state: ResultState::Exist,
            changed,
            failed,
            vm: Some(VmReport {
                name: vm.name.clone(),
                private_ip: vm.private_ip_address.clone(),
                cpu: self.cpu.value,
                disk: self.disk.value,
                memory: self.memory.value,
                ip_count: self.ip_count.value,
            }),
        }
    }
}

/// Final state of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultState {
    Created,
    Exist,
    Removed,
    /// Delete was refused; carries the provider error text.
    Rejected(String),
}

impl ResultState {
    pub fn as_str(&self) -> &str {
        match self {
            ResultState::Created => "created",
            ResultState::Exist => "exist",
            ResultState::Removed => "removed",
            ResultState::Rejected(message) => message,
        }
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResultState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// VM attributes reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmReport {
    pub name: String,
    pub private_ip: Option<String>,
    pub cpu: FieldValue<u32>,
    pub disk: FieldValue<u64>,
    pub memory: FieldValue<u64>,
    pub ip_count: FieldValue<Vec<String>>,
}

impl From<&RemoteVm> for VmReport {
    fn from(vm: &RemoteVm) -> Self {
        Self {
            name: vm.name.clone(),
            private_ip: vm.private_ip_address.clone(),
            cpu: FieldValue::Value(vm.cpu),
            disk: FieldValue::Value(vm.disk),
            memory: FieldValue::Value(vm.memory),
            ip_count: FieldValue::Value(vm.ip_addresses.clone()),
        }
    }
}

/// Aggregated result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileResult {
    pub state: ResultState,
    pub changed: bool,
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm: Option<VmReport>,
}

impl ReconcileResult {
    pub fn created(vm: Option<VmReport>) -> Self {
        Self {
            state: ResultState::Created,
            changed: true,
            failed: false,
            vm,
        }
    }

    pub fn removed() -> Self {
        Self {
            state: ResultState::Removed,
            changed: true,
            failed: false,
            vm: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            state: ResultState::Rejected(message.into()),
            changed: false,
            failed: false,
            vm: None,
        }
    }
}
