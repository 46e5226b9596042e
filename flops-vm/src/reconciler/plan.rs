//! Field-by-field diff between a desired spec and a remote VM.
//!
//! Each field is decided on its own; a `None` entry means the field already
//! matches and no call is issued for it.

use crate::clients::RemoteVm;
use crate::spec::DesiredSpec;

/// Memory resize. Shrinking needs a reboot on this provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryChange {
    pub target_mb: u64,
    pub allow_restart: bool,
}

/// Public IP convergence: one provider call per unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpChange {
    /// Number of addresses to add.
    Add(u32),
    /// Addresses to release, taken from the head of the current list.
    Remove(Vec<String>),
}

impl IpChange {
    pub fn units(&self) -> usize {
        match self {
            IpChange::Add(n) => *n as usize,
            IpChange::Remove(ips) => ips.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmPlan {
    pub cpu: Option<u32>,
    pub disk_mb: Option<u64>,
    pub memory: Option<MemoryChange>,
    pub ips: Option<IpChange>,
}

impl VmPlan {
    pub fn between(desired: &DesiredSpec, current: &RemoteVm) -> Self {
        let cpu = (desired.cpu_cores != current.cpu).then_some(desired.cpu_cores);

        let disk_mb = Some(desired.disk_mb()).filter(|mb| *mb != current.disk);

        let memory_mb = desired.memory_mb();
        let memory = (memory_mb != current.memory).then(|| MemoryChange {
            target_mb: memory_mb,
            allow_restart: memory_mb < current.memory,
        });

        let wanted = desired.public_ip_count as usize;
        let have = current.ip_addresses.len();
        let ips = if wanted > have {
            Some(IpChange::Add((wanted - have) as u32))
        } else if wanted < have {
            Some(IpChange::Remove(
                current.ip_addresses[..have - wanted].to_vec(),
            ))
        } else {
            None
        };

        Self {
            cpu,
            disk_mb,
            memory,
            ips,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.disk_mb.is_none() && self.memory.is_none() && self.ips.is_none()
    }

    /// Number of mutating calls the plan will issue.
    pub fn call_count(&self) -> usize {
        usize::from(self.cpu.is_some())
            + usize::from(self.disk_mb.is_some())
            + usize::from(self.memory.is_some())
            + self.ips.as_ref().map_or(0, IpChange::units)
    }
}
