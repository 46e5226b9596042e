//! Applies a [`VmPlan`] to an existing VM.
//!
//! Order is fixed: CPU, disk, memory, public IPs. Each field is best-effort
//! and independent. A rejected call becomes that field's outcome and the
//! next field still runs. Nothing is retried or rolled back.

use std::time::Duration;

use tracing::{info, warn};

use super::outcome::{FieldOutcome, FieldOutcomes, FieldValue};
use super::plan::{IpChange, MemoryChange, VmPlan};
use crate::clients::{ApiResponse, ProviderClient, RemoteVm};
use crate::clock::Clock;
use crate::error::Result;

pub struct MutationExecutor<'a> {
    client: &'a dyn ProviderClient,
    clock: &'a dyn Clock,
    settle_pause: Duration,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(client: &'a dyn ProviderClient, clock: &'a dyn Clock, settle_pause: Duration) -> Self {
        Self {
            client,
            clock,
            settle_pause,
        }
    }

    pub async fn apply(&self, vm: &RemoteVm, plan: &VmPlan) -> Result<FieldOutcomes> {
        let cpu = match plan.cpu {
            Some(cpu) => self.apply_cpu(vm.id, cpu).await?,
            None => FieldOutcome::unchanged(vm.cpu),
        };
        let disk = match plan.disk_mb {
            Some(disk_mb) => self.apply_disk(vm.id, disk_mb).await?,
            None => FieldOutcome::unchanged(vm.disk),
        };
        let memory = match plan.memory {
            Some(change) => self.apply_memory(vm.id, change).await?,
            None => FieldOutcome::unchanged(vm.memory),
        };
        let ip_count = match &plan.ips {
            Some(change) => self.apply_ips(vm.id, change).await?,
            None => FieldOutcome::unchanged(vm.ip_addresses.clone()),
        };

        Ok(FieldOutcomes {
            cpu,
            disk,
            memory,
            ip_count,
        })
    }

    /// Outcomes a plan would produce, without calling the provider.
    pub fn preview(vm: &RemoteVm, plan: &VmPlan) -> FieldOutcomes {
        fn planned<T>(target: Option<T>, current: T) -> FieldOutcome<T> {
            match target {
                Some(value) => FieldOutcome::applied(value),
                None => FieldOutcome::unchanged(current),
            }
        }

        FieldOutcomes {
            cpu: planned(plan.cpu, vm.cpu),
            disk: planned(plan.disk_mb, vm.disk),
            memory: planned(plan.memory.map(|m| m.target_mb), vm.memory),
            ip_count: FieldOutcome {
                changed: plan.ips.is_some(),
                value: FieldValue::Value(vm.ip_addresses.clone()),
            },
        }
    }

    async fn reread(&self, vm_id: u64) -> Result<RemoteVm> {
        Ok(self.client.get_vm(vm_id).await?)
    }

    async fn apply_cpu(&self, vm_id: u64, cpu: u32) -> Result<FieldOutcome<u32>> {
        info!("Changing CPU of VM {} to {}", vm_id, cpu);
        match self.client.set_cpu(vm_id, cpu).await? {
            ApiResponse::Ok(()) => Ok(FieldOutcome::applied(self.reread(vm_id).await?.cpu)),
            ApiResponse::Failed(message) => {
                warn!(vm_id, field = "cpu", "{}", message);
                Ok(FieldOutcome::failed(message))
            }
        }
    }

    async fn apply_disk(&self, vm_id: u64, disk_mb: u64) -> Result<FieldOutcome<u64>> {
        info!("Changing disk of VM {} to {} MiB", vm_id, disk_mb);
        // The provider may adjust memory to fit the new disk size.
        match self.client.set_disk(vm_id, disk_mb, true).await? {
            ApiResponse::Ok(()) => Ok(FieldOutcome::applied(self.reread(vm_id).await?.disk)),
            ApiResponse::Failed(message) => {
                warn!(vm_id, field = "disk", "{}", message);
                Ok(FieldOutcome::failed(message))
            }
        }
    }

    async fn apply_memory(&self, vm_id: u64, change: MemoryChange) -> Result<FieldOutcome<u64>> {
        info!(
            "Changing memory of VM {} to {} MiB (restart allowed: {})",
            vm_id, change.target_mb, change.allow_restart
        );
        let response = self
            .client
            .set_memory(vm_id, change.target_mb, change.allow_restart)
            .await?;

        // A shrink may reboot the VM; don't read it back mid-reboot.
        if change.allow_restart {
            self.clock.sleep(self.settle_pause).await;
        }

        match response {
            ApiResponse::Ok(()) => Ok(FieldOutcome::applied(self.reread(vm_id).await?.memory)),
            ApiResponse::Failed(message) => {
                warn!(vm_id, field = "memory", "{}", message);
                Ok(FieldOutcome::failed(message))
            }
        }
    }

    async fn apply_ips(&self, vm_id: u64, change: &IpChange) -> Result<FieldOutcome<Vec<String>>> {
        let mut applied = 0usize;
        let mut rejection = None;

        match change {
            IpChange::Add(count) => {
                info!("Adding {} public IPs to VM {}", count, vm_id);
                for _ in 0..*count {
                    match self.client.add_ip(vm_id).await? {
                        ApiResponse::Ok(()) => applied += 1,
                        ApiResponse::Failed(message) => {
                            rejection = Some(message);
                            break;
                        }
                    }
                }
            }
            IpChange::Remove(ips) => {
                info!("Removing {} public IPs from VM {}", ips.len(), vm_id);
                for ip in ips {
                    match self.client.remove_ip(vm_id, ip).await? {
                        ApiResponse::Ok(()) => applied += 1,
                        ApiResponse::Failed(message) => {
                            rejection = Some(message);
                            break;
                        }
                    }
                }
            }
        }

        match rejection {
            None => Ok(FieldOutcome::applied(
                self.reread(vm_id).await?.ip_addresses,
            )),
            Some(message) => {
                warn!(
                    vm_id,
                    field = "ip_count",
                    applied,
                    wanted = change.units(),
                    "{}",
                    message
                );
                Ok(FieldOutcome {
                    changed: applied > 0,
                    value: FieldValue::Error(message),
                })
            }
        }
    }
}
