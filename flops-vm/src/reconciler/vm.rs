//! VM reconciler - converges a declared VM against the provider.

use async_trait::async_trait;
use tracing::{info, warn};

use super::executor::MutationExecutor;
use super::outcome::{ReconcileResult, VmReport};
use super::plan::VmPlan;
use super::waiter::OperationWaiter;
use super::Reconciler;
use crate::clients::{ApiResponse, CreateVm, ProviderClient, RemoteVm};
use crate::clock::Clock;
use crate::config::ReconcileSettings;
use crate::error::{ReconcileError, Result};
use crate::spec::{DesiredSpec, DesiredState};

/// VM reconciler. Holds no state between passes beyond its collaborators.
pub struct VmReconciler<C, K> {
    client: C,
    clock: K,
    settings: ReconcileSettings,
}

impl<C: ProviderClient, K: Clock> VmReconciler<C, K> {
    pub fn new(client: C, clock: K, settings: ReconcileSettings) -> Self {
        Self {
            client,
            clock,
            settings,
        }
    }

    async fn update(&self, spec: &DesiredSpec, vm: &RemoteVm) -> Result<ReconcileResult> {
        let plan = VmPlan::between(spec, vm);
        if plan.is_empty() {
            info!("VM {} ({}) already matches spec", vm.name, vm.id);
        } else {
            info!(
                "VM {} ({}) needs {} provider calls",
                vm.name,
                vm.id,
                plan.call_count()
            );
        }

        let outcomes = if self.settings.check_mode {
            MutationExecutor::preview(vm, &plan)
        } else {
            MutationExecutor::new(&self.client, &self.clock, self.settings.settle_pause)
                .apply(vm, &plan)
                .await?
        };

        Ok(outcomes.aggregate(vm))
    }

    async fn create(&self, spec: &DesiredSpec) -> Result<ReconcileResult> {
        if self.settings.check_mode {
            info!("Would create VM {}", spec.name);
            return Ok(ReconcileResult::created(None));
        }

        let public_key_ids = self
            .client
            .resolve_public_keys(&self.settings.public_key_names)
            .await?;
        if public_key_ids.len() < self.settings.public_key_names.len() {
            warn!(
                "Only {} of {} public keys found",
                public_key_ids.len(),
                self.settings.public_key_names.len()
            );
        }

        let request = CreateVm {
            name: spec.name.clone(),
            memory_mb: spec.memory_mb(),
            disk_mb: spec.disk_mb(),
            cpu: spec.cpu_cores,
            ip_count: spec.public_ip_count,
            public_key_ids,
            distribution_id: self.settings.create.distribution_id,
            tariff_id: self.settings.create.tariff_id,
        };

        info!("Creating VM {}", spec.name);
        let operation_id = match self.client.create_vm(&request).await? {
            ApiResponse::Ok(operation_id) => operation_id,
            ApiResponse::Failed(message) => return Err(ReconcileError::CreateRejected(message)),
        };

        let vm_id = OperationWaiter::new(&self.client, &self.clock, self.settings.poll_interval)
            .wait(operation_id)
            .await?;
        let vm = self.client.get_vm(vm_id).await?;
        info!("Created VM {} ({})", vm.name, vm.id);

        Ok(ReconcileResult::created(Some(VmReport::from(&vm))))
    }
}

#[async_trait]
impl<C: ProviderClient, K: Clock> Reconciler for VmReconciler<C, K> {
    type Spec = DesiredSpec;
    type Status = ReconcileResult;

    async fn reconcile(&self, spec: &Self::Spec) -> Result<Self::Status> {
        info!("Reconciling VM {} (state={})", spec.name, spec.state);

        match spec.state {
            DesiredState::Absent => self.finalize(&spec.name).await,
            DesiredState::Present => match self.client.find_vm(&spec.name).await? {
                Some(vm) => self.update(spec, &vm).await,
                None => self.create(spec).await,
            },
        }
    }

    async fn finalize(&self, name: &str) -> Result<Self::Status> {
        let vm = self
            .client
            .find_vm(name)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(name.to_string()))?;

        if self.settings.check_mode {
            info!("Would delete VM {} ({})", vm.name, vm.id);
            return Ok(ReconcileResult::removed());
        }

        info!("Deleting VM {} ({})", vm.name, vm.id);
        match self.client.delete_vm(vm.id).await? {
            ApiResponse::Ok(()) => Ok(ReconcileResult::removed()),
            ApiResponse::Failed(message) => {
                warn!("Delete of VM {} rejected: {}", vm.id, message);
                Ok(ReconcileResult::rejected(message))
            }
        }
    }
}
