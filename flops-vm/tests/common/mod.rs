//! Shared test utilities for flops-vm integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flops_vm::clients::{
    ApiResponse, AsyncOperation, CreateVm, OperationStatus, ProviderClient, PublicKey, RemoteVm,
};
use flops_vm::{Clock, ClientError, ReconcileSettings, VmReconciler};

pub const OPERATION_ID: u64 = 500;
pub const CREATED_VM_ID: u64 = 900;

/// A provider call as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListVms,
    GetVm(u64),
    ListPublicKeys,
    CreateVm(CreateVm),
    GetOperation(u64),
    SetCpu(u64, u32),
    SetDisk(u64, u64, bool),
    SetMemory(u64, u64, bool),
    AddIp(u64),
    RemoveIp(u64, String),
    DeleteVm(u64),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Call::ListVms | Call::GetVm(_) | Call::ListPublicKeys | Call::GetOperation(_)
        )
    }
}

struct Rejection {
    succeed_first: u32,
    message: String,
}

#[derive(Default)]
struct State {
    vms: Vec<RemoteVm>,
    keys: Vec<PublicKey>,
    calls: Vec<Call>,
    rejections: HashMap<&'static str, Rejection>,
    create_rejection: Option<String>,
    pending_polls: u32,
    final_status: Option<OperationStatus>,
    omit_vm_id: bool,
    failing_reads: bool,
    pending_create: Option<CreateVm>,
    next_ip: u32,
}

/// Stateful in-memory provider. Clones share state.
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<State>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm(self, vm: RemoteVm) -> Self {
        self.state.lock().unwrap().vms.push(vm);
        self
    }

    pub fn with_key(self, id: u64, name: &str) -> Self {
        self.state.lock().unwrap().keys.push(PublicKey {
            id,
            name: name.to_string(),
        });
        self
    }

    /// Reject every call of kind `op` ("cpu", "disk", "memory", "add_ip", "remove_ip", "delete").
    pub fn reject(self, op: &'static str, message: &str) -> Self {
        self.reject_after(op, 0, message)
    }

    /// Let the first `n` calls of kind `op` succeed, reject the rest.
    pub fn reject_after(self, op: &'static str, n: u32, message: &str) -> Self {
        self.state.lock().unwrap().rejections.insert(
            op,
            Rejection {
                succeed_first: n,
                message: message.to_string(),
            },
        );
        self
    }

    pub fn reject_create(self, message: &str) -> Self {
        self.state.lock().unwrap().create_rejection = Some(message.to_string());
        self
    }

    /// Number of polls that report PENDING before the operation finishes.
    pub fn pending_polls(self, n: u32) -> Self {
        self.state.lock().unwrap().pending_polls = n;
        self
    }

    pub fn failing_operation(self) -> Self {
        self.finishes_with(OperationStatus::Error)
    }

    /// Status the operation reports once it stops being PENDING.
    pub fn finishes_with(self, status: OperationStatus) -> Self {
        self.state.lock().unwrap().final_status = Some(status);
        self
    }

    /// Operation finishes OK but reports no VM id.
    pub fn finishes_without_vm_id(self) -> Self {
        self.state.lock().unwrap().omit_vm_id = true;
        self
    }

    /// Every `get_vm` fails at the transport level.
    pub fn failing_reads(self) -> Self {
        self.state.lock().unwrap().failing_reads = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn vm(&self, name: &str) -> Option<RemoteVm> {
        let state = self.state.lock().unwrap();
        state.vms.iter().find(|vm| vm.name == name).cloned()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn gate(&self, op: &'static str) -> ApiResponse {
        let mut state = self.state.lock().unwrap();
        match state.rejections.get_mut(op) {
            Some(rejection) if rejection.succeed_first > 0 => {
                rejection.succeed_first -= 1;
                ApiResponse::Ok(())
            }
            Some(rejection) => ApiResponse::Failed(rejection.message.clone()),
            None => ApiResponse::Ok(()),
        }
    }

    fn mutate_vm(&self, vm_id: u64, f: impl FnOnce(&mut RemoteVm)) {
        let mut state = self.state.lock().unwrap();
        if let Some(vm) = state.vms.iter_mut().find(|vm| vm.id == vm_id) {
            f(vm);
        }
    }

    fn apply(&self, op: &'static str, vm_id: u64, f: impl FnOnce(&mut RemoteVm)) -> ApiResponse {
        let response = self.gate(op);
        if response.is_ok() {
            self.mutate_vm(vm_id, f);
        }
        response
    }

    fn allocate_ip(&self) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_ip += 1;
        format!("185.0.1.{}", state.next_ip)
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn list_vms(&self) -> Result<Vec<RemoteVm>, ClientError> {
        self.record(Call::ListVms);
        Ok(self.state.lock().unwrap().vms.clone())
    }

    async fn get_vm(&self, vm_id: u64) -> Result<RemoteVm, ClientError> {
        self.record(Call::GetVm(vm_id));
        let state = self.state.lock().unwrap();
        if state.failing_reads {
            return Err(ClientError::Api {
                call: "get vm",
                message: "connection reset".to_string(),
            });
        }
        state
            .vms
            .iter()
            .find(|vm| vm.id == vm_id)
            .cloned()
            .ok_or_else(|| ClientError::Api {
                call: "get vm",
                message: format!("VM {} not found", vm_id),
            })
    }

    async fn list_public_keys(&self) -> Result<Vec<PublicKey>, ClientError> {
        self.record(Call::ListPublicKeys);
        Ok(self.state.lock().unwrap().keys.clone())
    }

    async fn create_vm(&self, request: &CreateVm) -> Result<ApiResponse<u64>, ClientError> {
        self.record(Call::CreateVm(request.clone()));
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.create_rejection.clone() {
            return Ok(ApiResponse::Failed(message));
        }
        state.pending_create = Some(request.clone());
        Ok(ApiResponse::Ok(OPERATION_ID))
    }

    async fn get_operation(&self, operation_id: u64) -> Result<AsyncOperation, ClientError> {
        self.record(Call::GetOperation(operation_id));
        let mut state = self.state.lock().unwrap();
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(AsyncOperation {
                id: operation_id,
                status: OperationStatus::Pending,
                vm_id: None,
            });
        }
        if let Some(status) = state.final_status.filter(|s| *s != OperationStatus::Ok) {
            return Ok(AsyncOperation {
                id: operation_id,
                status,
                vm_id: None,
            });
        }

        if let Some(request) = state.pending_create.take() {
            let ip_addresses = (1..=request.ip_count)
                .map(|n| format!("185.0.0.{}", n))
                .collect();
            state.vms.push(RemoteVm {
                id: CREATED_VM_ID,
                name: request.name,
                cpu: request.cpu,
                memory: request.memory_mb,
                disk: request.disk_mb,
                ip_addresses,
                private_ip_address: Some("10.0.0.90".to_string()),
            });
        }
        Ok(AsyncOperation {
            id: operation_id,
            status: OperationStatus::Ok,
            vm_id: (!state.omit_vm_id).then_some(CREATED_VM_ID),
        })
    }

    async fn set_cpu(&self, vm_id: u64, cpu: u32) -> Result<ApiResponse, ClientError> {
        self.record(Call::SetCpu(vm_id, cpu));
        Ok(self.apply("cpu", vm_id, |vm| vm.cpu = cpu))
    }

    async fn set_disk(
        &self,
        vm_id: u64,
        disk_mb: u64,
        allow_memory_change: bool,
    ) -> Result<ApiResponse, ClientError> {
        self.record(Call::SetDisk(vm_id, disk_mb, allow_memory_change));
        Ok(self.apply("disk", vm_id, |vm| vm.disk = disk_mb))
    }

    async fn set_memory(
        &self,
        vm_id: u64,
        memory_mb: u64,
        allow_restart: bool,
    ) -> Result<ApiResponse, ClientError> {
        self.record(Call::SetMemory(vm_id, memory_mb, allow_restart));
        Ok(self.apply("memory", vm_id, |vm| vm.memory = memory_mb))
    }

    async fn add_ip(&self, vm_id: u64) -> Result<ApiResponse, ClientError> {
        self.record(Call::AddIp(vm_id));
        let response = self.gate("add_ip");
        if response.is_ok() {
            let ip = self.allocate_ip();
            self.mutate_vm(vm_id, |vm| vm.ip_addresses.push(ip));
        }
        Ok(response)
    }

    async fn remove_ip(&self, vm_id: u64, ip: &str) -> Result<ApiResponse, ClientError> {
        self.record(Call::RemoveIp(vm_id, ip.to_string()));
        Ok(self.apply("remove_ip", vm_id, |vm| {
            vm.ip_addresses.retain(|existing| existing != ip)
        }))
    }

    async fn delete_vm(&self, vm_id: u64) -> Result<ApiResponse, ClientError> {
        self.record(Call::DeleteVm(vm_id));
        let response = self.gate("delete");
        if response.is_ok() {
            self.state.lock().unwrap().vms.retain(|vm| vm.id != vm_id);
        }
        Ok(response)
    }
}

/// Clock that records requested sleeps and returns immediately.
#[derive(Clone, Default)]
pub struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

pub fn remote_vm(id: u64, name: &str, cpu: u32, memory: u64, disk: u64, ips: &[&str]) -> RemoteVm {
    RemoteVm {
        id,
        name: name.to_string(),
        cpu,
        memory,
        disk,
        ip_addresses: ips.iter().map(|ip| ip.to_string()).collect(),
        private_ip_address: Some(format!("10.0.0.{}", id)),
    }
}

/// Reconciler over a fake provider, returning handles to inspect afterwards.
pub fn reconciler(
    provider: &FakeProvider,
    settings: ReconcileSettings,
) -> (VmReconciler<FakeProvider, RecordingClock>, RecordingClock) {
    let clock = RecordingClock::default();
    (
        VmReconciler::new(provider.clone(), clock.clone(), settings),
        clock,
    )
}
