//! Provider clients.
//!
//! The reconciler only talks to the provider through [`ProviderClient`]:
//! - reads (list, get, operation status, public keys) fail with [`ClientError`]
//! - mutations return an [`ApiResponse`] tag so a rejection stays a value

pub mod flops;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ClientError;

pub use flops::FlopsClient;

/// Status tag of a mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse<T = ()> {
    Ok(T),
    /// Provider rejected the call; carries its `errorMessage`.
    Failed(String),
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, ApiResponse::Ok(_))
    }
}

/// A VM as the provider currently sees it. Sizes are in MiB.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVm {
    pub id: u64,
    pub name: String,
    pub cpu: u32,
    pub memory: u64,
    pub disk: u64,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
}

/// Registered SSH public key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublicKey {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Ok,
    Error,
    /// Any other status. Terminal, and not a success.
    #[serde(other)]
    Unknown,
}

/// Provider-side long-running task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOperation {
    pub id: u64,
    pub status: OperationStatus,
    /// Set once a create operation has finished.
    pub vm_id: Option<u64>,
}

/// Parameters for creating a VM. Sizes are in MiB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVm {
    pub name: String,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub cpu: u32,
    pub ip_count: u32,
    pub public_key_ids: Vec<u64>,
    pub distribution_id: u64,
    pub tariff_id: u64,
}

/// Capability surface of a VM hosting provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// All VMs visible to the account.
    async fn list_vms(&self) -> Result<Vec<RemoteVm>, ClientError>;

    async fn get_vm(&self, vm_id: u64) -> Result<RemoteVm, ClientError>;

    async fn list_public_keys(&self) -> Result<Vec<PublicKey>, ClientError>;

    /// Start creating a VM. `Ok` carries the operation id to poll.
    async fn create_vm(&self, request: &CreateVm) -> Result<ApiResponse<u64>, ClientError>;

    async fn get_operation(&self, operation_id: u64) -> Result<AsyncOperation, ClientError>;

    async fn set_cpu(&self, vm_id: u64, cpu: u32) -> Result<ApiResponse, ClientError>;

    async fn set_disk(
        &self,
        vm_id: u64,
        disk_mb: u64,
        allow_memory_change: bool,
    ) -> Result<ApiResponse, ClientError>;

    async fn set_memory(
        &self,
        vm_id: u64,
        memory_mb: u64,
        allow_restart: bool,
    ) -> Result<ApiResponse, ClientError>;

    async fn add_ip(&self, vm_id: u64) -> Result<ApiResponse, ClientError>;

    async fn remove_ip(&self, vm_id: u64, ip: &str) -> Result<ApiResponse, ClientError>;

    async fn delete_vm(&self, vm_id: u64) -> Result<ApiResponse, ClientError>;

    /// Ids of the keys whose name is in `names`, in provider order.
    async fn resolve_public_keys(&self, names: &[String]) -> Result<Vec<u64>, ClientError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.list_public_keys().await?;
        Ok(keys
            .into_iter()
            .filter(|key| names.contains(&key.name))
            .map(|key| key.id)
            .collect())
    }

    /// Linear scan of [`ProviderClient::list_vms`] by name.
    async fn find_vm(&self, name: &str) -> Result<Option<RemoteVm>, ClientError> {
        let vms = self.list_vms().await?;
        Ok(vms.into_iter().find(|vm| vm.name == name))
    }
}
