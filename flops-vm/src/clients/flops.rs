//! HTTP client for the flops.ru v1 API.
//!
//! Every endpoint is a GET with credentials in the query string. Responses
//! share one envelope: `status` is `"OK"` or not, with `result` on success
//! and `errorMessage` on failure.

use async_trait::async_trait;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer};
use tracing::debug;

use super::{
    ApiResponse, AsyncOperation, CreateVm, OperationStatus, ProviderClient, PublicKey, RemoteVm,
};
use crate::config::Credentials;
use crate::error::ClientError;

type Params = Vec<(&'static str, String)>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    status: String,
    result: Option<T>,
    error_message: Option<String>,
    #[serde(default, deserialize_with = "numeric_id")]
    operation_id: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

/// Ids arrive either as JSON numbers or as numeric strings.
fn numeric_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid id {:?}", text))),
    }
}

impl<T> Envelope<T> {
    fn is_ok(&self) -> bool {
        self.status == "OK"
    }

    fn error_text(&mut self) -> String {
        self.error_message
            .take()
            .unwrap_or_else(|| format!("status {}", self.status))
    }

    /// Unwrap a read: non-OK and missing payloads are errors.
    fn into_result(mut self, call: &'static str) -> Result<T, ClientError> {
        if !self.is_ok() {
            return Err(ClientError::Api {
                call,
                message: self.error_text(),
            });
        }
        self.result.ok_or(ClientError::MissingResult(call))
    }

    fn into_status(mut self) -> ApiResponse {
        if self.is_ok() {
            ApiResponse::Ok(())
        } else {
            ApiResponse::Failed(self.error_text())
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationInfo {
    status: OperationStatus,
    #[serde(default, deserialize_with = "numeric_id")]
    vm_id: Option<u64>,
}

/// [`ProviderClient`] backed by the flops.ru REST API.
pub struct FlopsClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl FlopsClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn read_params(&self) -> Params {
        vec![
            ("apiKey", self.credentials.api_key.clone()),
            ("clientId", self.credentials.client_id.clone()),
        ]
    }

    fn edit_params(&self) -> Params {
        let mut params = self.read_params();
        params.push(("tenantId", self.credentials.tenant_id.clone()));
        params
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &Params,
    ) -> Result<Envelope<T>, ClientError> {
        debug!("GET {}", path);
        let body = self
            .http
            .get(self.url(path))
            .query(params)
            .send()
            .await?
            .text()
            .await?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|source| ClientError::Decode {
                path: path.to_string(),
                source,
            })?;
        debug!(path = %path, status = %envelope.status, "provider response");
        Ok(envelope)
    }

    async fn mutate(&self, path: &str, params: Params) -> Result<ApiResponse, ClientError> {
        let envelope = self.call::<serde_json::Value>(path, &params).await?;
        Ok(envelope.into_status())
    }
}

#[async_trait]
impl ProviderClient for FlopsClient {
    async fn list_vms(&self) -> Result<Vec<RemoteVm>, ClientError> {
        self.call("vm/", &self.read_params())
            .await?
            .into_result("list vms")
    }

    async fn get_vm(&self, vm_id: u64) -> Result<RemoteVm, ClientError> {
        self.call(&format!("vm/{}", vm_id), &self.read_params())
            .await?
            .into_result("get vm")
    }

    async fn list_public_keys(&self) -> Result<Vec<PublicKey>, ClientError> {
        self.call("pubkeys/", &self.read_params())
            .await?
            .into_result("list public keys")
    }

    async fn create_vm(&self, request: &CreateVm) -> Result<ApiResponse<u64>, ClientError> {
        let mut params = self.edit_params();
        params.extend([
            ("name", request.name.clone()),
            ("memory", request.memory_mb.to_string()),
            ("disk", request.disk_mb.to_string()),
            ("cpu", request.cpu.to_string()),
            ("ipCount", request.ip_count.to_string()),
            ("distributionId", request.distribution_id.to_string()),
            ("tariffId", request.tariff_id.to_string()),
        ]);
        params.extend(
            request
                .public_key_ids
                .iter()
                .map(|id| ("publicKeyIds", id.to_string())),
        );

        let mut envelope = self.call::<serde_json::Value>("vm/install", &params).await?;
        if !envelope.is_ok() {
            return Ok(ApiResponse::Failed(envelope.error_text()));
        }
        envelope
            .operation_id
            .map(ApiResponse::Ok)
            .ok_or(ClientError::MissingResult("create vm"))
    }

    async fn get_operation(&self, operation_id: u64) -> Result<AsyncOperation, ClientError> {
        let info: OperationInfo = self
            .call(&format!("operation/{}", operation_id), &self.read_params())
            .await?
            .into_result("get operation")?;
        Ok(AsyncOperation {
            id: operation_id,
            status: info.status,
            vm_id: info.vm_id,
        })
    }

    async fn set_cpu(&self, vm_id: u64, cpu: u32) -> Result<ApiResponse, ClientError> {
        let mut params = self.edit_params();
        params.push(("cpu", cpu.to_string()));
        self.mutate(&format!("vm/{}/cpu_change/", vm_id), params)
            .await
    }

    async fn set_disk(
        &self,
        vm_id: u64,
        disk_mb: u64,
        allow_memory_change: bool,
    ) -> Result<ApiResponse, ClientError> {
        let mut params = self.edit_params();
        params.push(("disk", disk_mb.to_string()));
        if allow_memory_change {
            params.push(("allowMemoryChange", "true".to_string()));
        }
        self.mutate(&format!("vm/{}/disk_change/", vm_id), params)
            .await
    }

    async fn set_memory(
        &self,
        vm_id: u64,
        memory_mb: u64,
        allow_restart: bool,
    ) -> Result<ApiResponse, ClientError> {
        let mut params = self.edit_params();
        params.push(("memory", memory_mb.to_string()));
        if allow_restart {
            params.push(("allowRestart", "true".to_string()));
        }
        self.mutate(&format!("vm/{}/memory_change/", vm_id), params)
            .await
    }

    async fn add_ip(&self, vm_id: u64) -> Result<ApiResponse, ClientError> {
        self.mutate(&format!("vm/{}/ip_add/", vm_id), self.edit_params())
            .await
    }

    async fn remove_ip(&self, vm_id: u64, ip: &str) -> Result<ApiResponse, ClientError> {
        let mut params = self.edit_params();
        params.push(("ip", ip.to_string()));
        self.mutate(&format!("vm/{}/ip_delete/", vm_id), params)
            .await
    }

    async fn delete_vm(&self, vm_id: u64) -> Result<ApiResponse, ClientError> {
        self.mutate(&format!("vm/{}/delete/", vm_id), self.edit_params())
            .await
    }
}
