//! Waits for a provider operation to leave `PENDING`.
//!
//! `PENDING -> OK | ERROR`. A status outside that set counts as ERROR.
//! Polling is unbounded: the first poll is immediate, then one poll per
//! interval. A host that needs a deadline wraps
//! the whole pass in a timeout; the provider-side operation keeps running
//! either way.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clients::{OperationStatus, ProviderClient};
use crate::clock::Clock;
use crate::error::{ReconcileError, Result};

pub struct OperationWaiter<'a> {
    client: &'a dyn ProviderClient,
    clock: &'a dyn Clock,
    interval: Duration,
}

impl<'a> OperationWaiter<'a> {
    pub fn new(client: &'a dyn ProviderClient, clock: &'a dyn Clock, interval: Duration) -> Self {
        Self {
            client,
            clock,
            interval,
        }
    }

    /// Poll until the operation is terminal and return the resulting VM id.
    pub async fn wait(&self, operation_id: u64) -> Result<u64> {
        let mut polls = 0u32;

        loop {
            if polls > 0 {
                self.clock.sleep(self.interval).await;
            }
            let operation = self.client.get_operation(operation_id).await?;
            polls += 1;
            debug!(operation_id, polls, status = ?operation.status, "polled operation");

            match operation.status {
                OperationStatus::Pending => continue,
                OperationStatus::Ok => {
                    info!("Operation {} finished after {} polls", operation_id, polls);
                    return operation
                        .vm_id
                        .ok_or(ReconcileError::MissingVmId { operation_id });
                }
                OperationStatus::Error | OperationStatus::Unknown => {
                    warn!("Operation {} failed ({:?})", operation_id, operation.status);
                    return Err(ReconcileError::OperationFailed { operation_id });
                }
            }
        }
    }
}
