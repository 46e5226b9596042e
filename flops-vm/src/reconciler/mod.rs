//! Reconcilers.
//!
//! A reconciler compares the declared spec with what the provider reports
//! and issues the calls needed to converge.

pub mod executor;
pub mod outcome;
pub mod plan;
pub mod vm;
pub mod waiter;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// The declared spec.
    type Spec;
    /// The report handed back to the caller.
    type Status;

    /// Reconcile the resource - compare desired vs actual state and take action.
    async fn reconcile(&self, spec: &Self::Spec) -> Result<Self::Status>;

    /// Remove the resource identified by `name`.
    async fn finalize(&self, name: &str) -> Result<Self::Status>;
}
