//! flops-vm: reconciles a declared VM against the flops.ru hosting API.
//!
//! One pass handles one VM, identified by name:
//! - absent and wanted: create it and wait for the provider operation
//! - present: diff CPU, disk, memory and public IPs, apply what differs
//! - wanted gone: delete it
//!
//! The result says whether anything changed and whether any field failed.

pub mod clients;
pub mod clock;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod spec;

pub use clients::{ApiResponse, FlopsClient, ProviderClient, RemoteVm};
pub use clock::{Clock, TokioClock};
pub use config::{CreateDefaults, Credentials, ReconcileSettings};
pub use error::{ClientError, ReconcileError, SpecError};
pub use reconciler::outcome::{ReconcileResult, ResultState};
pub use reconciler::vm::VmReconciler;
pub use reconciler::Reconciler;
pub use spec::{DesiredSpec, DesiredState};
