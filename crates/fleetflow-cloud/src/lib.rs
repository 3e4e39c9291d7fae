//! FleetFlow Cloud Resources
//!
//! Provider-neutral building blocks for declaratively managed cloud
//! resources: the resource identity/ordering trait, planned actions, and the
//! persisted state file that is the single source of truth between runs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                fleet-upload CLI                  │
//! │            (plan / up / check / down)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               fleetflow-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │   trait ManagedResource { ... }          │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Ordering    │  │  State Mgmt  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────┐
//! │ fleetflow-cloud-s3│
//! │ s3-bucket-upload  │
//! └───────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod order;
pub mod resource;
pub mod state;

// Re-exports
pub use action::{Action, ActionType, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use order::creation_order;
pub use resource::ManagedResource;
pub use state::{GlobalState, ResourceState, ResourceStatus, StateLock, StateManager};
