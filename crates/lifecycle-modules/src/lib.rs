//! Module template resolution and lifecycle state aggregation
//!
//! Given a ModuleSet and the module catalog, pick exactly one ModuleTemplate
//! per module, apply version and maintenance policy, and roll the
//! per-module outcomes into one lifecycle state.
//!
//! The pipeline, leaves first:
//! - [`intent`]: declared and tracked modules become one intent per name
//! - [`strategy`]: release-meta, channel and version lookups
//! - [`aggregator`]: first responsible strategy wins
//! - [`maintenance`]: version changes wait for an open window
//! - [`validate`]: downgrade prevention and internal/beta gating
//! - [`resolver`]: runs the above for every module of a ModuleSet
//! - [`status`]: status records and the aggregate state

#![deny(missing_docs)]

pub mod aggregator;
pub mod error;
pub mod intent;
pub mod maintenance;
pub mod resolver;
pub mod status;
pub mod strategy;
pub mod validate;

pub use aggregator::StrategyAggregator;
pub use error::{LookupError, LookupErrorKind, Selector};
pub use intent::{extract_intents, ModuleIntent};
pub use maintenance::{
    MaintenanceError, MaintenancePolicy, MaintenanceWindow, WindowPolicy, WithMaintenanceWindow,
};
pub use resolver::{ModuleResolver, ResolvedModule};
pub use status::{determine_state, is_pruned, next_module_status};
pub use strategy::{ComponentIdentity, LookupStrategy, ResolutionResult, TemplateInfoLookup};
pub use validate::{is_valid_version_change, parse_version};
