//! Common types for the module lifecycle operator: CRDs, errors, the module
//! catalog, and telemetry setup.

#![deny(missing_docs)]

pub mod catalog;
pub mod crd;
pub mod error;
pub mod telemetry;

pub use catalog::{CatalogSnapshot, KubeCatalog, ModuleCatalog};
pub use error::Error;

/// API group shared by all lifecycle CRDs
pub const API_GROUP: &str = "lifecycle.dev";

/// Channel used when neither the module nor the ModuleSet names one
pub const DEFAULT_CHANNEL: &str = "regular";

/// Reserved channel literal meaning "pinned by version"
///
/// Never a real channel name. Templates addressed by explicit version carry
/// this value, and tracked statuses record it for version-pinned modules.
pub const NONE_CHANNEL: &str = "none";

/// Label value enabling a boolean label (`internal`, `beta`)
pub const ENABLE_LABEL_VALUE: &str = "true";

/// Label marking a ModuleSet or ModuleTemplate as internal
pub const INTERNAL_LABEL: &str = "lifecycle.dev/internal";

/// Label marking a ModuleSet or ModuleTemplate as beta
pub const BETA_LABEL: &str = "lifecycle.dev/beta";

/// Legacy label carrying the module name on templates without `spec.moduleName`
pub const MODULE_NAME_LABEL: &str = "lifecycle.dev/module-name";

/// Legacy annotation carrying the module version on templates without `spec.version`
pub const MODULE_VERSION_ANNOTATION: &str = "lifecycle.dev/module-version";

/// Runtime label: global account the managed cluster belongs to
pub const GLOBAL_ACCOUNT_ID_LABEL: &str = "lifecycle.dev/global-account-id";

/// Runtime label: region of the managed cluster
pub const REGION_LABEL: &str = "lifecycle.dev/region";

/// Runtime label: platform region of the managed cluster
pub const PLATFORM_REGION_LABEL: &str = "lifecycle.dev/platform-region";

/// Runtime label: service plan of the managed cluster
pub const PLAN_LABEL: &str = "lifecycle.dev/plan";
