//! Tracking configuration.
//!
//! All policy the diffing engine consults lives in one explicit
//! [`GlobalTrackingConfig`] object that hosts share through an `Arc`:
//!
//! - [`TrackingConfigStore`] - cached per-type "is tracked" decisions
//! - [`FluentConfiguration`] - per-type property include/exclude overrides
//! - [`SoftDeleteCriteria`] - the single registered soft-delete flag predicate
//! - [`UsernameProvider`] - constant or factory-based current user
//! - [`TrackingSettings`] - serde-loadable scalar settings

mod fluent;
mod global;
mod settings;
mod soft_delete;
mod store;
mod username;

pub use fluent::{
    FluentConfiguration, OverrideTrackingResponse, PropertyTrackingOverride, TrackAllResponse,
};
pub use global::GlobalTrackingConfig;
pub use settings::TrackingSettings;
pub use soft_delete::SoftDeleteCriteria;
pub use store::{TrackingConfigStore, TrackingConfigurationValue};
pub use username::UsernameProvider;
