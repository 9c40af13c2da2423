//! The generic managed-resource reconciler and the seams each kind plugs into it.
mod external;
mod reconciler;

pub use self::external::{
    ExternalClient, ExternalConnector, ExternalError, ExternalObservation, Result,
};
pub use self::reconciler::{
    error_policy, initialize, next_step, provider_tags, reconcile, Context, NextStep,
};
pub use self::external::{ConnectionDetailsSnafu, MissingFieldSnafu, ValidationSnafu};
