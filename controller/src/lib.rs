//! Reconciles the EKS managed resources (clusters, node groups, Fargate profiles, identity
//! provider configs and add-ons) against AWS.
pub mod aws;
pub mod connection;
pub mod diff;
pub mod eks;
pub mod error;
pub mod managed;
pub mod options;
pub mod references;

pub use crate::eks::AwsConnector;
pub use crate::managed::{error_policy, reconcile, Context};
pub use crate::options::ControllerOptions;
