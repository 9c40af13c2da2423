//! The desired-state schema of the EKS provider, along with the lifecycle types and control-plane
//! store client shared by every managed resource.
pub mod constants;
pub mod eks;
pub mod managed;
pub mod providerconfig;
pub mod telemetry;
