//! Custom resources for the `eks.aws.crossplane.io` API group.
//!
//! Every kind follows the same layout: `spec.forProvider` holds the user-declared AWS parameters
//! (with `*Ref`/`*Selector` placeholders for fields that may be bound to other managed resources)
//! next to the flattened lifecycle fields of [`ResourceSpec`](crate::managed::ResourceSpec), and
//! `status.atProvider` mirrors what AWS last reported.
pub mod addon;
pub mod cluster;
pub mod fargateprofile;
pub mod identityproviderconfig;
pub mod nodegroup;

pub use self::addon::Addon;
pub use self::cluster::Cluster;
pub use self::fargateprofile::FargateProfile;
pub use self::identityproviderconfig::IdentityProviderConfig;
pub use self::nodegroup::NodeGroup;
