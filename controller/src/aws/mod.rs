//! The seam between the reconcilers and AWS.
mod connect;
mod error;
mod sdk;
mod token;
pub mod types;

pub use self::connect::{sdk_config, ConnectError, SignerSnafu};
pub use self::error::EksError;
pub use self::sdk::AwsEksClient;
pub use self::token::{StsTokenSigner, TokenError, TokenSigner};
pub use self::types::*;

#[cfg(test)]
pub(crate) use self::error::service_error;
#[cfg(test)]
pub use self::token::MockTokenSigner;

use async_trait::async_trait;
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::{mock, predicate::*};

pub type Result<T> = std::result::Result<T, EksError>;

#[async_trait]
/// The EKS operations the reconcilers rely on. This is provided as a trait in order to allow mocks
/// to be used for testing purposes.
pub trait EksClient: Send + Sync {
    async fn describe_cluster(&self, name: &str) -> Result<ClusterDescription>;
    async fn create_cluster(&self, input: CreateClusterInput) -> Result<()>;
    async fn update_cluster_version(&self, name: &str, version: &str) -> Result<()>;
    async fn update_cluster_config(&self, input: UpdateClusterConfigInput) -> Result<()>;
    async fn associate_encryption_config(
        &self,
        name: &str,
        encryption_config: Vec<EncryptionConfigEntry>,
    ) -> Result<()>;
    async fn delete_cluster(&self, name: &str) -> Result<()>;

    async fn describe_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<NodegroupDescription>;
    async fn create_nodegroup(&self, input: CreateNodegroupInput) -> Result<()>;
    async fn update_nodegroup_version(&self, input: UpdateNodegroupVersionInput) -> Result<()>;
    async fn update_nodegroup_config(&self, input: UpdateNodegroupConfigInput) -> Result<()>;
    async fn delete_nodegroup(&self, cluster_name: &str, nodegroup_name: &str) -> Result<()>;

    async fn describe_fargate_profile(
        &self,
        cluster_name: &str,
        fargate_profile_name: &str,
    ) -> Result<FargateProfileDescription>;
    async fn create_fargate_profile(&self, input: CreateFargateProfileInput) -> Result<()>;
    async fn delete_fargate_profile(
        &self,
        cluster_name: &str,
        fargate_profile_name: &str,
    ) -> Result<()>;

    async fn describe_identity_provider_config(
        &self,
        cluster_name: &str,
        name: &str,
    ) -> Result<IdentityProviderConfigDescription>;
    async fn associate_identity_provider_config(
        &self,
        input: AssociateIdentityProviderConfigInput,
    ) -> Result<()>;
    async fn disassociate_identity_provider_config(
        &self,
        cluster_name: &str,
        name: &str,
    ) -> Result<()>;

    async fn describe_addon(&self, cluster_name: &str, addon_name: &str)
        -> Result<AddonDescription>;
    async fn create_addon(&self, input: CreateAddonInput) -> Result<()>;
    async fn update_addon(&self, input: UpdateAddonInput) -> Result<()>;
    async fn delete_addon(&self, cluster_name: &str, addon_name: &str) -> Result<()>;

    async fn tag_resource(&self, arn: &str, tags: BTreeMap<String, String>) -> Result<()>;
    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()>;
}

#[cfg(test)]
mock! {
    /// A Mock EksClient for use in tests.
    pub EksClient {}
    #[async_trait]
    impl EksClient for EksClient {
        async fn describe_cluster(&self, name: &str) -> Result<ClusterDescription>;
        async fn create_cluster(&self, input: CreateClusterInput) -> Result<()>;
        async fn update_cluster_version(&self, name: &str, version: &str) -> Result<()>;
        async fn update_cluster_config(&self, input: UpdateClusterConfigInput) -> Result<()>;
        async fn associate_encryption_config(
            &self,
            name: &str,
            encryption_config: Vec<EncryptionConfigEntry>,
        ) -> Result<()>;
        async fn delete_cluster(&self, name: &str) -> Result<()>;

        async fn describe_nodegroup(
            &self,
            cluster_name: &str,
            nodegroup_name: &str,
        ) -> Result<NodegroupDescription>;
        async fn create_nodegroup(&self, input: CreateNodegroupInput) -> Result<()>;
        async fn update_nodegroup_version(&self, input: UpdateNodegroupVersionInput) -> Result<()>;
        async fn update_nodegroup_config(&self, input: UpdateNodegroupConfigInput) -> Result<()>;
        async fn delete_nodegroup(&self, cluster_name: &str, nodegroup_name: &str) -> Result<()>;

        async fn describe_fargate_profile(
            &self,
            cluster_name: &str,
            fargate_profile_name: &str,
        ) -> Result<FargateProfileDescription>;
        async fn create_fargate_profile(&self, input: CreateFargateProfileInput) -> Result<()>;
        async fn delete_fargate_profile(
            &self,
            cluster_name: &str,
            fargate_profile_name: &str,
        ) -> Result<()>;

        async fn describe_identity_provider_config(
            &self,
            cluster_name: &str,
            name: &str,
        ) -> Result<IdentityProviderConfigDescription>;
        async fn associate_identity_provider_config(
            &self,
            input: AssociateIdentityProviderConfigInput,
        ) -> Result<()>;
        async fn disassociate_identity_provider_config(
            &self,
            cluster_name: &str,
            name: &str,
        ) -> Result<()>;

        async fn describe_addon(&self, cluster_name: &str, addon_name: &str)
            -> Result<AddonDescription>;
        async fn create_addon(&self, input: CreateAddonInput) -> Result<()>;
        async fn update_addon(&self, input: UpdateAddonInput) -> Result<()>;
        async fn delete_addon(&self, cluster_name: &str, addon_name: &str) -> Result<()>;

        async fn tag_resource(&self, arn: &str, tags: BTreeMap<String, String>) -> Result<()>;
        async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()>;
    }
}
