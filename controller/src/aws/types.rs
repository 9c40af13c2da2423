//! Request and response shapes of the EKS operations the reconcilers use.
//!
//! These mirror the EKS API closely but carry only the fields the provider reads or writes, so the
//! reconcilers can be exercised without the SDK.
use chrono::{DateTime, Utc};
use models::eks::cluster::{
    AccessConfig, KubernetesNetworkConfigRequest, KubernetesNetworkConfigResponse, Logging,
    OutpostConfigRequest,
};
use models::eks::fargateprofile::FargateProfileSelector;
use models::eks::identityproviderconfig::OidcIdentityProviderConfig;
use models::eks::nodegroup::{
    LaunchTemplateSpecification, NodeGroupResources, NodeGroupScalingConfig,
    NodeGroupUpdateConfig, RemoteAccessConfig, Taint,
};
use std::collections::BTreeMap;

/// A health issue reported for a node group or add-on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HealthIssue {
    pub code: Option<String>,
    pub message: Option<String>,
    pub resource_ids: Vec<String>,
}

// Cluster

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EncryptionConfigEntry {
    pub key_arn: Option<String>,
    pub resources: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VpcConfigDescription {
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub cluster_security_group_id: Option<String>,
    pub vpc_id: Option<String>,
    pub endpoint_public_access: bool,
    pub endpoint_private_access: bool,
    pub public_access_cidrs: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ClusterDescription {
    pub name: Option<String>,
    pub arn: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub resources_vpc_config: Option<VpcConfigDescription>,
    pub kubernetes_network_config: Option<KubernetesNetworkConfigResponse>,
    pub logging: Option<Logging>,
    pub identity_oidc_issuer: Option<String>,
    pub status: Option<String>,
    /// Base64-encoded PEM bundle.
    pub certificate_authority_data: Option<String>,
    pub platform_version: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub encryption_config: Vec<EncryptionConfigEntry>,
    pub outpost_config: Option<OutpostConfigRequest>,
    pub authentication_mode: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VpcConfigInput {
    pub subnet_ids: Option<Vec<String>>,
    pub security_group_ids: Option<Vec<String>>,
    pub endpoint_public_access: Option<bool>,
    pub endpoint_private_access: Option<bool>,
    pub public_access_cidrs: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateClusterInput {
    pub name: String,
    pub role_arn: String,
    pub version: Option<String>,
    pub resources_vpc_config: VpcConfigInput,
    pub kubernetes_network_config: Option<KubernetesNetworkConfigRequest>,
    pub logging: Option<Logging>,
    pub encryption_config: Vec<EncryptionConfigEntry>,
    pub outpost_config: Option<OutpostConfigRequest>,
    pub access_config: Option<AccessConfig>,
    pub tags: BTreeMap<String, String>,
}

/// Exactly one of the optional sections is set per request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateClusterConfigInput {
    pub name: String,
    pub logging: Option<Logging>,
    pub resources_vpc_config: Option<VpcConfigInput>,
    pub authentication_mode: Option<String>,
}

// Node group

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodegroupDescription {
    pub nodegroup_name: Option<String>,
    pub nodegroup_arn: Option<String>,
    pub cluster_name: Option<String>,
    pub version: Option<String>,
    pub release_version: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub capacity_type: Option<String>,
    pub scaling_config: Option<NodeGroupScalingConfig>,
    pub instance_types: Vec<String>,
    pub subnets: Vec<String>,
    pub remote_access: Option<RemoteAccessConfig>,
    pub ami_type: Option<String>,
    pub node_role: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub resources: Option<NodeGroupResources>,
    pub disk_size: Option<i32>,
    pub health_issues: Vec<HealthIssue>,
    pub update_config: Option<NodeGroupUpdateConfig>,
    pub launch_template: Option<LaunchTemplateSpecification>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateNodegroupInput {
    pub cluster_name: String,
    pub nodegroup_name: String,
    pub scaling_config: Option<NodeGroupScalingConfig>,
    pub disk_size: Option<i32>,
    pub subnets: Vec<String>,
    pub instance_types: Vec<String>,
    pub ami_type: Option<String>,
    pub remote_access: Option<RemoteAccessConfig>,
    pub node_role: String,
    pub labels: BTreeMap<String, String>,
    pub taints: Vec<Taint>,
    pub tags: BTreeMap<String, String>,
    pub launch_template: Option<LaunchTemplateSpecification>,
    pub update_config: Option<NodeGroupUpdateConfig>,
    pub capacity_type: Option<String>,
    pub version: Option<String>,
    pub release_version: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateNodegroupVersionInput {
    pub cluster_name: String,
    pub nodegroup_name: String,
    pub version: Option<String>,
    pub release_version: Option<String>,
    pub launch_template: Option<LaunchTemplateSpecification>,
    pub force: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateLabelsPayload {
    pub add_or_update_labels: BTreeMap<String, String>,
    pub remove_labels: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateTaintsPayload {
    pub add_or_update_taints: Vec<Taint>,
    pub remove_taints: Vec<Taint>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateNodegroupConfigInput {
    pub cluster_name: String,
    pub nodegroup_name: String,
    pub labels: Option<UpdateLabelsPayload>,
    pub taints: Option<UpdateTaintsPayload>,
    pub scaling_config: Option<NodeGroupScalingConfig>,
    pub update_config: Option<NodeGroupUpdateConfig>,
}

// Fargate profile

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FargateProfileDescription {
    pub fargate_profile_name: Option<String>,
    pub fargate_profile_arn: Option<String>,
    pub cluster_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub pod_execution_role_arn: Option<String>,
    pub subnets: Vec<String>,
    pub selectors: Vec<FargateProfileSelector>,
    pub status: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateFargateProfileInput {
    pub fargate_profile_name: String,
    pub cluster_name: String,
    pub pod_execution_role_arn: String,
    pub subnets: Vec<String>,
    pub selectors: Vec<FargateProfileSelector>,
    pub tags: BTreeMap<String, String>,
}

// Identity provider config

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdentityProviderConfigDescription {
    pub identity_provider_config_name: Option<String>,
    pub identity_provider_config_arn: Option<String>,
    pub cluster_name: Option<String>,
    pub oidc: Option<OidcIdentityProviderConfig>,
    pub status: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AssociateIdentityProviderConfigInput {
    pub cluster_name: String,
    pub identity_provider_config_name: String,
    pub oidc: OidcIdentityProviderConfig,
    pub tags: BTreeMap<String, String>,
}

// Add-on

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AddonDescription {
    pub addon_name: Option<String>,
    pub cluster_name: Option<String>,
    pub status: Option<String>,
    pub addon_version: Option<String>,
    pub health_issues: Vec<HealthIssue>,
    pub addon_arn: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub service_account_role_arn: Option<String>,
    pub configuration_values: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateAddonInput {
    pub cluster_name: String,
    pub addon_name: String,
    pub addon_version: Option<String>,
    pub service_account_role_arn: Option<String>,
    pub resolve_conflicts: Option<String>,
    pub configuration_values: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UpdateAddonInput {
    pub cluster_name: String,
    pub addon_name: String,
    pub addon_version: Option<String>,
    pub service_account_role_arn: Option<String>,
    pub resolve_conflicts: Option<String>,
    pub configuration_values: Option<String>,
}
