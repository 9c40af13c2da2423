use crate::impl_managed;
use crate::managed::{ConditionedStatus, Reference, ResourceSpec, Selector};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only identity provider type EKS supports.
pub const IDENTITY_PROVIDER_TYPE_OIDC: &str = "oidc";

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentityProviderConfigStatusType {
    Creating,
    Active,
    Deleting,
    CreateFailed,
    DeleteFailed,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OidcIdentityProviderConfig {
    pub client_id: String,
    pub issuer_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_claims: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix: Option<String>,
}

/// The desired state of an OIDC identity provider association. Everything but `tags` is fixed
/// at creation.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfigParameters {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_selector: Option<Selector>,
    pub oidc: OidcIdentityProviderConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfigObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<IdentityProviderConfigStatusType>,
}

/// Associates an OIDC identity provider with an EKS cluster.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "eks.aws.crossplane.io",
    kind = "IdentityProviderConfig",
    plural = "identityproviderconfigs",
    singular = "identityproviderconfig",
    status = "IdentityProviderConfigStatus",
    version = "v1beta1",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.atProvider.status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfigSpec {
    pub for_provider: IdentityProviderConfigParameters,
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProviderConfigStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<IdentityProviderConfigObservation>,
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
}

impl_managed!(IdentityProviderConfig);
