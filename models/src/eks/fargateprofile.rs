use crate::impl_managed;
use crate::managed::{ConditionedStatus, Reference, ResourceSpec, Selector};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FargateProfileStatusType {
    Creating,
    Active,
    Deleting,
    CreateFailed,
    DeleteFailed,
    #[serde(other)]
    Unknown,
}

/// Matches the pods scheduled onto Fargate.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FargateProfileSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// The desired state of a Fargate profile. Everything but `tags` is fixed at creation.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FargateProfileParameters {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_execution_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_execution_role_arn_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_execution_role_arn_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(length(max = 5))]
    pub selectors: Vec<FargateProfileSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_refs: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FargateProfileObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fargate_profile_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FargateProfileStatusType>,
}

/// Declares which pods of an EKS cluster run on Fargate.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "eks.aws.crossplane.io",
    kind = "FargateProfile",
    plural = "fargateprofiles",
    singular = "fargateprofile",
    status = "FargateProfileStatus",
    version = "v1beta1",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.forProvider.clusterName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FargateProfileSpec {
    pub for_provider: FargateProfileParameters,
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FargateProfileStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<FargateProfileObservation>,
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
}

impl_managed!(FargateProfile);
