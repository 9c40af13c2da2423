use crate::impl_managed;
use crate::managed::{ConditionedStatus, Reference, ResourceSpec, Selector};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddonStatusType {
    Creating,
    Active,
    Updating,
    Degraded,
    Deleting,
    CreateFailed,
    DeleteFailed,
    #[serde(other)]
    Unknown,
}

/// The desired state of an EKS add-on.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonParameters {
    pub region: String,
    pub addon_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_selector: Option<Selector>,
    /// A JSON or YAML document matching the add-on's configuration schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_values: Option<String>,
    /// How conflicting field values are handled: `OVERWRITE`, `NONE` or `PRESERVE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve_conflicts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_role_arn_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_role_arn_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonHealth {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<AddonIssue>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addon_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<AddonHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AddonStatusType>,
}

/// A managed add-on installed into an EKS cluster.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "eks.aws.crossplane.io",
    kind = "Addon",
    plural = "addons",
    singular = "addon",
    status = "AddonStatus",
    version = "v1beta1",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"Addon", "type":"string", "jsonPath":".spec.forProvider.addonName"}"#,
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.forProvider.addonVersion"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AddonSpec {
    pub for_provider: AddonParameters,
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<AddonObservation>,
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
}

impl_managed!(Addon);
