use crate::impl_managed;
use crate::managed::{ConditionedStatus, Reference, ResourceSpec, Selector};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The AMI type that marks a node group as running a custom image from its launch template.
pub const AMI_TYPE_CUSTOM: &str = "CUSTOM";

/// The lifecycle status EKS reports for a node group.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeGroupStatusType {
    Creating,
    Active,
    Updating,
    Deleting,
    CreateFailed,
    DeleteFailed,
    Degraded,
    #[serde(other)]
    Unknown,
}

/// The health issue codes EKS reports for a node group.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
pub enum NodeGroupIssueCode {
    AccessDenied,
    AmiIdNotFound,
    AsgInstanceLaunchFailures,
    AutoScalingGroupInstanceRefreshActive,
    AutoScalingGroupInvalidConfiguration,
    AutoScalingGroupNotFound,
    AutoScalingGroupOptInRequired,
    AutoScalingGroupRateLimitExceeded,
    ClusterUnreachable,
    Ec2LaunchTemplateNotFound,
    Ec2LaunchTemplateVersionMismatch,
    Ec2SecurityGroupDeletionFailure,
    Ec2SecurityGroupNotFound,
    Ec2SubnetInvalidConfiguration,
    Ec2SubnetNotFound,
    IamInstanceProfileNotFound,
    IamLimitExceeded,
    IamNodeRoleNotFound,
    InstanceLimitExceeded,
    InsufficientFreeAddresses,
    InternalFailure,
    NodeCreationFailure,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LaunchTemplateSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccessConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec2_ssh_key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_security_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_security_group_refs: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_security_group_selector: Option<Selector>,
}

/// Node group sizing. An unset `desiredSize` means the size is managed outside this provider,
/// for example by a cluster autoscaler.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupScalingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i32>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupUpdateConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable_percentage: Option<i32>,
    /// Forces version updates even when pods cannot be drained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// One of `NO_SCHEDULE`, `NO_EXECUTE` or `PREFER_NO_SCHEDULE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

/// The desired state of an EKS managed node group.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupParameters {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_type: Option<String>,
    /// `ON_DEMAND` or `SPOT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_template: Option<LaunchTemplateSpecification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_role_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_role_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_access: Option<RemoteAccessConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_config: Option<NodeGroupScalingConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_refs: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_config: Option<NodeGroupUpdateConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl NodeGroupParameters {
    /// Whether the node group runs a custom AMI, in which case its versions are owned by AWS.
    pub fn is_custom_ami(&self) -> bool {
        self.ami_type.as_deref() == Some(AMI_TYPE_CUSTOM)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub code: Option<NodeGroupIssueCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_ids: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupHealth {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_scaling_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_access_security_group: Option<String>,
}

/// The observed state of an EKS managed node group.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupObservation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<NodeGroupHealth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_group_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<NodeGroupResources>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling_config: Option<NodeGroupScalingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeGroupStatusType>,
}

/// A managed pool of worker nodes attached to an EKS cluster.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "eks.aws.crossplane.io",
    kind = "NodeGroup",
    plural = "nodegroups",
    singular = "nodegroup",
    status = "NodeGroupStatus",
    version = "v1beta1",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"Cluster", "type":"string", "jsonPath":".spec.forProvider.clusterName"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.atProvider.status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupSpec {
    pub for_provider: NodeGroupParameters,
    #[serde(flatten)]
    pub resource_spec: ResourceSpec,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<NodeGroupObservation>,
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
}

impl_managed!(NodeGroup);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_code_parsing() {
        let test_cases = vec![
            ("AccessDenied", NodeGroupIssueCode::AccessDenied),
            ("Ec2SubnetNotFound", NodeGroupIssueCode::Ec2SubnetNotFound),
            ("NodeCreationFailure", NodeGroupIssueCode::NodeCreationFailure),
            ("SomethingNew", NodeGroupIssueCode::Unknown),
        ];

        for (input, expected) in test_cases {
            let parsed: NodeGroupIssueCode = serde_plain::from_str(input).unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn test_custom_ami() {
        let mut params = NodeGroupParameters::default();
        assert!(!params.is_custom_ami());
        params.ami_type = Some("AL2_x86_64".to_string());
        assert!(!params.is_custom_ami());
        params.ami_type = Some(AMI_TYPE_CUSTOM.to_string());
        assert!(params.is_custom_ami());
    }

    #[test]
    fn test_unset_desired_size_round_trips_as_absent() {
        let params: NodeGroupParameters = serde_json::from_value(serde_json::json!({
            "region": "us-east-1",
            "scalingConfig": {"minSize": 6, "maxSize": 10},
        }))
        .unwrap();

        let scaling = params.scaling_config.unwrap();
        assert_eq!(scaling.desired_size, None);
        let value = serde_json::to_value(scaling).unwrap();
        assert!(value.get("desiredSize").is_none());
    }
}
