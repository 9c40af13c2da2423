//! `EksClient` implementation over `aws-sdk-eks`.
use super::error::EksError;
use super::types::*;
use super::{EksClient, Result};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_eks::primitives::DateTime as AwsDateTime;
use aws_sdk_eks::types as eks;
use chrono::{DateTime, Utc};
use models::eks::cluster::{
    ControlPlanePlacement, KubernetesNetworkConfigResponse, LogSetup, LogType, Logging,
    OutpostConfigRequest,
};
use models::eks::fargateprofile::FargateProfileSelector;
use models::eks::identityproviderconfig::{
    OidcIdentityProviderConfig, IDENTITY_PROVIDER_TYPE_OIDC,
};
use models::eks::nodegroup::{
    LaunchTemplateSpecification, NodeGroupResources, NodeGroupScalingConfig,
    NodeGroupUpdateConfig, RemoteAccessConfig, Taint,
};
use std::collections::{BTreeMap, HashMap};
use tracing::instrument;

/// Talks to the EKS API of a single region.
#[derive(Clone, Debug)]
pub struct AwsEksClient {
    client: aws_sdk_eks::Client,
}

impl AwsEksClient {
    pub fn new(config: &SdkConfig) -> Self {
        AwsEksClient {
            client: aws_sdk_eks::Client::new(config),
        }
    }
}

// The SDK models some fields as required and others as optional; these accept either.
fn opt<T>(value: impl Into<Option<T>>) -> Option<T> {
    value.into()
}

fn list<T>(value: impl Into<Option<Vec<T>>>) -> Vec<T> {
    value.into().unwrap_or_default()
}

fn btree(value: impl Into<Option<HashMap<String, String>>>) -> BTreeMap<String, String> {
    value.into().unwrap_or_default().into_iter().collect()
}

fn hash(value: BTreeMap<String, String>) -> Option<HashMap<String, String>> {
    if value.is_empty() {
        None
    } else {
        Some(value.into_iter().collect())
    }
}

fn non_empty<T>(value: Vec<T>) -> Option<Vec<T>> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn timestamp(value: Option<AwsDateTime>) -> Option<DateTime<Utc>> {
    value.and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
}

fn invalid_input(operation: &str, err: impl std::fmt::Display) -> EksError {
    EksError::InvalidInput {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

fn log_type(value: &eks::LogType) -> Option<LogType> {
    serde_plain::from_str(value.as_str()).ok()
}

fn log_type_name(value: &LogType) -> eks::LogType {
    let name = serde_plain::to_string(value).unwrap_or_default();
    eks::LogType::from(name.as_str())
}

fn logging_from_sdk(logging: eks::Logging) -> Logging {
    Logging {
        cluster_logging: list::<eks::LogSetup>(logging.cluster_logging)
            .into_iter()
            .map(|setup| LogSetup {
                enabled: opt(setup.enabled),
                types: list::<eks::LogType>(setup.types).iter().filter_map(log_type).collect(),
            })
            .collect(),
    }
}

fn logging_to_sdk(logging: &Logging) -> eks::Logging {
    eks::Logging::builder()
        .set_cluster_logging(Some(
            logging
                .cluster_logging
                .iter()
                .map(|setup| {
                    eks::LogSetup::builder()
                        .set_enabled(setup.enabled)
                        .set_types(Some(setup.types.iter().map(log_type_name).collect()))
                        .build()
                })
                .collect(),
        ))
        .build()
}

fn vpc_config_to_sdk(vpc: &VpcConfigInput) -> eks::VpcConfigRequest {
    eks::VpcConfigRequest::builder()
        .set_subnet_ids(vpc.subnet_ids.clone())
        .set_security_group_ids(vpc.security_group_ids.clone())
        .set_endpoint_public_access(vpc.endpoint_public_access)
        .set_endpoint_private_access(vpc.endpoint_private_access)
        .set_public_access_cidrs(vpc.public_access_cidrs.clone())
        .build()
}

fn encryption_config_to_sdk(entries: &[EncryptionConfigEntry]) -> Vec<eks::EncryptionConfig> {
    entries
        .iter()
        .map(|entry| {
            eks::EncryptionConfig::builder()
                .provider(
                    eks::Provider::builder()
                        .set_key_arn(entry.key_arn.clone())
                        .build(),
                )
                .set_resources(Some(entry.resources.clone()))
                .build()
        })
        .collect()
}

fn taint_to_sdk(taint: &Taint) -> eks::Taint {
    eks::Taint::builder()
        .set_key(taint.key.clone())
        .set_value(taint.value.clone())
        .set_effect(taint.effect.as_deref().map(eks::TaintEffect::from))
        .build()
}

fn taint_from_sdk(taint: eks::Taint) -> Taint {
    Taint {
        key: taint.key,
        value: taint.value,
        effect: taint.effect.map(|e| e.as_str().to_string()),
    }
}

fn scaling_config_to_sdk(scaling: &NodeGroupScalingConfig) -> eks::NodegroupScalingConfig {
    eks::NodegroupScalingConfig::builder()
        .set_desired_size(scaling.desired_size)
        .set_min_size(scaling.min_size)
        .set_max_size(scaling.max_size)
        .build()
}

fn update_config_to_sdk(update: &NodeGroupUpdateConfig) -> eks::NodegroupUpdateConfig {
    eks::NodegroupUpdateConfig::builder()
        .set_max_unavailable(update.max_unavailable)
        .set_max_unavailable_percentage(update.max_unavailable_percentage)
        .build()
}

fn launch_template_to_sdk(lt: &LaunchTemplateSpecification) -> eks::LaunchTemplateSpecification {
    eks::LaunchTemplateSpecification::builder()
        .set_id(lt.id.clone())
        .set_name(lt.name.clone())
        .set_version(lt.version.clone())
        .build()
}

fn health_issue(
    code: Option<&str>,
    message: Option<String>,
    resource_ids: Option<Vec<String>>,
) -> HealthIssue {
    HealthIssue {
        code: code.map(str::to_string),
        message,
        resource_ids: resource_ids.unwrap_or_default(),
    }
}

fn identity_provider_config(
    operation: &str,
    name: &str,
) -> Result<eks::IdentityProviderConfig> {
    eks::IdentityProviderConfig::builder()
        .r#type(IDENTITY_PROVIDER_TYPE_OIDC)
        .name(name)
        .build()
        .map_err(|e| invalid_input(operation, e))
}

#[async_trait]
impl EksClient for AwsEksClient {
    #[instrument(skip(self), err)]
    async fn describe_cluster(&self, name: &str) -> Result<ClusterDescription> {
        const OP: &str = "DescribeCluster";
        let cluster = self
            .client
            .describe_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?
            .cluster
            .ok_or_else(|| EksError::not_found(OP, name))?;

        Ok(ClusterDescription {
            name: cluster.name,
            arn: cluster.arn,
            created_at: timestamp(cluster.created_at),
            version: cluster.version,
            endpoint: cluster.endpoint,
            role_arn: cluster.role_arn,
            resources_vpc_config: cluster.resources_vpc_config.map(|vpc| VpcConfigDescription {
                subnet_ids: list(vpc.subnet_ids),
                security_group_ids: list(vpc.security_group_ids),
                cluster_security_group_id: vpc.cluster_security_group_id,
                vpc_id: vpc.vpc_id,
                endpoint_public_access: opt(vpc.endpoint_public_access).unwrap_or_default(),
                endpoint_private_access: opt(vpc.endpoint_private_access).unwrap_or_default(),
                public_access_cidrs: list(vpc.public_access_cidrs),
            }),
            kubernetes_network_config: cluster.kubernetes_network_config.map(|knc| {
                KubernetesNetworkConfigResponse {
                    ip_family: knc.ip_family.map(|f| f.as_str().to_string()),
                    service_ipv4_cidr: knc.service_ipv4_cidr,
                    service_ipv6_cidr: knc.service_ipv6_cidr,
                }
            }),
            logging: cluster.logging.map(logging_from_sdk),
            identity_oidc_issuer: cluster
                .identity
                .and_then(|identity| identity.oidc)
                .and_then(|oidc| oidc.issuer),
            status: cluster.status.map(|s| s.as_str().to_string()),
            certificate_authority_data: cluster.certificate_authority.and_then(|ca| ca.data),
            platform_version: cluster.platform_version,
            tags: btree(cluster.tags),
            encryption_config: list::<eks::EncryptionConfig>(cluster.encryption_config)
                .into_iter()
                .map(|ec| EncryptionConfigEntry {
                    key_arn: ec.provider.and_then(|p| p.key_arn),
                    resources: list(ec.resources),
                })
                .collect(),
            outpost_config: cluster.outpost_config.map(|oc| OutpostConfigRequest {
                control_plane_instance_type: opt(oc.control_plane_instance_type)
                    .unwrap_or_default(),
                outpost_arns: list(oc.outpost_arns),
                control_plane_placement: oc.control_plane_placement.map(|p| {
                    ControlPlanePlacement {
                        group_name: p.group_name,
                    }
                }),
            }),
            authentication_mode: cluster
                .access_config
                .and_then(|ac| ac.authentication_mode)
                .map(|m| m.as_str().to_string()),
        })
    }

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    async fn create_cluster(&self, input: CreateClusterInput) -> Result<()> {
        const OP: &str = "CreateCluster";
        let outpost_config = match &input.outpost_config {
            Some(oc) => Some(
                eks::OutpostConfigRequest::builder()
                    .set_outpost_arns(Some(oc.outpost_arns.clone()))
                    .control_plane_instance_type(&oc.control_plane_instance_type)
                    .set_control_plane_placement(oc.control_plane_placement.as_ref().map(|p| {
                        eks::ControlPlanePlacementRequest::builder()
                            .set_group_name(p.group_name.clone())
                            .build()
                    }))
                    .build()
                    .map_err(|e| invalid_input(OP, e))?,
            ),
            None => None,
        };

        self.client
            .create_cluster()
            .name(&input.name)
            .role_arn(&input.role_arn)
            .set_version(input.version.clone())
            .resources_vpc_config(vpc_config_to_sdk(&input.resources_vpc_config))
            .set_kubernetes_network_config(input.kubernetes_network_config.as_ref().map(|knc| {
                eks::KubernetesNetworkConfigRequest::builder()
                    .set_ip_family(knc.ip_family.as_deref().map(eks::IpFamily::from))
                    .set_service_ipv4_cidr(knc.service_ipv4_cidr.clone())
                    .build()
            }))
            .set_logging(input.logging.as_ref().map(logging_to_sdk))
            .set_encryption_config(non_empty(encryption_config_to_sdk(&input.encryption_config)))
            .set_outpost_config(outpost_config)
            .set_access_config(input.access_config.as_ref().map(|ac| {
                eks::CreateAccessConfigRequest::builder()
                    .set_authentication_mode(
                        ac.authentication_mode
                            .as_deref()
                            .map(eks::AuthenticationMode::from),
                    )
                    .set_bootstrap_cluster_creator_admin_permissions(
                        ac.bootstrap_cluster_creator_admin_permissions,
                    )
                    .build()
            }))
            .set_tags(hash(input.tags))
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn update_cluster_version(&self, name: &str, version: &str) -> Result<()> {
        self.client
            .update_cluster_version()
            .name(name)
            .version(version)
            .send()
            .await
            .map_err(|e| EksError::from_sdk("UpdateClusterVersion", e))?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    async fn update_cluster_config(&self, input: UpdateClusterConfigInput) -> Result<()> {
        self.client
            .update_cluster_config()
            .name(&input.name)
            .set_logging(input.logging.as_ref().map(logging_to_sdk))
            .set_resources_vpc_config(input.resources_vpc_config.as_ref().map(vpc_config_to_sdk))
            .set_access_config(input.authentication_mode.as_deref().map(|mode| {
                eks::UpdateAccessConfigRequest::builder()
                    .authentication_mode(eks::AuthenticationMode::from(mode))
                    .build()
            }))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("UpdateClusterConfig", e))?;
        Ok(())
    }

    #[instrument(skip(self, encryption_config), err)]
    async fn associate_encryption_config(
        &self,
        name: &str,
        encryption_config: Vec<EncryptionConfigEntry>,
    ) -> Result<()> {
        self.client
            .associate_encryption_config()
            .cluster_name(name)
            .set_encryption_config(Some(encryption_config_to_sdk(&encryption_config)))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("AssociateEncryptionConfig", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.client
            .delete_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk("DeleteCluster", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn describe_nodegroup(
        &self,
        cluster_name: &str,
        nodegroup_name: &str,
    ) -> Result<NodegroupDescription> {
        const OP: &str = "DescribeNodegroup";
        let ng = self
            .client
            .describe_nodegroup()
            .cluster_name(cluster_name)
            .nodegroup_name(nodegroup_name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?
            .nodegroup
            .ok_or_else(|| EksError::not_found(OP, nodegroup_name))?;

        Ok(NodegroupDescription {
            nodegroup_name: ng.nodegroup_name,
            nodegroup_arn: ng.nodegroup_arn,
            cluster_name: ng.cluster_name,
            version: ng.version,
            release_version: ng.release_version,
            created_at: timestamp(ng.created_at),
            modified_at: timestamp(ng.modified_at),
            status: ng.status.map(|s| s.as_str().to_string()),
            capacity_type: ng.capacity_type.map(|c| c.as_str().to_string()),
            scaling_config: ng.scaling_config.map(|sc| NodeGroupScalingConfig {
                desired_size: sc.desired_size,
                max_size: sc.max_size,
                min_size: sc.min_size,
            }),
            instance_types: list(ng.instance_types),
            subnets: list(ng.subnets),
            remote_access: ng.remote_access.map(|ra| RemoteAccessConfig {
                ec2_ssh_key: ra.ec2_ssh_key,
                source_security_groups: list(ra.source_security_groups),
                ..Default::default()
            }),
            ami_type: ng.ami_type.map(|a| a.as_str().to_string()),
            node_role: ng.node_role,
            labels: btree(ng.labels),
            taints: list(ng.taints).into_iter().map(taint_from_sdk).collect(),
            resources: ng.resources.map(|r| NodeGroupResources {
                auto_scaling_groups: list::<eks::AutoScalingGroup>(r.auto_scaling_groups)
                    .into_iter()
                    .filter_map(|asg| asg.name)
                    .collect(),
                remote_access_security_group: r.remote_access_security_group,
            }),
            disk_size: ng.disk_size,
            health_issues: ng
                .health
                .map(|h| list::<eks::Issue>(h.issues))
                .unwrap_or_default()
                .into_iter()
                .map(|issue| {
                    health_issue(
                        issue.code.as_ref().map(|c| c.as_str()),
                        issue.message,
                        issue.resource_ids,
                    )
                })
                .collect(),
            update_config: ng.update_config.map(|uc| NodeGroupUpdateConfig {
                max_unavailable: uc.max_unavailable,
                max_unavailable_percentage: uc.max_unavailable_percentage,
                force: None,
            }),
            launch_template: ng.launch_template.map(|lt| LaunchTemplateSpecification {
                id: lt.id,
                name: lt.name,
                version: lt.version,
            }),
            tags: btree(ng.tags),
        })
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, name = %input.nodegroup_name), err)]
    async fn create_nodegroup(&self, input: CreateNodegroupInput) -> Result<()> {
        self.client
            .create_nodegroup()
            .cluster_name(&input.cluster_name)
            .nodegroup_name(&input.nodegroup_name)
            .set_scaling_config(input.scaling_config.as_ref().map(scaling_config_to_sdk))
            .set_disk_size(input.disk_size)
            .set_subnets(Some(input.subnets.clone()))
            .set_instance_types(non_empty(input.instance_types.clone()))
            .set_ami_type(input.ami_type.as_deref().map(eks::AmiTypes::from))
            .set_remote_access(input.remote_access.as_ref().map(|ra| {
                eks::RemoteAccessConfig::builder()
                    .set_ec2_ssh_key(ra.ec2_ssh_key.clone())
                    .set_source_security_groups(non_empty(ra.source_security_groups.clone()))
                    .build()
            }))
            .node_role(&input.node_role)
            .set_labels(hash(input.labels.clone()))
            .set_taints(non_empty(input.taints.iter().map(taint_to_sdk).collect()))
            .set_tags(hash(input.tags.clone()))
            .set_launch_template(input.launch_template.as_ref().map(launch_template_to_sdk))
            .set_update_config(input.update_config.as_ref().map(update_config_to_sdk))
            .set_capacity_type(input.capacity_type.as_deref().map(eks::CapacityTypes::from))
            .set_version(input.version.clone())
            .set_release_version(input.release_version.clone())
            .send()
            .await
            .map_err(|e| EksError::from_sdk("CreateNodegroup", e))?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, name = %input.nodegroup_name), err)]
    async fn update_nodegroup_version(&self, input: UpdateNodegroupVersionInput) -> Result<()> {
        self.client
            .update_nodegroup_version()
            .cluster_name(&input.cluster_name)
            .nodegroup_name(&input.nodegroup_name)
            .set_version(input.version.clone())
            .set_release_version(input.release_version.clone())
            .set_launch_template(input.launch_template.as_ref().map(launch_template_to_sdk))
            .force(input.force)
            .send()
            .await
            .map_err(|e| EksError::from_sdk("UpdateNodegroupVersion", e))?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, name = %input.nodegroup_name), err)]
    async fn update_nodegroup_config(&self, input: UpdateNodegroupConfigInput) -> Result<()> {
        self.client
            .update_nodegroup_config()
            .cluster_name(&input.cluster_name)
            .nodegroup_name(&input.nodegroup_name)
            .set_labels(input.labels.as_ref().map(|labels| {
                eks::UpdateLabelsPayload::builder()
                    .set_add_or_update_labels(hash(labels.add_or_update_labels.clone()))
                    .set_remove_labels(non_empty(labels.remove_labels.clone()))
                    .build()
            }))
            .set_taints(input.taints.as_ref().map(|taints| {
                eks::UpdateTaintsPayload::builder()
                    .set_add_or_update_taints(non_empty(
                        taints.add_or_update_taints.iter().map(taint_to_sdk).collect(),
                    ))
                    .set_remove_taints(non_empty(
                        taints.remove_taints.iter().map(taint_to_sdk).collect(),
                    ))
                    .build()
            }))
            .set_scaling_config(input.scaling_config.as_ref().map(scaling_config_to_sdk))
            .set_update_config(input.update_config.as_ref().map(update_config_to_sdk))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("UpdateNodegroupConfig", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_nodegroup(&self, cluster_name: &str, nodegroup_name: &str) -> Result<()> {
        self.client
            .delete_nodegroup()
            .cluster_name(cluster_name)
            .nodegroup_name(nodegroup_name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk("DeleteNodegroup", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn describe_fargate_profile(
        &self,
        cluster_name: &str,
        fargate_profile_name: &str,
    ) -> Result<FargateProfileDescription> {
        const OP: &str = "DescribeFargateProfile";
        let fp = self
            .client
            .describe_fargate_profile()
            .cluster_name(cluster_name)
            .fargate_profile_name(fargate_profile_name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?
            .fargate_profile
            .ok_or_else(|| EksError::not_found(OP, fargate_profile_name))?;

        Ok(FargateProfileDescription {
            fargate_profile_name: fp.fargate_profile_name,
            fargate_profile_arn: fp.fargate_profile_arn,
            cluster_name: fp.cluster_name,
            created_at: timestamp(fp.created_at),
            pod_execution_role_arn: fp.pod_execution_role_arn,
            subnets: list(fp.subnets),
            selectors: list::<eks::FargateProfileSelector>(fp.selectors)
                .into_iter()
                .map(|s| FargateProfileSelector {
                    namespace: s.namespace,
                    labels: s.labels.map(|l| l.into_iter().collect()),
                })
                .collect(),
            status: fp.status.map(|s| s.as_str().to_string()),
            tags: btree(fp.tags),
        })
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, name = %input.fargate_profile_name), err)]
    async fn create_fargate_profile(&self, input: CreateFargateProfileInput) -> Result<()> {
        self.client
            .create_fargate_profile()
            .fargate_profile_name(&input.fargate_profile_name)
            .cluster_name(&input.cluster_name)
            .pod_execution_role_arn(&input.pod_execution_role_arn)
            .set_subnets(non_empty(input.subnets.clone()))
            .set_selectors(Some(
                input
                    .selectors
                    .iter()
                    .map(|s| {
                        eks::FargateProfileSelector::builder()
                            .set_namespace(s.namespace.clone())
                            .set_labels(s.labels.clone().map(|l| l.into_iter().collect()))
                            .build()
                    })
                    .collect(),
            ))
            .set_tags(hash(input.tags.clone()))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("CreateFargateProfile", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_fargate_profile(
        &self,
        cluster_name: &str,
        fargate_profile_name: &str,
    ) -> Result<()> {
        self.client
            .delete_fargate_profile()
            .cluster_name(cluster_name)
            .fargate_profile_name(fargate_profile_name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk("DeleteFargateProfile", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn describe_identity_provider_config(
        &self,
        cluster_name: &str,
        name: &str,
    ) -> Result<IdentityProviderConfigDescription> {
        const OP: &str = "DescribeIdentityProviderConfig";
        let oidc = self
            .client
            .describe_identity_provider_config()
            .cluster_name(cluster_name)
            .identity_provider_config(identity_provider_config(OP, name)?)
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?
            .identity_provider_config
            .and_then(|config| config.oidc)
            .ok_or_else(|| EksError::not_found(OP, name))?;

        let tags = btree(oidc.tags);
        let description = IdentityProviderConfigDescription {
            identity_provider_config_name: oidc.identity_provider_config_name,
            identity_provider_config_arn: oidc.identity_provider_config_arn,
            cluster_name: oidc.cluster_name,
            status: oidc.status.map(|s| s.as_str().to_string()),
            oidc: Some(OidcIdentityProviderConfig {
                client_id: oidc.client_id.unwrap_or_default(),
                issuer_url: oidc.issuer_url.unwrap_or_default(),
                groups_claim: oidc.groups_claim,
                groups_prefix: oidc.groups_prefix,
                required_claims: oidc.required_claims.map(|c| c.into_iter().collect()),
                username_claim: oidc.username_claim,
                username_prefix: oidc.username_prefix,
            }),
            tags,
        };
        Ok(description)
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, name = %input.identity_provider_config_name), err)]
    async fn associate_identity_provider_config(
        &self,
        input: AssociateIdentityProviderConfigInput,
    ) -> Result<()> {
        const OP: &str = "AssociateIdentityProviderConfig";
        let oidc = eks::OidcIdentityProviderConfigRequest::builder()
            .identity_provider_config_name(&input.identity_provider_config_name)
            .issuer_url(&input.oidc.issuer_url)
            .client_id(&input.oidc.client_id)
            .set_username_claim(input.oidc.username_claim.clone())
            .set_username_prefix(input.oidc.username_prefix.clone())
            .set_groups_claim(input.oidc.groups_claim.clone())
            .set_groups_prefix(input.oidc.groups_prefix.clone())
            .set_required_claims(
                input
                    .oidc
                    .required_claims
                    .clone()
                    .map(|c| c.into_iter().collect()),
            )
            .build()
            .map_err(|e| invalid_input(OP, e))?;

        self.client
            .associate_identity_provider_config()
            .cluster_name(&input.cluster_name)
            .oidc(oidc)
            .set_tags(hash(input.tags.clone()))
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn disassociate_identity_provider_config(
        &self,
        cluster_name: &str,
        name: &str,
    ) -> Result<()> {
        const OP: &str = "DisassociateIdentityProviderConfig";
        self.client
            .disassociate_identity_provider_config()
            .cluster_name(cluster_name)
            .identity_provider_config(identity_provider_config(OP, name)?)
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn describe_addon(
        &self,
        cluster_name: &str,
        addon_name: &str,
    ) -> Result<AddonDescription> {
        const OP: &str = "DescribeAddon";
        let addon = self
            .client
            .describe_addon()
            .cluster_name(cluster_name)
            .addon_name(addon_name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk(OP, e))?
            .addon
            .ok_or_else(|| EksError::not_found(OP, addon_name))?;

        Ok(AddonDescription {
            addon_name: addon.addon_name,
            cluster_name: addon.cluster_name,
            status: addon.status.map(|s| s.as_str().to_string()),
            addon_version: addon.addon_version,
            health_issues: addon
                .health
                .map(|h| list::<eks::AddonIssue>(h.issues))
                .unwrap_or_default()
                .into_iter()
                .map(|issue| {
                    health_issue(
                        issue.code.as_ref().map(|c| c.as_str()),
                        issue.message,
                        issue.resource_ids,
                    )
                })
                .collect(),
            addon_arn: addon.addon_arn,
            created_at: timestamp(addon.created_at),
            modified_at: timestamp(addon.modified_at),
            service_account_role_arn: addon.service_account_role_arn,
            configuration_values: addon.configuration_values,
            tags: btree(addon.tags),
        })
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, addon = %input.addon_name), err)]
    async fn create_addon(&self, input: CreateAddonInput) -> Result<()> {
        self.client
            .create_addon()
            .cluster_name(&input.cluster_name)
            .addon_name(&input.addon_name)
            .set_addon_version(input.addon_version.clone())
            .set_service_account_role_arn(input.service_account_role_arn.clone())
            .set_resolve_conflicts(
                input
                    .resolve_conflicts
                    .as_deref()
                    .map(eks::ResolveConflicts::from),
            )
            .set_configuration_values(input.configuration_values.clone())
            .set_tags(hash(input.tags.clone()))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("CreateAddon", e))?;
        Ok(())
    }

    #[instrument(skip(self, input), fields(cluster = %input.cluster_name, addon = %input.addon_name), err)]
    async fn update_addon(&self, input: UpdateAddonInput) -> Result<()> {
        self.client
            .update_addon()
            .cluster_name(&input.cluster_name)
            .addon_name(&input.addon_name)
            .set_addon_version(input.addon_version.clone())
            .set_service_account_role_arn(input.service_account_role_arn.clone())
            .set_resolve_conflicts(
                input
                    .resolve_conflicts
                    .as_deref()
                    .map(eks::ResolveConflicts::from),
            )
            .set_configuration_values(input.configuration_values.clone())
            .send()
            .await
            .map_err(|e| EksError::from_sdk("UpdateAddon", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_addon(&self, cluster_name: &str, addon_name: &str) -> Result<()> {
        self.client
            .delete_addon()
            .cluster_name(cluster_name)
            .addon_name(addon_name)
            .send()
            .await
            .map_err(|e| EksError::from_sdk("DeleteAddon", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn tag_resource(&self, arn: &str, tags: BTreeMap<String, String>) -> Result<()> {
        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags.into_iter().collect()))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("TagResource", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<()> {
        self.client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(tag_keys))
            .send()
            .await
            .map_err(|e| EksError::from_sdk("UntagResource", e))?;
        Ok(())
    }
}
