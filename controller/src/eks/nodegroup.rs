use super::{
    external_name, found, is_transient, lifecycle_condition, parse_status, required,
    tags_up_to_date, timestamp, tolerate_conflict, tolerate_exists, tolerate_not_found,
    update_tags,
};
use crate::aws::{
    CreateNodegroupInput, EksClient, HealthIssue, NodegroupDescription, UpdateLabelsPayload,
    UpdateNodegroupConfigInput, UpdateNodegroupVersionInput, UpdateTaintsPayload,
};
use crate::diff::{diff_labels, LateInitializer};
use crate::managed::{ExternalClient, ExternalObservation, Result};

use async_trait::async_trait;
use kube::ResourceExt;
use models::eks::nodegroup::{
    Issue, NodeGroupHealth, NodeGroupObservation, NodeGroupParameters, NodeGroupScalingConfig,
    NodeGroupStatusType, NodeGroupUpdateConfig, Taint,
};
use models::eks::NodeGroup;
use models::managed::{Condition, Managed};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{event, instrument, Level};

/// Drives an EKS managed node group.
pub struct NodeGroupClient<E> {
    eks: E,
}

impl<E: EksClient> NodeGroupClient<E> {
    pub fn new(eks: E) -> Self {
        NodeGroupClient { eks }
    }
}

fn observed_status(managed: &NodeGroup) -> Option<NodeGroupStatusType> {
    managed
        .status
        .as_ref()
        .and_then(|s| s.at_provider.as_ref())
        .and_then(|o| o.status)
}

#[async_trait]
impl<E: EksClient> ExternalClient<NodeGroup> for NodeGroupClient<E> {
    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn observe(&self, managed: &mut NodeGroup) -> Result<ExternalObservation> {
        let cluster_name = required(
            &managed.spec.for_provider.cluster_name,
            "spec.forProvider.clusterName",
        )?;
        let described = match found(
            self.eks
                .describe_nodegroup(cluster_name, &external_name(managed))
                .await,
        )? {
            Some(described) => described,
            None => return Ok(ExternalObservation::not_found()),
        };

        let late_initialized = late_initialize(&mut managed.spec.for_provider, &described);
        managed.status.get_or_insert_with(Default::default).at_provider =
            Some(observation(&described));
        managed.set_condition(lifecycle_condition(described.status.as_deref()));

        Ok(ExternalObservation {
            exists: true,
            up_to_date: is_up_to_date(&managed.spec.for_provider, &described),
            late_initialized,
            ..Default::default()
        })
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn create(&self, managed: &mut NodeGroup) -> Result<()> {
        if observed_status(managed) == Some(NodeGroupStatusType::Creating) {
            return Ok(());
        }
        let input = create_input(&external_name(managed), &managed.spec.for_provider)?;
        managed.set_condition(Condition::creating());
        tolerate_exists("CreateNodegroup", self.eks.create_nodegroup(input).await)
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update(&self, managed: &mut NodeGroup) -> Result<()> {
        let name = external_name(managed);
        let desired = &managed.spec.for_provider;
        let cluster_name = required(&desired.cluster_name, "spec.forProvider.clusterName")?;
        let described = self.eks.describe_nodegroup(cluster_name, &name).await?;
        if is_transient(described.status.as_deref()) {
            event!(Level::DEBUG, status = ?described.status, "Node group is busy, skipping update");
            return Ok(());
        }

        let tagged = update_tags(
            &self.eks,
            described.nodegroup_arn.as_deref(),
            desired.tags.as_ref(),
            &described.tags,
        )
        .await;

        if needs_version_update(desired, &described) {
            let input = version_input(cluster_name, &name, desired, &described);
            event!(Level::INFO, version = ?input.version, release_version = ?input.release_version, "Updating node group version");
            tolerate_conflict(
                "UpdateNodegroupVersion",
                self.eks.update_nodegroup_version(input).await,
            )?;
        } else if let Some(input) = config_input(cluster_name, &name, desired, &described) {
            tolerate_conflict(
                "UpdateNodegroupConfig",
                self.eks.update_nodegroup_config(input).await,
            )?;
        }
        tagged
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn delete(&self, managed: &mut NodeGroup) -> Result<()> {
        managed.set_condition(Condition::deleting());
        if observed_status(managed) == Some(NodeGroupStatusType::Deleting) {
            return Ok(());
        }
        let cluster_name = required(
            &managed.spec.for_provider.cluster_name,
            "spec.forProvider.clusterName",
        )?;
        tolerate_not_found(
            self.eks
                .delete_nodegroup(cluster_name, &external_name(managed))
                .await,
        )
    }
}

/// Fills unset fields of `params` from the described node group. For custom AMIs the versions are
/// always taken from AWS. Returns whether anything changed.
pub(crate) fn late_initialize(
    params: &mut NodeGroupParameters,
    described: &NodegroupDescription,
) -> bool {
    let mut li = LateInitializer::new();
    li.option(&mut params.ami_type, described.ami_type.clone());

    let mut forced = false;
    if params.is_custom_ami() {
        for (field, observed) in [
            (&mut params.version, &described.version),
            (&mut params.release_version, &described.release_version),
        ] {
            if observed.is_some() && field != observed {
                *field = observed.clone();
                forced = true;
            }
        }
    }

    li.option(&mut params.version, described.version.clone());
    li.option(&mut params.release_version, described.release_version.clone());
    li.option(&mut params.capacity_type, described.capacity_type.clone());
    li.option(&mut params.disk_size, described.disk_size);
    li.option(&mut params.node_role, described.node_role.clone());
    li.option(&mut params.remote_access, described.remote_access.clone());
    li.vec(&mut params.instance_types, described.instance_types.clone());
    li.vec(&mut params.subnets, described.subnets.clone());
    li.vec(&mut params.taints, described.taints.clone());
    li.map(&mut params.labels, described.labels.clone());

    if let Some(observed) = &described.launch_template {
        match &mut params.launch_template {
            Some(template) => li.option(&mut template.version, observed.version.clone()),
            None => li.option(&mut params.launch_template, Some(observed.clone())),
        }
    }

    // The desired size is never late-initialized; unset means it is managed elsewhere.
    if let Some(observed) = &described.scaling_config {
        match &mut params.scaling_config {
            Some(scaling) => {
                li.option(&mut scaling.min_size, observed.min_size);
                li.option(&mut scaling.max_size, observed.max_size);
            }
            None => li.option(
                &mut params.scaling_config,
                Some(NodeGroupScalingConfig {
                    desired_size: None,
                    min_size: observed.min_size,
                    max_size: observed.max_size,
                }),
            ),
        }
    }

    let observed = described.update_config.unwrap_or_default();
    match &mut params.update_config {
        Some(update) => {
            if update.max_unavailable.is_none() && update.max_unavailable_percentage.is_none() {
                li.option(&mut update.max_unavailable, observed.max_unavailable);
                li.option(
                    &mut update.max_unavailable_percentage,
                    observed.max_unavailable_percentage,
                );
            }
            li.option(&mut update.force, Some(false));
        }
        None => li.option(
            &mut params.update_config,
            Some(NodeGroupUpdateConfig {
                force: Some(false),
                ..observed
            }),
        ),
    }

    li.map(&mut params.tags, described.tags.clone());
    li.changed() || forced
}

fn drifted<T: PartialEq>(desired: &Option<T>, observed: &Option<T>) -> bool {
    desired.is_some() && desired != observed
}

fn template_version_drifted(desired: &NodeGroupParameters, described: &NodegroupDescription) -> bool {
    drifted(
        &desired.launch_template.as_ref().and_then(|t| t.version.clone()),
        &described.launch_template.as_ref().and_then(|t| t.version.clone()),
    )
}

fn needs_version_update(desired: &NodeGroupParameters, described: &NodegroupDescription) -> bool {
    let versions_drifted = !desired.is_custom_ami()
        && (drifted(&desired.version, &described.version)
            || drifted(&desired.release_version, &described.release_version));
    versions_drifted || template_version_drifted(desired, described)
}

fn scaling_drifted(desired: &NodeGroupParameters, described: &NodegroupDescription) -> bool {
    let desired = match &desired.scaling_config {
        Some(scaling) => scaling,
        None => return false,
    };
    let observed = described.scaling_config.unwrap_or_default();
    drifted(&desired.min_size, &observed.min_size)
        || drifted(&desired.max_size, &observed.max_size)
        || drifted(&desired.desired_size, &observed.desired_size)
}

fn update_config_drifted(desired: &NodeGroupParameters, described: &NodegroupDescription) -> bool {
    let desired = match &desired.update_config {
        Some(update) => update,
        None => return false,
    };
    let observed = described.update_config.unwrap_or_default();
    drifted(&desired.max_unavailable, &observed.max_unavailable)
        || drifted(
            &desired.max_unavailable_percentage,
            &observed.max_unavailable_percentage,
        )
}

/// Whether the mutable fields of `desired` match the described node group. An unset desired size
/// never causes drift.
pub(crate) fn is_up_to_date(desired: &NodeGroupParameters, described: &NodegroupDescription) -> bool {
    let labels_match = desired.labels.as_ref().map_or(true, |labels| {
        let (add_or_update, remove) = diff_labels(labels, &described.labels);
        add_or_update.is_empty() && remove.is_empty()
    });
    let (add_taints, remove_taints) = diff_taints(&desired.taints, &described.taints);

    tags_up_to_date(desired.tags.as_ref(), &described.tags)
        && labels_match
        && add_taints.is_empty()
        && remove_taints.is_empty()
        && !needs_version_update(desired, described)
        && !scaling_drifted(desired, described)
        && !update_config_drifted(desired, described)
}

/// Diffs taints by key. Taints without a key are ignored on both sides.
pub(crate) fn diff_taints(desired: &[Taint], observed: &[Taint]) -> (Vec<Taint>, Vec<Taint>) {
    let observed_by_key: BTreeMap<&str, &Taint> = observed
        .iter()
        .filter_map(|t| t.key.as_deref().map(|key| (key, t)))
        .collect();
    let desired_keys: BTreeSet<&str> = desired.iter().filter_map(|t| t.key.as_deref()).collect();

    let add_or_update = desired
        .iter()
        .filter(|t| match t.key.as_deref() {
            Some(key) => observed_by_key.get(key).copied() != Some(*t),
            None => false,
        })
        .cloned()
        .collect();
    let remove = observed
        .iter()
        .filter(|t| {
            t.key
                .as_deref()
                .map_or(false, |key| !desired_keys.contains(key))
        })
        .cloned()
        .collect();

    (add_or_update, remove)
}

/// Picks a desired size that keeps the observed size when it already fits the bounds.
pub(crate) fn clamp_desired_size(
    observed: Option<i32>,
    min: Option<i32>,
    max: Option<i32>,
) -> Option<i32> {
    let mut size = match observed {
        Some(size) => size,
        None => return min,
    };
    if let Some(min) = min {
        size = size.max(min);
    }
    if let Some(max) = max {
        size = size.min(max);
    }
    Some(size)
}

fn scaling_request(
    desired: &NodeGroupScalingConfig,
    observed: Option<&NodeGroupScalingConfig>,
) -> NodeGroupScalingConfig {
    let observed = observed.copied().unwrap_or_default();
    let min_size = desired.min_size.or(observed.min_size);
    let max_size = desired.max_size.or(observed.max_size);
    NodeGroupScalingConfig {
        desired_size: desired
            .desired_size
            .or_else(|| clamp_desired_size(observed.desired_size, min_size, max_size)),
        min_size,
        max_size,
    }
}

/// The update config AWS accepts: `force` only applies to version updates.
fn update_config_request(update: Option<NodeGroupUpdateConfig>) -> Option<NodeGroupUpdateConfig> {
    update
        .filter(|u| u.max_unavailable.is_some() || u.max_unavailable_percentage.is_some())
        .map(|u| NodeGroupUpdateConfig { force: None, ..u })
}

fn version_input(
    cluster_name: &str,
    name: &str,
    desired: &NodeGroupParameters,
    described: &NodegroupDescription,
) -> UpdateNodegroupVersionInput {
    let custom = desired.is_custom_ami();
    UpdateNodegroupVersionInput {
        cluster_name: cluster_name.to_string(),
        nodegroup_name: name.to_string(),
        version: desired.version.clone().filter(|_| !custom),
        release_version: desired.release_version.clone().filter(|_| !custom),
        launch_template: desired
            .launch_template
            .clone()
            .filter(|_| template_version_drifted(desired, described)),
        force: desired
            .update_config
            .and_then(|u| u.force)
            .unwrap_or(false),
    }
}

fn config_input(
    cluster_name: &str,
    name: &str,
    desired: &NodeGroupParameters,
    described: &NodegroupDescription,
) -> Option<UpdateNodegroupConfigInput> {
    let labels = desired
        .labels
        .as_ref()
        .map(|labels| diff_labels(labels, &described.labels))
        .filter(|(add_or_update, remove)| !add_or_update.is_empty() || !remove.is_empty())
        .map(|(add_or_update_labels, remove_labels)| UpdateLabelsPayload {
            add_or_update_labels,
            remove_labels,
        });
    let (add_or_update_taints, remove_taints) = diff_taints(&desired.taints, &described.taints);
    let taints = (!add_or_update_taints.is_empty() || !remove_taints.is_empty()).then(|| {
        UpdateTaintsPayload {
            add_or_update_taints,
            remove_taints,
        }
    });

    if labels.is_none()
        && taints.is_none()
        && !scaling_drifted(desired, described)
        && !update_config_drifted(desired, described)
    {
        return None;
    }

    Some(UpdateNodegroupConfigInput {
        cluster_name: cluster_name.to_string(),
        nodegroup_name: name.to_string(),
        labels,
        taints,
        scaling_config: desired
            .scaling_config
            .as_ref()
            .map(|scaling| scaling_request(scaling, described.scaling_config.as_ref())),
        update_config: update_config_request(desired.update_config),
    })
}

fn create_input(name: &str, params: &NodeGroupParameters) -> Result<CreateNodegroupInput> {
    Ok(CreateNodegroupInput {
        cluster_name: required(&params.cluster_name, "spec.forProvider.clusterName")?.to_string(),
        nodegroup_name: name.to_string(),
        // AWS requires a desired size; an unset one starts at the minimum.
        scaling_config: params.scaling_config.map(|scaling| NodeGroupScalingConfig {
            desired_size: scaling.desired_size.or(scaling.min_size),
            ..scaling
        }),
        disk_size: params.disk_size,
        subnets: params.subnets.clone(),
        instance_types: params.instance_types.clone(),
        ami_type: params.ami_type.clone(),
        remote_access: params.remote_access.clone(),
        node_role: required(&params.node_role, "spec.forProvider.nodeRole")?.to_string(),
        labels: params.labels.clone().unwrap_or_default(),
        taints: params.taints.clone(),
        tags: params.tags.clone().unwrap_or_default(),
        launch_template: params.launch_template.clone(),
        update_config: update_config_request(params.update_config),
        capacity_type: params.capacity_type.clone(),
        version: params.version.clone(),
        release_version: params.release_version.clone(),
    })
}

fn issue(issue: &HealthIssue) -> Issue {
    Issue {
        code: parse_status(issue.code.as_deref()),
        message: issue.message.clone(),
        resource_ids: issue.resource_ids.clone(),
    }
}

fn observation(described: &NodegroupDescription) -> NodeGroupObservation {
    NodeGroupObservation {
        created_at: timestamp(described.created_at),
        health: (!described.health_issues.is_empty()).then(|| NodeGroupHealth {
            issues: described.health_issues.iter().map(issue).collect(),
        }),
        modified_at: timestamp(described.modified_at),
        node_group_arn: described.nodegroup_arn.clone(),
        resources: described.resources.clone(),
        scaling_config: described.scaling_config,
        status: parse_status(described.status.as_deref()),
    }
}
