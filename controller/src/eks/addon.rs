use super::{
    found, is_transient, lifecycle_condition, parse_status, required, tags_up_to_date, timestamp,
    tolerate_conflict, tolerate_exists, tolerate_not_found, update_tags,
};
use crate::aws::{AddonDescription, CreateAddonInput, EksClient, UpdateAddonInput};
use crate::diff::LateInitializer;
use crate::managed::{ExternalClient, ExternalObservation, Result};

use async_trait::async_trait;
use kube::ResourceExt;
use models::eks::addon::{AddonHealth, AddonIssue, AddonObservation, AddonParameters, AddonStatusType};
use models::eks::Addon;
use models::managed::{Condition, Managed};
use tracing::{event, instrument, Level};

/// Drives an EKS add-on, which is identified by its cluster and add-on name.
pub struct AddonClient<E> {
    eks: E,
}

impl<E: EksClient> AddonClient<E> {
    pub fn new(eks: E) -> Self {
        AddonClient { eks }
    }
}

fn observed_status(managed: &Addon) -> Option<AddonStatusType> {
    managed
        .status
        .as_ref()
        .and_then(|s| s.at_provider.as_ref())
        .and_then(|o| o.status)
}

#[async_trait]
impl<E: EksClient> ExternalClient<Addon> for AddonClient<E> {
    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn observe(&self, managed: &mut Addon) -> Result<ExternalObservation> {
        let params = &managed.spec.for_provider;
        let cluster_name = required(&params.cluster_name, "spec.forProvider.clusterName")?;
        let described = match found(self.eks.describe_addon(cluster_name, &params.addon_name).await)? {
            Some(described) => described,
            None => return Ok(ExternalObservation::not_found()),
        };

        let late_initialized = late_initialize(&mut managed.spec.for_provider, &described);
        managed.status.get_or_insert_with(Default::default).at_provider = Some(observation(&described));
        managed.set_condition(lifecycle_condition(described.status.as_deref()));

        Ok(ExternalObservation {
            exists: true,
            up_to_date: is_up_to_date(&managed.spec.for_provider, &described),
            late_initialized,
            ..Default::default()
        })
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn create(&self, managed: &mut Addon) -> Result<()> {
        if observed_status(managed) == Some(AddonStatusType::Creating) {
            return Ok(());
        }
        let params = &managed.spec.for_provider;
        let input = CreateAddonInput {
            cluster_name: required(&params.cluster_name, "spec.forProvider.clusterName")?.to_string(),
            addon_name: params.addon_name.clone(),
            addon_version: params.addon_version.clone(),
            service_account_role_arn: params.service_account_role_arn.clone(),
            resolve_conflicts: params.resolve_conflicts.clone(),
            configuration_values: params.configuration_values.clone(),
            tags: params.tags.clone().unwrap_or_default(),
        };
        managed.set_condition(Condition::creating());
        tolerate_exists("CreateAddon", self.eks.create_addon(input).await)
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update(&self, managed: &mut Addon) -> Result<()> {
        let desired = &managed.spec.for_provider;
        let cluster_name = required(&desired.cluster_name, "spec.forProvider.clusterName")?;
        let described = self.eks.describe_addon(cluster_name, &desired.addon_name).await?;
        if is_transient(described.status.as_deref()) {
            return Ok(());
        }

        let tagged = update_tags(
            &self.eks,
            described.addon_arn.as_deref(),
            desired.tags.as_ref(),
            &described.tags,
        )
        .await;

        if !settings_up_to_date(desired, &described) {
            event!(Level::INFO, version = ?desired.addon_version, "Updating add-on");
            let input = UpdateAddonInput {
                cluster_name: cluster_name.to_string(),
                addon_name: desired.addon_name.clone(),
                addon_version: desired.addon_version.clone(),
                service_account_role_arn: desired.service_account_role_arn.clone(),
                resolve_conflicts: desired.resolve_conflicts.clone(),
                configuration_values: desired.configuration_values.clone(),
            };
            tolerate_conflict("UpdateAddon", self.eks.update_addon(input).await)?;
        }
        tagged
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn delete(&self, managed: &mut Addon) -> Result<()> {
        managed.set_condition(Condition::deleting());
        if observed_status(managed) == Some(AddonStatusType::Deleting) {
            return Ok(());
        }
        let params = &managed.spec.for_provider;
        let cluster_name = required(&params.cluster_name, "spec.forProvider.clusterName")?;
        tolerate_not_found(self.eks.delete_addon(cluster_name, &params.addon_name).await)
    }
}

pub(crate) fn late_initialize(params: &mut AddonParameters, described: &AddonDescription) -> bool {
    let mut li = LateInitializer::new();
    li.option(&mut params.addon_version, described.addon_version.clone());
    li.option(
        &mut params.service_account_role_arn,
        described.service_account_role_arn.clone(),
    );
    li.option(
        &mut params.configuration_values,
        described.configuration_values.clone(),
    );
    li.map(&mut params.tags, described.tags.clone());
    li.changed()
}

/// Compares configuration documents by content, so JSON and YAML renderings of the same values
/// match.
fn same_configuration(desired: &str, observed: &str) -> bool {
    match (
        serde_yaml::from_str::<serde_yaml::Value>(desired),
        serde_yaml::from_str::<serde_yaml::Value>(observed),
    ) {
        (Ok(desired), Ok(observed)) => desired == observed,
        _ => desired == observed,
    }
}

fn settings_up_to_date(desired: &AddonParameters, described: &AddonDescription) -> bool {
    let configuration_matches = match (&desired.configuration_values, &described.configuration_values) {
        (None, _) => true,
        (Some(desired), Some(observed)) => same_configuration(desired, observed),
        (Some(desired), None) => desired.trim().is_empty(),
    };
    let version_matches =
        desired.addon_version.is_none() || desired.addon_version == described.addon_version;
    let role_matches = desired.service_account_role_arn.is_none()
        || desired.service_account_role_arn == described.service_account_role_arn;

    version_matches && role_matches && configuration_matches
}

pub(crate) fn is_up_to_date(desired: &AddonParameters, described: &AddonDescription) -> bool {
    tags_up_to_date(desired.tags.as_ref(), &described.tags) && settings_up_to_date(desired, described)
}

fn observation(described: &AddonDescription) -> AddonObservation {
    AddonObservation {
        addon_arn: described.addon_arn.clone(),
        addon_version: described.addon_version.clone(),
        created_at: timestamp(described.created_at),
        health: (!described.health_issues.is_empty()).then(|| AddonHealth {
            issues: described
                .health_issues
                .iter()
                .map(|issue| AddonIssue {
                    code: issue.code.clone(),
                    message: issue.message.clone(),
                    resource_ids: issue.resource_ids.clone(),
                })
                .collect(),
        }),
        modified_at: timestamp(described.modified_at),
        status: parse_status(described.status.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{HealthIssue, MockEksClient};
    use crate::eks::test_util::{in_use, not_found};
    use maplit::btreemap;
    use models::eks::addon::AddonSpec;
    use models::managed::{ConditionReason, ConditionType};

    const CLUSTER: &str = "my-cool-cluster";
    const ADDON: &str = "vpc-cni";
    const ARN: &str = "arn:aws:eks:us-west-2:123456789012:addon/my-cool-cluster/vpc-cni/abc";

    fn params() -> AddonParameters {
        AddonParameters {
            region: "us-west-2".to_string(),
            addon_name: ADDON.to_string(),
            cluster_name: Some(CLUSTER.to_string()),
            resolve_conflicts: Some("OVERWRITE".to_string()),
            ..Default::default()
        }
    }

    fn addon(for_provider: AddonParameters) -> Addon {
        Addon::new(
            "cni",
            AddonSpec {
                for_provider,
                resource_spec: Default::default(),
            },
        )
    }

    fn active() -> AddonDescription {
        AddonDescription {
            addon_name: Some(ADDON.to_string()),
            cluster_name: Some(CLUSTER.to_string()),
            status: Some("ACTIVE".to_string()),
            addon_version: Some("v1.16.0-eksbuild.1".to_string()),
            addon_arn: Some(ARN.to_string()),
            configuration_values: Some(r#"{"env":{"WARM_IP_TARGET":"5"}}"#.to_string()),
            ..Default::default()
        }
    }

    fn describing(described: AddonDescription) -> MockEksClient {
        let mut eks = MockEksClient::new();
        eks.expect_describe_addon()
            .withf(|cluster, name| cluster == CLUSTER && name == ADDON)
            .returning(move |_, _| Ok(described.clone()));
        eks
    }

    #[tokio::test]
    async fn test_observe_late_initializes() {
        let client = AddonClient::new(describing(AddonDescription {
            status: Some("DEGRADED".to_string()),
            health_issues: vec![HealthIssue {
                code: Some("InsufficientNumberOfReplicas".to_string()),
                message: Some("not enough replicas".to_string()),
                resource_ids: vec![],
            }],
            ..active()
        }));
        let mut managed = addon(params());
        let observation = client.observe(&mut managed).await.unwrap();

        assert!(observation.exists);
        assert!(observation.late_initialized);
        assert!(observation.up_to_date);
        assert_eq!(
            managed.spec.for_provider.addon_version.as_deref(),
            Some("v1.16.0-eksbuild.1")
        );
        let observed = managed.status.as_ref().and_then(|s| s.at_provider.clone()).unwrap();
        assert_eq!(observed.status, Some(AddonStatusType::Degraded));
        assert_eq!(observed.health.unwrap().issues.len(), 1);
        assert_eq!(
            managed.condition(ConditionType::Ready).map(|c| c.reason),
            Some(ConditionReason::Unavailable)
        );
    }

    #[tokio::test]
    async fn test_observe_not_found() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_addon().returning(|_, _| Err(not_found()));

        let client = AddonClient::new(eks);
        let observation = client.observe(&mut addon(params())).await.unwrap();
        assert!(!observation.exists);
    }

    #[test]
    fn test_is_up_to_date() {
        let test_cases = vec![
            (params(), true),
            (
                AddonParameters {
                    addon_version: Some("v1.17.0-eksbuild.1".to_string()),
                    ..params()
                },
                false,
            ),
            (
                AddonParameters {
                    configuration_values: Some("env:\n  WARM_IP_TARGET: \"5\"\n".to_string()),
                    ..params()
                },
                true,
            ),
            (
                AddonParameters {
                    configuration_values: Some(r#"{"env":{"WARM_IP_TARGET":"10"}}"#.to_string()),
                    ..params()
                },
                false,
            ),
            (
                AddonParameters {
                    service_account_role_arn: Some("arn:aws:iam::123456789012:role/cni".to_string()),
                    ..params()
                },
                false,
            ),
            (
                AddonParameters {
                    tags: Some(btreemap! {"team".to_string() => "network".to_string()}),
                    ..params()
                },
                false,
            ),
        ];

        for (desired, expected) in test_cases {
            assert_eq!(is_up_to_date(&desired, &active()), expected, "{:?}", desired);
        }
    }

    #[tokio::test]
    async fn test_update_version() {
        let mut eks = describing(active());
        eks.expect_update_addon()
            .withf(|input| {
                input.cluster_name == CLUSTER
                    && input.addon_name == ADDON
                    && input.addon_version.as_deref() == Some("v1.17.0-eksbuild.1")
                    && input.resolve_conflicts.as_deref() == Some("OVERWRITE")
            })
            .times(1)
            .returning(|_| Err(in_use()));

        let client = AddonClient::new(eks);
        let mut managed = addon(AddonParameters {
            addon_version: Some("v1.17.0-eksbuild.1".to_string()),
            ..params()
        });
        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_skipped_while_updating() {
        let mut eks = describing(AddonDescription {
            status: Some("UPDATING".to_string()),
            ..active()
        });
        eks.expect_update_addon().times(0);

        let client = AddonClient::new(eks);
        let mut managed = addon(AddonParameters {
            addon_version: Some("v1.17.0-eksbuild.1".to_string()),
            ..params()
        });
        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let mut eks = MockEksClient::new();
        eks.expect_create_addon()
            .withf(|input| input.addon_name == ADDON && input.cluster_name == CLUSTER)
            .times(1)
            .returning(|_| Ok(()));
        eks.expect_delete_addon()
            .withf(|cluster, name| cluster == CLUSTER && name == ADDON)
            .times(1)
            .returning(|_, _| Ok(()));

        let client = AddonClient::new(eks);
        let mut managed = addon(params());
        client.create(&mut managed).await.unwrap();
        client.delete(&mut managed).await.unwrap();
        assert_eq!(
            managed.condition(ConditionType::Ready).map(|c| c.reason),
            Some(ConditionReason::Deleting)
        );
    }

    #[tokio::test]
    async fn test_observe_status_mapping() {
        // (EKS status, observed status, Ready reason)
        let test_cases = vec![
            ("ACTIVE", AddonStatusType::Active, ConditionReason::Available),
            ("CREATING", AddonStatusType::Creating, ConditionReason::Creating),
            ("DEGRADED", AddonStatusType::Degraded, ConditionReason::Unavailable),
            ("CREATE_FAILED", AddonStatusType::CreateFailed, ConditionReason::Unavailable),
            ("DELETING", AddonStatusType::Deleting, ConditionReason::Deleting),
            ("DELETE_FAILED", AddonStatusType::DeleteFailed, ConditionReason::Unavailable),
        ];

        for (status, observed, reason) in test_cases {
            let client = AddonClient::new(describing(AddonDescription {
                status: Some(status.to_string()),
                ..active()
            }));
            let mut managed = addon(params());
            client.observe(&mut managed).await.unwrap();

            assert_eq!(
                managed.status.as_ref().and_then(|s| s.at_provider.as_ref()).and_then(|o| o.status),
                Some(observed),
                "{}",
                status
            );
            assert_eq!(
                managed.condition(ConditionType::Ready).map(|c| c.reason),
                Some(reason),
                "{}",
                status
            );
        }
    }

    #[tokio::test]
    async fn test_update_service_account_role() {
        const ROLE: &str = "arn:aws:iam::123456789012:role/cni";
        let mut eks = describing(active());
        eks.expect_update_addon()
            .withf(|input| {
                input.cluster_name == CLUSTER
                    && input.addon_name == ADDON
                    && input.service_account_role_arn.as_deref() == Some(ROLE)
            })
            .times(1)
            .returning(|_| Ok(()));

        let client = AddonClient::new(eks);
        let mut managed = addon(AddonParameters {
            addon_version: active().addon_version,
            configuration_values: active().configuration_values,
            service_account_role_arn: Some(ROLE.to_string()),
            ..params()
        });
        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_skipped_while_creating() {
        let mut eks = describing(AddonDescription {
            status: Some("CREATING".to_string()),
            tags: btreemap! {"team".to_string() => "network".to_string()},
            ..active()
        });
        eks.expect_update_addon().times(0);
        eks.expect_tag_resource().times(0);
        eks.expect_untag_resource().times(0);

        let client = AddonClient::new(eks);
        let mut managed = addon(AddonParameters {
            service_account_role_arn: Some("arn:aws:iam::123456789012:role/cni".to_string()),
            ..params()
        });
        client.update(&mut managed).await.unwrap();
    }
}
