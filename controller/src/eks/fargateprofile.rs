use super::{
    external_name, found, is_transient, lifecycle_condition, parse_status, required,
    tags_up_to_date, timestamp, tolerate_exists, tolerate_not_found, update_tags,
};
use crate::aws::{CreateFargateProfileInput, EksClient, FargateProfileDescription};
use crate::diff::LateInitializer;
use crate::managed::{ExternalClient, ExternalObservation, Result};

use async_trait::async_trait;
use kube::ResourceExt;
use models::eks::fargateprofile::{
    FargateProfileObservation, FargateProfileParameters, FargateProfileStatusType,
};
use models::eks::FargateProfile;
use models::managed::{Condition, Managed};
use tracing::instrument;

/// Drives an EKS Fargate profile. Only the tags can change after creation.
pub struct FargateProfileClient<E> {
    eks: E,
}

impl<E: EksClient> FargateProfileClient<E> {
    pub fn new(eks: E) -> Self {
        FargateProfileClient { eks }
    }
}

fn observed_status(managed: &FargateProfile) -> Option<FargateProfileStatusType> {
    managed
        .status
        .as_ref()
        .and_then(|s| s.at_provider.as_ref())
        .and_then(|o| o.status)
}

#[async_trait]
impl<E: EksClient> ExternalClient<FargateProfile> for FargateProfileClient<E> {
    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn observe(&self, managed: &mut FargateProfile) -> Result<ExternalObservation> {
        let cluster_name = required(
            &managed.spec.for_provider.cluster_name,
            "spec.forProvider.clusterName",
        )?;
        let described = match found(
            self.eks
                .describe_fargate_profile(cluster_name, &external_name(managed))
                .await,
        )? {
            Some(described) => described,
            None => return Ok(ExternalObservation::not_found()),
        };

        let late_initialized = late_initialize(&mut managed.spec.for_provider, &described);
        managed.status.get_or_insert_with(Default::default).at_provider =
            Some(FargateProfileObservation {
                created_at: timestamp(described.created_at),
                fargate_profile_arn: described.fargate_profile_arn.clone(),
                status: parse_status(described.status.as_deref()),
            });
        managed.set_condition(lifecycle_condition(described.status.as_deref()));

        Ok(ExternalObservation {
            exists: true,
            up_to_date: tags_up_to_date(managed.spec.for_provider.tags.as_ref(), &described.tags),
            late_initialized,
            ..Default::default()
        })
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn create(&self, managed: &mut FargateProfile) -> Result<()> {
        if observed_status(managed) == Some(FargateProfileStatusType::Creating) {
            return Ok(());
        }
        let input = create_input(&external_name(managed), &managed.spec.for_provider)?;
        managed.set_condition(Condition::creating());
        tolerate_exists(
            "CreateFargateProfile",
            self.eks.create_fargate_profile(input).await,
        )
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update(&self, managed: &mut FargateProfile) -> Result<()> {
        let desired = &managed.spec.for_provider;
        let cluster_name = required(&desired.cluster_name, "spec.forProvider.clusterName")?;
        let described = self
            .eks
            .describe_fargate_profile(cluster_name, &external_name(managed))
            .await?;
        if is_transient(described.status.as_deref()) {
            return Ok(());
        }
        update_tags(
            &self.eks,
            described.fargate_profile_arn.as_deref(),
            desired.tags.as_ref(),
            &described.tags,
        )
        .await
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn delete(&self, managed: &mut FargateProfile) -> Result<()> {
        managed.set_condition(Condition::deleting());
        if observed_status(managed) == Some(FargateProfileStatusType::Deleting) {
            return Ok(());
        }
        let cluster_name = required(
            &managed.spec.for_provider.cluster_name,
            "spec.forProvider.clusterName",
        )?;
        tolerate_not_found(
            self.eks
                .delete_fargate_profile(cluster_name, &external_name(managed))
                .await,
        )
    }
}

pub(crate) fn late_initialize(
    params: &mut FargateProfileParameters,
    described: &FargateProfileDescription,
) -> bool {
    let mut li = LateInitializer::new();
    li.vec(&mut params.subnets, described.subnets.clone());
    li.map(&mut params.tags, described.tags.clone());
    li.changed()
}

fn create_input(name: &str, params: &FargateProfileParameters) -> Result<CreateFargateProfileInput> {
    Ok(CreateFargateProfileInput {
        fargate_profile_name: name.to_string(),
        cluster_name: required(&params.cluster_name, "spec.forProvider.clusterName")?.to_string(),
        pod_execution_role_arn: required(
            &params.pod_execution_role_arn,
            "spec.forProvider.podExecutionRoleArn",
        )?
        .to_string(),
        subnets: params.subnets.clone(),
        selectors: params.selectors.clone(),
        tags: params.tags.clone().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::MockEksClient;
    use crate::eks::test_util::not_found;
    use maplit::btreemap;
    use models::eks::fargateprofile::{FargateProfileSelector, FargateProfileSpec};
    use models::managed::{ConditionReason, ConditionType};

    const NAME: &str = "serverless";
    const CLUSTER: &str = "my-cool-cluster";
    const ROLE: &str = "arn:aws:iam::123456789012:role/pod-execution";
    const ARN: &str = "arn:aws:eks:us-west-2:123456789012:fargateprofile/my-cool-cluster/serverless/abc";

    fn params() -> FargateProfileParameters {
        FargateProfileParameters {
            region: "us-west-2".to_string(),
            cluster_name: Some(CLUSTER.to_string()),
            pod_execution_role_arn: Some(ROLE.to_string()),
            selectors: vec![FargateProfileSelector {
                namespace: Some("serverless".to_string()),
                labels: Some(btreemap! {"runtime".to_string() => "fargate".to_string()}),
            }],
            ..Default::default()
        }
    }

    fn profile(for_provider: FargateProfileParameters) -> FargateProfile {
        let mut profile = FargateProfile::new(
            NAME,
            FargateProfileSpec {
                for_provider,
                resource_spec: Default::default(),
            },
        );
        profile.set_external_name(NAME);
        profile
    }

    fn active() -> FargateProfileDescription {
        FargateProfileDescription {
            fargate_profile_name: Some(NAME.to_string()),
            fargate_profile_arn: Some(ARN.to_string()),
            cluster_name: Some(CLUSTER.to_string()),
            pod_execution_role_arn: Some(ROLE.to_string()),
            subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
            status: Some("ACTIVE".to_string()),
            tags: btreemap! {"a".to_string() => "1".to_string()},
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_observe() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_fargate_profile()
            .withf(|cluster, name| cluster == CLUSTER && name == NAME)
            .times(1)
            .returning(|_, _| Ok(active()));

        let client = FargateProfileClient::new(eks);
        let mut managed = profile(params());
        let observation = client.observe(&mut managed).await.unwrap();

        assert!(observation.exists);
        assert!(observation.late_initialized);
        assert!(observation.up_to_date);
        assert_eq!(managed.spec.for_provider.subnets, active().subnets);
        assert_eq!(
            managed.status.as_ref().and_then(|s| s.at_provider.as_ref()).and_then(|o| o.status),
            Some(FargateProfileStatusType::Active)
        );
        assert_eq!(
            managed.condition(ConditionType::Ready).map(|c| c.reason),
            Some(ConditionReason::Available)
        );
    }

    #[tokio::test]
    async fn test_observe_not_found() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_fargate_profile()
            .returning(|_, _| Err(not_found()));

        let client = FargateProfileClient::new(eks);
        let mut managed = profile(params());
        let observation = client.observe(&mut managed).await.unwrap();
        assert!(!observation.exists);
    }

    #[tokio::test]
    async fn test_update_tags_only() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_fargate_profile()
            .returning(|_, _| Ok(active()));
        eks.expect_tag_resource()
            .withf(|arn, tags| arn == ARN && tags == &btreemap! {"b".to_string() => "2".to_string()})
            .times(1)
            .returning(|_, _| Ok(()));
        eks.expect_untag_resource().times(0);

        let client = FargateProfileClient::new(eks);
        let mut managed = profile(FargateProfileParameters {
            tags: Some(btreemap! {
                "a".to_string() => "1".to_string(),
                "b".to_string() => "2".to_string(),
            }),
            // Immutable drift is not acted on.
            subnets: vec!["subnet-c".to_string()],
            ..params()
        });
        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_create() {
        let mut eks = MockEksClient::new();
        eks.expect_create_fargate_profile()
            .withf(|input| {
                input.fargate_profile_name == NAME
                    && input.cluster_name == CLUSTER
                    && input.pod_execution_role_arn == ROLE
                    && input.selectors.len() == 1
            })
            .times(1)
            .returning(|_| Ok(()));

        let client = FargateProfileClient::new(eks);
        let mut managed = profile(params());
        client.create(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_noop_while_deleting() {
        let mut eks = MockEksClient::new();
        eks.expect_delete_fargate_profile().times(0);

        let client = FargateProfileClient::new(eks);
        let mut managed = profile(params());
        managed.status = Some(Default::default());
        if let Some(status) = managed.status.as_mut() {
            status.at_provider = Some(FargateProfileObservation {
                status: Some(FargateProfileStatusType::Deleting),
                ..Default::default()
            });
        }
        client.delete(&mut managed).await.unwrap();
    }
}
