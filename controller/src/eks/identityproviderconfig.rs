use super::{
    external_name, found, is_transient, lifecycle_condition, parse_status, required,
    tags_up_to_date, tolerate_exists, tolerate_not_found, update_tags,
};
use crate::aws::{AssociateIdentityProviderConfigInput, EksClient, IdentityProviderConfigDescription};
use crate::diff::LateInitializer;
use crate::managed::{ExternalClient, ExternalObservation, Result};

use async_trait::async_trait;
use kube::ResourceExt;
use models::eks::identityproviderconfig::{
    IdentityProviderConfigObservation, IdentityProviderConfigParameters,
    IdentityProviderConfigStatusType,
};
use models::eks::IdentityProviderConfig;
use models::managed::{Condition, Managed};
use tracing::{event, instrument, Level};

/// Drives the association of an OIDC identity provider with a cluster.
pub struct IdentityProviderConfigClient<E> {
    eks: E,
}

impl<E: EksClient> IdentityProviderConfigClient<E> {
    pub fn new(eks: E) -> Self {
        IdentityProviderConfigClient { eks }
    }
}

fn observed_status(managed: &IdentityProviderConfig) -> Option<IdentityProviderConfigStatusType> {
    managed
        .status
        .as_ref()
        .and_then(|s| s.at_provider.as_ref())
        .and_then(|o| o.status)
}

#[async_trait]
impl<E: EksClient> ExternalClient<IdentityProviderConfig> for IdentityProviderConfigClient<E> {
    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn observe(&self, managed: &mut IdentityProviderConfig) -> Result<ExternalObservation> {
        let cluster_name = required(
            &managed.spec.for_provider.cluster_name,
            "spec.forProvider.clusterName",
        )?;
        let name = external_name(managed);
        let described = found(
            self.eks
                .describe_identity_provider_config(cluster_name, &name)
                .await,
        )?;
        let described = match described {
            Some(described) => described,
            None => {
                // EKS drops failed associations; forgetting the last status lets Create run again.
                if let Some(observation) = managed
                    .status
                    .as_mut()
                    .and_then(|s| s.at_provider.as_mut())
                {
                    if observation.status.take().is_some() {
                        event!(Level::INFO, "Identity provider config is gone, clearing its status");
                    }
                }
                return Ok(ExternalObservation::not_found());
            }
        };

        let late_initialized = late_initialize(&mut managed.spec.for_provider, &described);
        managed.status.get_or_insert_with(Default::default).at_provider =
            Some(IdentityProviderConfigObservation {
                arn: described.identity_provider_config_arn.clone(),
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
    async fn create(&self, managed: &mut IdentityProviderConfig) -> Result<()> {
        if observed_status(managed) == Some(IdentityProviderConfigStatusType::Creating) {
            return Ok(());
        }
        let params = &managed.spec.for_provider;
        let input = AssociateIdentityProviderConfigInput {
            cluster_name: required(&params.cluster_name, "spec.forProvider.clusterName")?.to_string(),
            identity_provider_config_name: external_name(managed),
            oidc: params.oidc.clone(),
            tags: params.tags.clone().unwrap_or_default(),
        };
        managed.set_condition(Condition::creating());
        tolerate_exists(
            "AssociateIdentityProviderConfig",
            self.eks.associate_identity_provider_config(input).await,
        )
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update(&self, managed: &mut IdentityProviderConfig) -> Result<()> {
        let desired = &managed.spec.for_provider;
        let cluster_name = required(&desired.cluster_name, "spec.forProvider.clusterName")?;
        let described = self
            .eks
            .describe_identity_provider_config(cluster_name, &external_name(managed))
            .await?;
        if is_transient(described.status.as_deref()) {
            return Ok(());
        }
        update_tags(
            &self.eks,
            described.identity_provider_config_arn.as_deref(),
            desired.tags.as_ref(),
            &described.tags,
        )
        .await
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn delete(&self, managed: &mut IdentityProviderConfig) -> Result<()> {
        managed.set_condition(Condition::deleting());
        if observed_status(managed) == Some(IdentityProviderConfigStatusType::Deleting) {
            return Ok(());
        }
        let cluster_name = required(
            &managed.spec.for_provider.cluster_name,
            "spec.forProvider.clusterName",
        )?;
        tolerate_not_found(
            self.eks
                .disassociate_identity_provider_config(cluster_name, &external_name(managed))
                .await,
        )
    }
}

pub(crate) fn late_initialize(
    params: &mut IdentityProviderConfigParameters,
    described: &IdentityProviderConfigDescription,
) -> bool {
    let mut li = LateInitializer::new();
    li.map(&mut params.tags, described.tags.clone());
    li.changed()
}
