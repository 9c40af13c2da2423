//! External clients for the five EKS kinds, plus the helpers they share.
//!
//! Each client observes its kind through an [`EksClient`] and issues at most one primary mutation
//! per update, after reconciling tags.
pub mod addon;
pub mod cluster;
pub mod fargateprofile;
pub mod identityproviderconfig;
pub mod nodegroup;

pub use self::addon::AddonClient;
pub use self::cluster::ClusterClient;
pub use self::fargateprofile::FargateProfileClient;
pub use self::identityproviderconfig::IdentityProviderConfigClient;
pub use self::nodegroup::NodeGroupClient;

use crate::aws::{self, sdk_config, AwsEksClient, ConnectError, EksClient, StsTokenSigner};
use crate::diff::tags::diff_optional_tags;
use crate::managed::{self, ExternalClient, ExternalConnector, MissingFieldSnafu};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use models::eks::{Addon, Cluster, FargateProfile, IdentityProviderConfig, NodeGroup};
use models::managed::{Condition, Managed, ManagedResourceClient};
use models::providerconfig::ProviderConfig;
use serde::de::DeserializeOwned;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use tracing::{event, Level};

const STATUS_ACTIVE: &str = "ACTIVE";
const STATUS_CREATING: &str = "CREATING";
const STATUS_UPDATING: &str = "UPDATING";
const STATUS_DELETING: &str = "DELETING";

/// Maps an AWS lifecycle status onto the `Ready` condition.
pub(crate) fn lifecycle_condition(status: Option<&str>) -> Condition {
    match status {
        Some(STATUS_ACTIVE) => Condition::available(),
        Some(STATUS_CREATING) => Condition::creating(),
        Some(STATUS_DELETING) => Condition::deleting(),
        _ => Condition::unavailable(),
    }
}

/// Whether AWS is still working on the object, in which case no mutation may be issued.
pub(crate) fn is_transient(status: Option<&str>) -> bool {
    matches!(
        status,
        Some(STATUS_CREATING) | Some(STATUS_UPDATING) | Some(STATUS_DELETING)
    )
}

pub(crate) fn parse_status<T: DeserializeOwned>(status: Option<&str>) -> Option<T> {
    status.and_then(|s| serde_plain::from_str(s).ok())
}

pub(crate) fn timestamp(time: Option<DateTime<Utc>>) -> Option<String> {
    time.map(|t| t.to_rfc3339())
}

/// The AWS-side name of a managed resource, falling back to its object name.
pub(crate) fn external_name<K: Managed>(managed: &K) -> String {
    managed
        .external_name()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| managed.name_any())
}

pub(crate) fn required<'a>(value: &'a Option<String>, field: &str) -> managed::Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .context(MissingFieldSnafu { field })
}

pub(crate) fn tags_up_to_date(
    desired: Option<&BTreeMap<String, String>>,
    observed: &BTreeMap<String, String>,
) -> bool {
    let (add, remove) = diff_optional_tags(desired, Some(observed));
    add.is_empty() && remove.is_empty()
}

/// Passes `result` through, except for errors that the next poll resolves on its own, which are
/// logged and dropped.
pub(crate) fn tolerate_conflict(
    operation: &str,
    result: aws::Result<()>,
) -> managed::Result<()> {
    match result {
        Err(err) if err.is_conflict() => {
            event!(Level::WARN, operation, error = %err, "Deferring mutation to the next poll");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

/// Delete calls succeed when the object is already gone.
pub(crate) fn tolerate_not_found(result: aws::Result<()>) -> managed::Result<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other.map_err(Into::into),
    }
}

/// Create calls succeed when the object already exists.
pub(crate) fn tolerate_exists(operation: &str, result: aws::Result<()>) -> managed::Result<()> {
    match result {
        Err(err) if err.is_in_use() => {
            event!(Level::INFO, operation, "External resource already exists");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

/// Describes an object, mapping "not found" to `None`.
pub(crate) fn found<T>(result: aws::Result<T>) -> managed::Result<Option<T>> {
    match result {
        Ok(described) => Ok(Some(described)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Brings the tags on `arn` to `desired`: removals first, then additions.
pub(crate) async fn update_tags<E: EksClient + ?Sized>(
    eks: &E,
    arn: Option<&str>,
    desired: Option<&BTreeMap<String, String>>,
    observed: &BTreeMap<String, String>,
) -> managed::Result<()> {
    let arn = match arn {
        Some(arn) => arn,
        None => return Ok(()),
    };
    let (add, remove) = diff_optional_tags(desired, Some(observed));
    if !remove.is_empty() {
        tolerate_conflict("UntagResource", eks.untag_resource(arn, remove).await)?;
    }
    if !add.is_empty() {
        tolerate_conflict("TagResource", eks.tag_resource(arn, add).await)?;
    }
    Ok(())
}

/// Connects every kind to EKS with the credentials named by its ProviderConfig.
#[derive(Clone)]
pub struct AwsConnector<S> {
    store: S,
}

impl<S: ManagedResourceClient> AwsConnector<S> {
    pub fn new(store: S) -> Self {
        AwsConnector { store }
    }

    async fn eks_client<K: Managed>(
        &self,
        managed: &K,
        provider_config: &ProviderConfig,
    ) -> Result<(AwsEksClient, aws_config::SdkConfig), ConnectError> {
        let config = sdk_config(&self.store, provider_config, managed.region()).await?;
        Ok((AwsEksClient::new(&config), config))
    }
}

#[async_trait]
impl<S: ManagedResourceClient + 'static> ExternalConnector<Cluster> for AwsConnector<S> {
    async fn connect(
        &self,
        managed: &Cluster,
        provider_config: &ProviderConfig,
    ) -> Result<Box<dyn ExternalClient<Cluster>>, ConnectError> {
        let (eks, config) = self.eks_client(managed, provider_config).await?;
        let signer = StsTokenSigner::new(&config).context(aws::SignerSnafu)?;
        Ok(Box::new(ClusterClient::new(eks, signer)))
    }
}

#[async_trait]
impl<S: ManagedResourceClient + 'static> ExternalConnector<NodeGroup> for AwsConnector<S> {
    async fn connect(
        &self,
        managed: &NodeGroup,
        provider_config: &ProviderConfig,
    ) -> Result<Box<dyn ExternalClient<NodeGroup>>, ConnectError> {
        let (eks, _) = self.eks_client(managed, provider_config).await?;
        Ok(Box::new(NodeGroupClient::new(eks)))
    }
}

#[async_trait]
impl<S: ManagedResourceClient + 'static> ExternalConnector<FargateProfile> for AwsConnector<S> {
    async fn connect(
        &self,
        managed: &FargateProfile,
        provider_config: &ProviderConfig,
    ) -> Result<Box<dyn ExternalClient<FargateProfile>>, ConnectError> {
        let (eks, _) = self.eks_client(managed, provider_config).await?;
        Ok(Box::new(FargateProfileClient::new(eks)))
    }
}

#[async_trait]
impl<S: ManagedResourceClient + 'static> ExternalConnector<IdentityProviderConfig>
    for AwsConnector<S>
{
    async fn connect(
        &self,
        managed: &IdentityProviderConfig,
        provider_config: &ProviderConfig,
    ) -> Result<Box<dyn ExternalClient<IdentityProviderConfig>>, ConnectError> {
        let (eks, _) = self.eks_client(managed, provider_config).await?;
        Ok(Box::new(IdentityProviderConfigClient::new(eks)))
    }
}

#[async_trait]
impl<S: ManagedResourceClient + 'static> ExternalConnector<Addon> for AwsConnector<S> {
    async fn connect(
        &self,
        managed: &Addon,
        provider_config: &ProviderConfig,
    ) -> Result<Box<dyn ExternalClient<Addon>>, ConnectError> {
        let (eks, _) = self.eks_client(managed, provider_config).await?;
        Ok(Box::new(AddonClient::new(eks)))
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use crate::aws::{service_error, EksError};

    pub(crate) fn not_found() -> EksError {
        service_error("ResourceNotFoundException", "No resource found")
    }

    pub(crate) fn in_use() -> EksError {
        service_error("ResourceInUseException", "Resource is in use")
    }
}
