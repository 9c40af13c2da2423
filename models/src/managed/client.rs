use super::{
    error::{self, Result},
    Managed, SecretKeySelector, SecretReference,
};
use crate::constants::FIELD_MANAGER;
use crate::providerconfig::ProviderConfig;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, ObjectMeta, Patch, PatchParams,
    PostParams,
};
use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use tracing::instrument;

#[cfg(feature = "mockall")]
use mockall::{mock, predicate::*};

/// Connection details published for a managed resource, keyed by secret key.
pub type ConnectionDetails = BTreeMap<String, Vec<u8>>;

/// The type stamped on connection secrets.
const CONNECTION_SECRET_TYPE: &str = "connection.crossplane.io/v1alpha1";

#[async_trait]
/// Read access to arbitrary objects in the control-plane store, used to resolve references between
/// managed resources. This is provided as a trait in order to allow mocks to be used for testing purposes.
pub trait ReferenceReader: Send + Sync {
    /// Fetches a single object by name, returning `None` if it does not exist.
    async fn get_object(&self, resource: &ApiResource, name: &str)
        -> Result<Option<DynamicObject>>;
    /// Lists the objects carrying every label in `match_labels`.
    async fn list_objects(
        &self,
        resource: &ApiResource,
        match_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock ReferenceReader for use in tests.
    pub ReferenceReader {}
    #[async_trait]
    impl ReferenceReader for ReferenceReader {
        async fn get_object(&self, resource: &ApiResource, name: &str)
            -> Result<Option<DynamicObject>>;
        async fn list_objects(
            &self,
            resource: &ApiResource,
            match_labels: &BTreeMap<String, String>,
        ) -> Result<Vec<DynamicObject>>;
    }
}

#[async_trait]
/// The control-plane store operations the managed reconciler performs.
pub trait ManagedResourceClient: ReferenceReader + Clone + Sized {
    /// Persists the metadata and spec of a managed resource.
    async fn update_managed<K: Managed>(&self, managed: &K) -> Result<K>;
    /// Persists the `.status` of a managed resource.
    async fn update_managed_status<K: Managed>(&self, managed: &K) -> Result<()>;
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig>;
    /// Reads one key of a secret.
    async fn get_secret_value(&self, selector: &SecretKeySelector) -> Result<Vec<u8>>;
    /// Creates or overwrites the connection secret of a managed resource.
    async fn apply_connection_secret(
        &self,
        target: &SecretReference,
        owner: OwnerReference,
        details: &ConnectionDetails,
    ) -> Result<()>;
    /// Deletes a connection secret. A missing secret is not an error.
    async fn delete_connection_secret(&self, target: &SecretReference) -> Result<()>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock ManagedResourceClient for use in tests.
    pub ManagedResourceClient {}
    impl Clone for ManagedResourceClient {
        fn clone(&self) -> Self;
    }
    #[async_trait]
    impl ReferenceReader for ManagedResourceClient {
        async fn get_object(&self, resource: &ApiResource, name: &str)
            -> Result<Option<DynamicObject>>;
        async fn list_objects(
            &self,
            resource: &ApiResource,
            match_labels: &BTreeMap<String, String>,
        ) -> Result<Vec<DynamicObject>>;
    }
    #[async_trait]
    impl ManagedResourceClient for ManagedResourceClient {
        async fn update_managed<K: Managed>(&self, managed: &K) -> Result<K>;
        async fn update_managed_status<K: Managed>(&self, managed: &K) -> Result<()>;
        async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig>;
        async fn get_secret_value(&self, selector: &SecretKeySelector) -> Result<Vec<u8>>;
        async fn apply_connection_secret(
            &self,
            target: &SecretReference,
            owner: OwnerReference,
            details: &ConnectionDetails,
        ) -> Result<()>;
        async fn delete_connection_secret(&self, target: &SecretReference) -> Result<()>;
    }
}

/// Builds the server-side apply body that writes the whole `.status` of `managed`.
///
/// Status is applied under `FIELD_MANAGER`, so any field this controller wrote before and that is
/// missing from the body (such as an observation cleared during the pass) is removed by the API
/// server. A merge patch would leave such fields in place.
pub fn status_apply_patch<K: Managed>(managed: &K) -> Result<serde_json::Value> {
    let object = serde_json::to_value(managed).context(error::CreateK8SPatchSnafu)?;
    let status = object
        .get("status")
        .filter(|status| !status.is_null())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    Ok(serde_json::json!({
        "apiVersion": K::api_version(&()),
        "kind": K::kind(&()),
        "metadata": {
            "name": managed.name_any(),
        },
        "status": status,
    }))
}

#[derive(Clone)]
/// Concrete implementation of the `ManagedResourceClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SManagedResourceClient {
    k8s_client: kube::client::Client,
}

impl K8SManagedResourceClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SManagedResourceClient { k8s_client }
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl ReferenceReader for K8SManagedResourceClient {
    #[instrument(skip(self, resource), fields(kind = %resource.kind), err)]
    async fn get_object(
        &self,
        resource: &ApiResource,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        Api::<DynamicObject>::all_with(self.k8s_client.clone(), resource)
            .get_opt(name)
            .await
            .context(error::GetObjectSnafu {
                kind: resource.kind.clone(),
                name,
            })
    }

    #[instrument(skip(self, resource), fields(kind = %resource.kind), err)]
    async fn list_objects(
        &self,
        resource: &ApiResource,
        match_labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>> {
        let selector = match_labels
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        let objects = Api::<DynamicObject>::all_with(self.k8s_client.clone(), resource)
            .list(&ListParams::default().labels(&selector))
            .await
            .context(error::ListObjectsSnafu {
                kind: resource.kind.clone(),
            })?;

        Ok(objects.items)
    }
}

#[async_trait]
impl ManagedResourceClient for K8SManagedResourceClient {
    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update_managed<K: Managed>(&self, managed: &K) -> Result<K> {
        let name = managed.name_any();
        Api::<K>::all(self.k8s_client.clone())
            .replace(&name, &PostParams::default(), managed)
            .await
            .context(error::UpdateObjectSnafu {
                kind: K::kind(&()).to_string(),
                name,
            })
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update_managed_status<K: Managed>(&self, managed: &K) -> Result<()> {
        let name = managed.name_any();
        let status_patch = status_apply_patch(managed)?;

        Api::<K>::all(self.k8s_client.clone())
            .patch_status(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&status_patch),
            )
            .await
            .context(error::UpdateStatusSnafu {
                kind: K::kind(&()).to_string(),
                name,
            })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig> {
        Api::<ProviderConfig>::all(self.k8s_client.clone())
            .get(name)
            .await
            .context(error::GetObjectSnafu {
                kind: "ProviderConfig",
                name,
            })
    }

    #[instrument(skip(self), err)]
    async fn get_secret_value(&self, selector: &SecretKeySelector) -> Result<Vec<u8>> {
        let secret = Api::<Secret>::namespaced(self.k8s_client.clone(), &selector.namespace)
            .get(&selector.name)
            .await
            .context(error::GetObjectSnafu {
                kind: "Secret",
                name: selector.name.clone(),
            })?;

        secret
            .data
            .and_then(|mut data| data.remove(&selector.key))
            .map(|value| value.0)
            .context(error::MissingSecretKeySnafu {
                namespace: selector.namespace.clone(),
                name: selector.name.clone(),
                key: selector.key.clone(),
            })
    }

    #[instrument(skip(self, owner, details), err)]
    async fn apply_connection_secret(
        &self,
        target: &SecretReference,
        owner: OwnerReference,
        details: &ConnectionDetails,
    ) -> Result<()> {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(target.name.clone()),
                namespace: Some(target.namespace.clone()),
                owner_references: Some(vec![owner]),
                ..Default::default()
            },
            data: Some(
                details
                    .iter()
                    .map(|(k, v)| (k.clone(), ByteString(v.clone())))
                    .collect(),
            ),
            type_: Some(CONNECTION_SECRET_TYPE.to_string()),
            ..Default::default()
        };

        Api::<Secret>::namespaced(self.k8s_client.clone(), &target.namespace)
            .patch(
                &target.name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&secret),
            )
            .await
            .context(error::PublishConnectionSecretSnafu {
                namespace: target.namespace.clone(),
                name: target.name.clone(),
            })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_connection_secret(&self, target: &SecretReference) -> Result<()> {
        match Api::<Secret>::namespaced(self.k8s_client.clone(), &target.namespace)
            .delete(&target.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(source) => Err(error::Error::DeleteConnectionSecret {
                namespace: target.namespace.clone(),
                name: target.name.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eks::identityproviderconfig::{
        IdentityProviderConfigObservation, IdentityProviderConfigSpec,
        IdentityProviderConfigStatus, IdentityProviderConfigStatusType,
    };
    use crate::eks::IdentityProviderConfig;
    use crate::managed::Condition;
    use serde_json::json;

    const ARN: &str =
        "arn:aws:eks:us-west-2:123456789012:identityproviderconfig/my-cool-cluster/oidc/corp-sso/abc";

    fn config(status: Option<IdentityProviderConfigStatusType>) -> IdentityProviderConfig {
        let mut config = IdentityProviderConfig::new("corp-sso", IdentityProviderConfigSpec::default());
        config.status = Some(IdentityProviderConfigStatus {
            at_provider: Some(IdentityProviderConfigObservation {
                arn: Some(ARN.to_string()),
                status,
            }),
            ..Default::default()
        });
        config
    }

    #[test]
    fn test_status_apply_patch_sends_whole_observation() {
        let failed = status_apply_patch(&config(Some(IdentityProviderConfigStatusType::CreateFailed)))
            .unwrap();
        assert_eq!(
            failed["status"]["atProvider"],
            json!({"arn": ARN, "status": "CREATE_FAILED"})
        );

        // A cleared observation field is absent from the applied status, so the API server drops
        // it instead of keeping the stale value.
        let mut reset = config(None);
        reset.set_condition(Condition::reconcile_success());
        let patch = status_apply_patch(&reset).unwrap();
        assert_eq!(patch["apiVersion"], json!("eks.aws.crossplane.io/v1beta1"));
        assert_eq!(patch["kind"], json!("IdentityProviderConfig"));
        assert_eq!(patch["metadata"], json!({"name": "corp-sso"}));
        assert_eq!(patch["status"]["atProvider"], json!({"arn": ARN}));
        assert_eq!(patch["status"]["conditions"][0]["type"], json!("Synced"));
        assert!(patch.get("spec").is_none());
    }

    #[test]
    fn test_status_apply_patch_without_status() {
        let mut config = config(None);
        config.status = None;
        let patch = status_apply_patch(&config).unwrap();
        assert_eq!(patch["status"], json!({}));
    }
}
