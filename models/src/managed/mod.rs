//! Lifecycle types shared by every managed resource.
//!
//! A managed resource is a cluster-scoped desired-state object that corresponds to exactly one
//! external AWS object. Its spec carries the user-declared parameters (`forProvider`) next to the
//! fields defined here, which control how the controller is allowed to act on the external object.
mod client;
mod condition;
mod error;

pub use self::client::*;
pub use self::condition::*;
pub use self::error::Error as ManagedResourceError;

use crate::constants::{ANNOTATION_EXTERNAL_NAME, DEFAULT_PROVIDER_CONFIG};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

#[cfg(feature = "mockall")]
pub use self::client::{MockManagedResourceClient, MockReferenceReader};

/// An action the controller may take against the external object.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Eq, PartialEq, Hash, JsonSchema)]
pub enum ManagementAction {
    /// Shorthand for every action.
    #[serde(rename = "*")]
    All,
    Observe,
    Create,
    Update,
    Delete,
    LateInitialize,
}

/// What happens to the external object when the managed resource is deleted.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    /// Leave the external object behind.
    Orphan,
}

/// A reference to another object by name.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
pub struct Reference {
    pub name: String,
}

impl Reference {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Reference { name: name.into() }
    }
}

/// Selects another managed resource by its labels and, optionally, by sharing a controller.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_controller_ref: Option<bool>,
}

/// Names a namespaced secret.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

/// Names a single key within a namespaced secret.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

fn default_management_policies() -> Vec<ManagementAction> {
    vec![ManagementAction::All]
}

/// The lifecycle fields every managed resource embeds in its spec.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// The ProviderConfig supplying credentials. `default` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<Reference>,
    #[serde(default = "default_management_policies")]
    pub management_policies: Vec<ManagementAction>,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    /// Where to publish connection details, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        ResourceSpec {
            provider_config_ref: None,
            management_policies: default_management_policies(),
            deletion_policy: DeletionPolicy::default(),
            write_connection_secret_to_ref: None,
        }
    }
}

impl ResourceSpec {
    pub fn provider_config_name(&self) -> &str {
        self.provider_config_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .unwrap_or(DEFAULT_PROVIDER_CONFIG)
    }

    /// Returns whether the management policies permit `action`.
    pub fn allows(&self, action: ManagementAction) -> bool {
        self.management_policies
            .iter()
            .any(|p| *p == ManagementAction::All || *p == action)
    }

    /// Returns whether deleting the managed resource should delete the external object.
    pub fn should_delete_external(&self) -> bool {
        self.deletion_policy == DeletionPolicy::Delete && self.allows(ManagementAction::Delete)
    }
}

/// Accessors the generic reconciler needs on every managed kind.
pub trait Managed:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn resource_spec(&self) -> &ResourceSpec;

    /// The AWS region the external object lives in.
    fn region(&self) -> &str;

    /// The tag map of the desired state, created empty if absent.
    fn tags_mut(&mut self) -> &mut BTreeMap<String, String>;

    fn conditions(&self) -> &[Condition];

    fn set_condition(&mut self, condition: Condition);

    /// Replaces this object's status with a copy of `other`'s.
    fn copy_status_from(&mut self, other: &Self);

    /// The AWS-side identifier, if one has been recorded.
    fn external_name(&self) -> Option<String> {
        self.annotations().get(ANNOTATION_EXTERNAL_NAME).cloned()
    }

    fn set_external_name(&mut self, name: &str) {
        self.annotations_mut()
            .insert(ANNOTATION_EXTERNAL_NAME.to_string(), name.to_string());
    }

    /// The owner reference the managed resource's controller set on it, if any.
    fn controller_reference(&self) -> Option<OwnerReference> {
        self.owner_references()
            .iter()
            .find(|r| r.controller == Some(true))
            .cloned()
    }

    /// The condition of the given type, if set.
    fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions()
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// Implements `Managed` for a kind whose spec carries `for_provider.region`, `for_provider.tags`
/// and a flattened `resource_spec`, and whose status flattens a `ConditionedStatus`.
#[macro_export]
macro_rules! impl_managed {
    ($kind:ty) => {
        impl $crate::managed::Managed for $kind {
            fn resource_spec(&self) -> &$crate::managed::ResourceSpec {
                &self.spec.resource_spec
            }

            fn region(&self) -> &str {
                &self.spec.for_provider.region
            }

            fn tags_mut(&mut self) -> &mut std::collections::BTreeMap<String, String> {
                self.spec
                    .for_provider
                    .tags
                    .get_or_insert_with(std::collections::BTreeMap::new)
            }

            fn conditions(&self) -> &[$crate::managed::Condition] {
                self.status
                    .as_ref()
                    .map(|s| s.conditioned.conditions.as_slice())
                    .unwrap_or(&[])
            }

            fn set_condition(&mut self, condition: $crate::managed::Condition) {
                self.status
                    .get_or_insert_with(Default::default)
                    .conditioned
                    .set_condition(condition)
            }

            fn copy_status_from(&mut self, other: &Self) {
                self.status = other.status.clone();
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_management_policies_default_to_all() {
        let spec: ResourceSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.management_policies, vec![ManagementAction::All]);
        assert!(spec.allows(ManagementAction::Create));
        assert!(spec.should_delete_external());
        assert_eq!(spec.provider_config_name(), DEFAULT_PROVIDER_CONFIG);
    }

    #[test]
    fn test_management_policies_restrict_actions() {
        let spec: ResourceSpec = serde_json::from_value(serde_json::json!({
            "managementPolicies": ["Observe", "Update"],
            "providerConfigRef": {"name": "prod"},
        }))
        .unwrap();

        assert!(spec.allows(ManagementAction::Observe));
        assert!(spec.allows(ManagementAction::Update));
        assert!(!spec.allows(ManagementAction::Create));
        assert!(!spec.allows(ManagementAction::LateInitialize));
        assert!(!spec.should_delete_external());
        assert_eq!(spec.provider_config_name(), "prod");
    }

    #[test]
    fn test_orphan_never_deletes_external() {
        let spec = ResourceSpec {
            deletion_policy: DeletionPolicy::Orphan,
            ..Default::default()
        };
        assert!(!spec.should_delete_external());
    }
}
