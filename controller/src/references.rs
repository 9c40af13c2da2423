//! Resolution of `*Ref`/`*Selector` fields into the concrete AWS identifiers they point at.
//!
//! A set reference is always re-resolved so a referent whose identifier changes is followed. A
//! selector is only consulted while both the value and the reference are empty; the match it picks
//! is then materialized as a reference so later passes are stable.
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube::ResourceExt;
use lazy_static::lazy_static;
use models::constants::ANNOTATION_EXTERNAL_NAME;
use models::eks::{Addon, Cluster, FargateProfile, IdentityProviderConfig, NodeGroup};
use models::managed::{Managed, ManagedResourceError, Reference, ReferenceReader, Selector};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::{event, Level};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ResolveError {
    #[snafu(display("Unable to get referenced {} '{}': '{}'", kind, name, source))]
    GetReferenced {
        kind: String,
        name: String,
        source: ManagedResourceError,
    },

    #[snafu(display("Unable to list {} objects for selector: '{}'", kind, source))]
    ListReferenced {
        kind: String,
        source: ManagedResourceError,
    },

    #[snafu(display("Referenced {} '{}' does not exist", kind, name))]
    ReferencedNotFound { kind: String, name: String },

    #[snafu(display("Referenced {} '{}' is not yet ready", kind, name))]
    ReferenceNotReady { kind: String, name: String },

    #[snafu(display("No {} matches the selector", kind))]
    NoSelectorMatch { kind: String },
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Which part of the referenced object holds the identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Extract {
    ExternalName,
    StatusArn,
}

/// A kind that fields can reference.
pub struct Target {
    resource: ApiResource,
    extract: Extract,
}

impl Target {
    fn new(group: &str, version: &str, kind: &str, plural: &str, extract: Extract) -> Self {
        Target {
            resource: ApiResource::from_gvk_with_plural(
                &GroupVersionKind::gvk(group, version, kind),
                plural,
            ),
            extract,
        }
    }

    fn kind(&self) -> String {
        self.resource.kind.clone()
    }

    /// The identifier carried by `object`, if it has been populated.
    fn value_of(&self, object: &DynamicObject) -> Option<String> {
        let value = match self.extract {
            Extract::ExternalName => object.annotations().get(ANNOTATION_EXTERNAL_NAME).cloned(),
            Extract::StatusArn => object
                .data
                .get("status")
                .and_then(|s| s.get("atProvider"))
                .and_then(|a| a.get("arn"))
                .and_then(|arn| arn.as_str())
                .map(str::to_string),
        };
        value.filter(|v| !v.is_empty())
    }
}

lazy_static! {
    pub static ref ROLE: Target = Target::new(
        "iam.aws.crossplane.io",
        "v1beta1",
        "Role",
        "roles",
        Extract::StatusArn
    );
    pub static ref SUBNET: Target = Target::new(
        "ec2.aws.crossplane.io",
        "v1beta1",
        "Subnet",
        "subnets",
        Extract::ExternalName
    );
    pub static ref SECURITY_GROUP: Target = Target::new(
        "ec2.aws.crossplane.io",
        "v1beta1",
        "SecurityGroup",
        "securitygroups",
        Extract::ExternalName
    );
    pub static ref KMS_KEY: Target = Target::new(
        "kms.aws.crossplane.io",
        "v1alpha1",
        "Key",
        "keys",
        Extract::StatusArn
    );
    pub static ref CLUSTER: Target = Target::new(
        models::constants::EKS_GROUP,
        "v1beta1",
        "Cluster",
        "clusters",
        Extract::ExternalName
    );
}

/// Binds reference fields to the identifiers of the objects they point at.
#[async_trait]
pub trait ResolveReferences {
    /// Resolves every reference in `forProvider`, returning whether any field changed.
    async fn resolve_references<R: ReferenceReader + ?Sized>(
        &mut self,
        reader: &R,
    ) -> Result<bool>;
}

/// Resolves a single-valued field.
async fn resolve<R: ReferenceReader + ?Sized>(
    reader: &R,
    target: &Target,
    controller: Option<&OwnerReference>,
    value: &mut Option<String>,
    reference: &mut Option<Reference>,
    selector: Option<&Selector>,
) -> Result<bool> {
    let referenced = reference.as_ref().map(|r| r.name.clone());
    let resolved = match (referenced, selector) {
        (Some(name), _) => referenced_value(reader, target, &name).await?,
        (None, Some(selector)) if value.as_deref().map_or(true, str::is_empty) => {
            let (name, resolved) = selected_values(reader, target, controller, selector)
                .await?
                .into_iter()
                .next()
                .context(NoSelectorMatchSnafu { kind: target.kind() })?;
            *reference = Some(Reference::new(name));
            resolved
        }
        _ => return Ok(false),
    };

    if value.as_deref() == Some(resolved.as_str()) {
        return Ok(false);
    }
    event!(Level::DEBUG, kind = %target.kind(), value = %resolved, "Resolved reference");
    *value = Some(resolved);
    Ok(true)
}

/// Resolves a list-valued field.
async fn resolve_all<R: ReferenceReader + ?Sized>(
    reader: &R,
    target: &Target,
    controller: Option<&OwnerReference>,
    values: &mut Vec<String>,
    references: &mut Option<Vec<Reference>>,
    selector: Option<&Selector>,
) -> Result<bool> {
    let referenced = references.clone().filter(|r| !r.is_empty());
    let resolved = match (referenced, selector) {
        (Some(refs), _) => {
            let mut resolved = Vec::with_capacity(refs.len());
            for r in refs.iter() {
                resolved.push(referenced_value(reader, target, &r.name).await?);
            }
            resolved
        }
        (None, Some(selector)) if values.is_empty() => {
            let matches = selected_values(reader, target, controller, selector).await?;
            ensure!(!matches.is_empty(), NoSelectorMatchSnafu { kind: target.kind() });
            *references = Some(
                matches
                    .iter()
                    .map(|(name, _)| Reference::new(name.clone()))
                    .collect(),
            );
            matches.into_iter().map(|(_, value)| value).collect()
        }
        _ => return Ok(false),
    };

    if *values == resolved {
        return Ok(false);
    }
    event!(Level::DEBUG, kind = %target.kind(), values = ?resolved, "Resolved references");
    *values = resolved;
    Ok(true)
}

async fn referenced_value<R: ReferenceReader + ?Sized>(
    reader: &R,
    target: &Target,
    name: &str,
) -> Result<String> {
    let object = reader
        .get_object(&target.resource, name)
        .await
        .context(GetReferencedSnafu {
            kind: target.kind(),
            name,
        })?
        .context(ReferencedNotFoundSnafu {
            kind: target.kind(),
            name,
        })?;
    target.value_of(&object).context(ReferenceNotReadySnafu {
        kind: target.kind(),
        name,
    })
}

/// Lists the objects matched by `selector` as `(object name, identifier)` pairs ordered by
/// identifier. A match without an identifier yet is an error.
async fn selected_values<R: ReferenceReader + ?Sized>(
    reader: &R,
    target: &Target,
    controller: Option<&OwnerReference>,
    selector: &Selector,
) -> Result<Vec<(String, String)>> {
    let match_labels = selector.match_labels.clone().unwrap_or_default();
    let objects = reader
        .list_objects(&target.resource, &match_labels)
        .await
        .context(ListReferencedSnafu { kind: target.kind() })?;

    let match_controller = selector.match_controller_ref == Some(true);
    let mut matches = objects
        .iter()
        .filter(|object| !match_controller || same_controller(object, controller))
        .map(|object| {
            let name = object.name_any();
            let value = target.value_of(object).context(ReferenceNotReadySnafu {
                kind: target.kind(),
                name: name.clone(),
            })?;
            Ok((name, value))
        })
        .collect::<Result<Vec<_>>>()?;
    matches.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    Ok(matches)
}

fn same_controller(object: &DynamicObject, controller: Option<&OwnerReference>) -> bool {
    match controller {
        Some(controller) => object
            .owner_references()
            .iter()
            .any(|r| r.controller == Some(true) && r.uid == controller.uid),
        None => false,
    }
}

#[async_trait]
impl ResolveReferences for Cluster {
    async fn resolve_references<R: ReferenceReader + ?Sized>(
        &mut self,
        reader: &R,
    ) -> Result<bool> {
        let controller = self.controller_reference();
        let controller = controller.as_ref();
        let params = &mut self.spec.for_provider;
        let vpc = &mut params.resources_vpc_config;

        let mut changed = resolve(
            reader,
            &ROLE,
            controller,
            &mut params.role_arn,
            &mut params.role_arn_ref,
            params.role_arn_selector.as_ref(),
        )
        .await?;
        changed |= resolve_all(
            reader,
            &SUBNET,
            controller,
            &mut vpc.subnet_ids,
            &mut vpc.subnet_id_refs,
            vpc.subnet_id_selector.as_ref(),
        )
        .await?;
        changed |= resolve_all(
            reader,
            &SECURITY_GROUP,
            controller,
            &mut vpc.security_group_ids,
            &mut vpc.security_group_id_refs,
            vpc.security_group_id_selector.as_ref(),
        )
        .await?;
        for encryption in params.encryption_config.iter_mut() {
            let provider = &mut encryption.provider;
            changed |= resolve(
                reader,
                &KMS_KEY,
                controller,
                &mut provider.key_arn,
                &mut provider.key_arn_ref,
                provider.key_arn_selector.as_ref(),
            )
            .await?;
        }
        Ok(changed)
    }
}

#[async_trait]
impl ResolveReferences for NodeGroup {
    async fn resolve_references<R: ReferenceReader + ?Sized>(
        &mut self,
        reader: &R,
    ) -> Result<bool> {
        let controller = self.controller_reference();
        let controller = controller.as_ref();
        let params = &mut self.spec.for_provider;

        let mut changed = resolve(
            reader,
            &CLUSTER,
            controller,
            &mut params.cluster_name,
            &mut params.cluster_name_ref,
            params.cluster_name_selector.as_ref(),
        )
        .await?;
        changed |= resolve(
            reader,
            &ROLE,
            controller,
            &mut params.node_role,
            &mut params.node_role_ref,
            params.node_role_selector.as_ref(),
        )
        .await?;
        changed |= resolve_all(
            reader,
            &SUBNET,
            controller,
            &mut params.subnets,
            &mut params.subnet_refs,
            params.subnet_selector.as_ref(),
        )
        .await?;
        if let Some(remote_access) = params.remote_access.as_mut() {
            changed |= resolve_all(
                reader,
                &SECURITY_GROUP,
                controller,
                &mut remote_access.source_security_groups,
                &mut remote_access.source_security_group_refs,
                remote_access.source_security_group_selector.as_ref(),
            )
            .await?;
        }
        Ok(changed)
    }
}

#[async_trait]
impl ResolveReferences for FargateProfile {
    async fn resolve_references<R: ReferenceReader + ?Sized>(
        &mut self,
        reader: &R,
    ) -> Result<bool> {
        let controller = self.controller_reference();
        let controller = controller.as_ref();
        let params = &mut self.spec.for_provider;

        let mut changed = resolve(
            reader,
            &CLUSTER,
            controller,
            &mut params.cluster_name,
            &mut params.cluster_name_ref,
            params.cluster_name_selector.as_ref(),
        )
        .await?;
        changed |= resolve(
            reader,
            &ROLE,
            controller,
            &mut params.pod_execution_role_arn,
            &mut params.pod_execution_role_arn_ref,
            params.pod_execution_role_arn_selector.as_ref(),
        )
        .await?;
        changed |= resolve_all(
            reader,
            &SUBNET,
            controller,
            &mut params.subnets,
            &mut params.subnet_refs,
            params.subnet_selector.as_ref(),
        )
        .await?;
        Ok(changed)
    }
}

#[async_trait]
impl ResolveReferences for IdentityProviderConfig {
    async fn resolve_references<R: ReferenceReader + ?Sized>(
        &mut self,
        reader: &R,
    ) -> Result<bool> {
        let controller = self.controller_reference();
        let params = &mut self.spec.for_provider;
        resolve(
            reader,
            &CLUSTER,
            controller.as_ref(),
            &mut params.cluster_name,
            &mut params.cluster_name_ref,
            params.cluster_name_selector.as_ref(),
        )
        .await
    }
}

#[async_trait]
impl ResolveReferences for Addon {
    async fn resolve_references<R: ReferenceReader + ?Sized>(
        &mut self,
        reader: &R,
    ) -> Result<bool> {
        let controller = self.controller_reference();
        let controller = controller.as_ref();
        let params = &mut self.spec.for_provider;

        let mut changed = resolve(
            reader,
            &CLUSTER,
            controller,
            &mut params.cluster_name,
            &mut params.cluster_name_ref,
            params.cluster_name_selector.as_ref(),
        )
        .await?;
        changed |= resolve(
            reader,
            &ROLE,
            controller,
            &mut params.service_account_role_arn,
            &mut params.service_account_role_arn_ref,
            params.service_account_role_arn_selector.as_ref(),
        )
        .await?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use models::eks::nodegroup::NodeGroupParameters;
    use models::eks::nodegroup::NodeGroupSpec;
    use models::managed::MockReferenceReader;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn external(target: &Target, name: &str, external_name: &str) -> DynamicObject {
        let mut object = DynamicObject::new(name, &target.resource);
        object.metadata.annotations = Some(btreemap! {
            ANNOTATION_EXTERNAL_NAME.to_string() => external_name.to_string(),
        });
        object
    }

    fn role(name: &str, arn: Option<&str>) -> DynamicObject {
        DynamicObject::new(name, &ROLE.resource).data(match arn {
            Some(arn) => json!({"status": {"atProvider": {"arn": arn}}}),
            None => json!({"status": {}}),
        })
    }

    fn nodegroup(params: NodeGroupParameters) -> NodeGroup {
        NodeGroup::new(
            "workers",
            NodeGroupSpec {
                for_provider: params,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_references_resolve() {
        let mut reader = MockReferenceReader::new();
        reader
            .expect_get_object()
            .withf(|resource, name| resource.kind == "Cluster" && name == "prod")
            .times(1)
            .returning(|_, _| Ok(Some(external(&CLUSTER, "prod", "prod-cluster"))));
        reader
            .expect_get_object()
            .withf(|resource, name| resource.kind == "Role" && name == "node-role")
            .times(1)
            .returning(|_, _| Ok(Some(role("node-role", Some("arn:aws:iam::1:role/node")))));
        reader
            .expect_get_object()
            .withf(|resource, _| resource.kind == "Subnet")
            .times(2)
            .returning(|_, name| Ok(Some(external(&SUBNET, name, &format!("subnet-{}", name)))));

        let mut ng = nodegroup(NodeGroupParameters {
            cluster_name_ref: Some(Reference::new("prod")),
            node_role_ref: Some(Reference::new("node-role")),
            subnet_refs: Some(vec![Reference::new("b"), Reference::new("a")]),
            ..Default::default()
        });

        assert!(ng.resolve_references(&reader).await.unwrap());
        let params = &ng.spec.for_provider;
        assert_eq!(params.cluster_name.as_deref(), Some("prod-cluster"));
        assert_eq!(params.node_role.as_deref(), Some("arn:aws:iam::1:role/node"));
        assert_eq!(params.subnets, vec!["subnet-b", "subnet-a"]);
    }

    #[tokio::test]
    async fn test_resolved_references_are_stable() {
        let mut reader = MockReferenceReader::new();
        reader
            .expect_get_object()
            .returning(|_, _| Ok(Some(external(&CLUSTER, "prod", "prod-cluster"))));

        let mut ng = nodegroup(NodeGroupParameters {
            cluster_name: Some("prod-cluster".to_string()),
            cluster_name_ref: Some(Reference::new("prod")),
            ..Default::default()
        });
        assert!(!ng.resolve_references(&reader).await.unwrap());
    }

    #[tokio::test]
    async fn test_reference_errors() {
        let test_cases = vec![
            (None, "does not exist"),
            (Some(role("node-role", None)), "is not yet ready"),
        ];

        for (object, expected) in test_cases {
            let mut reader = MockReferenceReader::new();
            reader
                .expect_get_object()
                .returning(move |_, _| Ok(object.clone()));

            let mut ng = nodegroup(NodeGroupParameters {
                node_role_ref: Some(Reference::new("node-role")),
                ..Default::default()
            });
            let err = ng.resolve_references(&reader).await.unwrap_err();
            assert!(err.to_string().contains(expected), "{}", err);
            assert_eq!(ng.spec.for_provider.node_role, None);
        }
    }

    #[tokio::test]
    async fn test_selector_picks_first_match_and_materializes_ref() {
        let mut reader = MockReferenceReader::new();
        reader
            .expect_list_objects()
            .withf(|resource, match_labels| {
                resource.kind == "Cluster" && *match_labels == labels(&[("env", "prod")])
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    external(&CLUSTER, "second", "zeta"),
                    external(&CLUSTER, "first", "alpha"),
                ])
            });

        let mut ng = nodegroup(NodeGroupParameters {
            cluster_name_selector: Some(Selector {
                match_labels: Some(labels(&[("env", "prod")])),
                match_controller_ref: None,
            }),
            ..Default::default()
        });

        assert!(ng.resolve_references(&reader).await.unwrap());
        assert_eq!(ng.spec.for_provider.cluster_name.as_deref(), Some("alpha"));
        assert_eq!(
            ng.spec.for_provider.cluster_name_ref,
            Some(Reference::new("first"))
        );
    }

    #[tokio::test]
    async fn test_selector_ignored_when_value_set() {
        let mut reader = MockReferenceReader::new();
        reader.expect_list_objects().never();

        let mut ng = nodegroup(NodeGroupParameters {
            subnets: vec!["subnet-1".to_string()],
            subnet_selector: Some(Selector::default()),
            ..Default::default()
        });
        assert!(!ng.resolve_references(&reader).await.unwrap());
    }

    #[tokio::test]
    async fn test_selector_without_matches() {
        let mut reader = MockReferenceReader::new();
        reader.expect_list_objects().returning(|_, _| Ok(vec![]));

        let mut ng = nodegroup(NodeGroupParameters {
            subnet_selector: Some(Selector::default()),
            ..Default::default()
        });
        let err = ng.resolve_references(&reader).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoSelectorMatch { .. }));
    }

    #[tokio::test]
    async fn test_selector_matching_controller_ref() {
        let owner = |uid: &str| OwnerReference {
            api_version: "v1".to_string(),
            kind: "Composite".to_string(),
            name: "composite".to_string(),
            uid: uid.to_string(),
            controller: Some(true),
            ..Default::default()
        };
        let mut ours = external(&SUBNET, "ours", "subnet-ours");
        ours.metadata.owner_references = Some(vec![owner("uid-1")]);
        let mut theirs = external(&SUBNET, "theirs", "subnet-theirs");
        theirs.metadata.owner_references = Some(vec![owner("uid-2")]);

        let mut reader = MockReferenceReader::new();
        reader
            .expect_list_objects()
            .returning(move |_, _| Ok(vec![theirs.clone(), ours.clone()]));

        let mut ng = nodegroup(NodeGroupParameters {
            subnet_selector: Some(Selector {
                match_labels: None,
                match_controller_ref: Some(true),
            }),
            ..Default::default()
        });
        ng.metadata.owner_references = Some(vec![owner("uid-1")]);

        assert!(ng.resolve_references(&reader).await.unwrap());
        assert_eq!(ng.spec.for_provider.subnets, vec!["subnet-ours"]);
        assert_eq!(
            ng.spec.for_provider.subnet_refs,
            Some(vec![Reference::new("ours")])
        );
    }
}
