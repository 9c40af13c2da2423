use super::{
    external_name, found, is_transient, lifecycle_condition, parse_status, required,
    tags_up_to_date, timestamp, tolerate_conflict, tolerate_exists, tolerate_not_found,
    update_tags,
};
use crate::aws::{
    ClusterDescription, CreateClusterInput, EksClient, EncryptionConfigEntry, TokenSigner,
    UpdateClusterConfigInput, VpcConfigInput,
};
use crate::connection::cluster_connection_details;
use crate::diff::{cidrs_equal, equivalent, LateInitializer};
use crate::managed::{
    ConnectionDetailsSnafu, ExternalClient, ExternalObservation, Result, ValidationSnafu,
};

use async_trait::async_trait;
use kube::ResourceExt;
use models::eks::cluster::{
    AccessConfig, ClusterObservation, ClusterParameters, ClusterStatusType, EncryptionConfig,
    EncryptionProvider, Identity, KubernetesNetworkConfigRequest, LogType, Logging, Oidc,
    VpcConfigRequest, VpcConfigResponse,
};
use models::eks::Cluster;
use models::managed::{Condition, ConnectionDetails, Managed};
use snafu::{ensure, ResultExt};
use std::collections::BTreeSet;
use tracing::{event, instrument, Level};

/// Drives an EKS control plane. Connection details carry a kubeconfig signed by `signer`.
pub struct ClusterClient<E, T> {
    eks: E,
    signer: T,
}

impl<E: EksClient, T: TokenSigner> ClusterClient<E, T> {
    pub fn new(eks: E, signer: T) -> Self {
        ClusterClient { eks, signer }
    }

    /// Builds the connection secret once the cluster reports its name, endpoint and CA.
    async fn connection_details(&self, described: &ClusterDescription) -> Result<ConnectionDetails> {
        match (
            &described.name,
            &described.endpoint,
            &described.certificate_authority_data,
        ) {
            (Some(name), Some(endpoint), Some(ca_data)) => {
                cluster_connection_details(&self.signer, name, endpoint, ca_data)
                    .await
                    .context(ConnectionDetailsSnafu)
            }
            _ => Ok(ConnectionDetails::new()),
        }
    }

    /// Issues the single highest-priority mutation the cluster needs, if any.
    async fn update_primary(
        &self,
        name: &str,
        desired: &ClusterParameters,
        described: &ClusterDescription,
    ) -> Result<()> {
        let current = current_parameters(described);

        if !desired.encryption_config.is_empty()
            && !equivalent(&desired.encryption_config, &current.encryption_config)
        {
            ensure!(
                current.encryption_config.is_empty(),
                ValidationSnafu {
                    message: "encryptionConfig cannot be changed once it has been associated",
                }
            );
            let entries = desired
                .encryption_config
                .iter()
                .map(encryption_entry)
                .collect();
            event!(Level::INFO, cluster = name, "Associating encryption config");
            return tolerate_conflict(
                "AssociateEncryptionConfig",
                self.eks.associate_encryption_config(name, entries).await,
            );
        }

        if let Some(version) = desired.version.as_deref() {
            if current.version.as_deref() != Some(version) {
                event!(Level::INFO, cluster = name, version, "Upgrading cluster version");
                return tolerate_conflict(
                    "UpdateClusterVersion",
                    self.eks.update_cluster_version(name, version).await,
                );
            }
        }

        if let Some(logging) = desired.logging.as_ref().filter(|logging| {
            enabled_log_types(Some(logging)) != enabled_log_types(current.logging.as_ref())
        }) {
            return tolerate_conflict(
                "UpdateClusterConfig",
                self.eks
                    .update_cluster_config(UpdateClusterConfigInput {
                        name: name.to_string(),
                        logging: Some(logging.clone()),
                        ..Default::default()
                    })
                    .await,
            );
        }

        if let Some(vpc) = vpc_update(&desired.resources_vpc_config, &current.resources_vpc_config)
        {
            return tolerate_conflict(
                "UpdateClusterConfig",
                self.eks
                    .update_cluster_config(UpdateClusterConfigInput {
                        name: name.to_string(),
                        resources_vpc_config: Some(vpc),
                        ..Default::default()
                    })
                    .await,
            );
        }

        let desired_mode = desired
            .access_config
            .as_ref()
            .and_then(|access| access.authentication_mode.as_deref());
        if let Some(mode) = desired_mode {
            if described.authentication_mode.as_deref() != Some(mode) {
                return tolerate_conflict(
                    "UpdateClusterConfig",
                    self.eks
                        .update_cluster_config(UpdateClusterConfigInput {
                            name: name.to_string(),
                            authentication_mode: Some(mode.to_string()),
                            ..Default::default()
                        })
                        .await,
                );
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<E: EksClient, T: TokenSigner> ExternalClient<Cluster> for ClusterClient<E, T> {
    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn observe(&self, managed: &mut Cluster) -> Result<ExternalObservation> {
        let name = external_name(managed);
        let described = match found(self.eks.describe_cluster(&name).await)? {
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
            connection_details: self.connection_details(&described).await?,
            late_initialized,
        })
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn create(&self, managed: &mut Cluster) -> Result<()> {
        if managed.observed_status() == Some(ClusterStatusType::Creating) {
            return Ok(());
        }
        let input = create_input(&external_name(managed), &managed.spec.for_provider)?;
        managed.set_condition(Condition::creating());
        tolerate_exists("CreateCluster", self.eks.create_cluster(input).await)
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn update(&self, managed: &mut Cluster) -> Result<()> {
        let name = external_name(managed);
        let described = self.eks.describe_cluster(&name).await?;
        if is_transient(described.status.as_deref()) {
            event!(Level::DEBUG, status = ?described.status, "Cluster is busy, skipping update");
            return Ok(());
        }

        let desired = &managed.spec.for_provider;
        let tagged = update_tags(
            &self.eks,
            described.arn.as_deref(),
            desired.tags.as_ref(),
            &described.tags,
        )
        .await;
        self.update_primary(&name, desired, &described).await?;
        tagged
    }

    #[instrument(skip(self, managed), fields(name = %managed.name_any()), err)]
    async fn delete(&self, managed: &mut Cluster) -> Result<()> {
        managed.set_condition(Condition::deleting());
        if managed.observed_status() == Some(ClusterStatusType::Deleting) {
            return Ok(());
        }
        tolerate_not_found(self.eks.delete_cluster(&external_name(managed)).await)
    }
}

/// Fills unset fields of `params` from the described cluster. Returns whether anything changed.
pub(crate) fn late_initialize(params: &mut ClusterParameters, described: &ClusterDescription) -> bool {
    let mut li = LateInitializer::new();
    li.option(&mut params.version, described.version.clone());
    li.option(&mut params.role_arn, described.role_arn.clone());
    li.option(&mut params.logging, described.logging.clone());
    li.option(&mut params.outpost_config, described.outpost_config.clone());
    li.vec(
        &mut params.encryption_config,
        described
            .encryption_config
            .iter()
            .map(encryption_config)
            .collect(),
    );

    if let Some(observed) = &described.kubernetes_network_config {
        match &mut params.kubernetes_network_config {
            Some(network) => {
                li.option(&mut network.ip_family, observed.ip_family.clone());
                li.option(&mut network.service_ipv4_cidr, observed.service_ipv4_cidr.clone());
            }
            None => li.option(
                &mut params.kubernetes_network_config,
                Some(KubernetesNetworkConfigRequest {
                    ip_family: observed.ip_family.clone(),
                    service_ipv4_cidr: observed.service_ipv4_cidr.clone(),
                }),
            ),
        }
    }

    if let Some(mode) = &described.authentication_mode {
        match &mut params.access_config {
            Some(access) => li.option(&mut access.authentication_mode, Some(mode.clone())),
            None => li.option(
                &mut params.access_config,
                Some(AccessConfig {
                    authentication_mode: Some(mode.clone()),
                    bootstrap_cluster_creator_admin_permissions: None,
                }),
            ),
        }
    }

    if let Some(vpc) = &described.resources_vpc_config {
        let desired = &mut params.resources_vpc_config;
        li.option(
            &mut desired.endpoint_private_access,
            Some(vpc.endpoint_private_access),
        );
        li.option(
            &mut desired.endpoint_public_access,
            Some(vpc.endpoint_public_access),
        );
        li.vec(&mut desired.public_access_cidrs, vpc.public_access_cidrs.clone());
        li.vec(&mut desired.security_group_ids, vpc.security_group_ids.clone());
        li.vec(&mut desired.subnet_ids, vpc.subnet_ids.clone());
    }

    li.map(&mut params.tags, described.tags.clone());
    li.changed()
}

/// The parameters that describe `described` exactly.
fn current_parameters(described: &ClusterDescription) -> ClusterParameters {
    let mut current = ClusterParameters::default();
    late_initialize(&mut current, described);
    current
}

/// Whether the mutable fields of `desired` match the described cluster. Unset desired fields
/// take the observed value.
pub(crate) fn is_up_to_date(desired: &ClusterParameters, described: &ClusterDescription) -> bool {
    let mut desired = desired.clone();
    late_initialize(&mut desired, described);
    let current = current_parameters(described);

    tags_up_to_date(desired.tags.as_ref(), &described.tags)
        && cidrs_equal(
            &desired.resources_vpc_config.public_access_cidrs,
            &current.resources_vpc_config.public_access_cidrs,
        )
        && enabled_log_types(desired.logging.as_ref())
            == enabled_log_types(current.logging.as_ref())
        && equivalent(&comparable(&desired), &comparable(&current))
}

/// The fields compared by `equivalent`. Immutable fields, tags, logging and CIDRs are left out.
fn comparable(params: &ClusterParameters) -> ClusterParameters {
    ClusterParameters {
        version: params.version.clone(),
        encryption_config: params.encryption_config.clone(),
        resources_vpc_config: VpcConfigRequest {
            public_access_cidrs: Vec::new(),
            ..params.resources_vpc_config.clone()
        },
        access_config: params.access_config.as_ref().map(|access| AccessConfig {
            authentication_mode: access.authentication_mode.clone(),
            bootstrap_cluster_creator_admin_permissions: None,
        }),
        ..Default::default()
    }
}

fn enabled_log_types(logging: Option<&Logging>) -> BTreeSet<LogType> {
    logging
        .into_iter()
        .flat_map(|logging| logging.cluster_logging.iter())
        .filter(|setup| setup.enabled == Some(true))
        .flat_map(|setup| setup.types.iter().copied())
        .collect()
}

/// The VPC change to request, if the endpoint access, CIDRs, subnets or security groups drifted.
fn vpc_update(desired: &VpcConfigRequest, current: &VpcConfigRequest) -> Option<VpcConfigInput> {
    let changed = |d: Option<bool>, c: Option<bool>| d.is_some() && d != c;
    let set = |ids: &[String]| ids.iter().cloned().collect::<BTreeSet<_>>();

    let endpoints_changed = changed(
        desired.endpoint_public_access,
        current.endpoint_public_access,
    ) || changed(
        desired.endpoint_private_access,
        current.endpoint_private_access,
    );
    let cidrs_changed = !desired.public_access_cidrs.is_empty()
        && !cidrs_equal(&desired.public_access_cidrs, &current.public_access_cidrs);
    let subnets_changed =
        !desired.subnet_ids.is_empty() && set(&desired.subnet_ids) != set(&current.subnet_ids);
    let security_groups_changed = !desired.security_group_ids.is_empty()
        && set(&desired.security_group_ids) != set(&current.security_group_ids);

    if !(endpoints_changed || cidrs_changed || subnets_changed || security_groups_changed) {
        return None;
    }

    let cidrs = if desired.public_access_cidrs.is_empty() {
        &current.public_access_cidrs
    } else {
        &desired.public_access_cidrs
    };
    Some(VpcConfigInput {
        subnet_ids: subnets_changed.then(|| desired.subnet_ids.clone()),
        security_group_ids: security_groups_changed.then(|| desired.security_group_ids.clone()),
        endpoint_public_access: desired
            .endpoint_public_access
            .or(current.endpoint_public_access),
        endpoint_private_access: desired
            .endpoint_private_access
            .or(current.endpoint_private_access),
        public_access_cidrs: (!cidrs.is_empty()).then(|| cidrs.clone()),
    })
}

fn encryption_entry(config: &EncryptionConfig) -> EncryptionConfigEntry {
    EncryptionConfigEntry {
        key_arn: config.provider.key_arn.clone(),
        resources: config.resources.clone(),
    }
}

fn encryption_config(entry: &EncryptionConfigEntry) -> EncryptionConfig {
    EncryptionConfig {
        provider: EncryptionProvider {
            key_arn: entry.key_arn.clone(),
            ..Default::default()
        },
        resources: entry.resources.clone(),
    }
}

fn create_input(name: &str, params: &ClusterParameters) -> Result<CreateClusterInput> {
    let vpc = &params.resources_vpc_config;
    let non_empty = |ids: &Vec<String>| (!ids.is_empty()).then(|| ids.clone());

    Ok(CreateClusterInput {
        name: name.to_string(),
        role_arn: required(&params.role_arn, "spec.forProvider.roleArn")?.to_string(),
        version: params.version.clone(),
        resources_vpc_config: VpcConfigInput {
            subnet_ids: non_empty(&vpc.subnet_ids),
            security_group_ids: non_empty(&vpc.security_group_ids),
            endpoint_public_access: vpc.endpoint_public_access,
            endpoint_private_access: vpc.endpoint_private_access,
            public_access_cidrs: non_empty(&vpc.public_access_cidrs),
        },
        kubernetes_network_config: params.kubernetes_network_config.clone(),
        logging: params.logging.clone(),
        encryption_config: params.encryption_config.iter().map(encryption_entry).collect(),
        outpost_config: params.outpost_config.clone(),
        access_config: params.access_config.clone(),
        tags: params.tags.clone().unwrap_or_default(),
    })
}

fn observation(described: &ClusterDescription) -> ClusterObservation {
    ClusterObservation {
        arn: described.arn.clone(),
        created_at: timestamp(described.created_at),
        endpoint: described.endpoint.clone(),
        identity: described.identity_oidc_issuer.clone().map(|issuer| Identity {
            oidc: Some(Oidc {
                issuer: Some(issuer),
            }),
        }),
        kubernetes_network_config: described.kubernetes_network_config.clone(),
        platform_version: described.platform_version.clone(),
        resources_vpc_config: described
            .resources_vpc_config
            .as_ref()
            .map(|vpc| VpcConfigResponse {
                cluster_security_group_id: vpc.cluster_security_group_id.clone(),
                vpc_id: vpc.vpc_id.clone(),
            }),
        status: parse_status(described.status.as_deref()),
        version: described.version.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::{MockEksClient, MockTokenSigner, VpcConfigDescription};
    use crate::eks::test_util::{in_use, not_found};
    use crate::managed::ExternalError;
    use maplit::btreemap;
    use models::constants::{CONNECTION_CLUSTER_CA, CONNECTION_ENDPOINT, CONNECTION_KUBECONFIG};
    use models::eks::cluster::{ClusterSpec, ClusterStatus, LogSetup};
    use models::managed::{ConditionReason, ConditionType};

    const NAME: &str = "my-cool-cluster";
    const ROLE_ARN: &str = "arn:aws:iam::123456789012:role/cool-role";
    const CLUSTER_ARN: &str = "arn:aws:eks:us-west-2:123456789012:cluster/my-cool-cluster";
    const KEY_ARN: &str = "arn:aws:kms:us-west-2:123456789012:key/cool-key";

    fn cluster(for_provider: ClusterParameters) -> Cluster {
        let mut cluster = Cluster::new(
            NAME,
            ClusterSpec {
                for_provider,
                resource_spec: Default::default(),
            },
        );
        cluster.set_external_name(NAME);
        cluster
    }

    fn params() -> ClusterParameters {
        ClusterParameters {
            region: "us-west-2".to_string(),
            role_arn: Some(ROLE_ARN.to_string()),
            resources_vpc_config: VpcConfigRequest {
                subnet_ids: vec!["cool-subnet".to_string()],
                ..Default::default()
            },
            version: Some("1.16".to_string()),
            ..Default::default()
        }
    }

    fn active() -> ClusterDescription {
        ClusterDescription {
            name: Some(NAME.to_string()),
            arn: Some(CLUSTER_ARN.to_string()),
            version: Some("1.16".to_string()),
            endpoint: Some("https://ep".to_string()),
            role_arn: Some(ROLE_ARN.to_string()),
            status: Some("ACTIVE".to_string()),
            certificate_authority_data: Some("Y2E=".to_string()),
            resources_vpc_config: Some(VpcConfigDescription {
                subnet_ids: vec!["cool-subnet".to_string()],
                endpoint_public_access: true,
                public_access_cidrs: vec!["0.0.0.0/0".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// A cluster whose spec was late-initialized from `described`.
    fn observed_cluster(described: &ClusterDescription) -> Cluster {
        let mut params = params();
        late_initialize(&mut params, described);
        cluster(params)
    }

    fn signer() -> MockTokenSigner {
        let mut signer = MockTokenSigner::new();
        signer
            .expect_token()
            .withf(|name| name == NAME)
            .returning(|_| Ok("k8s-aws-v1.signed".to_string()));
        signer
    }

    fn ready_reason(cluster: &Cluster) -> Option<ConditionReason> {
        cluster.condition(ConditionType::Ready).map(|c| c.reason)
    }

    #[tokio::test]
    async fn test_observe_not_found() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster()
            .withf(|name| name == NAME)
            .times(1)
            .returning(|_| Err(not_found()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = cluster(params());
        let before = managed.clone();

        let observation = client.observe(&mut managed).await.unwrap();
        assert_eq!(observation, ExternalObservation::not_found());
        assert_eq!(managed, before);
    }

    #[tokio::test]
    async fn test_create_then_observe_active() {
        let mut eks = MockEksClient::new();
        eks.expect_create_cluster()
            .withf(|input| {
                input.name == NAME
                    && input.role_arn == ROLE_ARN
                    && input.version.as_deref() == Some("1.16")
                    && input.resources_vpc_config.subnet_ids == Some(vec!["cool-subnet".to_string()])
            })
            .times(1)
            .returning(|_| Ok(()));
        eks.expect_describe_cluster()
            .withf(|name| name == NAME)
            .times(1)
            .returning(|_| Ok(active()));

        let client = ClusterClient::new(eks, signer());
        let mut managed = cluster(params());

        client.create(&mut managed).await.unwrap();
        assert_eq!(ready_reason(&managed), Some(ConditionReason::Creating));

        let observation = client.observe(&mut managed).await.unwrap();
        assert!(observation.exists);
        assert!(observation.up_to_date);
        assert_eq!(ready_reason(&managed), Some(ConditionReason::Available));
        assert_eq!(managed.observed_status(), Some(ClusterStatusType::Active));

        let details = observation.connection_details;
        assert_eq!(details[CONNECTION_ENDPOINT], b"https://ep".to_vec());
        assert_eq!(details[CONNECTION_CLUSTER_CA], b"ca".to_vec());
        let kubeconfig = String::from_utf8(details[CONNECTION_KUBECONFIG].clone()).unwrap();
        assert!(kubeconfig.contains("token: k8s-aws-v1."));
    }

    #[tokio::test]
    async fn test_create_is_idempotent_while_creating() {
        let client = ClusterClient::new(MockEksClient::new(), MockTokenSigner::new());
        let mut managed = cluster(params());
        managed.status = Some(ClusterStatus {
            at_provider: Some(ClusterObservation {
                status: Some(ClusterStatusType::Creating),
                ..Default::default()
            }),
            ..Default::default()
        });

        client.create(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_requires_role_arn() {
        let client = ClusterClient::new(MockEksClient::new(), MockTokenSigner::new());
        let mut managed = cluster(ClusterParameters {
            role_arn: None,
            ..params()
        });

        let err = client.create(&mut managed).await.unwrap_err();
        assert!(matches!(err, ExternalError::MissingField { .. }));
    }

    #[tokio::test]
    async fn test_no_connection_details_without_endpoint() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster().returning(|_| {
            Ok(ClusterDescription {
                status: Some("CREATING".to_string()),
                endpoint: None,
                ..active()
            })
        });

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = cluster(params());
        let observation = client.observe(&mut managed).await.unwrap();
        assert!(observation.connection_details.is_empty());
        assert_eq!(ready_reason(&managed), Some(ConditionReason::Creating));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let test_cases = vec![
            ("ACTIVE", ConditionReason::Available),
            ("CREATING", ConditionReason::Creating),
            ("DELETING", ConditionReason::Deleting),
            ("UPDATING", ConditionReason::Unavailable),
            ("FAILED", ConditionReason::Unavailable),
        ];

        for (status, expected) in test_cases {
            let mut eks = MockEksClient::new();
            eks.expect_describe_cluster().returning(move |_| {
                Ok(ClusterDescription {
                    status: Some(status.to_string()),
                    certificate_authority_data: None,
                    ..active()
                })
            });
            let client = ClusterClient::new(eks, MockTokenSigner::new());
            let mut managed = cluster(params());
            client.observe(&mut managed).await.unwrap();
            assert_eq!(ready_reason(&managed), Some(expected), "{}", status);
        }
    }

    #[test]
    fn test_late_initialize_is_idempotent() {
        let described = ClusterDescription {
            logging: Some(Logging {
                cluster_logging: vec![LogSetup {
                    enabled: Some(true),
                    types: vec![LogType::Api, LogType::Audit],
                }],
            }),
            authentication_mode: Some("API_AND_CONFIG_MAP".to_string()),
            tags: btreemap! {"team".to_string() => "blue".to_string()},
            ..active()
        };

        let mut params = ClusterParameters {
            region: "us-west-2".to_string(),
            ..Default::default()
        };
        assert!(late_initialize(&mut params, &described));
        let once = params.clone();
        assert!(!late_initialize(&mut params, &described));
        assert_eq!(params, once);

        assert_eq!(params.version.as_deref(), Some("1.16"));
        assert_eq!(params.role_arn.as_deref(), Some(ROLE_ARN));
        assert_eq!(params.resources_vpc_config.endpoint_public_access, Some(true));
        assert_eq!(
            params.access_config.and_then(|a| a.authentication_mode).as_deref(),
            Some("API_AND_CONFIG_MAP")
        );

        // A spec late-initialized from a response is up to date with that response.
        assert!(is_up_to_date(&once, &described));
    }

    #[test]
    fn test_is_up_to_date() {
        let described = active();
        let base = observed_cluster(&described).spec.for_provider;

        let test_cases = vec![
            (base.clone(), true),
            (
                ClusterParameters {
                    version: Some("1.17".to_string()),
                    ..base.clone()
                },
                false,
            ),
            (
                ClusterParameters {
                    resources_vpc_config: VpcConfigRequest {
                        public_access_cidrs: vec!["0.0.0.10/0".to_string()],
                        ..base.resources_vpc_config.clone()
                    },
                    ..base.clone()
                },
                true,
            ),
            (
                ClusterParameters {
                    resources_vpc_config: VpcConfigRequest {
                        public_access_cidrs: vec!["10.0.0.0/8".to_string()],
                        ..base.resources_vpc_config.clone()
                    },
                    ..base.clone()
                },
                false,
            ),
            (
                ClusterParameters {
                    tags: Some(btreemap! {"team".to_string() => "blue".to_string()}),
                    ..base.clone()
                },
                false,
            ),
            (
                ClusterParameters {
                    role_arn: Some("arn:aws:iam::123456789012:role/other".to_string()),
                    ..base.clone()
                },
                true,
            ),
        ];

        for (desired, expected) in test_cases {
            assert_eq!(is_up_to_date(&desired, &described), expected, "{:?}", desired);
        }
    }

    #[tokio::test]
    async fn test_update_upgrades_version_only() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster()
            .times(1)
            .returning(|_| Ok(active()));
        eks.expect_update_cluster_version()
            .withf(|name, version| name == NAME && version == "1.17")
            .times(1)
            .returning(|_, _| Ok(()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&active());
        managed.spec.for_provider.version = Some("1.17".to_string());

        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_skipped_while_busy() {
        for status in ["UPDATING", "CREATING"] {
            let mut eks = MockEksClient::new();
            eks.expect_describe_cluster().times(1).returning(move |_| {
                Ok(ClusterDescription {
                    status: Some(status.to_string()),
                    ..active()
                })
            });

            let client = ClusterClient::new(eks, MockTokenSigner::new());
            let mut managed = observed_cluster(&active());
            managed.spec.for_provider.version = Some("1.17".to_string());
            managed.spec.for_provider.tags = Some(btreemap! {"a".to_string() => "1".to_string()});

            client.update(&mut managed).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_update_tags_before_primary_mutation() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster().returning(|_| {
            Ok(ClusterDescription {
                tags: btreemap! {"stale".to_string() => "x".to_string()},
                ..active()
            })
        });
        eks.expect_untag_resource()
            .withf(|arn, keys| arn == CLUSTER_ARN && keys == &vec!["stale".to_string()])
            .times(1)
            .returning(|_, _| Err(in_use()));
        eks.expect_tag_resource()
            .withf(|arn, tags| {
                arn == CLUSTER_ARN && tags == &btreemap! {"team".to_string() => "blue".to_string()}
            })
            .times(1)
            .returning(|_, _| Ok(()));
        eks.expect_update_cluster_version()
            .times(1)
            .returning(|_, _| Ok(()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&active());
        managed.spec.for_provider.version = Some("1.17".to_string());
        managed.spec.for_provider.tags = Some(btreemap! {"team".to_string() => "blue".to_string()});

        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_associates_encryption_first() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster().returning(|_| Ok(active()));
        eks.expect_associate_encryption_config()
            .withf(|name, entries| {
                name == NAME
                    && entries
                        == &vec![EncryptionConfigEntry {
                            key_arn: Some(KEY_ARN.to_string()),
                            resources: vec!["secrets".to_string()],
                        }]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&active());
        managed.spec.for_provider.version = Some("1.17".to_string());
        managed.spec.for_provider.encryption_config = vec![EncryptionConfig {
            provider: EncryptionProvider {
                key_arn: Some(KEY_ARN.to_string()),
                ..Default::default()
            },
            resources: vec!["secrets".to_string()],
        }];

        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_rejects_changed_encryption() {
        let encrypted = ClusterDescription {
            encryption_config: vec![EncryptionConfigEntry {
                key_arn: Some(KEY_ARN.to_string()),
                resources: vec!["secrets".to_string()],
            }],
            ..active()
        };
        let mut eks = MockEksClient::new();
        let described = encrypted.clone();
        eks.expect_describe_cluster()
            .returning(move |_| Ok(described.clone()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&encrypted);
        managed.spec.for_provider.encryption_config[0].provider.key_arn =
            Some("arn:aws:kms:us-west-2:123456789012:key/other-key".to_string());

        let err = client.update(&mut managed).await.unwrap_err();
        assert!(matches!(err, ExternalError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_logging() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster().returning(|_| Ok(active()));
        eks.expect_update_cluster_config()
            .withf(|input| {
                input.name == NAME
                    && input.resources_vpc_config.is_none()
                    && input
                        .logging
                        .as_ref()
                        .map(|l| l.cluster_logging[0].types == vec![LogType::Audit])
                        == Some(true)
            })
            .times(1)
            .returning(|_| Ok(()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&active());
        managed.spec.for_provider.logging = Some(Logging {
            cluster_logging: vec![LogSetup {
                enabled: Some(true),
                types: vec![LogType::Audit],
            }],
        });

        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_vpc_endpoint_access() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster().returning(|_| Ok(active()));
        eks.expect_update_cluster_config()
            .withf(|input| {
                input.logging.is_none()
                    && input.resources_vpc_config
                        == Some(VpcConfigInput {
                            subnet_ids: None,
                            security_group_ids: None,
                            endpoint_public_access: Some(true),
                            endpoint_private_access: Some(true),
                            public_access_cidrs: Some(vec!["0.0.0.0/0".to_string()]),
                        })
            })
            .times(1)
            .returning(|_| Ok(()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&active());
        managed
            .spec
            .for_provider
            .resources_vpc_config
            .endpoint_private_access = Some(true);

        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_swallows_conflicts() {
        let mut eks = MockEksClient::new();
        eks.expect_describe_cluster().returning(|_| Ok(active()));
        eks.expect_update_cluster_version()
            .times(1)
            .returning(|_, _| Err(in_use()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = observed_cluster(&active());
        managed.spec.for_provider.version = Some("1.17".to_string());

        client.update(&mut managed).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete() {
        let mut eks = MockEksClient::new();
        eks.expect_delete_cluster()
            .withf(|name| name == NAME)
            .times(1)
            .returning(|_| Err(not_found()));

        let client = ClusterClient::new(eks, MockTokenSigner::new());
        let mut managed = cluster(params());
        client.delete(&mut managed).await.unwrap();
        assert_eq!(ready_reason(&managed), Some(ConditionReason::Deleting));
    }

    #[tokio::test]
    async fn test_delete_noop_while_deleting() {
        let client = ClusterClient::new(MockEksClient::new(), MockTokenSigner::new());
        let mut managed = cluster(params());
        managed.status = Some(ClusterStatus {
            at_provider: Some(ClusterObservation {
                status: Some(ClusterStatusType::Deleting),
                ..Default::default()
            }),
            ..Default::default()
        });

        client.delete(&mut managed).await.unwrap();
    }
}
