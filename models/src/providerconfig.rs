//! The provider-wide credentials source consumed when connecting to AWS.
use crate::managed::SecretKeySelector;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where AWS credentials come from.
#[derive(Copy, Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
pub enum CredentialsSource {
    /// An AWS shared-credentials document stored in a secret.
    #[default]
    Secret,
    /// The ambient identity of the controller process (IRSA, instance profile, environment).
    InjectedIdentity,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    pub source: CredentialsSource,
    /// The secret key holding the credentials document. Required when `source` is `Secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
}

/// Configures how the controller authenticates to AWS on behalf of the managed resources that
/// reference it.
#[derive(Clone, CustomResource, Serialize, Deserialize, Debug, Default, Eq, PartialEq, JsonSchema)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "aws.crossplane.io",
    kind = "ProviderConfig",
    plural = "providerconfigs",
    singular = "providerconfig",
    version = "v1beta1"
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    pub credentials: ProviderCredentials,
    /// A role assumed on top of the base credentials.
    #[serde(
        default,
        rename = "assumeRoleARN",
        skip_serializing_if = "Option::is_none"
    )]
    pub assume_role_arn: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_provider_config_spec() {
        let spec: ProviderConfigSpec = serde_json::from_value(serde_json::json!({
            "credentials": {
                "source": "Secret",
                "secretRef": {"namespace": "crossplane-system", "name": "aws-creds", "key": "creds"},
            },
            "assumeRoleARN": "arn:aws:iam::123456789012:role/provider",
        }))
        .unwrap();

        assert_eq!(spec.credentials.source, CredentialsSource::Secret);
        assert_eq!(
            spec.credentials.secret_ref,
            Some(SecretKeySelector {
                namespace: "crossplane-system".to_string(),
                name: "aws-creds".to_string(),
                key: "creds".to_string(),
            })
        );
        assert_eq!(
            spec.assume_role_arn.as_deref(),
            Some("arn:aws:iam::123456789012:role/provider")
        );
    }
}
