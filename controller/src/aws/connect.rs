//! Builds the AWS SDK configuration a managed resource's reconciler talks through.
#[allow(deprecated)]
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::{error::CredentialsError, ProvideCredentials};
use aws_credential_types::Credentials;
use models::managed::{ManagedResourceClient, ManagedResourceError};
use models::providerconfig::{CredentialsSource, ProviderConfig};
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use tracing::{event, instrument, Level};

/// The shared-credentials profile read from a credentials secret.
const PROFILE: &str = "default";
const ASSUME_ROLE_SESSION_NAME: &str = "provider-aws-eks";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("ProviderConfig '{}' uses a Secret source but names no secretRef", name))]
    MissingSecretRef { name: String },

    #[snafu(display("Unable to read AWS credentials: '{}'", source))]
    ReadCredentials { source: ManagedResourceError },

    #[snafu(display("AWS credentials secret is not valid UTF-8"))]
    CredentialsEncoding { source: std::str::Utf8Error },

    #[snafu(display("Unable to load AWS credentials profile [{}]: '{}'", profile, source))]
    LoadCredentials {
        profile: String,
        source: CredentialsError,
    },

    #[snafu(display("Managed resource names no AWS region"))]
    MissingRegion,

    #[snafu(display("Unable to build cluster token signer: '{}'", source))]
    Signer { source: super::TokenError },
}

/// Loads the `[default]` profile of a shared-credentials document through the SDK's profile provider.
#[allow(deprecated)]
pub(crate) async fn load_credentials(document: &str) -> Result<Credentials, ConnectError> {
    let files = ProfileFiles::builder()
        .with_contents(ProfileFileKind::Credentials, document)
        .build();
    ProfileFileCredentialsProvider::builder()
        .profile_files(files)
        .profile_name(PROFILE)
        .build()
        .provide_credentials()
        .await
        .context(LoadCredentialsSnafu { profile: PROFILE })
}

/// Loads the SDK configuration for `region` using the credentials `provider_config` points at,
/// assuming its role when one is configured.
#[instrument(skip(store, provider_config), fields(provider_config = %provider_config.metadata.name.as_deref().unwrap_or_default()), err)]
pub async fn sdk_config<S: ManagedResourceClient>(
    store: &S,
    provider_config: &ProviderConfig,
    region: &str,
) -> Result<SdkConfig, ConnectError> {
    ensure!(!region.is_empty(), MissingRegionSnafu);
    let region = Region::new(region.to_string());
    let loader = aws_config::defaults(BehaviorVersion::latest()).region(region.clone());

    let config = match provider_config.spec.credentials.source {
        CredentialsSource::Secret => {
            let selector = provider_config
                .spec
                .credentials
                .secret_ref
                .as_ref()
                .context(MissingSecretRefSnafu {
                    name: provider_config.metadata.name.clone().unwrap_or_default(),
                })?;
            let document = store
                .get_secret_value(selector)
                .await
                .context(ReadCredentialsSnafu)?;
            let document = std::str::from_utf8(&document).context(CredentialsEncodingSnafu)?;
            loader
                .credentials_provider(load_credentials(document).await?)
                .load()
                .await
        }
        CredentialsSource::InjectedIdentity => loader.load().await,
    };

    match &provider_config.spec.assume_role_arn {
        Some(role_arn) => {
            event!(Level::DEBUG, role_arn = %role_arn, "Assuming role");
            let provider = AssumeRoleProvider::builder(role_arn)
                .session_name(ASSUME_ROLE_SESSION_NAME)
                .region(region.clone())
                .configure(&config)
                .build()
                .await;
            Ok(aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(provider)
                .load()
                .await)
        }
        None => Ok(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_credentials() {
        let document = "\
# written by the installer
[other]
aws_access_key_id = OTHER
aws_secret_access_key = other-secret

[default]
aws_access_key_id = AKIDEXAMPLE
aws_secret_access_key=wJalrXUtnFEMI/K7MDENG
aws_session_token = token
";
        let credentials = load_credentials(document).await.unwrap();
        assert_eq!(credentials.access_key_id(), "AKIDEXAMPLE");
        assert_eq!(credentials.secret_access_key(), "wJalrXUtnFEMI/K7MDENG");
        assert_eq!(credentials.session_token(), Some("token"));
    }

    #[tokio::test]
    async fn test_load_credentials_errors() {
        let test_cases = vec![
            "",
            "[other]\naws_access_key_id = A\naws_secret_access_key = S\n",
            "[default]\naws_secret_access_key = S\n",
            "[default]\naws_access_key_id = A\n",
        ];

        for document in test_cases {
            let err = load_credentials(document).await.unwrap_err();
            assert!(
                matches!(err, ConnectError::LoadCredentials { .. }),
                "{:?}: {}",
                document,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_session_token_is_optional() {
        let credentials = load_credentials("[default]\naws_access_key_id=A\naws_secret_access_key=S")
            .await
            .unwrap();
        assert_eq!(credentials.session_token(), None);
    }

    #[tokio::test]
    async fn test_load_credentials_ignores_comments_after_values() {
        // The SDK parser only treats `#` as a comment when preceded by whitespace.
        let credentials = load_credentials(
            "[default]\naws_access_key_id = AKID ; rotated\naws_secret_access_key = s#cret\n",
        )
        .await
        .unwrap();
        assert_eq!(credentials.access_key_id(), "AKID");
        assert_eq!(credentials.secret_access_key(), "s#cret");
    }
}
