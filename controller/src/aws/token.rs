//! Bearer tokens for the Kubernetes API of an EKS cluster.
//!
//! A token is a presigned STS `GetCallerIdentity` URL, bound to the cluster through the signed
//! `x-k8s-aws-id` header, which the cluster's authenticator replays against STS.
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::provider::{
    error::CredentialsError, ProvideCredentials, SharedCredentialsProvider,
};
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SignatureLocation, SigningError, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use snafu::{OptionExt, ResultExt, Snafu};
use std::time::{Duration, SystemTime};

#[cfg(test)]
use mockall::{mock, predicate::*};

pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";
const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";
const STS_SERVICE: &str = "sts";
const PRESIGN_EXPIRY: Duration = Duration::from_secs(60);

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TokenError {
    #[snafu(display("No AWS credentials are configured"))]
    NoCredentials,

    #[snafu(display("No AWS region is configured"))]
    NoRegion,

    #[snafu(display("Unable to load AWS credentials: '{}'", source))]
    LoadCredentials { source: CredentialsError },

    #[snafu(display("Unable to build signing parameters: '{}'", source))]
    SigningParams { source: v4::signing_params::BuildError },

    #[snafu(display("Unable to presign STS request: '{}'", source))]
    Presign { source: SigningError },

    #[snafu(display("Unable to build STS request: '{}'", source))]
    Request { source: http::Error },
}

#[async_trait]
/// Produces bearer tokens for a cluster. This is provided as a trait in order to allow mocks to be
/// used for testing purposes.
pub trait TokenSigner: Send + Sync {
    async fn token(&self, cluster_name: &str) -> Result<String, TokenError>;
}

#[cfg(test)]
mock! {
    /// A Mock TokenSigner for use in tests.
    pub TokenSigner {}
    #[async_trait]
    impl TokenSigner for TokenSigner {
        async fn token(&self, cluster_name: &str) -> Result<String, TokenError>;
    }
}

/// Presigns STS requests with the credentials of an SDK configuration.
#[derive(Clone, Debug)]
pub struct StsTokenSigner {
    credentials: SharedCredentialsProvider,
    region: String,
}

impl StsTokenSigner {
    pub fn new(config: &SdkConfig) -> Result<Self, TokenError> {
        Ok(StsTokenSigner {
            credentials: config.credentials_provider().context(NoCredentialsSnafu)?,
            region: config.region().context(NoRegionSnafu)?.to_string(),
        })
    }
}

fn sts_url(region: &str) -> String {
    format!(
        "https://sts.{}.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15",
        region
    )
}

/// Wraps a presigned URL into a token.
fn encode_token(presigned_url: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(presigned_url))
}

#[async_trait]
impl TokenSigner for StsTokenSigner {
    async fn token(&self, cluster_name: &str) -> Result<String, TokenError> {
        let identity: Identity = self
            .credentials
            .provide_credentials()
            .await
            .context(LoadCredentialsSnafu)?
            .into();

        let mut settings = SigningSettings::default();
        settings.signature_location = SignatureLocation::QueryParams;
        settings.expires_in = Some(PRESIGN_EXPIRY);

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(STS_SERVICE)
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .context(SigningParamsSnafu)?
            .into();

        let url = sts_url(&self.region);
        let signable = SignableRequest::new(
            "GET",
            &url,
            [(CLUSTER_ID_HEADER, cluster_name)].into_iter(),
            SignableBody::Bytes(&[]),
        )
        .context(PresignSnafu)?;
        let (instructions, _signature) = sign(signable, &params).context(PresignSnafu)?.into_parts();

        let mut request = http::Request::builder()
            .uri(&url)
            .header(CLUSTER_ID_HEADER, cluster_name)
            .body(())
            .context(RequestSnafu)?;
        instructions.apply_to_request_http1x(&mut request);

        Ok(encode_token(&request.uri().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region};
    use aws_credential_types::Credentials;

    fn signer() -> StsTokenSigner {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-west-2"))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                "AKIDEXAMPLE",
                "secret",
                None,
                None,
                "test",
            )))
            .build();
        StsTokenSigner::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_token_is_a_presigned_sts_url() {
        let token = signer().token("prod").await.unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));

        let url = String::from_utf8(
            URL_SAFE_NO_PAD
                .decode(token.trim_start_matches(TOKEN_PREFIX))
                .unwrap(),
        )
        .unwrap();
        assert!(url.starts_with(&sts_url("us-west-2")));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("x-k8s-aws-id"));
    }

    #[test]
    fn test_signer_requires_credentials() {
        let config = SdkConfig::builder()
            .region(Region::new("us-west-2"))
            .build();
        assert!(matches!(
            StsTokenSigner::new(&config),
            Err(TokenError::NoCredentials)
        ));
    }
}
