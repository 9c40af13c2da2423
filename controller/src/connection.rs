//! Connection details published for an EKS cluster: its endpoint, CA bundle and a kubeconfig
//! that authenticates with a freshly signed bearer token.
use crate::aws::{TokenError, TokenSigner};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use models::constants::{CONNECTION_CLUSTER_CA, CONNECTION_ENDPOINT, CONNECTION_KUBECONFIG};
use models::managed::ConnectionDetails;
use serde::Serialize;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectionError {
    #[snafu(display("Unable to sign cluster token: '{}'", source))]
    Token { source: TokenError },

    #[snafu(display("Unable to decode cluster CA data: '{}'", source))]
    CaData { source: base64::DecodeError },

    #[snafu(display("Unable to serialize kubeconfig: '{}'", source))]
    Kubeconfig { source: serde_yaml::Error },
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct Kubeconfig {
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<NamedCluster>,
    contexts: Vec<NamedContext>,
    current_context: String,
    users: Vec<NamedUser>,
}

#[derive(Serialize)]
struct NamedCluster {
    name: String,
    cluster: KubeconfigCluster,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct KubeconfigCluster {
    server: String,
    certificate_authority_data: String,
}

#[derive(Serialize)]
struct NamedContext {
    name: String,
    context: KubeconfigContext,
}

#[derive(Serialize)]
struct KubeconfigContext {
    cluster: String,
    user: String,
}

#[derive(Serialize)]
struct NamedUser {
    name: String,
    user: KubeconfigUser,
}

#[derive(Serialize)]
struct KubeconfigUser {
    token: String,
}

/// Renders a kubeconfig whose single cluster, context and user are all named `name`.
fn kubeconfig(
    name: &str,
    endpoint: &str,
    ca: &[u8],
    token: String,
) -> Result<String, ConnectionError> {
    let config = Kubeconfig {
        api_version: "v1",
        kind: "Config",
        clusters: vec![NamedCluster {
            name: name.to_string(),
            cluster: KubeconfigCluster {
                server: endpoint.to_string(),
                certificate_authority_data: STANDARD.encode(ca),
            },
        }],
        contexts: vec![NamedContext {
            name: name.to_string(),
            context: KubeconfigContext {
                cluster: name.to_string(),
                user: name.to_string(),
            },
        }],
        current_context: name.to_string(),
        users: vec![NamedUser {
            name: name.to_string(),
            user: KubeconfigUser { token },
        }],
    };
    serde_yaml::to_string(&config).context(KubeconfigSnafu)
}

/// Builds the connection details of the cluster `name`. `ca_data` is the base64-encoded CA bundle
/// as EKS reports it.
pub async fn cluster_connection_details<T: TokenSigner + ?Sized>(
    signer: &T,
    name: &str,
    endpoint: &str,
    ca_data: &str,
) -> Result<ConnectionDetails, ConnectionError> {
    let ca = STANDARD.decode(ca_data).context(CaDataSnafu)?;
    let token = signer.token(name).await.context(TokenSnafu)?;
    let kubeconfig = kubeconfig(name, endpoint, &ca, token)?;

    Ok(ConnectionDetails::from([
        (CONNECTION_ENDPOINT.to_string(), endpoint.as_bytes().to_vec()),
        (CONNECTION_KUBECONFIG.to_string(), kubeconfig.into_bytes()),
        (CONNECTION_CLUSTER_CA.to_string(), ca),
    ]))
}
