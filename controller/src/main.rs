use controller::{error_policy, reconcile, AwsConnector, Context, ControllerOptions};
use controller::managed::ExternalConnector;
use controller::references::ResolveReferences;
use models::eks::{Addon, Cluster, FargateProfile, IdentityProviderConfig, NodeGroup};
use models::managed::{K8SManagedResourceClient, Managed};
use models::telemetry;

use futures::StreamExt;
use kube::{
    api::Api,
    runtime::{watcher::Config as WatcherConfig, Controller},
    Client,
};
use snafu::ResultExt;
use std::convert::TryFrom;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{event, Level};

/// The module-wide result type.
type Result<T> = std::result::Result<T, controller_error::Error>;

type ProviderConnector = AwsConnector<K8SManagedResourceClient>;

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| controller_error::Error::CryptoProvider)?;
    telemetry::init_telemetry_from_env().context(controller_error::TelemetryInitSnafu)?;

    let options = ControllerOptions::try_from_env().context(controller_error::OptionsSnafu)?;
    let config = kube::Config::infer()
        .await
        .context(controller_error::ConfigCreateSnafu)?;
    let k8s_client = Client::try_from(config).context(controller_error::ClientCreateSnafu)?;
    let store = K8SManagedResourceClient::new(k8s_client.clone());

    event!(
        Level::INFO,
        poll_interval = ?options.poll_interval,
        short_wait = ?options.short_wait,
        "Starting EKS controllers"
    );

    futures::join!(
        run_controller::<Cluster>(k8s_client.clone(), store.clone(), options),
        run_controller::<NodeGroup>(k8s_client.clone(), store.clone(), options),
        run_controller::<FargateProfile>(k8s_client.clone(), store.clone(), options),
        run_controller::<IdentityProviderConfig>(k8s_client.clone(), store.clone(), options),
        run_controller::<Addon>(k8s_client, store, options),
    );

    event!(Level::INFO, "All controllers shut down");
    Ok(())
}

/// Watches every object of kind `K` and drives it through the managed reconciler until a
/// shutdown signal arrives.
async fn run_controller<K>(
    client: Client,
    store: K8SManagedResourceClient,
    options: ControllerOptions,
) where
    K: Managed + ResolveReferences,
    ProviderConnector: ExternalConnector<K>,
{
    let kind = K::kind(&()).to_string();
    event!(Level::INFO, %kind, "Registering controller");

    let api = Api::<K>::all(client);
    let ctx = Arc::new(Context::new(store.clone(), AwsConnector::new(store), options));
    Controller::new(api, WatcherConfig::default())
        .shutdown_on_signal()
        .run(
            reconcile::<K, K8SManagedResourceClient, ProviderConnector>,
            error_policy::<K, K8SManagedResourceClient, ProviderConnector>,
            ctx,
        )
        .for_each(log_reconcile_result(kind))
        .await;
}

fn log_reconcile_result<T: Debug, E: Debug>(
    kind: String,
) -> impl Fn(std::result::Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => event!(Level::DEBUG, %kind, ?action, "Reconciled"),
            Err(e) => event!(Level::WARN, %kind, error = ?e, "Reconcile failed"),
        }
        std::future::ready(())
    }
}

pub mod controller_error {
    use controller::options::OptionsError;
    use models::telemetry;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub))]
    pub enum Error {
        #[snafu(display("Unable to install the default rustls crypto provider"))]
        CryptoProvider,

        #[snafu(display("Unable to read controller options: '{}'", source))]
        Options { source: OptionsError },

        #[snafu(display("Unable to infer Kubernetes client configuration: '{}'", source))]
        ConfigCreate {
            source: kube::config::InferConfigError,
        },

        #[snafu(display("Unable to create Kubernetes client: '{}'", source))]
        ClientCreate { source: kube::Error },

        #[snafu(display("Error configuring telemetry: '{}'", source))]
        TelemetryInit {
            source: telemetry::TelemetryConfigError,
        },
    }
}
