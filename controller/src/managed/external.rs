use crate::aws::{ConnectError, EksError};
use crate::connection::ConnectionError;

use async_trait::async_trait;
use models::managed::ConnectionDetails;
use models::providerconfig::ProviderConfig;
use snafu::Snafu;

/// What an observation of the external object found.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExternalObservation {
    pub exists: bool,
    /// No drift remains between the desired and the observed state.
    pub up_to_date: bool,
    pub connection_details: ConnectionDetails,
    /// The spec was filled in from the observation and should be persisted.
    pub late_initialized: bool,
}

impl ExternalObservation {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExternalError {
    #[snafu(display("{}", source))]
    Aws { source: EksError },

    #[snafu(display("Unable to build connection details: '{}'", source))]
    ConnectionDetails { source: ConnectionError },

    #[snafu(display("'{}' is required", field))]
    MissingField { field: String },

    #[snafu(display("{}", message))]
    Validation { message: String },
}

impl From<EksError> for ExternalError {
    fn from(source: EksError) -> Self {
        ExternalError::Aws { source }
    }
}

pub type Result<T> = std::result::Result<T, ExternalError>;

/// Drives one external object toward the desired state of the managed resource `K`.
#[async_trait]
pub trait ExternalClient<K>: Send + Sync {
    /// Describes the external object and records what was found on `managed`.
    async fn observe(&self, managed: &mut K) -> Result<ExternalObservation>;
    async fn create(&self, managed: &mut K) -> Result<()>;
    async fn update(&self, managed: &mut K) -> Result<()>;
    async fn delete(&self, managed: &mut K) -> Result<()>;
}

/// Builds an `ExternalClient` for a managed resource from the ProviderConfig it names.
#[async_trait]
pub trait ExternalConnector<K>: Send + Sync {
    async fn connect(
        &self,
        managed: &K,
        provider_config: &ProviderConfig,
    ) -> std::result::Result<Box<dyn ExternalClient<K>>, ConnectError>;
}
