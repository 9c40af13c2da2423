use crate::aws::ConnectError;
use crate::managed::ExternalError;
use crate::references::ResolveError;

use models::managed::ManagedResourceError;
use snafu::Snafu;

/// The result type of a reconcile pass.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Why a reconcile pass failed. The display text is recorded as the `Synced` condition message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReconcileError {
    #[snafu(display("Cannot update managed resource: '{}'", source))]
    UpdateManaged { source: ManagedResourceError },

    #[snafu(display("Cannot update managed resource status: '{}'", source))]
    UpdateManagedStatus { source: ManagedResourceError },

    #[snafu(display("Cannot resolve references: '{}'", source))]
    ResolveReferences { source: ResolveError },

    #[snafu(display("Cannot get ProviderConfig '{}': '{}'", name, source))]
    GetProviderConfig {
        name: String,
        source: ManagedResourceError,
    },

    #[snafu(display("Cannot connect to AWS: '{}'", source))]
    Connect { source: ConnectError },

    #[snafu(display("Cannot observe external resource: '{}'", source))]
    Observe { source: ExternalError },

    #[snafu(display("Cannot create external resource: '{}'", source))]
    Create { source: ExternalError },

    #[snafu(display("Cannot update external resource: '{}'", source))]
    Update { source: ExternalError },

    #[snafu(display("Cannot delete external resource: '{}'", source))]
    Delete { source: ExternalError },

    #[snafu(display("Cannot publish connection details: '{}'", source))]
    PublishConnectionDetails { source: ManagedResourceError },

    #[snafu(display("Cannot unpublish connection details: '{}'", source))]
    UnpublishConnectionDetails { source: ManagedResourceError },

    #[snafu(display(
        "External resource does not exist and the management policies do not permit creating it"
    ))]
    CreateNotPermitted,
}
