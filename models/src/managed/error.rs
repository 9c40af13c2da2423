use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to get {} '{}': '{}'", kind, name, source))]
    GetObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to list {} objects: '{}'", kind, source))]
    ListObjects { kind: String, source: kube::Error },

    #[snafu(display("Unable to update {} '{}': '{}'", kind, name, source))]
    UpdateObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to update status of {} '{}': '{}'", kind, name, source))]
    UpdateStatus {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("Unable to create patch to send to Kubernetes API: '{}'", source))]
    CreateK8SPatch { source: serde_json::error::Error },

    #[snafu(display("Secret '{}/{}' has no key '{}'", namespace, name, key))]
    MissingSecretKey {
        namespace: String,
        name: String,
        key: String,
    },

    #[snafu(display(
        "Unable to publish connection secret '{}/{}': '{}'",
        namespace,
        name,
        source
    ))]
    PublishConnectionSecret {
        namespace: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display(
        "Unable to delete connection secret '{}/{}': '{}'",
        namespace,
        name,
        source
    ))]
    DeleteConnectionSecret {
        namespace: String,
        name: String,
        source: kube::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
