/// Helper macro to avoid retyping the API group of the EKS kinds when creating further string
/// constants from it. When given no parameters, this returns the group name. When given a string
/// literal parameter it adds `/parameter` to the end.
#[macro_export]
macro_rules! eks_group {
    () => {
        "eks.aws.crossplane.io"
    };
    ($s:literal) => {
        concat!(eks_group!(), "/", $s)
    };
}

/// Same as `eks_group!`, for the group that hosts the provider-wide kinds.
#[macro_export]
macro_rules! aws_group {
    () => {
        "aws.crossplane.io"
    };
    ($s:literal) => {
        concat!(aws_group!(), "/", $s)
    };
}

pub const EKS_GROUP: &str = eks_group!();
pub const EKS_API_VERSION: &str = eks_group!("v1beta1");
pub const AWS_GROUP: &str = aws_group!();
pub const AWS_API_VERSION: &str = aws_group!("v1beta1");

/// Annotation holding the AWS-side identifier of a managed resource.
pub const ANNOTATION_EXTERNAL_NAME: &str = "crossplane.io/external-name";

/// Finalizer guarding deletion of the external object.
pub const FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Field manager used for server-side applies.
pub const FIELD_MANAGER: &str = "provider-aws-eks";

/// The ProviderConfig used when a managed resource does not name one.
pub const DEFAULT_PROVIDER_CONFIG: &str = "default";

// Tags merged into every external object so its origin in the control plane can be traced.
pub const TAG_KIND: &str = "crossplane-kind";
pub const TAG_NAME: &str = "crossplane-name";
pub const TAG_PROVIDER_CONFIG: &str = "crossplane-providerconfig";

// Connection secret keys published for clusters.
pub const CONNECTION_ENDPOINT: &str = "endpoint";
pub const CONNECTION_KUBECONFIG: &str = "kubeconfig";
pub const CONNECTION_CLUSTER_CA: &str = "clusterCA";
