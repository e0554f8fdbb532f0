//! Copy secrets between namespaces and attach image pull secrets.
//!
//! Secret manifests and command output never reach the logs.

use chartcheck_core::shell;
use serde_yaml::Value;
use tracing::info;

use crate::K8sError;
use crate::options::KubectlOptions;

/// Metadata fields the API server fills in; a copied manifest must not carry them.
const SERVER_METADATA: &[&str] = &[
    "namespace",
    "uid",
    "resourceVersion",
    "creationTimestamp",
    "selfLink",
    "managedFields",
    "ownerReferences",
];

const LAST_APPLIED: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Strip namespace and server-populated metadata from a secret manifest.
pub fn sanitize_secret_manifest(manifest: &str) -> Result<String, K8sError> {
    let mut doc: Value =
        serde_yaml::from_str(manifest).map_err(|e| K8sError::Manifest(e.to_string()))?;

    let metadata = doc
        .get_mut("metadata")
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| K8sError::Manifest("manifest has no metadata".to_owned()))?;

    for key in SERVER_METADATA {
        metadata.remove(*key);
    }

    let annotations_empty = match metadata
        .get_mut("annotations")
        .and_then(Value::as_mapping_mut)
    {
        Some(annotations) => {
            annotations.remove(LAST_APPLIED);
            annotations.is_empty()
        }
        None => false,
    };
    if annotations_empty {
        metadata.remove("annotations");
    }

    serde_yaml::to_string(&doc).map_err(|e| K8sError::Manifest(e.to_string()))
}

/// Copy secret `name` from `from_namespace` into `to_namespace`.
pub async fn copy_secret(
    options: &KubectlOptions,
    name: &str,
    from_namespace: &str,
    to_namespace: &str,
) -> Result<(), K8sError> {
    let source = options.with_namespace(from_namespace);
    let get = source.command(["get", "secret", name, "-o", "yaml"]).quiet();
    let manifest = shell::run_command_and_get_stdout(&get).await?;
    let manifest = sanitize_secret_manifest(&manifest)?;

    let file = tempfile::Builder::new()
        .prefix("chartcheck-secret-")
        .suffix(".yaml")
        .tempfile()?;
    tokio::fs::write(file.path(), manifest).await?;

    let target = options.with_namespace(to_namespace);
    let path = file.path().to_string_lossy().into_owned();
    let apply = target.command(["apply", "-f", path.as_str()]).quiet();
    shell::run_command(&apply).await?;

    // temp file is removed when `file` drops
    drop(file);
    info!(secret = name, from = from_namespace, to = to_namespace, "copied secret");
    Ok(())
}

/// `{"imagePullSecrets":[{"name":SECRET}]}`
pub fn pull_secret_patch(secret: &str) -> String {
    serde_json::json!({ "imagePullSecrets": [{ "name": secret }] }).to_string()
}

/// Patch the `default` service account of `namespace` to pull with `secret`.
pub async fn attach_pull_secret(
    options: &KubectlOptions,
    namespace: &str,
    secret: &str,
) -> Result<(), K8sError> {
    let patch = pull_secret_patch(secret);
    let cmd = options.with_namespace(namespace).command([
        "patch",
        "serviceaccount",
        "default",
        "-p",
        patch.as_str(),
    ]);
    shell::run_command(&cmd).await?;
    info!(namespace, secret, "attached image pull secret to default service account");
    Ok(())
}
