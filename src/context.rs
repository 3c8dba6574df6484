use std::{ffi::OsString, path::PathBuf};

use kube::config::{Kubeconfig, KubeconfigError};
use tracing::debug;

const SERVICE_ACCOUNT_NAMESPACE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigLoadError {
    #[error("failed to load kubeconfig")]
    Kubeconfig(#[from] KubeconfigError),

    #[error("no kubeconfig found in KUBECONFIG or ~/.kube/config, and not running in a cluster")]
    NoKubeconfig,

    #[error("context {0:?} not found in kubeconfig")]
    ContextNotFound(String),

    #[error("failed to read in-cluster namespace")]
    InCluster(#[source] std::io::Error),
}

/// Looks up the namespace of the user's active cluster context.
pub(crate) trait ContextNamespace {
    /// Returns the active namespace, or an empty string if the active context
    /// doesn't set one.
    fn active_namespace(&self) -> Result<String, ConfigLoadError>;
}

/// The parts of the process environment that kubeconfig discovery reads.
#[derive(Debug, Clone, Default)]
pub(crate) struct KubeEnv {
    /// The raw value of `KUBECONFIG`.
    pub kubeconfig: Option<OsString>,
    pub home: Option<PathBuf>,
    /// `KUBERNETES_SERVICE_HOST` and `KUBERNETES_SERVICE_PORT` are both set.
    pub in_cluster: bool,
    pub pod_namespace: Option<String>,
    pub namespace_file: PathBuf,
}

impl KubeEnv {
    pub(crate) fn from_process() -> Self {
        Self {
            kubeconfig: std::env::var_os("KUBECONFIG"),
            home: dirs::home_dir(),
            in_cluster: std::env::var_os("KUBERNETES_SERVICE_HOST").is_some()
                && std::env::var_os("KUBERNETES_SERVICE_PORT").is_some(),
            pod_namespace: std::env::var("POD_NAMESPACE").ok(),
            namespace_file: PathBuf::from(SERVICE_ACCOUNT_NAMESPACE),
        }
    }

    /// Kubeconfig files to read, in merge order. Every existing path in
    /// `KUBECONFIG` if it's set and names at least one, otherwise
    /// `~/.kube/config` if it exists.
    fn kubeconfig_paths(&self) -> Vec<PathBuf> {
        let from_env: Vec<_> = self
            .kubeconfig
            .iter()
            .flat_map(std::env::split_paths)
            .filter(|path| !path.as_os_str().is_empty())
            .filter(|path| {
                let exists = path.exists();
                if !exists {
                    debug!(path = %path.display(), "skipping missing KUBECONFIG entry");
                }
                exists
            })
            .collect();

        if !from_env.is_empty() {
            return from_env;
        }

        self.home
            .iter()
            .map(|home| home.join(".kube").join("config"))
            .filter(|path| path.exists())
            .collect()
    }
}

/// A [ContextNamespace] backed by the local kubeconfig.
///
/// With an explicit path only that file is read. Otherwise the usual
/// discovery rules apply: every file in `KUBECONFIG`, then `~/.kube/config`,
/// and finally the pod's service account when running in a cluster.
#[derive(Debug, Clone)]
pub(crate) struct KubeconfigContext {
    explicit_path: Option<PathBuf>,
    env: KubeEnv,
}

impl KubeconfigContext {
    pub(crate) fn new(explicit_path: Option<PathBuf>) -> Self {
        Self::with_env(explicit_path, KubeEnv::from_process())
    }

    pub(crate) fn with_env(explicit_path: Option<PathBuf>, env: KubeEnv) -> Self {
        Self { explicit_path, env }
    }

    fn load(&self) -> Result<Option<Kubeconfig>, ConfigLoadError> {
        if let Some(path) = &self.explicit_path {
            debug!(path = %path.display(), "reading explicit kubeconfig");
            return Ok(Some(Kubeconfig::read_from(path)?));
        }

        let mut merged: Option<Kubeconfig> = None;
        for path in self.env.kubeconfig_paths() {
            debug!(path = %path.display(), "reading kubeconfig");
            let next = Kubeconfig::read_from(&path)?;
            merged = Some(match merged {
                Some(kubeconfig) => kubeconfig.merge(next)?,
                None => next,
            });
        }

        match merged {
            Some(kubeconfig) => Ok(Some(kubeconfig)),
            None if self.env.in_cluster => {
                debug!("no kubeconfig found, using in-cluster namespace");
                Ok(None)
            }
            None => Err(ConfigLoadError::NoKubeconfig),
        }
    }
}

impl ContextNamespace for KubeconfigContext {
    fn active_namespace(&self) -> Result<String, ConfigLoadError> {
        match self.load()? {
            Some(kubeconfig) => namespace_in_current_context(&kubeconfig),
            None => in_cluster_namespace(&self.env),
        }
    }
}

fn namespace_in_current_context(kubeconfig: &Kubeconfig) -> Result<String, ConfigLoadError> {
    let Some(current) = kubeconfig.current_context.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(String::new());
    };

    let named = kubeconfig
        .contexts
        .iter()
        .find(|c| c.name == current)
        .ok_or_else(|| ConfigLoadError::ContextNotFound(current.to_string()))?;

    let namespace = named
        .context
        .as_ref()
        .and_then(|ctx| ctx.namespace.clone())
        .unwrap_or_default();

    debug!(context = current, namespace = %namespace, "resolved namespace from current context");
    Ok(namespace)
}

fn in_cluster_namespace(env: &KubeEnv) -> Result<String, ConfigLoadError> {
    if let Some(namespace) = env.pod_namespace.as_ref().filter(|ns| !ns.is_empty()) {
        return Ok(namespace.clone());
    }

    match std::fs::read_to_string(&env.namespace_file) {
        Ok(namespace) => Ok(namespace.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ConfigLoadError::InCluster(e)),
    }
}
