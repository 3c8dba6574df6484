use std::{fmt::Debug, path::Path};

use k8s_openapi::{api::networking::v1::Ingress, serde::de::DeserializeOwned};
use kube::{
    api::ListParams,
    config::{KubeConfigOptions, Kubeconfig},
    Resource, ResourceExt as _,
};
use tracing::debug;

/// Page size for list requests.
const PAGE_SIZE: u32 = 500;

const LAST_APPLIED_CONFIG: &str = "kubectl.kubernetes.io/last-applied-configuration";

pub(crate) trait KubeResource:
    Clone + Debug + DeserializeOwned + Resource<DynamicType = ()> + Send + Sync + 'static
{
    fn static_kind() -> &'static str;

    /// Strip fields that are noise for conversion.
    fn modify(&mut self);
}

impl KubeResource for Ingress {
    fn static_kind() -> &'static str {
        <Ingress as k8s_openapi::Resource>::KIND
    }

    fn modify(&mut self) {
        self.annotations_mut().remove(LAST_APPLIED_CONFIG);
        self.managed_fields_mut().clear();
        self.status = None;
    }
}

/// Build a client from an explicit kubeconfig, or with the default inference
/// rules (`KUBECONFIG`, `~/.kube/config`, in-cluster) when there isn't one.
pub(crate) async fn client(kubeconfig: Option<&Path>) -> anyhow::Result<kube::Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => kube::Config::infer().await?,
    };

    Ok(kube::Client::try_from(config)?)
}

/// An Api scoped by a namespace filter. An empty filter is every namespace.
pub(crate) fn kube_api<K>(client: &kube::Client, namespace_filter: &str) -> kube::Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    match namespace_filter {
        "" => kube::Api::all(client.clone()),
        namespace => kube::Api::namespaced(client.clone(), namespace),
    }
}

/// List every object an Api can see, one page at a time.
pub(crate) async fn list_all<T: KubeResource>(api: &kube::Api<T>) -> Result<Vec<T>, kube::Error> {
    let mut objs = Vec::new();
    let mut params = ListParams::default().limit(PAGE_SIZE);

    loop {
        let page = api.list(&params).await?;
        debug!(kind = T::static_kind(), count = page.items.len(), "listed page");

        objs.extend(page.items.into_iter().map(|mut obj| {
            obj.modify();
            obj
        }));

        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => params = params.continue_token(&token),
            _ => break,
        }
    }

    Ok(objs)
}

pub(crate) fn is_api_not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(e) if e.code == 404)
}

#[cfg(test)]
mod test {
    use kube::ResourceExt;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_modify_ingress() {
        let mut ingress: Ingress = serde_json::from_value(json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "Ingress",
            "metadata": {
                "name": "web",
                "namespace": "default",
                "annotations": {
                    "kubectl.kubernetes.io/last-applied-configuration": "{}",
                    "kubernetes.io/ingress.class": "nginx",
                },
                "managedFields": [{"manager": "kubectl", "operation": "Update"}],
            },
            "spec": {"ingressClassName": "nginx"},
            "status": {"loadBalancer": {"ingress": [{"ip": "10.0.0.1"}]}},
        }))
        .unwrap();

        ingress.modify();

        assert!(!ingress.annotations().contains_key(LAST_APPLIED_CONFIG));
        assert!(ingress.annotations().contains_key("kubernetes.io/ingress.class"));
        assert!(ingress.managed_fields().is_empty());
        assert!(ingress.status.is_none());
        assert_eq!(Ingress::static_kind(), "Ingress");
    }
}
