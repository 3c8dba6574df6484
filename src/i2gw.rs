use std::{io::Write, path::PathBuf};

use anyhow::Context as _;
use k8s_openapi::api::networking::v1::Ingress;
use tracing::{debug, info};

use crate::k8s;
use crate::print::PrintRequest;
use crate::printer::ResourcePrinter;

mod convert;

pub(crate) use convert::{ingresses_to_gateway_api, GatewayResources};

/// Converts Ingresses into Gateway API resources and prints them.
pub(crate) trait Engine {
    async fn run(&self, request: PrintRequest) -> anyhow::Result<()>;
}

/// An [Engine] that reads Ingresses from a live cluster and prints to stdout.
#[derive(Debug, Clone)]
pub(crate) struct KubeEngine {
    kubeconfig: Option<PathBuf>,
}

impl KubeEngine {
    pub(crate) fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }
}

impl Engine for KubeEngine {
    async fn run(&self, request: PrintRequest) -> anyhow::Result<()> {
        let PrintRequest {
            mut printer,
            namespace_filter,
        } = request;

        let client = k8s::client(self.kubeconfig.as_deref())
            .await
            .context("failed to create a Kubernetes client")?;

        let api = k8s::kube_api::<Ingress>(&client, &namespace_filter);
        let ingresses = match k8s::list_all(&api).await {
            Ok(ingresses) => ingresses,
            Err(e) if k8s::is_api_not_found(&e) => {
                return Err(e).context("Ingress API (networking.k8s.io/v1) not found");
            }
            Err(e) => return Err(e).context("failed to list Ingresses"),
        };

        info!(
            namespace = display_namespace(&namespace_filter),
            count = ingresses.len(),
            "converting Ingresses"
        );

        let resources = ingresses_to_gateway_api(&ingresses);
        debug!(
            gateways = resources.gateways.len(),
            http_routes = resources.http_routes.len(),
            "printing resources"
        );

        let mut stdout = std::io::stdout().lock();
        print_resources(&mut printer, &resources, &mut stdout)?;
        stdout.flush()?;

        Ok(())
    }
}

/// Print every Gateway, then every HTTPRoute.
fn print_resources<W: Write>(
    printer: &mut ResourcePrinter,
    resources: &GatewayResources,
    out: &mut W,
) -> anyhow::Result<()> {
    for gateway in &resources.gateways {
        printer.print_obj(gateway, out)?;
    }
    for http_route in &resources.http_routes {
        printer.print_obj(http_route, out)?;
    }
    Ok(())
}

fn display_namespace(namespace_filter: &str) -> &str {
    match namespace_filter {
        "" => "*",
        namespace => namespace,
    }
}
