//! Ingress to Gateway API translation.
//!
//! Ingresses are grouped by namespace and ingress class. Every group becomes
//! one Gateway named after the class, with a listener per host. Every host in
//! a group becomes one HTTPRoute attached to that Gateway, holding the rules
//! of every Ingress that mentions the host.
//!
//! Listener and route names are derived from hosts and Ingress names, and two
//! different hosts can derive the same name. Names are only picked once every
//! Ingress has been grouped, and a taken name gets a numeric suffix.

use std::collections::{BTreeMap, HashMap, HashSet};

use gateway_api::apis::standard::{
    gateways::{
        Gateway, GatewayListeners, GatewayListenersTls, GatewayListenersTlsCertificateRefs,
        GatewaySpec,
    },
    httproutes::{
        HTTPRoute, HTTPRouteParentRefs, HTTPRouteRules, HTTPRouteRulesBackendRefs,
        HTTPRouteRulesMatches, HTTPRouteRulesMatchesPath, HTTPRouteRulesMatchesPathType,
        HTTPRouteSpec,
    },
};
use k8s_openapi::api::networking::v1::{HTTPIngressPath, Ingress, IngressBackend};
use kube::ResourceExt as _;
use tracing::warn;

const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

/// An error converting a single Ingress, or a single path in an Ingress.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum ConvertError {
    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("no ingress class set with spec.ingressClassName or the kubernetes.io/ingress.class annotation")]
    MissingIngressClass,

    #[error("unsupported path type: {0}")]
    UnsupportedPathType(String),

    #[error("backend {0:?} is not a Service")]
    UnsupportedBackend(String),

    #[error("service {service:?} uses named port {port:?}, a port number is required")]
    NamedPort { service: String, port: String },

    #[error("service {0:?} has no port")]
    MissingPort(String),
}

/// The output of a conversion, each list sorted by namespace and name.
#[derive(Debug, Default)]
pub(crate) struct GatewayResources {
    pub gateways: Vec<Gateway>,
    pub http_routes: Vec<HTTPRoute>,
}

/// Convert Ingresses into Gateways and HTTPRoutes.
///
/// Ingresses and paths that can't be converted are logged and skipped.
pub(crate) fn ingresses_to_gateway_api(ingresses: &[Ingress]) -> GatewayResources {
    let mut ingresses: Vec<_> = ingresses.iter().collect();
    ingresses.sort_by_key(|i| (i.namespace(), i.name_any()));

    let mut converter = Converter::default();
    for ingress in ingresses {
        if let Err(e) = converter.add_ingress(ingress) {
            warn!(
                ingress = %ingress_ref(ingress),
                err = %e,
                "skipping Ingress"
            );
        }
    }

    converter.into_resources()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Protocol {
    Http,
    Https,
}

impl Protocol {
    fn port(self) -> i32 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum RouteTarget {
    Host(String),
    DefaultBackend(String),
}

#[derive(Default)]
struct Converter {
    // (namespace, class) -> (host, protocol) -> tls secret
    gateways: BTreeMap<(String, String), BTreeMap<(String, Protocol), Option<String>>>,
    // (namespace, class, target) -> route
    routes: BTreeMap<(String, String, RouteTarget), Route>,
}

struct Route {
    base_name: String,
    hostname: Option<String>,
    rules: Vec<HTTPRouteRules>,
}

impl Converter {
    fn add_ingress(&mut self, ingress: &Ingress) -> Result<(), ConvertError> {
        let name = ingress
            .metadata
            .name
            .clone()
            .ok_or_else(|| ConvertError::InvalidObject("missing name".to_string()))?;
        let namespace = ingress
            .namespace()
            .ok_or_else(|| ConvertError::InvalidObject("missing namespace".to_string()))?;
        let class = ingress_class(ingress).ok_or(ConvertError::MissingIngressClass)?;

        let Some(spec) = &ingress.spec else {
            return Ok(());
        };

        for tls in spec.tls.iter().flatten() {
            let Some(secret_name) = &tls.secret_name else {
                continue;
            };
            for host in tls.hosts.iter().flatten() {
                self.add_listener(&namespace, &class, host, Protocol::Https, Some(secret_name));
            }
        }

        for rule in spec.rules.iter().flatten() {
            let Some(http) = &rule.http else {
                continue;
            };
            let host = rule.host.clone().unwrap_or_default();
            self.add_listener(&namespace, &class, &host, Protocol::Http, None);

            let rules = http.paths.iter().filter_map(|path| match path_rule(path) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!(
                        ingress = %ingress_ref(ingress),
                        host = %host,
                        path = path.path.as_deref().unwrap_or("/"),
                        err = %e,
                        "skipping path"
                    );
                    None
                }
            });
            let rules: Vec<_> = rules.collect();

            let key = (namespace.clone(), class.clone(), RouteTarget::Host(host.clone()));
            self.routes
                .entry(key)
                .or_insert_with(|| Route {
                    base_name: format!("{name}-{}", name_from_host(&host)),
                    hostname: Some(host).filter(|h| !h.is_empty()),
                    rules: Vec::new(),
                })
                .rules
                .extend(rules);
        }

        if let Some(backend) = &spec.default_backend {
            let backend_ref = match backend_ref(backend) {
                Ok(backend_ref) => backend_ref,
                Err(e) => {
                    warn!(ingress = %ingress_ref(ingress), err = %e, "skipping default backend");
                    return Ok(());
                }
            };

            self.add_listener(&namespace, &class, "", Protocol::Http, None);

            let key = (namespace.clone(), class.clone(), RouteTarget::DefaultBackend(name.clone()));
            self.routes.insert(
                key,
                Route {
                    base_name: format!("{name}-default-backend"),
                    hostname: None,
                    rules: vec![HTTPRouteRules {
                        backend_refs: Some(vec![backend_ref]),
                        ..Default::default()
                    }],
                },
            );
        }

        Ok(())
    }

    fn add_listener(
        &mut self,
        namespace: &str,
        class: &str,
        host: &str,
        protocol: Protocol,
        tls_secret: Option<&str>,
    ) {
        self.gateways
            .entry((namespace.to_string(), class.to_string()))
            .or_default()
            .entry((host.to_string(), protocol))
            .or_insert_with(|| tls_secret.map(str::to_string));
    }

    fn into_resources(self) -> GatewayResources {
        let gateways = self
            .gateways
            .into_iter()
            .map(|((namespace, class), listeners)| gateway(namespace, class, listeners))
            .collect();

        // route names are unique per namespace
        let mut taken: HashMap<String, HashSet<String>> = HashMap::new();
        let mut http_routes: Vec<_> = self
            .routes
            .into_iter()
            .map(|((namespace, class, _), route)| {
                let name = unique_name(taken.entry(namespace.clone()).or_default(), &route.base_name);
                if name != route.base_name {
                    warn!(
                        namespace = %namespace,
                        name = %route.base_name,
                        renamed = %name,
                        "HTTPRoute name already used, renaming"
                    );
                }

                let mut http_route = HTTPRoute::new(
                    &name,
                    HTTPRouteSpec {
                        parent_refs: Some(vec![HTTPRouteParentRefs {
                            name: class,
                            ..Default::default()
                        }]),
                        hostnames: route.hostname.map(|h| vec![h]),
                        rules: Some(route.rules),
                        ..Default::default()
                    },
                );
                http_route.metadata.namespace = Some(namespace);
                http_route
            })
            .collect();
        http_routes.sort_by_key(|r| (r.namespace(), r.name_any()));

        GatewayResources {
            gateways,
            http_routes,
        }
    }
}

fn gateway(
    namespace: String,
    class: String,
    listeners: BTreeMap<(String, Protocol), Option<String>>,
) -> Gateway {
    let mut taken = HashSet::new();
    let listeners = listeners
        .into_iter()
        .map(|((host, protocol), tls_secret)| {
            let base_name = format!(
                "{}-{}",
                name_from_host(&host),
                protocol.as_str().to_ascii_lowercase()
            );
            let name = unique_name(&mut taken, &base_name);

            GatewayListeners {
                name,
                hostname: Some(host).filter(|h| !h.is_empty()),
                port: protocol.port(),
                protocol: protocol.as_str().to_string(),
                tls: tls_secret.map(|secret| GatewayListenersTls {
                    certificate_refs: Some(vec![GatewayListenersTlsCertificateRefs {
                        name: secret,
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }
        })
        .collect();

    let mut gateway = Gateway::new(
        &class,
        GatewaySpec {
            gateway_class_name: class.clone(),
            listeners,
            ..Default::default()
        },
    );
    gateway.metadata.namespace = Some(namespace);
    gateway
}

/// Returns `base`, or `base` with the first free numeric suffix if it's
/// already taken, and marks the result taken.
fn unique_name(taken: &mut HashSet<String>, base: &str) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }

    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn ingress_ref(ingress: &Ingress) -> String {
    format!(
        "{}/{}",
        ingress.namespace().unwrap_or_default(),
        ingress.name_any()
    )
}

fn ingress_class(ingress: &Ingress) -> Option<String> {
    let from_spec = ingress
        .spec
        .as_ref()
        .and_then(|s| s.ingress_class_name.clone());

    from_spec
        .or_else(|| ingress.annotations().get(INGRESS_CLASS_ANNOTATION).cloned())
        .filter(|class| !class.is_empty())
}

/// A name fragment for a host: `*.example.com` becomes
/// `wildcard-example-com`, and no host at all becomes `all-hosts`.
fn name_from_host(host: &str) -> String {
    if host.is_empty() {
        return "all-hosts".to_string();
    }
    host.replace('*', "wildcard").replace('.', "-")
}

fn path_rule(path: &HTTPIngressPath) -> Result<HTTPRouteRules, ConvertError> {
    let path_type = match path.path_type.as_str() {
        "Prefix" => HTTPRouteRulesMatchesPathType::PathPrefix,
        "Exact" => HTTPRouteRulesMatchesPathType::Exact,
        "ImplementationSpecific" => {
            warn!(
                path = path.path.as_deref().unwrap_or("/"),
                "treating ImplementationSpecific path as PathPrefix"
            );
            HTTPRouteRulesMatchesPathType::PathPrefix
        }
        other => return Err(ConvertError::UnsupportedPathType(other.to_string())),
    };
    let value = path.path.clone().unwrap_or_else(|| "/".to_string());
    let backend_ref = backend_ref(&path.backend)?;

    Ok(HTTPRouteRules {
        matches: Some(vec![HTTPRouteRulesMatches {
            path: Some(HTTPRouteRulesMatchesPath {
                r#type: Some(path_type),
                value: Some(value),
            }),
            ..Default::default()
        }]),
        backend_refs: Some(vec![backend_ref]),
        ..Default::default()
    })
}

fn backend_ref(backend: &IngressBackend) -> Result<HTTPRouteRulesBackendRefs, ConvertError> {
    let Some(service) = &backend.service else {
        let name = backend
            .resource
            .as_ref()
            .map(|r| format!("{}/{}", r.kind, r.name))
            .unwrap_or_default();
        return Err(ConvertError::UnsupportedBackend(name));
    };

    let port = service
        .port
        .as_ref()
        .ok_or_else(|| ConvertError::MissingPort(service.name.clone()))?;

    match (port.number, &port.name) {
        (Some(number), _) => Ok(HTTPRouteRulesBackendRefs {
            name: service.name.clone(),
            port: Some(number),
            ..Default::default()
        }),
        (None, Some(name)) => Err(ConvertError::NamedPort {
            service: service.name.clone(),
            port: name.clone(),
        }),
        (None, None) => Err(ConvertError::MissingPort(service.name.clone())),
    }
}
