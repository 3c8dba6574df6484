//! The `print` command.
//!
//! Resolves the printer and namespace filter from [PrintArgs] and hands them
//! to a conversion [Engine]. Both resolutions happen before the engine runs,
//! so a bad flag or an unreadable kubeconfig never produces partial output.

use tracing::debug;

use crate::args::PrintArgs;
use crate::context::{ConfigLoadError, ContextNamespace};
use crate::i2gw::Engine;
use crate::printer::{self, ResourcePrinter, UnsupportedFormat};

#[derive(Debug, thiserror::Error)]
pub(crate) enum PrintError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error("failed to determine the namespace of the current context")]
    ConfigLoad(#[from] ConfigLoadError),

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

/// A single, fully resolved request to the conversion engine.
///
/// An empty `namespace_filter` means all namespaces.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct PrintRequest {
    pub printer: ResourcePrinter,
    pub namespace_filter: String,
}

/// Run `print` once.
///
/// Nothing is cached between calls: every call re-resolves its flags and
/// re-reads the current context if it needs to.
pub(crate) async fn run<C, E>(args: &PrintArgs, context: &C, engine: &E) -> Result<(), PrintError>
where
    C: ContextNamespace,
    E: Engine,
{
    let printer = printer::resource_printer(&args.output)?;
    let namespace_filter = namespace_filter(&args.namespace, args.all_namespaces, context)?;

    debug!(
        output = %printer.format(),
        namespace_filter = %namespace_filter,
        "running conversion"
    );

    engine
        .run(PrintRequest {
            printer,
            namespace_filter,
        })
        .await?;

    Ok(())
}

/// Returns the namespace filter for a request.
///
/// `all_namespaces` always wins, even over an explicit namespace. Without
/// either, the namespace of the current context is used.
pub(crate) fn namespace_filter<C: ContextNamespace>(
    namespace: &str,
    all_namespaces: bool,
    context: &C,
) -> Result<String, ConfigLoadError> {
    if all_namespaces {
        return Ok(String::new());
    }

    if namespace.is_empty() {
        return context.active_namespace();
    }

    Ok(namespace.to_string())
}
