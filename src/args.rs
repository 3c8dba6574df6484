use clap::Args;

use crate::printer::ALLOWED_FORMATS;

/// Arguments for the `print` command.
#[derive(Args, Debug, Clone)]
pub(crate) struct PrintArgs {
    #[arg(
        long,
        short,
        default_value = "yaml",
        help = format!("Output format. One of: ({})", ALLOWED_FORMATS.join(", "))
    )]
    pub output: String,

    /// If present, the namespace scope for this CLI request.
    ///
    /// When unset, the namespace of the current kubeconfig context is used.
    #[arg(long, short, default_value_t)]
    pub namespace: String,

    /// If present, list the requested object(s) across all namespaces.
    ///
    /// Namespace in current context is ignored even if specified with
    /// --namespace.
    #[arg(long, short = 'A')]
    pub all_namespaces: bool,
}
