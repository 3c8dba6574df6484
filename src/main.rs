use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod args;
mod context;
mod i2gw;
mod k8s;
mod print;
mod printer;

/// Convert Ingress resources to Gateway API resources.
#[derive(Parser, Debug)]
#[command(version)]
struct CliArgs {
    /// Log as JSON instead of a human-readable format.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to the kubeconfig file to use. Defaults to $KUBECONFIG or
    /// ~/.kube/config.
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints HTTPRoutes and Gateways generated from Ingress resources
    Print(args::PrintArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = CliArgs::parse();
    setup_tracing(args.log_json);

    let result = match &args.command {
        Command::Print(print_args) => {
            let context = context::KubeconfigContext::new(args.kubeconfig.clone());
            let engine = i2gw::KubeEngine::new(args.kubeconfig.clone());
            print::run(print_args, &context, &engine).await
        }
    };

    if let Err(e) = result {
        let e = anyhow::Error::from(e);
        tracing::debug!(err = ?e, "exiting");
        // reported regardless of the log filter
        eprintln!("{}", exit_message(&e));
        std::process::exit(1);
    }
}

fn exit_message(e: &anyhow::Error) -> String {
    format!("error: {e:#}")
}

fn setup_tracing(log_json: bool) {
    let default_log_filter = "ingress2gateway=info"
        .parse()
        .expect("default log filter must be valid");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_log_filter)
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(true);

    if log_json {
        builder
            .json()
            .flatten_event(true)
            .with_span_list(false)
            .init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    fn parse_print(args: &[&str]) -> args::PrintArgs {
        let cli = CliArgs::try_parse_from(args).unwrap();
        match cli.command {
            Command::Print(print_args) => print_args,
        }
    }

    #[test]
    fn test_cli_definition() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_print_defaults() {
        let args = parse_print(&["ingress2gateway", "print"]);
        assert_eq!(args.output, "yaml");
        assert_eq!(args.namespace, "");
        assert!(!args.all_namespaces);
    }

    #[test]
    fn test_print_short_flags() {
        let args = parse_print(&["ingress2gateway", "print", "-o", "json", "-n", "team-a", "-A"]);
        assert_eq!(args.output, "json");
        assert_eq!(args.namespace, "team-a");
        assert!(args.all_namespaces);
    }

    #[test]
    fn test_print_long_flags() {
        let args = parse_print(&[
            "ingress2gateway",
            "print",
            "--output=",
            "--namespace",
            "ns1",
            "--all-namespaces",
        ]);
        assert_eq!(args.output, "");
        assert_eq!(args.namespace, "ns1");
        assert!(args.all_namespaces);
    }

    #[test]
    fn test_output_is_not_validated_by_clap() {
        // bad formats are reported by the printer so the error names the value
        let args = parse_print(&["ingress2gateway", "print", "-o", "xml"]);
        assert_eq!(args.output, "xml");
    }

    #[test]
    fn test_global_flags() {
        let cli = CliArgs::try_parse_from([
            "ingress2gateway",
            "print",
            "--kubeconfig",
            "/tmp/kubeconfig",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(cli.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));
        assert!(cli.log_json);
    }

    #[test]
    fn test_exit_message() {
        let e = anyhow::Error::from(print::PrintError::from(printer::UnsupportedFormat(
            "xml".to_string(),
        )));
        assert_eq!(exit_message(&e), "error: xml is not a supported output format");

        let e = anyhow::Error::from(print::PrintError::from(
            context::ConfigLoadError::ContextNotFound("prod".to_string()),
        ));
        assert_eq!(
            exit_message(&e),
            "error: failed to determine the namespace of the current context: \
             context \"prod\" not found in kubeconfig"
        );
    }

    #[test]
    fn test_print_takes_no_positionals() {
        assert!(CliArgs::try_parse_from(["ingress2gateway", "print", "extra"]).is_err());
    }
}
