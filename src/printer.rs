//! Resource printers.
//!
//! Printers render Kubernetes objects the way `kubectl get -o yaml|json`
//! does: YAML objects are separated by `---` and JSON objects are indented
//! with four spaces.

use std::{fmt, io::Write, str::FromStr};

use serde::Serialize;

/// The formats accepted by `--output`.
pub(crate) const ALLOWED_FORMATS: &[&str] = &["json", "yaml"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0} is not a supported output format")]
pub(crate) struct UnsupportedFormat(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Yaml,
    Json,
}

impl FromStr for OutputFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yaml" | "" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Yaml => f.write_str("yaml"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Select a [ResourcePrinter] for an `--output` value.
pub(crate) fn resource_printer(output_format: &str) -> Result<ResourcePrinter, UnsupportedFormat> {
    let format = output_format.parse()?;
    Ok(ResourcePrinter::new(format))
}

/// Serializes objects to a writer in a fixed [OutputFormat].
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ResourcePrinter {
    format: OutputFormat,
    printed: usize,
}

impl ResourcePrinter {
    pub(crate) fn new(format: OutputFormat) -> Self {
        Self { format, printed: 0 }
    }

    pub(crate) fn format(&self) -> OutputFormat {
        self.format
    }

    pub(crate) fn print_obj<T, W>(&mut self, obj: &T, w: &mut W) -> anyhow::Result<()>
    where
        T: Serialize,
        W: Write,
    {
        self.printed += 1;

        match self.format {
            OutputFormat::Yaml => {
                if self.printed > 1 {
                    w.write_all(b"---\n")?;
                }
                let doc = serde_yaml::to_string(obj)?;
                w.write_all(doc.as_bytes())?;
            }
            OutputFormat::Json => {
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = serde_json::Serializer::with_formatter(&mut *w, formatter);
                obj.serialize(&mut ser)?;
                w.write_all(b"\n")?;
            }
        }

        Ok(())
    }
}
