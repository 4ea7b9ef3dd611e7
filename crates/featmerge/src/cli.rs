use crate::commands::merge::{execute_merge, MergeArgs};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Parse a `KEY=VALUE` pair
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge feature descriptors, left to right, into one feature
    Merge {
        /// Feature descriptor files (JSON), in merge order
        #[arg(required = true, value_name = "FEATURE")]
        inputs: Vec<PathBuf>,

        /// Id of the merged feature (defaults to the id of the first input)
        #[arg(long, value_name = "GROUP:ARTIFACT:VERSION")]
        id: Option<String>,

        /// Artifact override rule, e.g. `org.example:api:HIGHEST` (repeatable, evaluated in order)
        #[arg(long = "override", value_name = "RULE")]
        overrides: Vec<String>,

        /// Metadata key recording which feature contributed each artifact
        #[arg(long, value_name = "KEY")]
        origin_key: Option<String>,

        /// Force a variable value (repeatable)
        #[arg(long = "variable", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        variables: Vec<(String, String)>,

        /// Force a framework property value (repeatable)
        #[arg(long = "framework-property", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        framework_properties: Vec<(String, String)>,

        /// Merge settings file (TOML); flags take precedence
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Write the merged feature to this file instead of stdout
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Feature descriptor merge tool",
    long_about = "Feature descriptor merge tool\n\nFolds feature descriptors into one feature, resolving artifact conflicts with override rules.",
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via FEATMERGE_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Initialize logging and run the selected subcommand
    pub fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };
        let level = self.log_level.as_str();
        let default_filter = format!("featmerge={},featmerge_core={}", level, level);
        featmerge_core::logging::init(log_format, Some(default_filter.as_str()))?;
        tracing::debug!("CLI initialized with log level: {}", level);

        match self.command {
            Some(Commands::Merge {
                inputs,
                id,
                overrides,
                origin_key,
                variables,
                framework_properties,
                config,
                output,
            }) => execute_merge(MergeArgs {
                inputs,
                id,
                overrides,
                origin_key,
                variables,
                framework_properties,
                config,
                output,
            }),
            None => {
                println!("featmerge - feature descriptor merge tool");
                println!("Run 'featmerge --help' for usage information");
                Ok(())
            }
        }
    }
}
