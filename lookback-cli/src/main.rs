use anyhow::{Context, Result};
use clap::Parser;
use lookback_core::query::{parse_script, run_script};
use lookback_core::{QueryError, ScriptFormat, Store, StoreConfig};
use std::io::Read;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "lookback",
    about = "Run a query script against an in-memory versioned store",
    version
)]
struct Cli {
    /// Script to run (`-` reads stdin).
    #[arg(env = "LOOKBACK_SCRIPT", default_value = "-")]
    script: String,

    /// Script encoding: text, json or auto.
    #[arg(long, env = "LOOKBACK_FORMAT", default_value = "auto", value_parser = parse_format)]
    format: ScriptFormat,
}

fn parse_format(raw: &str) -> Result<ScriptFormat, QueryError> {
    ScriptFormat::from_str(raw)
}

/// Reads the whole script from `path`, or from stdin for `-`
fn read_script(path: &str) -> Result<String> {
    if path == "-" {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read script from stdin")?;
        Ok(input)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("failed to read script {}", path))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries the replies
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lookback=info,lookback_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let input = read_script(&cli.script)?;
    let queries = parse_script(&input, cli.format)
        .with_context(|| format!("invalid script {}", cli.script))?;

    let store = Store::with_config(StoreConfig::from_env());

    tracing::info!("running {} queries from {}", queries.len(), cli.script);

    let replies: Vec<String> = run_script(&store, &queries)
        .iter()
        .map(ToString::to_string)
        .collect();

    tracing::info!(
        "done: {} keys, {} versions left in store",
        store.len(),
        store.version_count()
    );

    println!("{}", serde_json::to_string(&replies)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_script_path_and_format() {
        let cli = Cli::try_parse_from(["lookback", "script.json", "--format", "json"]).unwrap();
        assert_eq!(cli.script, "script.json");
        assert_eq!(cli.format, ScriptFormat::Json);

        let cli = Cli::try_parse_from(["lookback", "--format", "TEXT", "-"]).unwrap();
        assert_eq!(cli.script, "-");
        assert_eq!(cli.format, ScriptFormat::Text);
    }

    #[test]
    fn test_help_is_not_a_script_path() {
        let err = Cli::try_parse_from(["lookback", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_extra_arguments_rejected() {
        let err = Cli::try_parse_from(["lookback", "-", "extra"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = Cli::try_parse_from(["lookback", "--format", "yaml", "-"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
