use clap::{Parser, ValueEnum};
use relq_query::SqlDialect;
use std::path::PathBuf;

/// Output format for the compiled command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Command text followed by a parameter table
    Text,
    /// Single JSON document
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "relq")]
#[command(about = "relq - compile relational query shapes to parameterized SQL")]
#[command(version)]
pub struct Cli {
    /// Query shape (JSON)
    pub query: PathBuf,

    /// Parameter values as a JSON object of name to plain JSON value
    #[arg(short, long)]
    pub params: Option<PathBuf>,

    /// Config file path (TOML)
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Target provider (sqlserver, sqlite); overrides the config file
    #[arg(long)]
    pub provider: Option<SqlDialect>,

    /// Use plain SQL equality for nullable operands
    #[arg(long)]
    pub relational_nulls: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "relq",
            "query.json",
            "--provider",
            "sqlite",
            "-f",
            "json",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.provider, Some(SqlDialect::Sqlite));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
        assert!(cli.params.is_none());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["relq", "q.json", "--provider", "oracle"]).is_err());
    }
}
