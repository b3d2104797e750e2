//! CLI command definitions for caseforge.
//!
//! `generate` runs a full batch (warm-up, records, export); `export`
//! rebuilds the table from an existing log.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use crate::export::{export_all, ExportSummary, TableFormat};
use crate::llm::{build_provider, ProviderKind, StructuredClient};
use crate::pipeline::{
    build_roster, BatchConfig, BatchOrchestrator, BatchReport, CaseSampler, RecordOutcome,
    RecordPipeline,
};
use crate::storage::{JsonlRecordLog, RecordSink};

/// Synthetic customer-service record generator.
#[derive(Parser)]
#[command(name = "caseforge")]
#[command(about = "Generate synthetic customer-service records with an LLM")]
#[command(version)]
#[command(
    long_about = "caseforge builds a roster of service representatives, then generates one record per \
customer interaction: customer, service case, assigned representative and feedback.\n\n\
Records are appended to a JSONL log and exported to an Excel workbook (.xlsx) or a Parquet \
file (.parquet), chosen by the table path extension, when the batch ends.\n\n\
Example usage:\n  caseforge generate --count 20 --concurrency 5 --provider openai"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a batch of records and export the log.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Rebuild the table from an existing record log.
    Export(ExportArgs),
}

/// Arguments for `caseforge generate`.
///
/// Unset flags fall back to `CASEFORGE_*` variables, then the `--config`
/// file, then built-in defaults.
#[derive(Parser, Debug, Default)]
pub struct GenerateArgs {
    /// Number of records to generate.
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Maximum number of records generated at once.
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Size of the representative roster (at least one per department).
    #[arg(long)]
    pub representatives: Option<usize>,

    /// LLM provider.
    #[arg(short = 'p', long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Model override (defaults to the provider's model).
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Sampling temperature, 0.0 to 2.0.
    #[arg(short = 't', long)]
    pub temperature: Option<f64>,

    /// Completion token cap per call.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// HTTP timeout per call, in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Provider endpoint override.
    #[arg(long)]
    pub api_base: Option<String>,

    /// API key (otherwise OPENAI_API_KEY or GOOGLE_API_KEY, depending on the provider).
    #[arg(long)]
    pub api_key: Option<String>,

    /// Seed for the local category/channel/rating draws.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Record log (JSONL, appended to).
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Tabular export, `.xlsx` or `.parquet` (overwritten).
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// YAML configuration file.
    #[arg(long, env = "CASEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable the progress bar.
    #[arg(long)]
    pub no_progress: bool,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl GenerateArgs {
    /// Layers the flags that were given over `config`.
    pub fn apply_to(&self, mut config: BatchConfig) -> BatchConfig {
        if let Some(count) = self.count {
            config = config.with_record_count(count);
        }
        if let Some(limit) = self.concurrency {
            config = config.with_concurrency_limit(limit);
        }
        if let Some(count) = self.representatives {
            config = config.with_representative_count(count);
        }
        if let Some(provider) = self.provider {
            config = config.with_provider(provider);
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        if let Some(secs) = self.timeout {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base.clone());
        }
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.clone());
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(log) = &self.log {
            config = config.with_log_path(log.clone());
        }
        if let Some(table) = &self.table {
            config = config.with_table_path(table.clone());
        }
        if self.no_progress || self.json {
            config = config.with_progress(false);
        }
        config
    }
}

/// Arguments for `caseforge export`.
#[derive(Parser, Debug, Default)]
pub struct ExportArgs {
    /// Record log to read.
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Table to write, `.xlsx` or `.parquet`.
    #[arg(long)]
    pub table: Option<PathBuf>,

    /// YAML configuration file supplying default paths.
    #[arg(long, env = "CASEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output JSON summary.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments without running the command.
///
/// Lets `main` set up logging from `--log-level` before anything runs.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Export(args) => run_export_command(args).await,
    }
}

// ============================================================================
// Generate
// ============================================================================

#[derive(Debug, Serialize)]
struct FailureSummary {
    index: usize,
    stage: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct GenerateSummary {
    batch_id: String,
    provider: String,
    model: String,
    requested: usize,
    succeeded: usize,
    failed: usize,
    roster: Vec<String>,
    peak_in_flight: usize,
    elapsed_secs: f64,
    log_path: PathBuf,
    table_path: Option<PathBuf>,
    table_format: Option<TableFormat>,
    table_rows: Option<usize>,
    failures: Vec<FailureSummary>,
}

impl GenerateSummary {
    fn new(
        config: &BatchConfig,
        roster: &[crate::schema::Representative],
        report: &BatchReport,
        export: Option<&ExportSummary>,
    ) -> Self {
        let failures = report
            .failures()
            .filter_map(|outcome| match outcome {
                RecordOutcome::Failed {
                    index,
                    stage,
                    message,
                } => Some(FailureSummary {
                    index: *index,
                    stage: stage.map(|s| s.to_string()),
                    message: message.clone(),
                }),
                RecordOutcome::Succeeded { .. } => None,
            })
            .collect();

        Self {
            batch_id: report.batch_id.to_string(),
            provider: config.provider.to_string(),
            model: config.effective_model(),
            requested: config.record_count,
            succeeded: report.succeeded(),
            failed: report.failed(),
            roster: roster
                .iter()
                .map(|r| format!("{} ({})", r.name, r.department))
                .collect(),
            peak_in_flight: report.peak_in_flight,
            elapsed_secs: report.elapsed.as_secs_f64(),
            log_path: config.log_path.clone(),
            table_path: export.map(|e| e.table_path.clone()),
            table_format: export.map(|e| e.format),
            table_rows: export.map(|e| e.rows),
            failures,
        }
    }

    fn print_human(&self) {
        println!("✓ Batch {} finished", self.batch_id);
        println!("  Provider:       {} ({})", self.provider, self.model);
        println!("  Roster:         {}", self.roster.join(", "));
        println!("  Records:        {}/{} stored", self.succeeded, self.requested);
        println!("  Failed:         {}", self.failed);
        println!("  Peak in flight: {}", self.peak_in_flight);
        println!("  Elapsed:        {:.1}s", self.elapsed_secs);
        println!("  Log:            {}", self.log_path.display());
        match (&self.table_path, self.table_rows) {
            (Some(path), Some(rows)) => println!("  Table:          {} ({rows} rows)", path.display()),
            _ => println!("  Table:          not written"),
        }
        for failure in &self.failures {
            println!(
                "    #{} {}: {}",
                failure.index,
                failure.stage.as_deref().unwrap_or("unknown stage"),
                failure.message
            );
        }
    }
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let config = args.apply_to(BatchConfig::load(args.config.as_deref())?);
    config.validate()?;
    let settings = config.provider_settings()?;

    info!(
        provider = %settings.kind,
        model = %settings.model,
        api_key = %settings.api_key_masked(),
        records = config.record_count,
        concurrency = config.concurrency_limit,
        "Starting batch"
    );

    let provider = build_provider(&settings)?;
    let client = StructuredClient::new(provider)
        .with_model(config.effective_model())
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    let roster = build_roster(&client, config.representative_count)
        .await
        .context("representative warm-up failed")?;
    info!(size = roster.len(), "Roster ready");

    let sink: Arc<dyn RecordSink> = Arc::new(JsonlRecordLog::new(config.log_path.clone()));
    let sampler = Arc::new(CaseSampler::new(config.seed));
    let pipeline = RecordPipeline::new(client, sampler, roster.clone(), sink);

    let report = BatchOrchestrator::new(Arc::new(pipeline))
        .with_progress(config.show_progress)
        .run_batch(config.record_count, config.concurrency_limit)
        .await;

    let export = export_log(&config.log_path, &config.table_path).await?;

    let summary = GenerateSummary::new(&config, &roster, &report, export.as_ref());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print_human();
    }

    if config.record_count > 0 && report.succeeded() == 0 {
        anyhow::bail!("all {} records failed", config.record_count);
    }
    Ok(())
}

/// Exports the log if one exists; a batch where nothing was ever stored has none.
async fn export_log(log_path: &Path, table_path: &Path) -> anyhow::Result<Option<ExportSummary>> {
    if !tokio::fs::try_exists(log_path).await.unwrap_or(false) {
        warn!(log = %log_path.display(), "No record log, skipping export");
        return Ok(None);
    }
    let summary = export_all(log_path, table_path)
        .await
        .with_context(|| format!("failed to export {}", log_path.display()))?;
    Ok(Some(summary))
}

// ============================================================================
// Export
// ============================================================================

async fn run_export_command(args: ExportArgs) -> anyhow::Result<()> {
    let config = BatchConfig::load(args.config.as_deref())?;
    let log_path = args.log.unwrap_or(config.log_path);
    let table_path = args.table.unwrap_or(config.table_path);

    let summary = export_all(&log_path, &table_path)
        .await
        .with_context(|| format!("failed to export {}", log_path.display()))?;

    if args.json {
        let output = serde_json::json!({
            "log_path": log_path,
            "table_path": summary.table_path,
            "format": summary.format,
            "rows": summary.rows,
            "bytes": summary.bytes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("✓ Exported {} records", summary.rows);
        println!("  Log:   {}", log_path.display());
        println!(
            "  Table: {} ({}, {} bytes)",
            summary.table_path.display(),
            summary.format,
            summary.bytes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_command_defaults() {
        let cli = Cli::try_parse_from(["caseforge", "generate"]).expect("should parse");
        match cli.command {
            Commands::Generate(args) => {
                assert!(args.count.is_none());
                assert!(args.provider.is_none());
                assert!(!args.no_progress);
                assert!(!args.json);
            }
            _ => panic!("Expected Generate command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_generate_command_with_all_options() {
        let cli = Cli::try_parse_from([
            "caseforge",
            "gen",
            "-n",
            "25",
            "-c",
            "3",
            "--representatives",
            "6",
            "-p",
            "gemini",
            "-m",
            "gemini-1.5-pro",
            "-t",
            "1.1",
            "--max-tokens",
            "2048",
            "--timeout",
            "30",
            "--seed",
            "7",
            "--log",
            "out/records.jsonl",
            "--table",
            "out/records.parquet",
            "--no-progress",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "debug");
        let Commands::Generate(args) = cli.command else {
            panic!("Expected Generate command");
        };
        let config = args.apply_to(BatchConfig::default());
        assert_eq!(config.record_count, 25);
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.representative_count, 6);
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.effective_model(), "gemini-1.5-pro");
        assert_eq!(config.temperature, 1.1);
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.log_path, PathBuf::from("out/records.jsonl"));
        assert_eq!(config.table_path, PathBuf::from("out/records.parquet"));
        assert!(!config.show_progress);
    }

    #[test]
    fn test_unset_flags_keep_lower_layers() {
        let base = BatchConfig::default()
            .with_record_count(40)
            .with_seed(11);
        let config = GenerateArgs {
            concurrency: Some(2),
            ..Default::default()
        }
        .apply_to(base);

        assert_eq!(config.record_count, 40);
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.seed, Some(11));
        assert!(config.show_progress);
    }

    #[test]
    fn test_json_output_disables_progress() {
        let config = GenerateArgs {
            json: true,
            ..Default::default()
        }
        .apply_to(BatchConfig::default());
        assert!(!config.show_progress);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["caseforge", "generate", "-p", "anthropic"]).is_err());
    }

    #[test]
    fn test_export_command_paths() {
        let cli = Cli::try_parse_from([
            "caseforge",
            "export",
            "--log",
            "a.jsonl",
            "--table",
            "b.parquet",
        ])
        .expect("should parse");
        let Commands::Export(args) = cli.command else {
            panic!("Expected Export command");
        };
        assert_eq!(args.log, Some(PathBuf::from("a.jsonl")));
        assert_eq!(args.table, Some(PathBuf::from("b.parquet")));
    }

    #[tokio::test]
    async fn test_export_log_skips_missing_log() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let exported = export_log(
            &dir.path().join("missing.jsonl"),
            &dir.path().join("out.parquet"),
        )
        .await
        .expect("missing log is not an error");
        assert!(exported.is_none());
        assert!(!dir.path().join("out.parquet").exists());
    }
}
