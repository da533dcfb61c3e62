use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bqpublish::{
    BqClient, PublishConfig, PublishOrchestrator, PublishReport, QueryLoader,
    QueryMetadataResolver, QueryMode, Parameter, ScratchConfig, ShardLimits, gcs_store,
};
use bqpublish::config::{DEFAULT_API_VERSION, DEFAULT_MAX_ROWS_PER_SHARD, DEFAULT_MAX_SHARD_BYTES, DEFAULT_PAGE_SIZE};
use bqpublish::error::{BigQueryError, PublishError};
use bqpublish::executor::{DEFAULT_SCRATCH_DATASET, DEFAULT_SCRATCH_TTL_HOURS};

#[derive(Parser)]
#[command(name = "publish_public_data_json")]
#[command(about = "Publish query results as gzip-compressed JSON to Cloud Storage")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and publish its results as JSON
    #[command(name = "publish_json")]
    PublishJson {
        /// Path to the query file (<namespace>/<table>_v<N>/query.sql)
        #[arg(long = "query_file")]
        query_file: PathBuf,

        /// Query parameter as name:TYPE:value (repeatable)
        #[arg(long = "parameter")]
        parameter: Vec<String>,

        /// Bucket receiving the published objects
        #[arg(long = "target_bucket", env = "PUBLIC_DATA_BUCKET")]
        target_bucket: Option<String>,

        /// GCP project that runs the query
        #[arg(long = "project_id", env = "GCP_PROJECT_ID")]
        project_id: Option<String>,

        /// API version path segment
        #[arg(long = "api_version", default_value = DEFAULT_API_VERSION)]
        api_version: String,

        /// Dataset holding temporary tables
        #[arg(long = "scratch_dataset", default_value = DEFAULT_SCRATCH_DATASET)]
        scratch_dataset: String,

        /// Expiration of temporary tables in hours
        #[arg(long = "scratch_ttl_hours", default_value_t = DEFAULT_SCRATCH_TTL_HOURS)]
        scratch_ttl_hours: u32,

        /// Maximum rows per shard file
        #[arg(long = "max_rows_per_shard", default_value_t = DEFAULT_MAX_ROWS_PER_SHARD)]
        max_rows_per_shard: usize,

        /// Maximum uncompressed bytes per shard file
        #[arg(long = "max_shard_bytes", default_value_t = DEFAULT_MAX_SHARD_BYTES)]
        max_shard_bytes: usize,

        /// Rows fetched per result page
        #[arg(long = "page_size", default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("bqpublish=debug,publish_public_data_json=debug,info")
    } else {
        EnvFilter::new("bqpublish=info,publish_public_data_json=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), PublishError> {
    match cli.command {
        Commands::PublishJson {
            query_file,
            parameter,
            target_bucket,
            project_id,
            api_version,
            scratch_dataset,
            scratch_ttl_hours,
            max_rows_per_shard,
            max_shard_bytes,
            page_size,
        } => {
            let mut config = PublishConfig::new()
                .with_api_version(api_version)
                .with_scratch(ScratchConfig::new(scratch_dataset).with_ttl(scratch_ttl_hours))
                .with_shard_limits(ShardLimits {
                    max_rows: max_rows_per_shard,
                    max_bytes: max_shard_bytes,
                })
                .with_page_size(page_size);
            if let Some(project) = project_id {
                config = config.with_project(project);
            }
            if let Some(bucket) = target_bucket {
                config = config.with_bucket(bucket);
            }

            cmd_publish_json(query_file, parameter, config).await
        }
    }
}

async fn cmd_publish_json(
    query_file: PathBuf,
    parameter_flags: Vec<String>,
    config: PublishConfig,
) -> Result<(), PublishError> {
    let parameters = Parameter::parse_all(&parameter_flags)?;
    let definition = QueryLoader::new().load_query(&query_file)?;
    let mode = QueryMetadataResolver::resolve(&definition, &parameters)?;

    if let QueryMode::AdHoc { reason } = &mode {
        println!("✓ {} not published ({:?}); nothing to write", definition.identity, reason);
        return Ok(());
    }

    config.validate()?;
    let destination = config.require_destination()?;

    info!("Connecting to project {} and bucket {}", destination.project_id, destination.bucket);
    let client = BqClient::new(&destination.project_id).await?;
    let store = gcs_store(&destination.bucket)?;

    let orchestrator = PublishOrchestrator::new(Arc::new(client), store, config);
    let report = orchestrator.publish_mode(&definition, &parameters, mode).await?;

    print_report(&report, &destination.bucket);
    Ok(())
}

fn print_report(report: &PublishReport, bucket: &str) {
    println!("\n✓ {} published ({})", report.query, report.mode.as_str());
    println!("  Rows: {}", report.rows);
    println!("  Shards: {}", report.shards.len());
    for shard in &report.shards {
        println!("    gs://{}/{} ({} rows)", bucket, shard.path, shard.rows);
    }
    if !report.pruned.is_empty() {
        println!("  Pruned: {} stale object(s)", report.pruned.len());
    }
    if let (Some(path), Some(at)) = (&report.last_updated, &report.last_updated_at) {
        println!("  Last updated: {} (gs://{}/{})", at, bucket, path);
    }
}

fn print_error(err: &PublishError) {
    if let PublishError::QueryExecution(bq) = err {
        print_bq_error(bq);
        return;
    }

    eprintln!("\x1b[31m✗ Error [{}]:\x1b[0m {}", err.kind(), err);
}

fn print_bq_error(err: &BigQueryError) {
    eprintln!("\n\x1b[31m✗ BigQuery Error [{}]\x1b[0m", err.error_code());
    eprintln!("  {}", err);
    eprintln!("\n\x1b[33mSuggestion:\x1b[0m");
    for line in err.suggestion().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}
