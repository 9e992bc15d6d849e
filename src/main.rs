use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use rate_metrics::{
    artifact,
    config::{Config, ConfigFile},
    decode,
    pipeline::Pipeline,
    progress,
    schema::Dataset,
    source::Database,
};
use tracing::{error, info};

#[derive(Parser)]
#[clap(version, about = "Build the enhanced rate metrics artifact")]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the source tables and write the compressed artifact
    Generate {
        #[clap(short, long, env = "RATE_METRICS_CONFIG")]
        config: Option<PathBuf>,
        #[clap(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode an artifact, check its invariants and print decoded rows
    Inspect {
        path: PathBuf,
        #[clap(short, long)]
        dataset: Option<String>,
        #[clap(short, long, default_value_t = 10)]
        limit: usize,
    },
}

async fn generate(
    config: Option<PathBuf>,
    database_url: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let file = match &config {
        Some(path) => ConfigFile::load(path).await.with_context(|| "load config")?,
        None => ConfigFile::default(),
    };
    let config = Config::resolve(file, database_url, output).with_context(|| "invalid config")?;
    let client = Database::connect(&config.database_url)
        .await
        .with_context(|| "connect to database")?;
    let pipeline = Pipeline {
        client,
        config,
        reporter: progress::create_reporter(),
    };
    let report = pipeline
        .run()
        .await
        .with_context(|| "generate enhanced metrics")?;
    info!(
        path = %report.path.display(),
        compression_ratio = %report.compression_ratio,
        rate_changes = report.summary.total_recent_rate_changes,
        "done"
    );
    Ok(())
}

async fn inspect(path: PathBuf, dataset: Option<String>, limit: usize) -> anyhow::Result<()> {
    let metrics = artifact::read(&path)
        .await
        .with_context(|| format!("read artifact {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&metrics.summary)?);
    println!("{}", serde_json::to_string_pretty(&metrics.metadata)?);
    for (name, block) in metrics.blocks() {
        decode::validate(block).with_context(|| format!("invalid dataset {name}"))?;
        println!(
            "{name}: {} records, {} columns",
            block.total_records,
            block.column_order.len()
        );
    }
    if let Some(name) = dataset {
        let dataset = Dataset::from_key(&name).ok_or_else(|| anyhow!("unknown dataset {name}"))?;
        let block = metrics
            .block(dataset.key())
            .ok_or_else(|| anyhow!("artifact has no {name} block"))?;
        for row in decode::decode_rows(block)?.iter().take(limit) {
            println!("{}", serde_json::to_string(row)?);
        }
    }
    Ok(())
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    match opts.command {
        Command::Generate {
            config,
            database_url,
            output,
        } => generate(config, database_url, output).await,
        Command::Inspect {
            path,
            dataset,
            limit,
        } => inspect(path, dataset, limit).await,
    }
}

fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
