use anyhow::Context;
use clap::Parser;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vcfseek::{Config, ReferenceGenome, VariantSource, storage::open_location};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let genome = match config.genome.as_deref() {
        Some(name) => Some(
            ReferenceGenome::from_short_name(name)
                .with_context(|| format!("unknown reference genome: {}", name))?,
        ),
        None => None,
    };

    let data = open_location(&config.source)?;
    let index = open_location(&config.index_location())?;
    tracing::info!("Opening {} with index {}", data.describe(), index.describe());

    let source = VariantSource::open(data, index, genome)
        .await
        .with_context(|| format!("failed to open {}", config.source))?;

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    if config.header {
        for line in source.header() {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        return Ok(());
    }

    let regions = config.all_regions();
    if regions.is_empty() {
        anyhow::bail!("no regions given");
    }

    let records = match source.variants_in_regions(&regions).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(kind = e.error_type(), "query failed: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("{} records in {} regions", records.len(), regions.len());

    for record in &records {
        if config.json {
            serde_json::to_writer(&mut out, record)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", record.line())?;
        }
    }
    out.flush()?;

    Ok(())
}
