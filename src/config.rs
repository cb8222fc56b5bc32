use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "vcfseek")]
#[command(about = "Query regions of a bgzip-compressed, tabix-indexed VCF file")]
pub struct Config {
    /// Path or http(s) URL of the .vcf.gz file
    pub source: String,

    /// Regions to query (contig, contig:pos or contig:pos-end)
    pub regions: Vec<String>,

    /// Additional region to query, may be repeated
    #[arg(short, long = "region")]
    pub region: Vec<String>,

    /// Path or URL of the tabix index (defaults to <source>.tbi)
    #[arg(short, long, env = "VCFSEEK_INDEX")]
    pub index: Option<String>,

    /// Reference genome (hg19, b37, hg38), inferred from the header if unset
    #[arg(short, long, env = "VCFSEEK_GENOME")]
    pub genome: Option<String>,

    /// Print the header lines instead of records
    #[arg(long)]
    pub header: bool,

    /// Print records as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,
}

impl Config {
    pub fn index_location(&self) -> String {
        self.index
            .clone()
            .unwrap_or_else(|| format!("{}.tbi", self.source))
    }

    /// Positional and `--region` regions, in that order.
    pub fn all_regions(&self) -> Vec<String> {
        self.regions.iter().chain(&self.region).cloned().collect()
    }
}
