use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use hqvar::filter::FilterPolicy;
use hqvar::merge::merge_tables;
use hqvar::pipeline::{self, PipelineConfig};
use hqvar::summary::{read_unified_table, write_summaries};
use hqvar::PipelineError;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(version, about = "Extract, merge and classify high-quality variants from per-sample VCFs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone, Copy)]
struct Thresholds {
    /// Minimum QUAL for a record to pass.
    #[arg(long, default_value_t = 30.0)]
    min_qual: f64,
    /// Minimum INFO/DP for a record to pass.
    #[arg(long, default_value_t = 10)]
    min_depth: i64,
    /// Minimum INFO/AC for a record to pass.
    #[arg(long, default_value_t = 0.05)]
    min_allele_count: f64,
}

impl From<Thresholds> for FilterPolicy {
    fn from(t: Thresholds) -> FilterPolicy {
        FilterPolicy {
            min_qual: t.min_qual,
            min_depth: t.min_depth,
            min_allele_count: t.min_allele_count,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Filter one sample's VCF and emit its filtered artifact, positional
    /// index and high-quality table.
    Filter {
        /// Input `<sample_id>.vcf.gz`; the sample id comes from the file name.
        vcf: PathBuf,
        /// Directory for `<sample_id>_filtered.vcf.gz` and `<sample_id>_hq.tsv`.
        #[arg(short, long)]
        output_dir: PathBuf,
        #[command(flatten)]
        thresholds: Thresholds,
    },
    /// Merge per-sample `_hq.tsv` tables into a single ordered table.
    Merge {
        /// Per-sample `<sample_id>_hq.tsv` tables.
        #[arg(required = true)]
        tables: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Summarize a merged table into per-sample counts and substitution classes.
    Summarize {
        table: PathBuf,
        #[arg(short, long)]
        output_dir: PathBuf,
    },
    /// Run the whole pipeline over a directory of `<sample_id>.vcf.gz` files.
    Run {
        input_dir: PathBuf,
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Worker threads for per-sample processing (default: one per core).
        #[arg(long)]
        threads: Option<usize>,
        #[command(flatten)]
        thresholds: Thresholds,
    },
}

fn table_sample_id(path: &Path) -> Result<String, PipelineError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix("_hq.tsv"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::BadSampleName(path.to_path_buf()))
}

fn main() -> Result<(), PipelineError> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Filter {
            vcf,
            output_dir,
            thresholds,
        } => {
            let sample_id = pipeline::sample_id_from_path(&vcf)
                .ok_or_else(|| PipelineError::BadSampleName(vcf.clone()))?;
            std::fs::create_dir_all(&output_dir)?;
            let outcome =
                pipeline::process_sample(&sample_id, &vcf, &output_dir, &thresholds.into())?;
            println!(
                "{}: {}/{} passed filter, {} high-quality rows",
                sample_id, outcome.filter.passed, outcome.filter.total, outcome.annotate.rows
            );
        }
        Commands::Merge { tables, output } => {
            let tables = tables
                .into_iter()
                .map(|p| Ok((table_sample_id(&p)?, p)))
                .collect::<Result<Vec<_>, PipelineError>>()?;
            let stats = merge_tables(&tables, &output)?;
            println!(
                "{} rows from {} samples -> {}",
                stats.rows,
                stats.samples_merged,
                output.display()
            );
        }
        Commands::Summarize { table, output_dir } => {
            std::fs::create_dir_all(&output_dir)?;
            let rows = read_unified_table(&table)?;
            write_summaries(&rows, &output_dir)?;
        }
        Commands::Run {
            input_dir,
            output_dir,
            threads,
            thresholds,
        } => {
            let report = pipeline::run(&PipelineConfig {
                input_dir,
                output_dir,
                policy: thresholds.into(),
                threads,
            })?;
            println!(
                "{} samples processed, {} failed, {} rows -> {}",
                report.samples.len(),
                report.failed_samples.len(),
                report.merge.rows,
                report.merged_table.display()
            );
        }
    }
    Ok(())
}
