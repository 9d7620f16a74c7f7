use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info};
use rayon::prelude::*;

use crate::annotate::{annotate_sample, AnnotateStats};
use crate::filter::{filter_sample, FilterPolicy, FilterStats};
use crate::merge::{merge_tables, MergeStats};
use crate::summary::{read_unified_table, write_summaries};
use crate::PipelineError;

/// Name of the merged table inside the output directory.
pub const MERGED_TABLE: &str = "hq_allvariants.tsv";

/// Everything the pipeline needs, passed in explicitly. No path state is
/// shared implicitly between stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub policy: FilterPolicy,
    /// `None` leaves the rayon default (one thread per core).
    pub threads: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub sample_id: String,
    pub filter: FilterStats,
    pub annotate: AnnotateStats,
    pub hq_table: PathBuf,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub samples: Vec<SampleOutcome>,
    /// Samples whose filter/annotate stage failed; they are excluded from
    /// the merge but do not abort the run.
    pub failed_samples: Vec<String>,
    pub merge: MergeStats,
    pub merged_table: PathBuf,
}

/// Derive the sample id from a `<sample_id>.vcf.gz` file name.
pub fn sample_id_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".vcf.gz")?;
    if stem.is_empty() || stem.ends_with("_filtered") {
        return None;
    }
    Some(stem.to_string())
}

/// Find `*.vcf.gz` inputs under `input_dir`, ignoring filtered artifacts
/// from previous runs. Sorted by sample id so discovery order is stable.
pub fn discover_samples(input_dir: &Path) -> Result<Vec<(String, PathBuf)>, PipelineError> {
    if !input_dir.is_dir() {
        return Err(PipelineError::MissingInput(input_dir.to_path_buf()));
    }
    let mut samples = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        if let Some(sample_id) = sample_id_from_path(&path) {
            samples.push((sample_id, path));
        }
    }
    samples.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(samples)
}

/// Filter and annotate one sample, regenerating its artifacts from the
/// source file (idempotent overwrite).
pub fn process_sample(
    sample_id: &str,
    vcf: &Path,
    out_dir: &Path,
    policy: &FilterPolicy,
) -> Result<SampleOutcome, PipelineError> {
    let filtered = out_dir.join(format!("{}_filtered.vcf.gz", sample_id));
    let hq_table = out_dir.join(format!("{}_hq.tsv", sample_id));
    let filter = filter_sample(vcf, &filtered, sample_id, policy)?;
    let annotate = annotate_sample(&filtered, &hq_table, sample_id)?;
    Ok(SampleOutcome {
        sample_id: sample_id.to_string(),
        filter,
        annotate,
        hq_table,
    })
}

/// Run the whole pipeline: discover samples, fan out filter+annotate across
/// them, merge the per-sample tables deterministically, summarize.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    fs::create_dir_all(&config.output_dir)?;
    let samples = discover_samples(&config.input_dir)?;
    info!(
        "{} samples discovered in {}",
        samples.len(),
        config.input_dir.display()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads.unwrap_or(0))
        .build()
        .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;

    // per-sample stages are independent; the merge re-imposes order below
    let results: Vec<(String, Result<SampleOutcome, PipelineError>)> = pool.install(|| {
        samples
            .par_iter()
            .map(|(sample_id, vcf)| {
                let outcome = process_sample(sample_id, vcf, &config.output_dir, &config.policy);
                (sample_id.clone(), outcome)
            })
            .collect()
    });

    let mut outcomes = Vec::new();
    let mut failed_samples = Vec::new();
    for (sample_id, result) in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!("{}: sample failed, excluded from merge: {}", sample_id, e);
                failed_samples.push(sample_id);
            }
        }
    }

    let tables: Vec<(String, PathBuf)> = outcomes
        .iter()
        .map(|o| (o.sample_id.clone(), o.hq_table.clone()))
        .collect();
    let merged_table = config.output_dir.join(MERGED_TABLE);
    let merge = merge_tables(&tables, &merged_table)?;

    let rows = read_unified_table(&merged_table)?;
    write_summaries(&rows, &config.output_dir)?;

    Ok(PipelineReport {
        samples: outcomes,
        failed_samples,
        merge,
        merged_table,
    })
}
