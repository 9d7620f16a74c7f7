use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{info, warn};

use crate::annotate::AnnotatedRow;
use crate::classify::{classify, substitution_label, SubstitutionClass};
use crate::PipelineError;

/// Per-sample qualifying-variant total.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSummary {
    pub sample_id: String,
    pub total: usize,
}

/// Per-sample, per-class count and proportion. A class with zero rows for a
/// sample is absent, not zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub sample_id: String,
    pub class: SubstitutionClass,
    /// Distinct `REF>ALT` labels observed in this class, sorted.
    pub substitutions: Vec<String>,
    pub count: usize,
    /// count / sample total * 100.
    pub percent: f64,
}

/// Load a merged table back into rows. Unparseable data rows are skipped
/// with a warning; the merged table is our own artifact, so any appearing
/// here indicates outside interference, not a pipeline error.
pub fn read_unified_table(path: &Path) -> Result<Vec<AnnotatedRow>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if i == 0 {
            continue; // header
        }
        match AnnotatedRow::from_tsv(&line) {
            Some(row) => rows.push(row),
            None => warn!("{}: skipping unparseable row {}", path.display(), i + 1),
        }
    }
    Ok(rows)
}

/// Group by sample id and count rows. Output is sorted by sample id.
pub fn sample_totals(rows: &[AnnotatedRow]) -> Vec<SampleSummary> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    for row in rows {
        *totals.entry(&row.sample_id).or_default() += 1;
    }
    totals
        .into_iter()
        .map(|(sample_id, total)| SampleSummary {
            sample_id: sample_id.to_string(),
            total,
        })
        .collect()
}

/// Group by sample id then substitution class. Output is sorted by sample
/// id, then Transition < Transversion < Other.
pub fn class_breakdown(rows: &[AnnotatedRow]) -> Vec<ClassSummary> {
    let mut totals: BTreeMap<&str, usize> = BTreeMap::new();
    let mut groups: BTreeMap<(&str, SubstitutionClass), (usize, BTreeSet<String>)> =
        BTreeMap::new();
    for row in rows {
        *totals.entry(&row.sample_id).or_default() += 1;
        let class = classify(&row.reference, &row.alternate);
        let entry = groups
            .entry((&row.sample_id, class))
            .or_insert_with(|| (0, BTreeSet::new()));
        entry.0 += 1;
        entry
            .1
            .insert(substitution_label(&row.reference, &row.alternate));
    }
    groups
        .into_iter()
        .map(|((sample_id, class), (count, labels))| ClassSummary {
            sample_id: sample_id.to_string(),
            class,
            substitutions: labels.into_iter().collect(),
            count,
            percent: count as f64 / totals[sample_id] as f64 * 100.0,
        })
        .collect()
}

/// Write `sample_counts.tsv` and `class_counts.tsv` under `out_dir`.
/// Summaries are recomputed from the rows in full on every call.
pub fn write_summaries(rows: &[AnnotatedRow], out_dir: &Path) -> Result<(), PipelineError> {
    let totals = sample_totals(rows);
    let mut writer = BufWriter::new(File::create(out_dir.join("sample_counts.tsv"))?);
    writeln!(writer, "SAMPLE_ID\tN_VARIANTS")?;
    for s in &totals {
        writeln!(writer, "{}\t{}", s.sample_id, s.total)?;
    }
    writer.flush()?;

    let breakdown = class_breakdown(rows);
    let mut writer = BufWriter::new(File::create(out_dir.join("class_counts.tsv"))?);
    writeln!(writer, "SAMPLE_ID\tCLASS\tSUBSTITUTIONS\tCOUNT\tPERCENT")?;
    for c in &breakdown {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{:.2}",
            c.sample_id,
            c.class,
            c.substitutions.join(","),
            c.count,
            c.percent
        )?;
    }
    writer.flush()?;

    info!(
        "summaries for {} samples written to {}",
        totals.len(),
        out_dir.display()
    );
    Ok(())
}
