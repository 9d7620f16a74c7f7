use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::{debug, info};

use crate::record::VariantRecord;
use crate::PipelineError;

/// Column header shared by the per-sample tables and the merged table.
pub const TSV_HEADER: &str = "CHROM\tPOS\tREF\tALT\tQUAL\tDP\tAF\tSAMPLE_ID";

/// The normalized row emitted for a record with a derivable allele frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRow {
    pub chrom: String,
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    pub qual: f64,
    pub depth: i64,
    /// AC / AN. Not re-validated: AC > AN passes through as a value > 1.
    pub allele_frequency: f64,
    pub sample_id: String,
}

impl AnnotatedRow {
    /// Derive a row from a filtered record. Returns `None` when DP, AC or AN
    /// is missing or non-numeric, when AN = 0, or when QUAL is absent: an
    /// incomplete annotation excludes the record from the high-quality set.
    pub fn from_record(record: &VariantRecord) -> Option<AnnotatedRow> {
        let qual = record.qual?;
        let fields = record.info_fields();
        let depth = fields.depth?;
        let ac = fields.allele_count?;
        let an = fields.allele_number?;
        if an == 0.0 {
            return None;
        }
        Some(AnnotatedRow {
            chrom: record.chrom.clone(),
            pos: record.pos,
            reference: record.reference.clone(),
            alternate: record.alternate.clone(),
            qual,
            depth,
            allele_frequency: ac / an,
            sample_id: record.sample_id.clone(),
        })
    }

    pub fn to_tsv(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.pos,
            self.reference,
            self.alternate,
            self.qual,
            self.depth,
            self.allele_frequency,
            self.sample_id
        )
    }

    /// Parse one data row of a table written by [`AnnotatedRow::to_tsv`].
    pub fn from_tsv(line: &str) -> Option<AnnotatedRow> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 8 {
            return None;
        }
        Some(AnnotatedRow {
            chrom: fields[0].to_string(),
            pos: fields[1].parse().ok()?,
            reference: fields[2].to_string(),
            alternate: fields[3].to_string(),
            qual: fields[4].parse().ok()?,
            depth: fields[5].parse().ok()?,
            allele_frequency: fields[6].parse().ok()?,
            sample_id: fields[7].to_string(),
        })
    }
}

/// Counts from one annotation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotateStats {
    pub rows: usize,
    /// Records that passed the filter but lacked a derivable AF.
    pub dropped_incomplete: usize,
    pub malformed: usize,
}

/// Read a `<sample>_filtered.vcf.gz` artifact and write `<sample>_hq.tsv`.
pub fn annotate_sample(
    filtered: &Path,
    out_table: &Path,
    sample_id: &str,
) -> Result<AnnotateStats, PipelineError> {
    if !filtered.exists() {
        return Err(PipelineError::MissingInput(filtered.to_path_buf()));
    }
    let reader = BufReader::new(MultiGzDecoder::new(File::open(filtered)?));
    let mut writer = BufWriter::new(File::create(out_table)?);
    writeln!(writer, "{}", TSV_HEADER)?;

    let mut stats = AnnotateStats::default();
    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        let record = match VariantRecord::from_line(&line, sample_id) {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: skipping malformed line: {}", sample_id, e);
                stats.malformed += 1;
                continue;
            }
        };
        match AnnotatedRow::from_record(&record) {
            Some(row) => {
                writeln!(writer, "{}", row.to_tsv())?;
                stats.rows += 1;
            }
            None => {
                debug!(
                    "{}: {}:{} dropped, incomplete DP/AC/AN annotation",
                    sample_id, record.chrom, record.pos
                );
                stats.dropped_incomplete += 1;
            }
        }
    }
    writer.flush()?;
    info!(
        "{}: {} high-quality rows ({} incomplete dropped)",
        sample_id, stats.rows, stats.dropped_incomplete
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> VariantRecord {
        VariantRecord::from_line(line, "S1").unwrap()
    }

    #[test]
    fn test_derive_row() {
        let rec = record("chr1\t100\t.\tA\tG\t35\tPASS\tDP=20;AC=0.1;AN=2");
        let row = AnnotatedRow::from_record(&rec).unwrap();
        assert_eq!(row.qual, 35.0);
        assert_eq!(row.depth, 20);
        assert!((row.allele_frequency - 0.05).abs() < 1e-12);
        assert_eq!(row.to_tsv(), "chr1\t100\tA\tG\t35\t20\t0.05\tS1");
    }

    #[test]
    fn test_an_zero_drops() {
        let rec = record("chr1\t100\t.\tA\tG\t35\tPASS\tDP=20;AC=0.1;AN=0");
        assert_eq!(AnnotatedRow::from_record(&rec), None);
    }

    #[test]
    fn test_missing_annotation_drops() {
        for info in ["AC=0.1;AN=2", "DP=20;AN=2", "DP=20;AC=0.1", "DP=20;AC=x;AN=2"] {
            let rec = record(&format!("chr1\t100\t.\tA\tG\t35\tPASS\t{}", info));
            assert_eq!(AnnotatedRow::from_record(&rec), None, "info={}", info);
        }
    }

    #[test]
    fn test_ac_above_an_passes_through() {
        let rec = record("chr1\t100\t.\tA\tG\t35\tPASS\tDP=20;AC=3;AN=2");
        let row = AnnotatedRow::from_record(&rec).unwrap();
        assert!((row.allele_frequency - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_tsv_round_trip() {
        let rec = record("chrX\t123456\t.\tAT\tA\t99.5\tPASS\tDP=44;AC=1;AN=2");
        let row = AnnotatedRow::from_record(&rec).unwrap();
        assert_eq!(AnnotatedRow::from_tsv(&row.to_tsv()), Some(row));
    }

    #[test]
    fn test_from_tsv_rejects_short_row() {
        assert_eq!(AnnotatedRow::from_tsv("chr1\t100\tA\tG"), None);
        assert_eq!(AnnotatedRow::from_tsv(TSV_HEADER), None);
    }
}
