use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};

use crate::record::VariantRecord;
use crate::PipelineError;

/// Inclusion thresholds for the high-quality set.
#[derive(Debug, Clone, Copy)]
pub struct FilterPolicy {
    pub min_qual: f64,
    pub min_depth: i64,
    /// Compared against the raw AC value. The source pipeline defined this
    /// threshold against AC even though it reads like a frequency cutoff;
    /// the comparison is kept as-is.
    pub min_allele_count: f64,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy {
            min_qual: 30.0,
            min_depth: 10,
            min_allele_count: 0.05,
        }
    }
}

impl FilterPolicy {
    /// All three thresholds must hold. A missing or non-numeric field fails
    /// the record; that is an exclusion, not an error.
    pub fn passes(&self, record: &VariantRecord) -> bool {
        let qual = match record.qual {
            Some(q) => q,
            None => return false,
        };
        if qual < self.min_qual {
            return false;
        }
        let fields = record.info_fields();
        match (fields.depth, fields.allele_count) {
            (Some(dp), Some(ac)) => dp >= self.min_depth && ac >= self.min_allele_count,
            _ => false,
        }
    }
}

/// Per-sample counts from one filtering pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterStats {
    /// Data lines seen (header lines excluded).
    pub total: usize,
    /// Lines that failed to parse and were skipped.
    pub malformed: usize,
    /// Records parsed but below one or more thresholds.
    pub failed: usize,
    pub passed: usize,
}

// One chromosome's run of passing records, in file order.
struct ChromExtent {
    chrom: String,
    first_pos: u64,
    last_pos: u64,
    records: u64,
}

/// Filter one sample's `.vcf.gz` into `<output>`, copying header lines
/// through unchanged, and write a positional-lookup index next to it
/// (`<output>.idx`: chromosome, first position, last position, record count).
pub fn filter_sample(
    input: &Path,
    output: &Path,
    sample_id: &str,
    policy: &FilterPolicy,
) -> Result<FilterStats, PipelineError> {
    if !input.exists() {
        return Err(PipelineError::MissingInput(input.to_path_buf()));
    }
    let reader = BufReader::new(MultiGzDecoder::new(File::open(input)?));
    let mut writer = GzEncoder::new(
        BufWriter::new(File::create(output)?),
        Compression::default(),
    );

    let mut stats = FilterStats::default();
    let mut extents: Vec<ChromExtent> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.starts_with('#') {
            writeln!(writer, "{}", line)?;
            continue;
        }
        stats.total += 1;
        let record = match VariantRecord::from_line(&line, sample_id) {
            Ok(r) => r,
            Err(e) => {
                debug!("{}: skipping malformed line: {}", sample_id, e);
                stats.malformed += 1;
                continue;
            }
        };
        if !policy.passes(&record) {
            stats.failed += 1;
            continue;
        }
        stats.passed += 1;
        writeln!(writer, "{}", line)?;
        match extents.last_mut() {
            Some(e) if e.chrom == record.chrom => {
                e.last_pos = record.pos;
                e.records += 1;
            }
            _ => extents.push(ChromExtent {
                chrom: record.chrom.clone(),
                first_pos: record.pos,
                last_pos: record.pos,
                records: 1,
            }),
        }
    }
    writer.finish()?.flush()?;

    write_region_index(&index_path(output), &extents)?;
    info!(
        "{}: {}/{} records passed filter ({} malformed skipped)",
        sample_id, stats.passed, stats.total, stats.malformed
    );
    Ok(stats)
}

/// Index artifact path for a filtered file: `<filtered>.idx`.
pub fn index_path(filtered: &Path) -> PathBuf {
    let mut name = filtered.as_os_str().to_os_string();
    name.push(".idx");
    PathBuf::from(name)
}

fn write_region_index(path: &Path, extents: &[ChromExtent]) -> Result<(), PipelineError> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "CHROM\tFIRST_POS\tLAST_POS\tN_RECORDS")?;
    for e in extents {
        writeln!(w, "{}\t{}\t{}\t{}", e.chrom, e.first_pos, e.last_pos, e.records)?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn record(line: &str) -> VariantRecord {
        VariantRecord::from_line(line, "S1").unwrap()
    }

    #[test]
    fn test_passing_record() {
        let rec = record("chr1\t100\t.\tA\tG\t35\tPASS\tDP=20;AC=0.1;AN=2");
        assert!(FilterPolicy::default().passes(&rec));
    }

    #[test]
    fn test_low_qual_fails() {
        let rec = record("chr2\t200\t.\tA\tT\t25\tPASS\tDP=15;AC=0.2;AN=2");
        assert!(!FilterPolicy::default().passes(&rec));
    }

    #[test]
    fn test_boundary_values_pass() {
        let rec = record("chr1\t100\t.\tA\tG\t30\tPASS\tDP=10;AC=0.05;AN=2");
        assert!(FilterPolicy::default().passes(&rec));
    }

    #[test]
    fn test_low_depth_fails() {
        let rec = record("chr1\t100\t.\tA\tG\t35\tPASS\tDP=9;AC=0.1;AN=2");
        assert!(!FilterPolicy::default().passes(&rec));
    }

    #[test]
    fn test_low_allele_count_fails() {
        let rec = record("chr1\t100\t.\tA\tG\t35\tPASS\tDP=20;AC=0.04;AN=2");
        assert!(!FilterPolicy::default().passes(&rec));
    }

    #[test]
    fn test_missing_fields_fail() {
        for info in ["AC=0.1;AN=2", "DP=20;AN=2", "DP=abc;AC=0.1"] {
            let rec = record(&format!("chr1\t100\t.\tA\tG\t35\tPASS\t{}", info));
            assert!(!FilterPolicy::default().passes(&rec), "info={}", info);
        }
    }

    #[test]
    fn test_missing_qual_fails() {
        let rec = record("chr1\t100\t.\tA\tG\t.\tPASS\tDP=20;AC=0.1;AN=2");
        assert!(!FilterPolicy::default().passes(&rec));
    }

    fn write_gz(path: &Path, contents: &str) {
        let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        enc.write_all(contents.as_bytes()).unwrap();
        enc.finish().unwrap();
    }

    #[test]
    fn test_filter_sample_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("S1.vcf.gz");
        let output = dir.path().join("S1_filtered.vcf.gz");
        write_gz(
            &input,
            "##fileformat=VCFv4.2\n\
             #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
             chr1\t100\t.\tA\tG\t35\tPASS\tDP=20;AC=0.1;AN=2\n\
             chr1\t150\tbroken\n\
             chr2\t200\t.\tA\tT\t25\tPASS\tDP=15;AC=0.2;AN=2\n\
             chr2\t250\t.\tC\tT\t40\tPASS\tDP=30;AC=0.5;AN=2\n",
        );

        let stats = filter_sample(&input, &output, "S1", &FilterPolicy::default()).unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.passed, 2);

        let mut body = String::new();
        MultiGzDecoder::new(File::open(&output).unwrap())
            .read_to_string(&mut body)
            .unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4); // 2 header + 2 passing
        assert!(lines[0].starts_with("##"));
        assert!(lines[2].starts_with("chr1\t100"));
        assert!(lines[3].starts_with("chr2\t250"));

        let idx = std::fs::read_to_string(index_path(&output)).unwrap();
        let idx_lines: Vec<&str> = idx.lines().collect();
        assert_eq!(idx_lines[0], "CHROM\tFIRST_POS\tLAST_POS\tN_RECORDS");
        assert_eq!(idx_lines[1], "chr1\t100\t100\t1");
        assert_eq!(idx_lines[2], "chr2\t250\t250\t1");
    }

    #[test]
    fn test_filter_sample_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = filter_sample(
            &dir.path().join("absent.vcf.gz"),
            &dir.path().join("out.vcf.gz"),
            "S1",
            &FilterPolicy::default(),
        );
        assert!(matches!(err, Err(PipelineError::MissingInput(_))));
    }
}
