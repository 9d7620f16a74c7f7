use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use tempfile::NamedTempFile;

use crate::annotate::TSV_HEADER;
use crate::PipelineError;

#[derive(Debug, Default, Clone)]
pub struct MergeStats {
    pub samples_merged: usize,
    pub rows: usize,
    /// Samples whose per-sample table was absent at merge time.
    pub samples_missing: Vec<String>,
}

/// Concatenate per-sample tables into one table with a single header.
///
/// Samples are ordered lexicographically by sample id and within-sample row
/// order is preserved, so re-running over the same inputs is byte-identical.
/// A missing per-sample table drops that sample's contribution with a
/// warning; the merge continues. Zero data rows still yields a header-only
/// table. The result is written to a temporary file in the destination
/// directory and renamed into place, so a concurrent reader never observes
/// a partial merge.
pub fn merge_tables(
    tables: &[(String, PathBuf)],
    output: &Path,
) -> Result<MergeStats, PipelineError> {
    let mut tables: Vec<&(String, PathBuf)> = tables.iter().collect();
    tables.sort_by(|a, b| a.0.cmp(&b.0));

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut stats = MergeStats::default();
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writeln!(writer, "{}", TSV_HEADER)?;
        for (sample_id, path) in tables {
            if !path.exists() {
                warn!("{}: table {} missing, sample skipped", sample_id, path.display());
                stats.samples_missing.push(sample_id.clone());
                continue;
            }
            let reader = BufReader::new(File::open(path)?);
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                // each per-sample table carries its own header on line 1;
                // the merged table gets exactly one
                if i == 0 {
                    continue;
                }
                writeln!(writer, "{}", line)?;
                stats.rows += 1;
            }
            stats.samples_merged += 1;
        }
        writer.flush()?;
    }
    tmp.persist(output).map_err(|e| PipelineError::Publish {
        path: output.to_path_buf(),
        source: e.error,
    })?;
    info!(
        "merged {} rows from {} samples into {}",
        stats.rows,
        stats.samples_merged,
        output.display()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_table(path: &Path, rows: &[&str]) {
        let mut body = String::from(TSV_HEADER);
        for r in rows {
            body.push('\n');
            body.push_str(r);
        }
        body.push('\n');
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_merge_orders_samples_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = dir.path().join("S1_hq.tsv");
        let s2 = dir.path().join("S2_hq.tsv");
        write_table(
            &s1,
            &[
                "chr1\t100\tA\tG\t35\t20\t0.05\tS1",
                "chr2\t250\tC\tT\t40\t30\t0.25\tS1",
            ],
        );
        write_table(
            &s2,
            &[
                "chr1\t100\tA\tG\t50\t25\t0.5\tS2",
                "chr3\t10\tG\tC\t60\t12\t0.5\tS2",
                "chr3\t20\tT\tA\t31\t11\t0.1\tS2",
            ],
        );
        let out = dir.path().join("hq_allvariants.tsv");

        // pass in discovery order S2 before S1; merge must re-order
        let stats = merge_tables(
            &[("S2".to_string(), s2.clone()), ("S1".to_string(), s1.clone())],
            &out,
        )
        .unwrap();
        assert_eq!(stats.samples_merged, 2);
        assert_eq!(stats.rows, 5);
        assert!(stats.samples_missing.is_empty());

        let body = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], TSV_HEADER);
        assert!(lines[1].ends_with("S1"));
        assert!(lines[2].ends_with("S1"));
        assert!(lines[3].ends_with("S2"));
        assert!(lines[5].ends_with("S2"));

        // idempotent: merging the same inputs again is byte-identical
        merge_tables(
            &[("S1".to_string(), s1), ("S2".to_string(), s2)],
            &out,
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), body);
    }

    #[test]
    fn test_merge_tolerates_missing_sample() {
        let dir = tempfile::tempdir().unwrap();
        let s1 = dir.path().join("S1_hq.tsv");
        write_table(&s1, &["chr1\t100\tA\tG\t35\t20\t0.05\tS1"]);
        let out = dir.path().join("hq_allvariants.tsv");

        let stats = merge_tables(
            &[
                ("S1".to_string(), s1),
                ("S9".to_string(), dir.path().join("S9_hq.tsv")),
            ],
            &out,
        )
        .unwrap();
        assert_eq!(stats.samples_merged, 1);
        assert_eq!(stats.samples_missing, vec!["S9".to_string()]);
        assert_eq!(stats.rows, 1);
    }

    #[test]
    fn test_empty_merge_is_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hq_allvariants.tsv");
        let stats = merge_tables(&[], &out).unwrap();
        assert_eq!(stats.rows, 0);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            format!("{}\n", TSV_HEADER)
        );
    }
}
