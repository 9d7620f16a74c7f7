use rustc_hash::FxHashMap;
use thiserror::Error;

/// A single variant line from a VCF body, with the INFO column
/// decoded into a key/value map.
#[derive(Debug, Clone)]
pub struct VariantRecord {
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
    /// QUAL column; `None` when the column is `.` or not numeric.
    pub qual: Option<f64>,
    /// INFO key -> raw value. A flag token (no `=`) maps to an empty string.
    pub info: FxHashMap<String, String>,
    /// Derived from the source filename, never from file content.
    pub sample_id: String,
}

/// The DP/AC/AN annotations this pipeline cares about, parsed once.
/// Each field is `None` when the key is absent or its value is not numeric.
/// AC and AN are read as reals: AC may be fractional in this pipeline's
/// convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfoFields {
    pub depth: Option<i64>,
    pub allele_count: Option<f64>,
    pub allele_number: Option<f64>,
}

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("expected at least 8 tab-separated fields, found {0}")]
    TooFewFields(usize),
    #[error("position is not a positive integer: '{0}'")]
    InvalidPosition(String),
}

impl VariantRecord {
    /// Parse one VCF body line. Header lines (leading `#`) are the caller's
    /// job to skip; this only sees data rows.
    pub fn from_line(line: &str, sample_id: &str) -> Result<VariantRecord, ParseError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 8 {
            return Err(ParseError::TooFewFields(fields.len()));
        }
        let pos = match fields[1].parse::<u64>() {
            Ok(p) if p > 0 => p,
            _ => return Err(ParseError::InvalidPosition(fields[1].to_string())),
        };
        let qual = match fields[5] {
            "." => None,
            q => q.parse::<f64>().ok(),
        };
        Ok(VariantRecord {
            chrom: fields[0].to_string(),
            pos,
            reference: fields[3].to_string(),
            alternate: fields[4].to_string(),
            qual,
            info: parse_info(fields[7]),
            sample_id: sample_id.to_string(),
        })
    }

    /// Typed view of the DP/AC/AN annotations.
    pub fn info_fields(&self) -> InfoFields {
        InfoFields {
            depth: self.info.get("DP").and_then(|v| v.parse().ok()),
            allele_count: self.info.get("AC").and_then(|v| v.parse().ok()),
            allele_number: self.info.get("AN").and_then(|v| v.parse().ok()),
        }
    }
}

/// Split a `;`-delimited INFO column into key=value pairs. A token without
/// `=` is a flag and maps to an empty value.
fn parse_info(info: &str) -> FxHashMap<String, String> {
    let mut map = FxHashMap::default();
    for token in info.split(';') {
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((k, v)) => map.insert(k.to_string(), v.to_string()),
            None => map.insert(token.to_string(), String::new()),
        };
    }
    map
}
