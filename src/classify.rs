use std::fmt;

/// Classification of a substitution by chemical similarity of the swapped
/// bases. Defined only for single-character ACGT alleles; indels, multi-base
/// alleles and ambiguity codes are `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubstitutionClass {
    Transition,
    Transversion,
    Other,
}

impl fmt::Display for SubstitutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionClass::Transition => write!(f, "Transition"),
            SubstitutionClass::Transversion => write!(f, "Transversion"),
            SubstitutionClass::Other => write!(f, "Other"),
        }
    }
}

fn single_base(allele: &str) -> Option<char> {
    let mut chars = allele.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if matches!(c, 'A' | 'C' | 'G' | 'T') => Some(c),
        _ => None,
    }
}

/// Ordered rule table, first match wins:
/// 1. {A,G} in either direction -> Transition
/// 2. {C,T} in either direction -> Transition
/// 3. both alleles single-character ACGT -> Transversion
/// 4. otherwise -> Other
pub fn classify(reference: &str, alternate: &str) -> SubstitutionClass {
    let (r, a) = match (single_base(reference), single_base(alternate)) {
        (Some(r), Some(a)) => (r, a),
        _ => return SubstitutionClass::Other,
    };
    match (r, a) {
        ('A', 'G') | ('G', 'A') | ('C', 'T') | ('T', 'C') => SubstitutionClass::Transition,
        _ => SubstitutionClass::Transversion,
    }
}

/// Reporting label for a substitution, e.g. `A>G`.
pub fn substitution_label(reference: &str, alternate: &str) -> String {
    format!("{}>{}", reference, alternate)
}
