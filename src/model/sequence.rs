//! Nucleotide sequence helpers.

/// Watson-Crick complement of one base. Case is preserved; anything outside
/// `ACGTN` complements to `N`.
pub fn complement(base: char) -> char {
    match base {
        'A' => 'T',
        'C' => 'G',
        'G' => 'C',
        'T' => 'A',
        'a' => 't',
        'c' => 'g',
        'g' => 'c',
        't' => 'a',
        'n' => 'n',
        _ => 'N',
    }
}

pub fn reverse_complement(seq: &str) -> String {
    seq.chars().rev().map(complement).collect()
}
