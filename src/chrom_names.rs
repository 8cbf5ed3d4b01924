//! Chromosome name classification and ordering
//!

use std::cmp::Ordering;

use regex::Regex;

/// Chromosomes matching this pattern are eligible for discordant pair extraction
pub const DEFAULT_PRIMARY_CHROM_REGEX: &str = r"^(chr)?(\d{1,2}|X|Y|M|MT)$";

const MITOCHONDRIAL_NAMES: [&str; 4] = ["M", "MT", "chrM", "chrMT"];

pub fn is_mitochondrial(chrom: &str) -> bool {
    MITOCHONDRIAL_NAMES.contains(&chrom)
}

/// Selects the primary assembled chromosomes, excluding unplaced/unlocalized contigs, decoys and alts
///
pub struct PrimaryChromFilter {
    regex: Regex,
}

impl PrimaryChromFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_primary(&self, chrom: &str) -> bool {
        self.regex.is_match(chrom)
    }
}

impl Default for PrimaryChromFilter {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_PRIMARY_CHROM_REGEX).unwrap(),
        }
    }
}

/// Sort key for natural chromosome order: numbered autosomes first, then X, Y, mitochondria, then
/// everything else by name
///
fn chrom_sort_key(chrom: &str) -> (u8, u32) {
    let short_name = chrom.strip_prefix("chr").unwrap_or(chrom);
    if let Ok(n) = short_name.parse::<u32>() {
        return (0, n);
    }
    match short_name {
        "X" => (1, 0),
        "Y" => (2, 0),
        "M" | "MT" => (3, 0),
        _ => (4, 0),
    }
}

/// Compare chromosome names in natural order, so that chr2 < chr10 < chrX < chrY < chrM
///
pub fn compare_chrom_names(chrom1: &str, chrom2: &str) -> Ordering {
    chrom_sort_key(chrom1)
        .cmp(&chrom_sort_key(chrom2))
        .then_with(|| chrom1.cmp(chrom2))
}
