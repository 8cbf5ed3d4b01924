//! Alignment record values consumed by pair extraction, and their conversion from BAM records
//!

use rust_htslib::bam::record::{Aux, Cigar};
use rust_htslib::{bam, htslib};

use crate::errors::PairClusterError;

/// Aligner's pair classification tag
pub const PAIR_CLASSIFICATION_AUX_TAG: &[u8] = b"ZP";

const READ_GROUP_AUX_TAG: &[u8] = b"RG";

const FLAG_PAIRED: u16 = htslib::BAM_FPAIRED as u16;
const FLAG_MATE_UNMAPPED: u16 = htslib::BAM_FMUNMAP as u16;
const FLAG_REVERSE: u16 = htslib::BAM_FREVERSE as u16;
const FLAG_MATE_REVERSE: u16 = htslib::BAM_FMREVERSE as u16;
const FLAG_SECOND_IN_PAIR: u16 = htslib::BAM_FREAD2 as u16;
const FLAG_DUPLICATE: u16 = htslib::BAM_FDUP as u16;
const FLAG_QC_FAIL: u16 = htslib::BAM_FQCFAIL as u16;

/// Records with any of these flags are never considered as discordant pair evidence
const FLAG_FILTER: u16 = (htslib::BAM_FUNMAP
    | htslib::BAM_FSECONDARY
    | htslib::BAM_FQCFAIL
    | htslib::BAM_FSUPPLEMENTARY) as u16;

pub fn is_duplicate_flag(flags: u16) -> bool {
    (flags & FLAG_DUPLICATE) != 0
}

pub fn is_qc_fail_flag(flags: u16) -> bool {
    (flags & FLAG_QC_FAIL) != 0
}

/// The subset of one alignment record needed to build discordant mate pairs
///
#[derive(Clone, Debug, Default)]
pub struct AlignedRecord {
    pub qname: String,
    pub read_group: Option<String>,
    pub chrom: String,
    pub mate_chrom: String,

    /// 1-indexed alignment start
    pub start: i64,

    /// 1-indexed, inclusive alignment end
    pub end: i64,

    /// 1-indexed mate alignment start
    pub mate_start: i64,

    pub flags: u16,
    pub mapq: u8,

    /// Value of the pair classification aux tag, if present
    pub pair_tag: Option<String>,
}

impl AlignedRecord {
    /// Read name qualified by read group, so that identical names from different lanes are distinct
    ///
    pub fn read_name(&self) -> String {
        match &self.read_group {
            Some(rg) => format!("{}:{}", self.qname, rg),
            None => self.qname.clone(),
        }
    }

    pub fn is_paired(&self) -> bool {
        (self.flags & FLAG_PAIRED) != 0
    }

    pub fn is_mate_unmapped(&self) -> bool {
        (self.flags & FLAG_MATE_UNMAPPED) != 0
    }

    pub fn is_reverse(&self) -> bool {
        (self.flags & FLAG_REVERSE) != 0
    }

    pub fn is_mate_reverse(&self) -> bool {
        (self.flags & FLAG_MATE_REVERSE) != 0
    }

    pub fn is_second_in_pair(&self) -> bool {
        (self.flags & FLAG_SECOND_IN_PAIR) != 0
    }

    /// Check if the record should be skipped before any pair evidence checks
    ///
    pub fn is_filtered(&self) -> bool {
        (self.flags & FLAG_FILTER) != 0
    }

    /// Convert a BAM record, looking up chromosome names in `header`
    ///
    pub fn from_bam_record(
        record: &bam::Record,
        header: &bam::HeaderView,
    ) -> Result<Self, PairClusterError> {
        let qname = String::from_utf8_lossy(record.qname()).to_string();

        let chrom_name = |tid: i32| {
            if tid < 0 {
                String::new()
            } else {
                String::from_utf8_lossy(header.tid2name(tid as u32)).to_string()
            }
        };

        Ok(Self {
            read_group: get_optional_string_aux_tag(record, READ_GROUP_AUX_TAG, &qname)?,
            pair_tag: get_optional_string_aux_tag(record, PAIR_CLASSIFICATION_AUX_TAG, &qname)?,
            chrom: chrom_name(record.tid()),
            mate_chrom: chrom_name(record.mtid()),
            start: record.pos() + 1,
            end: get_alignment_end(record),
            mate_start: record.mpos() + 1,
            flags: record.flags(),
            mapq: record.mapq(),
            qname,
        })
    }
}

/// Retrieve a string aux tag from a bam record
///
/// A tag with a non-string value is reported as an error
///
fn get_optional_string_aux_tag(
    record: &bam::Record,
    aux_tag: &[u8],
    qname: &str,
) -> Result<Option<String>, PairClusterError> {
    match record.aux(aux_tag) {
        Ok(Aux::String(val)) => Ok(Some(val.to_string())),
        Ok(aux_val) => Err(PairClusterError::AlignmentInput(format!(
            "Unexpected {} tag format in read {qname}: {:?}",
            String::from_utf8_lossy(aux_tag),
            aux_val
        ))),
        Err(_) => Ok(None),
    }
}

/// Report the 1-indexed inclusive end position of an alignment
///
fn get_alignment_end(record: &bam::Record) -> i64 {
    let ref_span = record
        .cigar()
        .iter()
        .map(|c| match c {
            Cigar::Del(len)
            | Cigar::RefSkip(len)
            | Cigar::Diff(len)
            | Cigar::Equal(len)
            | Cigar::Match(len) => *len as i64,
            _ => 0,
        })
        .sum::<i64>();
    record.pos() + ref_span.max(1)
}
