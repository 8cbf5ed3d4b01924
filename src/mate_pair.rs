//! Discordant mate pair records and their line serialization
//!

use std::cmp::Ordering;

use strum::{Display, EnumIter};

use crate::alignment_record::AlignedRecord;
use crate::chrom_names::compare_chrom_names;
use crate::errors::PairClusterError;
use crate::int_range::{IntRange, range_overlap};
use crate::pair_signature::{
    OrientationCategory, PairSignature, PairingType, get_orientation_category,
};

/// Number of fields in a serialized mate pair line
const PAIR_LINE_FIELD_COUNT: usize = 15;

/// One aligned read of a discordant pair
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MateEndpoint {
    pub read_name: String,
    pub chrom: String,

    /// 1-indexed, inclusive
    pub start: i64,

    /// 1-indexed, inclusive
    pub end: i64,

    /// Pair classification tag as stored with this mate
    pub signature_tag: String,

    /// SAM flags of the mate's alignment record
    pub flags: u16,

    pub is_reverse: bool,
}

impl MateEndpoint {
    fn from_record(record: &AlignedRecord, signature_tag: &str) -> Self {
        Self {
            read_name: record.read_name(),
            chrom: record.chrom.clone(),
            start: record.start,
            end: record.end,
            signature_tag: signature_tag.to_string(),
            flags: record.flags,
            is_reverse: record.is_reverse(),
        }
    }

    pub fn range(&self) -> IntRange {
        IntRange::from_pair(self.start, self.end)
    }

    pub fn strand_char(&self) -> char {
        if self.is_reverse { '-' } else { '+' }
    }

    /// True if either end of the mate alignment falls inside `range`
    ///
    pub fn touches(&self, range: &IntRange) -> bool {
        range.contains_pos(self.start) || range.contains_pos(self.end)
    }
}

/// Strands of the left and right mates
///
#[derive(Clone, Copy, Debug, Display, EnumIter, Eq, Hash, PartialEq)]
pub enum StrandOrientation {
    #[strum(to_string = "+/+")]
    ForwardForward,
    #[strum(to_string = "-/-")]
    ReverseReverse,
    #[strum(to_string = "+/-")]
    ForwardReverse,
    #[strum(to_string = "-/+")]
    ReverseForward,
}

impl StrandOrientation {
    pub fn from_mates(left_is_reverse: bool, right_is_reverse: bool) -> Self {
        match (left_is_reverse, right_is_reverse) {
            (false, false) => Self::ForwardForward,
            (true, true) => Self::ReverseReverse,
            (false, true) => Self::ForwardReverse,
            (true, false) => Self::ReverseForward,
        }
    }
}

/// Two mate alignments of one discordant read pair, in canonical left/right order
///
/// Mates on the same chromosome are ordered by start position, mates on different chromosomes
/// by natural chromosome order.
///
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MatePair {
    pub read_name: String,
    pub signature: PairSignature,
    pub left: MateEndpoint,
    pub right: MateEndpoint,

    /// Strand and read-number pattern of the pair, such as "F2F1"
    pub pair_order: String,
}

/// Build the pair order string from the record assigned to the left side of the pair
///
fn get_pair_order(record: &AlignedRecord) -> String {
    let first = if record.is_reverse() { 'R' } else { 'F' };
    let second = if record.is_mate_reverse() { 'R' } else { 'F' };
    let (pair1, pair2) = if record.is_second_in_pair() {
        (2, 1)
    } else {
        (1, 2)
    };
    format!("{first}{pair1}{second}{pair2}")
}

fn is_out_of_order(left: &MateEndpoint, right: &MateEndpoint) -> bool {
    if left.chrom == right.chrom {
        left.start > right.start
    } else {
        compare_chrom_names(&left.chrom, &right.chrom) == Ordering::Greater
    }
}

fn parse_bool(line: &str, field: &str) -> Result<bool, PairClusterError> {
    if field.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if field.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(PairClusterError::malformed(
            line,
            format!("invalid strand field '{field}'"),
        ))
    }
}

fn parse_int<T: std::str::FromStr>(
    line: &str,
    field: &str,
    label: &str,
) -> Result<T, PairClusterError> {
    field
        .parse::<T>()
        .map_err(|_| PairClusterError::malformed(line, format!("invalid {label} '{field}'")))
}

fn parse_endpoint(line: &str, fields: &[&str]) -> Result<MateEndpoint, PairClusterError> {
    let endpoint = MateEndpoint {
        read_name: fields[0].to_string(),
        chrom: fields[1].to_string(),
        start: parse_int(line, fields[2], "start")?,
        end: parse_int(line, fields[3], "end")?,
        signature_tag: fields[4].to_string(),
        flags: parse_int(line, fields[5], "flags")?,
        is_reverse: parse_bool(line, fields[6])?,
    };
    if endpoint.read_name.is_empty() || endpoint.chrom.is_empty() {
        return Err(PairClusterError::malformed(line, "empty read or chromosome name"));
    }
    if endpoint.end < endpoint.start {
        return Err(PairClusterError::malformed(line, "mate end precedes start"));
    }
    Ok(endpoint)
}

fn write_endpoint_fields(endpoint: &MateEndpoint, delimiter: char, line: &mut String) {
    use std::fmt::Write;
    write!(
        line,
        "{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}{}{d}",
        endpoint.read_name,
        endpoint.chrom,
        endpoint.start,
        endpoint.end,
        endpoint.signature_tag,
        endpoint.flags,
        endpoint.is_reverse,
        d = delimiter
    )
    .unwrap();
}

impl MatePair {
    /// Create a pair from the two alignment records of one read pair
    ///
    /// `signature` is taken from the first record's pair classification tag, or is `Cxx` for mates
    /// on different chromosomes. The records may be given in either order.
    ///
    pub fn from_records(
        first: &AlignedRecord,
        second: &AlignedRecord,
        signature: PairSignature,
    ) -> Result<Self, PairClusterError> {
        let read_name = first.read_name();
        let mate_name = second.read_name();
        if read_name != mate_name {
            return Err(PairClusterError::MateMismatch {
                left: read_name,
                right: mate_name,
            });
        }

        // Interchromosomal pairs are stored as Cxx whatever tag the aligner assigned
        let tag = |record: &AlignedRecord| match &record.pair_tag {
            Some(x) if !signature.is_cross_chrom() => x.clone(),
            _ => signature.to_string(),
        };
        let left = MateEndpoint::from_record(first, &tag(first));
        let right = MateEndpoint::from_record(second, &tag(second));
        let (left, right, left_record) = if is_out_of_order(&left, &right) {
            (right, left, second)
        } else {
            (left, right, first)
        };

        Ok(Self {
            read_name,
            signature,
            left,
            right,
            pair_order: get_pair_order(left_record),
        })
    }

    /// Parse a pair from its comma-delimited bucket line
    ///
    pub fn from_line(line: &str) -> Result<Self, PairClusterError> {
        Self::from_delimited(line, ',')
    }

    fn from_delimited(line: &str, delimiter: char) -> Result<Self, PairClusterError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(delimiter).collect::<Vec<_>>();

        // Tolerate a trailing delimiter
        while fields.len() > PAIR_LINE_FIELD_COUNT && fields.last().is_some_and(|x| x.is_empty())
        {
            fields.pop();
        }
        if fields.len() != PAIR_LINE_FIELD_COUNT {
            return Err(PairClusterError::malformed(
                line,
                format!(
                    "expected {PAIR_LINE_FIELD_COUNT} fields, found {}",
                    fields.len()
                ),
            ));
        }

        let left = parse_endpoint(line, &fields[0..7])?;
        let right = parse_endpoint(line, &fields[7..14])?;
        if left.read_name != right.read_name {
            return Err(PairClusterError::malformed(line, "mate read names differ"));
        }

        let signature = match PairSignature::from_tag(&left.signature_tag) {
            Some(x) => x,
            None => {
                return Err(PairClusterError::malformed(
                    line,
                    format!("unknown pair signature '{}'", left.signature_tag),
                ));
            }
        };

        let pair_order = fields[14].to_string();
        if pair_order.len() != 4 {
            return Err(PairClusterError::malformed(
                line,
                format!("invalid pair order '{pair_order}'"),
            ));
        }

        let (left, right) = if is_out_of_order(&left, &right) {
            (right, left)
        } else {
            (left, right)
        };

        Ok(Self {
            read_name: left.read_name.clone(),
            signature,
            left,
            right,
            pair_order,
        })
    }

    fn to_delimited(&self, delimiter: char) -> String {
        let mut line = String::new();
        write_endpoint_fields(&self.left, delimiter, &mut line);
        write_endpoint_fields(&self.right, delimiter, &mut line);
        line.push_str(&self.pair_order);
        line
    }

    /// Comma-delimited bucket line, without a line terminator
    ///
    pub fn to_line(&self) -> String {
        self.to_delimited(',')
    }

    /// Tab-delimited line used when writing cluster members
    ///
    pub fn to_cluster_line(&self) -> String {
        self.to_delimited('\t')
    }

    /// Report line with per-mate strand symbols and the SV types consistent with the signature
    ///
    pub fn to_verbose_line(&self) -> String {
        let endpoint = |m: &MateEndpoint| {
            format!(
                "{},{},{},{},{},{}",
                m.read_name,
                m.chrom,
                m.start,
                m.end,
                m.flags,
                m.strand_char()
            )
        };
        format!(
            "{},{},{},{},{}",
            endpoint(&self.left),
            endpoint(&self.right),
            self.pair_order,
            self.signature.sv_type_label(),
            self.signature
        )
    }

    pub fn is_same_chrom(&self) -> bool {
        self.left.chrom == self.right.chrom
    }

    /// Bucket grouping key for the chromosomes of this pair, such as "chr7" or "chr4-chr15"
    ///
    pub fn chrom_pair_key(&self) -> String {
        get_chrom_pair_key(&self.left.chrom, &self.right.chrom)
    }

    /// Strand orientation of the two mates, displayed as "+/-" etc.
    ///
    pub fn strand_orientation(&self) -> StrandOrientation {
        StrandOrientation::from_mates(self.left.is_reverse, self.right.is_reverse)
    }

    /// True if both mates are on the same chromosome and their alignments share a position
    ///
    pub fn has_overlap(&self) -> bool {
        self.is_same_chrom() && range_overlap(&self.left.range(), &self.right.range())
    }

    pub fn orientation_category(&self, pairing_type: PairingType) -> Option<OrientationCategory> {
        get_orientation_category(self.signature, &self.pair_order, pairing_type)
    }
}

pub fn get_chrom_pair_key(left_chrom: &str, right_chrom: &str) -> String {
    if left_chrom == right_chrom {
        left_chrom.to_string()
    } else {
        format!("{left_chrom}-{right_chrom}")
    }
}

/// Mate pair coordinates used as sort keys
///
#[derive(Clone, Copy)]
pub enum PairSortKey {
    LeftStart,
    LeftEnd,
    RightStart,
    RightEnd,
}

impl PairSortKey {
    pub fn value(&self, pair: &MatePair) -> i64 {
        match self {
            PairSortKey::LeftStart => pair.left.start,
            PairSortKey::LeftEnd => pair.left.end,
            PairSortKey::RightStart => pair.right.start,
            PairSortKey::RightEnd => pair.right.end,
        }
    }
}

/// Stable sort of mate pairs on one coordinate
///
pub fn sort_mate_pairs(pairs: &mut [MatePair], key: PairSortKey) {
    pairs.sort_by_key(|x| key.value(x));
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;

    #[test]
    fn test_parse_pair_line() {
        let pair = MatePair::from_line(AAC_TEST_LINES[0]).unwrap();
        assert_eq!(pair.read_name, "254_166_1407:20110221052813657");
        assert_eq!(pair.signature, PairSignature::Aac);
        assert_eq!(pair.left.chrom, "chr7");
        assert_eq!(pair.left.start, 140188379);
        assert_eq!(pair.left.end, 140188428);
        assert_eq!(pair.left.flags, 129);
        assert!(!pair.left.is_reverse);
        assert_eq!(pair.right.start, 140191044);
        assert_eq!(pair.right.flags, 65);
        assert_eq!(pair.pair_order, "F2F1");
        assert_eq!(pair.strand_orientation().to_string(), "+/+");
        assert_eq!(pair.chrom_pair_key(), "chr7");
    }

    #[test]
    fn test_line_round_trip() {
        for line in AAC_TEST_LINES.iter().chain(CXX_TEST_LINES.iter()) {
            let pair = MatePair::from_line(line).unwrap();
            assert_eq!(pair.to_line(), *line);
            assert_eq!(MatePair::from_line(&pair.to_line()).unwrap(), pair);
            assert_eq!(pair.to_cluster_line(), line.replace(',', "\t"));
        }
    }

    #[test]
    fn test_cross_chrom_records_round_trip() {
        fn record(
            chrom: &str,
            start: i64,
            mate_chrom: &str,
            mate_start: i64,
            flags: u16,
            tag: &str,
        ) -> AlignedRecord {
            AlignedRecord {
                qname: "722_126_792".to_string(),
                read_group: None,
                chrom: chrom.to_string(),
                mate_chrom: mate_chrom.to_string(),
                start,
                end: start + 49,
                mate_start,
                flags,
                mapq: 60,
                pair_tag: Some(tag.to_string()),
            }
        }

        for tag in ["ABC", "X**", "C**"] {
            let chr15 = record("chr15", 63771542, "chr4", 38243635, 65, tag);
            let chr4 = record("chr4", 38243635, "chr15", 63771542, 129, tag);
            let pair = MatePair::from_records(&chr15, &chr4, PairSignature::Cxx).unwrap();
            assert_eq!(pair.left.chrom, "chr4");
            assert_eq!(pair.left.signature_tag, "Cxx");
            assert_eq!(pair.right.signature_tag, "Cxx");

            let reparsed = MatePair::from_line(&pair.to_line()).unwrap();
            assert_eq!(reparsed.signature, PairSignature::Cxx);
            assert_eq!(reparsed, pair);
        }

        // Same-chromosome pairs keep the aligner's tag
        let left = record("chr7", 100, "chr7", 500, 129, "AAC");
        let right = record("chr7", 500, "chr7", 100, 65, "AAC");
        let pair = MatePair::from_records(&left, &right, PairSignature::Aac).unwrap();
        assert_eq!(pair.left.signature_tag, "AAC");
        assert_eq!(MatePair::from_line(&pair.to_line()).unwrap(), pair);
    }

    #[test]
    fn test_trailing_delimiter() {
        let line = format!("{},", AAC_TEST_LINES[3]);
        let pair = MatePair::from_line(&line).unwrap();
        assert_eq!(pair.pair_order, "R1R2");
        assert_eq!(pair.strand_orientation(), StrandOrientation::ReverseReverse);
    }

    #[test]
    fn test_star_signature_alias() {
        let line = CXX_TEST_LINES[0].replace("Cxx", "C**");
        let pair = MatePair::from_line(&line).unwrap();
        assert_eq!(pair.signature, PairSignature::Cxx);
        assert_eq!(pair.left.signature_tag, "C**");
        assert_eq!(pair.chrom_pair_key(), "chr4-chr15");
    }

    #[test]
    fn test_malformed_lines() {
        assert!(MatePair::from_line("").is_err());
        assert!(MatePair::from_line("a,b,c").is_err());

        let bad_start = AAC_TEST_LINES[0].replace("140188379", "x140188379");
        assert!(matches!(
            MatePair::from_line(&bad_start),
            Err(PairClusterError::MalformedPairLine { .. })
        ));

        let bad_strand = AAC_TEST_LINES[0].replacen("false", "maybe", 1);
        assert!(MatePair::from_line(&bad_strand).is_err());

        let bad_signature = AAC_TEST_LINES[0].replace("AAC", "AAA");
        assert!(MatePair::from_line(&bad_signature).is_err());
    }

    #[test]
    fn test_swapped_mates_are_reordered() {
        let line = "r1,chr15,63771542,63771585,Cxx,65,false,r1,chr4,38243635,38243684,Cxx,129,false,F2F1";
        let pair = MatePair::from_line(line).unwrap();
        assert_eq!(pair.left.chrom, "chr4");
        assert_eq!(pair.right.chrom, "chr15");

        let line = "r2,chr7,500,550,AAC,65,false,r2,chr7,100,150,AAC,129,false,F2F1";
        let pair = MatePair::from_line(line).unwrap();
        assert_eq!(pair.left.start, 100);
        assert_eq!(pair.right.start, 500);
    }

    #[test]
    fn test_has_overlap() {
        let pair = MatePair::from_line(AAC_TEST_LINES[0]).unwrap();
        assert!(!pair.has_overlap());

        let line = "r1,chr7,100,200,AAB,65,false,r1,chr7,150,250,AAB,129,true,F1R2";
        let pair = MatePair::from_line(line).unwrap();
        assert!(pair.has_overlap());

        let line = "r1,chr7,100,200,AAB,65,false,r1,chr7,201,250,AAB,129,true,F1R2";
        let pair = MatePair::from_line(line).unwrap();
        assert!(!pair.has_overlap());

        let pair = MatePair::from_line(CXX_TEST_LINES[0]).unwrap();
        assert!(!pair.has_overlap());
    }

    #[test]
    fn test_aac_fixture_strands() {
        let pairs = get_test_pairs(&AAC_TEST_LINES);
        let forward = pairs
            .iter()
            .filter(|x| x.strand_orientation() == StrandOrientation::ForwardForward)
            .count();
        let reverse = pairs
            .iter()
            .filter(|x| x.strand_orientation() == StrandOrientation::ReverseReverse)
            .count();
        assert_eq!((forward, reverse), (4, 2));
    }

    #[test]
    fn test_orientation_category() {
        for pair in get_test_pairs(&AAC_TEST_LINES) {
            assert_eq!(
                pair.orientation_category(PairingType::Lmp),
                Some(OrientationCategory::One)
            );
            assert_eq!(pair.orientation_category(PairingType::Pe), None);
        }
    }

    #[test]
    fn test_sort_mate_pairs() {
        let mut pairs = get_test_pairs(&AAC_TEST_LINES);
        sort_mate_pairs(&mut pairs, PairSortKey::LeftStart);
        assert_eq!(pairs[0].left.start, 140188227);
        assert_eq!(pairs[5].left.start, 140188994);

        sort_mate_pairs(&mut pairs, PairSortKey::RightEnd);
        assert_eq!(pairs[0].right.end, 140191093);
        assert_eq!(pairs[5].right.end, 140191629);
    }

    #[test]
    fn test_strand_orientation() {
        use strum::IntoEnumIterator;
        let labels = StrandOrientation::iter()
            .map(|x| x.to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["+/+", "-/-", "+/-", "-/+"]);
        assert_eq!(
            StrandOrientation::from_mates(true, false),
            StrandOrientation::ReverseForward
        );
    }

    #[test]
    fn test_verbose_line() {
        let pair = MatePair::from_line(AAC_TEST_LINES[3]).unwrap();
        assert!(pair.to_verbose_line().ends_with(",R1R2,DEL/ITX,AAC"));
    }
}
