//! Stream alignment records into discordant mate pair buckets
//!

use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::channel;

use log::{debug, info};
use rust_htslib::bam::{self, Read};
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};
use thousands::Separable;

use crate::alignment_record::AlignedRecord;
use crate::bucket_store::{BlockKey, BucketStore};
use crate::chrom_names::{PrimaryChromFilter, is_mitochondrial};
use crate::errors::PairClusterError;
use crate::mate_pair::MatePair;
use crate::pair_signature::PairSignature;
use crate::run_stats::ExtractionStats;

/// Reasons an alignment record is rejected by the extraction gate
#[derive(Clone, Copy, Debug, Display, EnumCount, EnumIter, Eq, PartialEq)]
pub enum IneligibleReason {
    #[strum(to_string = "unpaired_read")]
    UnpairedRead,
    #[strum(to_string = "mate_unmapped")]
    MateUnmapped,
    #[strum(to_string = "low_mapq")]
    LowMapq,
    #[strum(to_string = "non_primary_chromosome")]
    NonPrimaryChrom,
    #[strum(to_string = "mitochondrial")]
    Mitochondrial,
    #[strum(to_string = "missing_pair_tag")]
    MissingPairTag,
    #[strum(to_string = "concordant_pair")]
    ConcordantPair,
    #[strum(to_string = "invalid_pair_tag")]
    InvalidPairTag,
}

pub struct ExtractorSettings {
    /// Size of the genome blocks after which buffered pairs are flushed to bucket files
    pub block_size: i64,

    pub min_mapq: u8,
    pub primary_chrom_filter: PrimaryChromFilter,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            block_size: 10_000_000,
            min_mapq: 0,
            primary_chrom_filter: PrimaryChromFilter::default(),
        }
    }
}

/// Pairs up eligible records from one coordinate-sorted sample and writes them to buckets
///
/// Pairs are buffered per (signature, chromosome pair) and flushed each time the input moves to
/// a new genome block.
///
pub struct PairExtractor<'a> {
    settings: &'a ExtractorSettings,
    store: &'a BucketStore,
    sample_label: String,

    /// Eligible records waiting for their mate, keyed on read name
    pending_mates: HashMap<String, (AlignedRecord, PairSignature)>,

    buckets: BTreeMap<(PairSignature, String), Vec<MatePair>>,

    /// Monotonic index of the current block, used in bucket file names
    block_index: u32,

    /// Chromosome and block number of the most recent record
    current_block: Option<(String, i64)>,

    ineligible_counts: [usize; IneligibleReason::COUNT],
    stats: ExtractionStats,
}

impl<'a> PairExtractor<'a> {
    pub fn new(
        settings: &'a ExtractorSettings,
        store: &'a BucketStore,
        sample_label: &str,
    ) -> Self {
        Self {
            settings,
            store,
            sample_label: sample_label.to_string(),
            pending_mates: HashMap::new(),
            buckets: BTreeMap::new(),
            block_index: 0,
            current_block: None,
            ineligible_counts: [0; IneligibleReason::COUNT],
            stats: ExtractionStats::new(sample_label),
        }
    }

    /// Run the extraction gate, returning the record's pair signature if it is eligible
    ///
    pub fn check_eligibility(
        &self,
        record: &AlignedRecord,
    ) -> Result<PairSignature, IneligibleReason> {
        if !record.is_paired() {
            return Err(IneligibleReason::UnpairedRead);
        }
        if record.is_mate_unmapped() || record.mate_chrom.is_empty() {
            return Err(IneligibleReason::MateUnmapped);
        }
        if record.mapq < self.settings.min_mapq {
            return Err(IneligibleReason::LowMapq);
        }

        let filter = &self.settings.primary_chrom_filter;
        if !(filter.is_primary(&record.chrom) && filter.is_primary(&record.mate_chrom)) {
            return Err(IneligibleReason::NonPrimaryChrom);
        }
        if is_mitochondrial(&record.chrom) || is_mitochondrial(&record.mate_chrom) {
            return Err(IneligibleReason::Mitochondrial);
        }

        if record.chrom != record.mate_chrom {
            return Ok(PairSignature::Cxx);
        }

        let Some(tag) = record.pair_tag.as_deref() else {
            return Err(IneligibleReason::MissingPairTag);
        };
        if tag.len() != 3 || !tag.chars().all(|c| matches!(c, 'A' | 'B' | 'C')) {
            return Err(IneligibleReason::InvalidPairTag);
        }
        match PairSignature::from_tag(tag) {
            Some(x) if !x.is_cross_chrom() => Ok(x),
            _ => Err(IneligibleReason::ConcordantPair),
        }
    }

    /// Add the next record from the coordinate-sorted input
    ///
    pub fn process_record(&mut self, record: AlignedRecord) -> Result<(), PairClusterError> {
        self.stats.record_count += 1;
        if record.is_filtered() {
            self.stats.filtered_record_count += 1;
            return Ok(());
        }

        self.update_block(&record)?;

        let signature = match self.check_eligibility(&record) {
            Ok(x) => x,
            Err(reason) => {
                self.ineligible_counts[reason as usize] += 1;
                return Ok(());
            }
        };

        let read_name = record.read_name();
        match self.pending_mates.remove(&read_name) {
            Some((mate, mate_signature)) => {
                let pair = MatePair::from_records(&mate, &record, mate_signature)?;
                *self
                    .stats
                    .signature_pair_counts
                    .entry(mate_signature.to_string())
                    .or_default() += 1;
                self.buckets
                    .entry((mate_signature, pair.chrom_pair_key()))
                    .or_default()
                    .push(pair);
            }
            None => {
                self.pending_mates.insert(read_name, (record, signature));
            }
        }
        Ok(())
    }

    fn update_block(&mut self, record: &AlignedRecord) -> Result<(), PairClusterError> {
        let block_number = (record.start - 1).max(0) / self.settings.block_size;
        if let Some((chrom, number)) = &self.current_block {
            if *chrom == record.chrom && *number == block_number {
                return Ok(());
            }
            self.flush_buckets()?;
            self.block_index += 1;
        }
        self.current_block = Some((record.chrom.clone(), block_number));
        Ok(())
    }

    fn flush_buckets(&mut self) -> Result<(), PairClusterError> {
        for ((signature, chrom_pair), pairs) in std::mem::take(&mut self.buckets) {
            let block = BlockKey {
                chrom_pair,
                index: self.block_index,
            };
            let path = self
                .store
                .write(signature, &self.sample_label, &block, &pairs)?;
            debug!("Wrote {} pairs to '{path}'", pairs.len());
            self.stats.bucket_file_count += 1;
        }
        Ok(())
    }

    /// Flush all remaining pairs and return extraction stats
    ///
    /// Records still waiting for a mate are discarded.
    ///
    pub fn finish(mut self) -> Result<ExtractionStats, PairClusterError> {
        self.flush_buckets()?;
        self.stats.unpaired_record_count = self.pending_mates.len();
        for reason in IneligibleReason::iter() {
            let count = self.ineligible_counts[reason as usize];
            if count > 0 {
                self.stats
                    .ineligible_record_counts
                    .insert(reason.to_string(), count);
            }
        }
        Ok(self.stats)
    }
}

/// Extract all discordant pairs from one coordinate-sorted alignment file into buckets
///
pub fn extract_sample_pairs(
    bam_filename: &str,
    sample_label: &str,
    settings: &ExtractorSettings,
    store: &BucketStore,
) -> Result<ExtractionStats, PairClusterError> {
    let mut bam_reader = bam::Reader::from_path(bam_filename).map_err(|e| {
        PairClusterError::AlignmentInput(format!(
            "Unable to open alignment file '{bam_filename}': {e}"
        ))
    })?;
    let header = bam_reader.header().clone();

    let mut extractor = PairExtractor::new(settings, store, sample_label);
    let mut record = bam::Record::new();
    while let Some(r) = bam_reader.read(&mut record) {
        r.map_err(|e| {
            PairClusterError::AlignmentInput(format!(
                "Failed to parse alignment record from '{bam_filename}': {e}"
            ))
        })?;
        extractor.process_record(AlignedRecord::from_bam_record(&record, &header)?)?;
    }
    let stats = extractor.finish()?;

    info!(
        "Extracted {} discordant pairs for sample {sample_label} from {} records",
        stats.total_pair_count().separate_with_commas(),
        stats.record_count.separate_with_commas()
    );
    Ok(stats)
}

/// Alignment file of one sample
pub struct SampleAlignments {
    pub label: String,
    pub bam_filename: String,
}

/// Extract pairs from each sample concurrently, returning once every sample has completed
///
/// Results are returned in input sample order.
///
pub fn extract_samples(
    samples: &[SampleAlignments],
    settings: &ExtractorSettings,
    store: &BucketStore,
    thread_count: usize,
) -> Result<Vec<ExtractionStats>, PairClusterError> {
    let worker_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count.clamp(1, samples.len().max(1)))
        .build()
        .map_err(|e| PairClusterError::WorkerPool(e.to_string()))?;

    let (tx, rx) = channel();
    worker_pool.scope(move |scope| {
        for (sample_index, sample) in samples.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result =
                    extract_sample_pairs(&sample.bam_filename, &sample.label, settings, store);
                tx.send((sample_index, result)).unwrap();
            });
        }
    });

    let mut results = rx.into_iter().collect::<Vec<_>>();
    results.sort_by_key(|(sample_index, _)| *sample_index);
    results.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket_store::test_utils::get_utf8_temp_dir;
    use crate::mate_pair::test_utils::*;

    #[allow(clippy::too_many_arguments)]
    fn get_record(
        qname: &str,
        flags: u16,
        chrom: &str,
        start: i64,
        end: i64,
        mate_chrom: &str,
        mate_start: i64,
        pair_tag: Option<&str>,
    ) -> AlignedRecord {
        AlignedRecord {
            qname: qname.to_string(),
            read_group: Some("20110221052813657".to_string()),
            chrom: chrom.to_string(),
            mate_chrom: mate_chrom.to_string(),
            start,
            end,
            mate_start,
            flags,
            mapq: 60,
            pair_tag: pair_tag.map(|x| x.to_string()),
        }
    }

    /// Both records of the first AAC test pair, in coordinate order
    fn get_aac_test_records() -> (AlignedRecord, AlignedRecord) {
        let left = get_record(
            "254_166_1407",
            129,
            "chr7",
            140188379,
            140188428,
            "chr7",
            140191044,
            Some("AAC"),
        );
        let right = get_record(
            "254_166_1407",
            65,
            "chr7",
            140191044,
            140191093,
            "chr7",
            140188379,
            Some("AAC"),
        );
        (left, right)
    }

    #[test]
    fn test_extraction_gate() {
        let settings = ExtractorSettings::default();
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(&get_utf8_temp_dir(&dir));
        let extractor = PairExtractor::new(&settings, &store, "TD");

        let (record, _) = get_aac_test_records();
        assert_eq!(extractor.check_eligibility(&record), Ok(PairSignature::Aac));

        let mut r = record.clone();
        r.chrom = "chrUn_GL000220v1".to_string();
        assert_eq!(
            extractor.check_eligibility(&r),
            Err(IneligibleReason::NonPrimaryChrom)
        );

        let mut r = record.clone();
        r.mate_chrom = "chrM".to_string();
        assert_eq!(
            extractor.check_eligibility(&r),
            Err(IneligibleReason::Mitochondrial)
        );

        let mut r = record.clone();
        r.flags |= 0x8;
        assert_eq!(
            extractor.check_eligibility(&r),
            Err(IneligibleReason::MateUnmapped)
        );

        let mut r = record.clone();
        r.pair_tag = Some("AXB".to_string());
        assert_eq!(
            extractor.check_eligibility(&r),
            Err(IneligibleReason::InvalidPairTag)
        );

        let mut r = record.clone();
        r.pair_tag = Some("AAA".to_string());
        assert_eq!(
            extractor.check_eligibility(&r),
            Err(IneligibleReason::ConcordantPair)
        );

        let mut r = record.clone();
        r.pair_tag = None;
        assert_eq!(
            extractor.check_eligibility(&r),
            Err(IneligibleReason::MissingPairTag)
        );

        // Any interchromosomal pair is accepted regardless of tag
        let mut r = record.clone();
        r.mate_chrom = "chr15".to_string();
        r.pair_tag = None;
        assert_eq!(extractor.check_eligibility(&r), Ok(PairSignature::Cxx));
    }

    #[test]
    fn test_min_mapq() {
        let settings = ExtractorSettings {
            min_mapq: 20,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(&get_utf8_temp_dir(&dir));
        let extractor = PairExtractor::new(&settings, &store, "TD");

        let (mut record, _) = get_aac_test_records();
        record.mapq = 10;
        assert_eq!(
            extractor.check_eligibility(&record),
            Err(IneligibleReason::LowMapq)
        );
    }

    #[test]
    fn test_extract_pair() {
        let settings = ExtractorSettings::default();
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(&get_utf8_temp_dir(&dir));

        let mut extractor = PairExtractor::new(&settings, &store, "TD");
        let (left, right) = get_aac_test_records();
        extractor.process_record(left).unwrap();
        let unpaired = get_record(
            "lonely",
            65,
            "chr7",
            140190000,
            140190049,
            "chr7",
            140199000,
            Some("AAC"),
        );
        extractor.process_record(unpaired).unwrap();
        extractor.process_record(right).unwrap();
        let stats = extractor.finish().unwrap();

        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.unpaired_record_count, 1);
        assert_eq!(stats.signature_pair_counts["AAC"], 1);
        assert_eq!(stats.bucket_file_count, 1);

        let pairs = store
            .read_all(PairSignature::Aac, "TD")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(pairs, get_test_pairs(&AAC_TEST_LINES[..1]));
    }

    #[test]
    fn test_cross_chrom_pair() {
        let settings = ExtractorSettings::default();
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(&get_utf8_temp_dir(&dir));

        let mut extractor = PairExtractor::new(&settings, &store, "TD");
        let chr4 = get_record("r1", 129, "chr4", 38243635, 38243684, "chr15", 63771542, None);
        let chr15 = get_record("r1", 65, "chr15", 63771542, 63771585, "chr4", 38243635, None);
        extractor.process_record(chr4).unwrap();
        extractor.process_record(chr15).unwrap();
        let stats = extractor.finish().unwrap();
        assert_eq!(stats.signature_pair_counts["Cxx"], 1);

        let pairs = store
            .read_all(PairSignature::Cxx, "TD")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].left.chrom, "chr4");
        assert_eq!(pairs[0].right.chrom, "chr15");
        assert_eq!(pairs[0].pair_order, "F2F1");
        assert_eq!(pairs[0].chrom_pair_key(), "chr4-chr15");
    }

    #[test]
    fn test_blocks_are_flushed() {
        let settings = ExtractorSettings {
            block_size: 1000,
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(&get_utf8_temp_dir(&dir));

        let mut extractor = PairExtractor::new(&settings, &store, "ND");
        let mut records = Vec::new();
        for i in 0..3 {
            let qname = format!("r{i}");
            let left_start = 100 + i * 5000;
            let right_start = left_start + 3000;
            records.push(get_record(
                &qname,
                129,
                "chr1",
                left_start,
                left_start + 49,
                "chr1",
                right_start,
                Some("AAC"),
            ));
            records.push(get_record(
                &qname,
                65,
                "chr1",
                right_start,
                right_start + 49,
                "chr1",
                left_start,
                Some("AAC"),
            ));
        }
        records.sort_by_key(|x| x.start);
        for record in records {
            extractor.process_record(record).unwrap();
        }
        let stats = extractor.finish().unwrap();
        assert_eq!(stats.bucket_file_count, 3);

        let pairs = store
            .read_all(PairSignature::Aac, "ND")
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let names = pairs.iter().map(|x| x.read_name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "r0:20110221052813657",
                "r1:20110221052813657",
                "r2:20110221052813657"
            ]
        );
    }

    #[test]
    fn test_filtered_and_ineligible_counts() {
        let settings = ExtractorSettings::default();
        let dir = tempfile::tempdir().unwrap();
        let store = BucketStore::new(&get_utf8_temp_dir(&dir));

        let mut extractor = PairExtractor::new(&settings, &store, "TD");
        let (mut secondary, mut no_tag) = get_aac_test_records();
        secondary.flags |= 0x100;
        no_tag.pair_tag = None;
        extractor.process_record(secondary).unwrap();
        extractor.process_record(no_tag).unwrap();
        let stats = extractor.finish().unwrap();

        assert_eq!(stats.filtered_record_count, 1);
        assert_eq!(stats.ineligible_record_counts["missing_pair_tag"], 1);
        assert_eq!(stats.total_pair_count(), 0);
        assert_eq!(stats.bucket_file_count, 0);
    }

    #[test]
    fn test_extract_samples_from_bam() {
        use rust_htslib::bam::{Format, Header, HeaderView, Writer, header};

        let dir = tempfile::tempdir().unwrap();
        let root = get_utf8_temp_dir(&dir);

        let mut bam_header = Header::new();
        bam_header.push_record(
            header::HeaderRecord::new(b"SQ")
                .push_tag(b"SN", "chr7")
                .push_tag(b"LN", 159345973),
        );
        let header_view = HeaderView::from_header(&bam_header);

        let sam_lines = [
            "254_166_1407\t129\tchr7\t140188379\t60\t50M\t=\t140191044\t0\t*\t*\tZP:Z:AAC\tRG:Z:20110221052813657",
            "254_166_1407\t65\tchr7\t140191044\t60\t50M\t=\t140188379\t0\t*\t*\tZP:Z:AAC\tRG:Z:20110221052813657",
        ];

        let mut samples = Vec::new();
        for label in ["TD", "ND"] {
            let bam_filename = root.join(format!("{label}.bam"));
            {
                let mut writer = Writer::from_path(&bam_filename, &bam_header, Format::Bam).unwrap();
                for line in sam_lines {
                    let record = bam::Record::from_sam(&header_view, line.as_bytes()).unwrap();
                    writer.write(&record).unwrap();
                }
            }
            samples.push(SampleAlignments {
                label: label.to_string(),
                bam_filename: bam_filename.to_string(),
            });
        }

        let store = BucketStore::new(&root.join("buckets"));
        let stats = extract_samples(&samples, &ExtractorSettings::default(), &store, 4).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].sample_label, "TD");
        assert_eq!(stats[1].sample_label, "ND");

        for label in ["TD", "ND"] {
            let pairs = store
                .read_all(PairSignature::Aac, label)
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            assert_eq!(pairs, get_test_pairs(&AAC_TEST_LINES[..1]));
        }
    }

    #[test]
    fn test_missing_bam_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = get_utf8_temp_dir(&dir);
        let store = BucketStore::new(&root);
        let samples = [SampleAlignments {
            label: "TD".to_string(),
            bam_filename: root.join("missing.bam").to_string(),
        }];
        let result = extract_samples(&samples, &ExtractorSettings::default(), &store, 1);
        assert!(matches!(result, Err(PairClusterError::AlignmentInput(_))));
    }
}
