//! On-disk buckets of serialized mate pairs, partitioned by signature, sample and genome block
//!
//! Layout: `<root>/<signature>/<sample>/<chrom_pair>.<block:06>.pairs`, one comma-delimited
//! pair per line.
//!

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use log::debug;

use crate::errors::PairClusterError;
use crate::mate_pair::MatePair;
use crate::pair_signature::PairSignature;

const BUCKET_FILE_EXTENSION: &str = "pairs";

/// Identifies one flushed bucket file within a signature/sample directory
///
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct BlockKey {
    pub chrom_pair: String,
    pub index: u32,
}

impl BlockKey {
    fn filename(&self) -> String {
        format!(
            "{}.{:06}.{BUCKET_FILE_EXTENSION}",
            self.chrom_pair, self.index
        )
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(BUCKET_FILE_EXTENSION)?.strip_suffix('.')?;
        let (chrom_pair, index) = stem.rsplit_once('.')?;
        if chrom_pair.is_empty() {
            return None;
        }
        Some(Self {
            chrom_pair: chrom_pair.to_string(),
            index: index.parse().ok()?,
        })
    }
}

pub struct BucketStore {
    root: Utf8PathBuf,
}

impl BucketStore {
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Remove every bucket file left under the store root by an earlier run
    ///
    pub fn clear(&self) -> Result<(), PairClusterError> {
        if self.root.exists() {
            debug!("Removing existing buckets under '{}'", self.root);
            std::fs::remove_dir_all(&self.root)
                .map_err(|e| PairClusterError::bucket_io(&self.root, e))?;
        }
        Ok(())
    }

    fn sample_dir(&self, signature: PairSignature, sample: &str) -> Utf8PathBuf {
        self.root.join(signature.to_string()).join(sample)
    }

    /// Write one block of pairs, replacing any previous file for the same block
    ///
    pub fn write(
        &self,
        signature: PairSignature,
        sample: &str,
        block: &BlockKey,
        pairs: &[MatePair],
    ) -> Result<Utf8PathBuf, PairClusterError> {
        let dir = self.sample_dir(signature, sample);
        std::fs::create_dir_all(&dir).map_err(|e| PairClusterError::bucket_io(&dir, e))?;

        let path = dir.join(block.filename());
        let write_pairs = || -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&path)?);
            for pair in pairs {
                writeln!(writer, "{}", pair.to_line())?;
            }
            writer.flush()
        };
        write_pairs().map_err(|e| PairClusterError::bucket_io(&path, e))?;
        Ok(path)
    }

    /// List bucket files for one signature/sample in filename order
    ///
    /// A missing directory is treated as an empty bucket set.
    ///
    fn list_blocks(
        &self,
        signature: PairSignature,
        sample: &str,
    ) -> Result<Vec<(BlockKey, Utf8PathBuf)>, PairClusterError> {
        let dir = self.sample_dir(signature, sample);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut blocks = Vec::new();
        for entry in dir
            .read_dir_utf8()
            .map_err(|e| PairClusterError::bucket_io(&dir, e))?
        {
            let entry = entry.map_err(|e| PairClusterError::bucket_io(&dir, e))?;
            if let Some(key) = BlockKey::from_filename(entry.file_name()) {
                blocks.push((entry.file_name().to_string(), key, entry.path().to_path_buf()));
            }
        }
        blocks.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(blocks.into_iter().map(|(_, key, path)| (key, path)).collect())
    }

    /// Chromosome pair keys with at least one bucket file, in filename order
    ///
    pub fn chrom_pairs(
        &self,
        signature: PairSignature,
        sample: &str,
    ) -> Result<Vec<String>, PairClusterError> {
        Ok(self
            .list_blocks(signature, sample)?
            .into_iter()
            .map(|(key, _)| key.chrom_pair)
            .dedup()
            .collect())
    }

    /// Read every pair stored for one signature/sample
    ///
    /// Clustering reads the same files one chromosome pair at a time with [`Self::read_chrom_pair`].
    ///
    #[cfg(test)]
    pub fn read_all(
        &self,
        signature: PairSignature,
        sample: &str,
    ) -> Result<BucketReader, PairClusterError> {
        let files = self
            .list_blocks(signature, sample)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        Ok(BucketReader::new(files))
    }

    /// Read the pairs stored for one chromosome pair of one signature/sample
    ///
    pub fn read_chrom_pair(
        &self,
        signature: PairSignature,
        sample: &str,
        chrom_pair: &str,
    ) -> Result<BucketReader, PairClusterError> {
        let files = self
            .list_blocks(signature, sample)?
            .into_iter()
            .filter(|(key, _)| key.chrom_pair == chrom_pair)
            .map(|(_, path)| path)
            .collect();
        Ok(BucketReader::new(files))
    }
}

/// Lazily reads pairs from a list of bucket files
///
/// Malformed lines are skipped and counted. An I/O error is returned once, after which the
/// reader is exhausted.
///
pub struct BucketReader {
    files: std::vec::IntoIter<Utf8PathBuf>,
    current: Option<(Utf8PathBuf, Lines<BufReader<File>>)>,
    malformed_line_count: usize,
}

impl BucketReader {
    fn new(files: Vec<Utf8PathBuf>) -> Self {
        Self {
            files: files.into_iter(),
            current: None,
            malformed_line_count: 0,
        }
    }

    pub fn malformed_line_count(&self) -> usize {
        self.malformed_line_count
    }

    fn fail(&mut self, path: Utf8PathBuf, err: std::io::Error) -> PairClusterError {
        self.current = None;
        self.files = Vec::new().into_iter();
        PairClusterError::bucket_io(path, err)
    }
}

impl Iterator for BucketReader {
    type Item = Result<MatePair, PairClusterError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some((path, lines)) = self.current.as_mut() else {
                let path = self.files.next()?;
                match File::open(&path) {
                    Ok(f) => {
                        self.current = Some((path, BufReader::new(f).lines()));
                        continue;
                    }
                    Err(e) => return Some(Err(self.fail(path, e))),
                }
            };

            match lines.next() {
                None => {
                    self.current = None;
                }
                Some(Err(e)) => {
                    let path = path.clone();
                    return Some(Err(self.fail(path, e)));
                }
                Some(Ok(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    match MatePair::from_line(&line) {
                        Ok(pair) => return Some(Ok(pair)),
                        Err(e) => {
                            debug!("Skipping line in bucket file '{path}': {e}");
                            self.malformed_line_count += 1;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub mod test_utils {
    use camino::Utf8PathBuf;

    pub fn get_utf8_temp_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }
}
