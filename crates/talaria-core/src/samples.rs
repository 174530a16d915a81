//! Training sample records and the append-only sample file.
//!
//! Binary format of one record (little-endian):
//! - hash: 8 bytes (first 8 bytes of the SHA-1 of everything below)
//! - sensor ids: 16 bytes (4 × u32, r1 r2 v1 v2)
//! - timestamps: N × 8 bytes (f64)
//! - channels: 4 × N × 8 bytes (f64, r1 r2 v1 v2, NaN for a missing value)
//!
//! `N` is fixed for a whole file and is not stored in it.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{self, Read, Write};

use log::debug;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::series::SeriesError;

/// Size of the content hash prefix
pub const HASH_LEN: usize = 8;

/// Size of the four sensor ids
pub const IDS_LEN: usize = 4 * 4;

/// Channels per record
pub const CHANNELS: usize = 4;

/// Truncated content digest identifying a record
pub type ContentHash = [u8; HASH_LEN];

/// Error types for sample generation and sample files
#[derive(Debug, Error)]
pub enum SampleError {
    /// A record with the same content was already written to this stream
    #[error("Hash collision on sample {hash}")]
    HashCollision {
        /// Hex form of the colliding hash
        hash: String,
    },

    /// The output or input stream failed
    #[error("Sample stream I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A record ended before its expected length
    #[error("Truncated sample record ({actual} of {expected} bytes)")]
    Truncated {
        /// Encoded record length
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Channel evaluation failed
    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Result type for sample operations
pub type SampleResult<T> = Result<T, SampleError>;

/// Lowercase hex form of a content hash
pub fn hash_hex(hash: &ContentHash) -> String {
    hash.iter().fold(String::with_capacity(HASH_LEN * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

/// One window of aligned channel data
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    /// Sensor ids in r1, r2, v1, v2 order
    pub ids: [u32; CHANNELS],
    /// Query timestamps shared by all channels
    pub timestamps: Vec<f64>,
    /// Channel values at `timestamps`, r1, r2, v1, v2
    pub channels: [Vec<f64>; CHANNELS],
}

impl SampleRecord {
    /// Encoded size of a record with `window_samples` points per channel
    pub const fn encoded_len(window_samples: usize) -> usize {
        HASH_LEN + IDS_LEN + (1 + CHANNELS) * window_samples * 8
    }

    /// Points per channel
    pub fn window_samples(&self) -> usize {
        self.timestamps.len()
    }

    /// Serialized record without the hash prefix
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(Self::encoded_len(self.window_samples()) - HASH_LEN);

        for id in self.ids {
            bytes.extend_from_slice(&id.to_le_bytes());
        }
        for value in &self.timestamps {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        for channel in &self.channels {
            for value in channel {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }

        bytes
    }

    /// Content hash of the serialized body
    pub fn content_hash(&self) -> ContentHash {
        digest(&self.body_bytes())
    }

    /// Serialized record including the hash prefix
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body_bytes();
        let mut bytes = Vec::with_capacity(HASH_LEN + body.len());
        bytes.extend_from_slice(&digest(&body));
        bytes.extend_from_slice(&body);
        bytes
    }

    /// Parse one encoded record, returning the stored hash alongside it
    pub fn from_bytes(bytes: &[u8], window_samples: usize) -> SampleResult<StoredSample> {
        let expected = Self::encoded_len(window_samples);
        if bytes.len() < expected {
            return Err(SampleError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&bytes[..HASH_LEN]);
        let mut offset = HASH_LEN;

        let mut ids = [0u32; CHANNELS];
        for id in ids.iter_mut() {
            let mut id_bytes = [0u8; 4];
            id_bytes.copy_from_slice(&bytes[offset..offset + 4]);
            *id = u32::from_le_bytes(id_bytes);
            offset += 4;
        }

        let mut read_block = || {
            let block: Vec<f64> = bytes[offset..offset + window_samples * 8]
                .chunks_exact(8)
                .map(|chunk| {
                    let mut value_bytes = [0u8; 8];
                    value_bytes.copy_from_slice(chunk);
                    f64::from_le_bytes(value_bytes)
                })
                .collect();
            offset += window_samples * 8;
            block
        };

        let timestamps = read_block();
        let channels = [read_block(), read_block(), read_block(), read_block()];

        Ok(StoredSample {
            hash,
            record: Self {
                ids,
                timestamps,
                channels,
            },
        })
    }
}

fn digest(body: &[u8]) -> ContentHash {
    let full = Sha1::digest(body);
    let mut hash = [0u8; HASH_LEN];
    hash.copy_from_slice(&full[..HASH_LEN]);
    hash
}

/// A record read back from a sample file
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    /// Hash as stored in the file
    pub hash: ContentHash,
    pub record: SampleRecord,
}

impl StoredSample {
    /// Check the stored hash against the record content
    pub fn is_intact(&self) -> bool {
        self.record.content_hash() == self.hash
    }

    /// Hex form of the stored hash
    pub fn hash_hex(&self) -> String {
        hash_hex(&self.hash)
    }
}

/// Append-only sample stream with content-hash deduplication.
///
/// Holds the set of hashes written so far; a record whose hash is already in
/// the set is rejected with [`SampleError::HashCollision`] and not written.
pub struct SampleWriter<W: Write> {
    out: W,
    seen: HashSet<ContentHash>,
    records_written: u64,
    bytes_written: u64,
}

impl<W: Write> SampleWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            seen: HashSet::new(),
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Append a record, returning its hash
    pub fn write(&mut self, record: &SampleRecord) -> SampleResult<ContentHash> {
        let bytes = record.to_bytes();
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&bytes[..HASH_LEN]);

        if self.seen.contains(&hash) {
            return Err(SampleError::HashCollision {
                hash: hash_hex(&hash),
            });
        }

        self.out.write_all(&bytes)?;
        self.seen.insert(hash);
        self.records_written += 1;
        self.bytes_written += bytes.len() as u64;
        debug!("Wrote sample {} ({} bytes)", hash_hex(&hash), bytes.len());

        Ok(hash)
    }

    /// Records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> SampleResult<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and return the underlying stream
    pub fn into_inner(mut self) -> SampleResult<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Iterator over the records of a sample stream.
///
/// A stream that ends partway through a record yields
/// [`SampleError::Truncated`] and then stops.
pub struct SampleReader<R: Read> {
    input: R,
    window_samples: usize,
    buffer: Vec<u8>,
    done: bool,
}

impl<R: Read> SampleReader<R> {
    pub fn new(input: R, window_samples: usize) -> Self {
        Self {
            input,
            window_samples,
            buffer: vec![0u8; SampleRecord::encoded_len(window_samples)],
            done: false,
        }
    }

    /// Fill the buffer, returning how many bytes were read before EOF
    fn fill(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.buffer.len() {
            match self.input.read(&mut self.buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for SampleReader<R> {
    type Item = SampleResult<StoredSample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let filled = match self.fill() {
            Ok(filled) => filled,
            Err(e) => {
                self.done = true;
                return Some(Err(e.into()));
            }
        };

        if filled == 0 {
            self.done = true;
            return None;
        }
        if filled < self.buffer.len() {
            self.done = true;
            return Some(Err(SampleError::Truncated {
                expected: self.buffer.len(),
                actual: filled,
            }));
        }

        Some(SampleRecord::from_bytes(&self.buffer, self.window_samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(seed: f64) -> SampleRecord {
        SampleRecord {
            ids: [11, 12, 13, 14],
            timestamps: vec![0.0, 10.0, 20.0],
            channels: [
                vec![seed, 1.0, 2.0],
                vec![3.0, 4.0, 5.0],
                vec![6.0, 7.0, 8.0],
                vec![9.0, 10.0, f64::NAN],
            ],
        }
    }

    #[test]
    fn test_record_size() {
        assert_eq!(SampleRecord::encoded_len(240), 8 + 16 + 5 * 240 * 8);
        assert_eq!(record(0.0).to_bytes().len(), SampleRecord::encoded_len(3));
    }

    #[test]
    fn test_record_layout() {
        let rec = record(0.5);
        let bytes = rec.to_bytes();

        assert_eq!(&bytes[..8], &rec.content_hash());
        assert_eq!(&bytes[8..12], &11u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &14u32.to_le_bytes());
        // timestamps start right after the ids
        assert_eq!(&bytes[32..40], &10.0f64.to_le_bytes());
        // r1 block follows the 3 timestamps
        assert_eq!(&bytes[48..56], &0.5f64.to_le_bytes());
    }

    #[test]
    fn test_hash_is_truncated_sha1_of_body() {
        let rec = record(1.0);
        let full = Sha1::digest(rec.body_bytes());
        assert_eq!(&rec.content_hash()[..], &full[..8]);
        assert_eq!(hash_hex(&[0, 1, 0xab, 0xff, 0, 0, 0, 0x10]), "0001abff00000010");
    }

    #[test]
    fn test_writer_drops_duplicate_content() {
        let mut writer = SampleWriter::new(Vec::new());

        writer.write(&record(1.0)).unwrap();
        let err = writer.write(&record(1.0)).unwrap_err();
        assert!(matches!(err, SampleError::HashCollision { .. }));
        writer.write(&record(2.0)).unwrap();

        assert_eq!(writer.records_written(), 2);
        let out = writer.into_inner().unwrap();
        assert_eq!(out.len(), 2 * SampleRecord::encoded_len(3));
    }

    #[test]
    fn test_reader_yields_written_records() {
        let mut writer = SampleWriter::new(Vec::new());
        writer.write(&record(1.0)).unwrap();
        writer.write(&record(2.0)).unwrap();
        let bytes = writer.into_inner().unwrap();

        let samples: Vec<StoredSample> = SampleReader::new(Cursor::new(bytes), 3)
            .collect::<SampleResult<_>>()
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(StoredSample::is_intact));
        assert_eq!(samples[1].record.ids, [11, 12, 13, 14]);
        assert_eq!(samples[1].record.channels[0][0], 2.0);
        assert!(samples[0].record.channels[3][2].is_nan());
        assert_eq!(samples[0].hash_hex().len(), 16);
    }

    #[test]
    fn test_reader_reports_trailing_partial_record() {
        let mut bytes = record(1.0).to_bytes();
        bytes.extend_from_slice(&[0u8; 10]);

        let mut reader = SampleReader::new(Cursor::new(bytes), 3);
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next(),
            Some(Err(SampleError::Truncated { actual: 10, .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_tampered_record_is_not_intact() {
        let mut bytes = record(1.0).to_bytes();
        bytes[30] ^= 0xff;
        let stored = SampleRecord::from_bytes(&bytes, 3).unwrap();
        assert!(!stored.is_intact());
    }
}
