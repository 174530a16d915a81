//! Fixed-layout binary encoding of a [`Series`].
//!
//! Binary format (little-endian):
//! - count: 4 bytes (u32)
//! - timestamps: count × 8 bytes (f64, seconds since epoch)
//! - values: count × 8 bytes (f64, NaN for a missing value)
//!
//! The two blocks are contiguous, not interleaved.

use thiserror::Error;

use crate::series::Series;

/// Size of the leading point count
pub const COUNT_SIZE: usize = 4;

/// Size of one encoded f64
const F64_SIZE: usize = 8;

/// Error types for series decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer length does not match the encoded point count
    #[error("Encoded series has {actual} bytes, expected {expected}")]
    LengthMismatch {
        /// Length implied by the header
        expected: usize,
        /// Length of the buffer
        actual: usize,
    },
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Encoded size of a series with `count` points
pub const fn encoded_len(count: usize) -> usize {
    COUNT_SIZE + 2 * count * F64_SIZE
}

impl Series {
    /// Converts the series to its binary representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let count = self.len();
        let mut bytes = Vec::with_capacity(encoded_len(count));

        bytes.extend_from_slice(&(count as u32).to_le_bytes());

        for &x in self.x() {
            bytes.extend_from_slice(&x.to_le_bytes());
        }

        for &y in self.y() {
            bytes.extend_from_slice(&y.unwrap_or(f64::NAN).to_le_bytes());
        }

        bytes
    }

    /// Creates a series from its binary representation.
    ///
    /// The result is flagged sorted when its keys are non-decreasing.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() < COUNT_SIZE {
            return Err(CodecError::LengthMismatch {
                expected: COUNT_SIZE,
                actual: bytes.len(),
            });
        }

        let mut count_bytes = [0u8; COUNT_SIZE];
        count_bytes.copy_from_slice(&bytes[..COUNT_SIZE]);
        let count = u32::from_le_bytes(count_bytes) as usize;

        let expected = encoded_len(count);
        if bytes.len() != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = COUNT_SIZE;

        // Read timestamps block
        let mut x = Vec::with_capacity(count);
        for _ in 0..count {
            x.push(read_f64(bytes, offset));
            offset += F64_SIZE;
        }

        // Read values block
        let mut y = Vec::with_capacity(count);
        for _ in 0..count {
            let value = read_f64(bytes, offset);
            y.push(if value.is_nan() { None } else { Some(value) });
            offset += F64_SIZE;
        }

        let sorted = x.windows(2).all(|pair| pair[0] <= pair[1]);
        Ok(Series::from_parts(x, y, sorted))
    }
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut value_bytes = [0u8; F64_SIZE];
    value_bytes.copy_from_slice(&bytes[offset..offset + F64_SIZE]);
    f64::from_le_bytes(value_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Interpolation;

    #[test]
    fn test_layout() {
        let series = Series::new(vec![1.0, 2.0], vec![10.0, 20.0]).unwrap();
        let bytes = series.to_bytes();

        assert_eq!(bytes.len(), encoded_len(2));
        assert_eq!(&bytes[..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..12], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[12..20], &2.0f64.to_le_bytes());
        assert_eq!(&bytes[20..28], &10.0f64.to_le_bytes());
        assert_eq!(&bytes[28..36], &20.0f64.to_le_bytes());
    }

    #[test]
    fn test_empty_series() {
        let bytes = Series::default().to_bytes();
        assert_eq!(bytes, 0u32.to_le_bytes().to_vec());

        let decoded = Series::from_bytes(&bytes).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_single_point() {
        let series = Series::new(vec![1_600_000_000.25], vec![-3.5]).unwrap();
        let decoded = Series::from_bytes(&series.to_bytes()).unwrap();
        assert_eq!(decoded.x(), series.x());
        assert_eq!(decoded.y(), series.y());
        assert!(decoded.is_sorted());
    }

    #[test]
    fn test_thousand_points() {
        let x: Vec<f64> = (0..1000).map(|i| 1.5e9 + i as f64 * 900.0).collect();
        let y: Vec<f64> = (0..1000).map(|i| (i as f64 / 17.0).cos() * 250.0).collect();
        let series = Series::new(x, y).unwrap();

        let decoded = Series::from_bytes(&series.to_bytes()).unwrap();

        assert_eq!(decoded.x(), series.x());
        assert_eq!(decoded.y(), series.y());
        assert!(decoded.is_sorted());
        assert_eq!(
            decoded.lookup(1.5e9 + 450.0, Interpolation::Nearest).unwrap(),
            series.y()[0]
        );
    }

    #[test]
    fn test_missing_values_survive() {
        let series = Series::from_options(vec![0.0, 1.0, 2.0], vec![Some(1.0), None, Some(3.0)])
            .unwrap();
        let decoded = Series::from_bytes(&series.to_bytes()).unwrap();
        assert_eq!(decoded.y(), &[Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_unsorted_keys_not_flagged() {
        let series = Series::new(vec![5.0, 1.0], vec![0.0, 0.0]).unwrap();
        let decoded = Series::from_bytes(&series.to_bytes()).unwrap();
        assert!(!decoded.is_sorted());
    }

    #[test]
    fn test_length_mismatch() {
        let series = Series::new(vec![1.0, 2.0], vec![10.0, 20.0]).unwrap();
        let bytes = series.to_bytes();

        assert_eq!(
            Series::from_bytes(&bytes[..bytes.len() - 1]),
            Err(CodecError::LengthMismatch {
                expected: 36,
                actual: 35
            })
        );
        assert_eq!(
            Series::from_bytes(&[1, 0]),
            Err(CodecError::LengthMismatch {
                expected: 4,
                actual: 2
            })
        );
    }
}
