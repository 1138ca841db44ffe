//! Byte-exact striping-policy record
//!
//! The striping descriptor is stored verbatim inside file metadata, so the
//! encoder and decoder must agree on the exact layout: four big-endian u32
//! fields at fixed offsets followed by the pattern bytes.
//!
//! ```text
//! [0..4)   stripe size (kB)
//! [4..8)   width (OSDs per stripe)
//! [8..12)  parity width
//! [12..16) EC write quorum
//! [16..)   pattern, no terminator (length implied by the record length)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

const HEADER_LEN: usize = 16;

/// Striping descriptor of a replica, immutable once built
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StripingPolicy {
    pattern: String,
    stripe_size: u32,
    width: u32,
    parity_width: u32,
    ec_write_quorum: u32,
}

impl StripingPolicy {
    /// Create a policy without parity (e.g. plain RAID0)
    pub fn new(
        pattern: impl Into<String>,
        stripe_size: u32,
        width: u32,
    ) -> Result<Self, StripingRecordError> {
        Self::with_redundancy(pattern, stripe_size, width, 0, 0)
    }

    /// Create a policy with parity stripes and an erasure-coding write quorum
    pub fn with_redundancy(
        pattern: impl Into<String>,
        stripe_size: u32,
        width: u32,
        parity_width: u32,
        ec_write_quorum: u32,
    ) -> Result<Self, StripingRecordError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(StripingRecordError::EmptyPattern);
        }
        if !pattern.is_ascii() {
            return Err(StripingRecordError::InvalidPattern);
        }
        if stripe_size == 0 {
            return Err(StripingRecordError::ZeroStripeSize);
        }
        if width == 0 {
            return Err(StripingRecordError::ZeroWidth);
        }
        if parity_width >= width {
            return Err(StripingRecordError::ParityTooLarge {
                parity: parity_width,
                width,
            });
        }
        Ok(Self {
            pattern,
            stripe_size,
            width,
            parity_width,
            ec_write_quorum,
        })
    }

    /// The striping pattern identifier (e.g. `RAID0`)
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Stripe size in kilobytes
    #[must_use]
    pub fn stripe_size(&self) -> u32 {
        self.stripe_size
    }

    /// Number of OSDs per stripe
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of parity stripes
    #[must_use]
    pub fn parity_width(&self) -> u32 {
        self.parity_width
    }

    /// Erasure-coding write quorum
    #[must_use]
    pub fn ec_write_quorum(&self) -> u32 {
        self.ec_write_quorum
    }

    /// Encode into the canonical byte representation
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.pattern.len());
        buf.put_u32(self.stripe_size);
        buf.put_u32(self.width);
        buf.put_u32(self.parity_width);
        buf.put_u32(self.ec_write_quorum);
        buf.put_slice(self.pattern.as_bytes());
        buf.freeze()
    }

    /// Decode from the canonical byte representation
    pub fn decode(record: &[u8]) -> Result<Self, StripingRecordError> {
        if record.len() < HEADER_LEN {
            return Err(StripingRecordError::TooShort { len: record.len() });
        }

        let mut header = &record[..HEADER_LEN];
        let stripe_size = header.get_u32();
        let width = header.get_u32();
        let parity_width = header.get_u32();
        let ec_write_quorum = header.get_u32();

        let pattern = std::str::from_utf8(&record[HEADER_LEN..])
            .map_err(|_| StripingRecordError::InvalidPattern)?;

        Self::with_redundancy(pattern, stripe_size, width, parity_width, ec_write_quorum)
    }
}

impl fmt::Display for StripingPolicy {
    /// Canonical string form: `"pattern, stripeSize, width"`, extended with
    /// `", parity, ecQuorum"` when either redundancy field is set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.pattern, self.stripe_size, self.width)?;
        if self.parity_width != 0 || self.ec_write_quorum != 0 {
            write!(f, ", {}, {}", self.parity_width, self.ec_write_quorum)?;
        }
        Ok(())
    }
}

/// Errors that can occur when building or decoding a striping record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StripingRecordError {
    #[error("record too short: {len} bytes, need at least 16")]
    TooShort { len: usize },
    #[error("pattern must not be empty")]
    EmptyPattern,
    #[error("pattern must be ASCII")]
    InvalidPattern,
    #[error("stripe size must be positive")]
    ZeroStripeSize,
    #[error("width must be at least 1")]
    ZeroWidth,
    #[error("parity width {parity} must be smaller than width {width}")]
    ParityTooLarge { parity: u32, width: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let policies = [
            StripingPolicy::new("RAID0", 128, 4).unwrap(),
            StripingPolicy::new("R", 1, 1).unwrap(),
            StripingPolicy::with_redundancy("EC", 256, 8, 3, 5).unwrap(),
        ];
        for policy in policies {
            let encoded = policy.encode();
            assert_eq!(encoded.len(), 16 + policy.pattern().len());
            let decoded = StripingPolicy::decode(&encoded).unwrap();
            assert_eq!(decoded, policy);
        }
    }

    #[test]
    fn test_wire_sample() {
        // RAID0, stripe size 128 kB, width 4, no redundancy
        let policy = StripingPolicy::new("RAID0", 128, 4).unwrap();
        let expected = [
            0x00, 0x00, 0x00, 0x80, // stripe size
            0x00, 0x00, 0x00, 0x04, // width
            0x00, 0x00, 0x00, 0x00, // parity width
            0x00, 0x00, 0x00, 0x00, // EC write quorum
            0x52, 0x41, 0x49, 0x44, 0x30, // "RAID0"
        ];
        assert_eq!(policy.encode().as_ref(), &expected[..]);
        assert_eq!(StripingPolicy::decode(&expected).unwrap(), policy);
    }

    #[test]
    fn test_decode_too_short() {
        let err = StripingPolicy::decode(&[0u8; 15]).unwrap_err();
        assert_eq!(err, StripingRecordError::TooShort { len: 15 });
    }

    #[test]
    fn test_decode_rejects_invalid_fields() {
        // Zero width in an otherwise well-formed record
        let mut record = StripingPolicy::new("RAID0", 128, 4).unwrap().encode().to_vec();
        record[4..8].copy_from_slice(&[0, 0, 0, 0]);
        assert_eq!(
            StripingPolicy::decode(&record).unwrap_err(),
            StripingRecordError::ZeroWidth
        );

        // Header only, no pattern bytes
        let record = StripingPolicy::new("RAID0", 128, 4).unwrap().encode();
        assert_eq!(
            StripingPolicy::decode(&record[..16]).unwrap_err(),
            StripingRecordError::EmptyPattern
        );
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(StripingPolicy::new("RAID0", 0, 4).is_err());
        assert!(StripingPolicy::new("RAID0", 128, 0).is_err());
        assert!(StripingPolicy::with_redundancy("EC", 128, 4, 4, 0).is_err());
        assert!(StripingPolicy::new("", 128, 4).is_err());
        assert!(StripingPolicy::new("RAID\u{00e9}", 128, 4).is_err());
    }

    #[test]
    fn test_canonical_form() {
        let plain = StripingPolicy::new("RAID0", 128, 4).unwrap();
        assert_eq!(plain.to_string(), "RAID0, 128, 4");

        let ec = StripingPolicy::with_redundancy("EC", 256, 8, 3, 5).unwrap();
        assert_eq!(ec.to_string(), "EC, 256, 8, 3, 5");
    }
}
