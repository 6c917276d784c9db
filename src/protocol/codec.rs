//! Byte-order codec
//!
//! `Encoder` stages a frame header into a reusable buffer, `Decoder` walks a
//! received header with a cursor. Every integer is 4 bytes big-endian;
//! strings, byte arrays and arrays are prefixed with their length.

use super::message::{ViewId, ENDPT_MAX_SIZE, INT_SIZE, KEY_SIZE};
use crate::error::ProtocolError;

/// Initial capacity of a staging buffer
pub const HEADER_INITIAL_CAPACITY: usize = 1 << 10;
/// Above this capacity the buffer is dropped after a send
pub const HEADER_HIGH_WATER: usize = 1 << 16;
/// Capacity a buffer is shrunk back to
pub const HEADER_SHRINK_CAPACITY: usize = 1 << 12;

const MILLION: f64 = 1_000_000.0;

/// Header staging buffer
///
/// Capacity grows by doubling. Callers that reuse an encoder across frames
/// call [`Encoder::shrink_if_oversized`] after flushing so one large header
/// does not pin memory forever.
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(HEADER_INITIAL_CAPACITY)
    }
}

impl Encoder {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Reset for reuse. Capacity is kept.
    #[inline(always)]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Drop an oversized buffer, returns true if it did.
    pub fn shrink_if_oversized(&mut self) -> bool {
        if self.buffer.capacity() > HEADER_HIGH_WATER {
            self.buffer = Vec::with_capacity(HEADER_SHRINK_CAPACITY);
            true
        } else {
            false
        }
    }

    fn grow_for(&mut self, additional: usize) {
        let needed = self.buffer.len() + additional;
        let capacity = self.buffer.capacity();
        if needed <= capacity {
            return;
        }
        let mut new_capacity = capacity.max(1);
        while new_capacity < needed {
            new_capacity *= 2;
        }
        self.buffer.reserve_exact(new_capacity - self.buffer.len());
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.grow_for(bytes.len());
        self.buffer.extend_from_slice(bytes);
    }

    #[inline]
    pub fn write_int(&mut self, i: i32) {
        self.put(&i.to_be_bytes());
    }

    #[inline]
    pub fn write_bool(&mut self, b: bool) {
        self.write_int(i32::from(b));
    }

    /// Seconds as `(sec10, usec10)`: whole tens of seconds, then the
    /// remainder in tens of microseconds. Truncates, resolution is 10us.
    pub fn write_time(&mut self, time: f64) {
        let tmp = time / 10.0;
        let sec10 = tmp as i32;
        let usec10 = ((tmp - f64::from(sec10)) * MILLION) as i32;
        self.write_int(sec10);
        self.write_int(usec10);
    }

    /// Length prefix then raw bytes. An empty slice is written as length 0.
    pub fn write_byte_array(&mut self, buf: &[u8]) {
        self.write_int(buf.len() as i32);
        self.put(buf);
    }

    /// `None` and `""` are both written as length 0.
    ///
    /// The string must be ASCII; callers validate before staging.
    pub fn write_string(&mut self, s: Option<&str>) {
        let s = s.unwrap_or("");
        debug_assert!(s.is_ascii(), "non-ASCII string reached the encoder");
        self.write_byte_array(s.as_bytes());
    }

    pub fn write_string_array<S: AsRef<str>>(&mut self, sa: &[S]) {
        self.write_int(sa.len() as i32);
        for s in sa {
            self.write_string(Some(s.as_ref()));
        }
    }

    pub fn write_int_array(&mut self, ia: &[i32]) {
        self.write_int(ia.len() as i32);
        for &i in ia {
            self.write_int(i);
        }
    }

    pub fn write_view_id(&mut self, vid: &ViewId) {
        self.write_int(vid.ltime);
        self.write_string(Some(&vid.endpt));
    }
}

/// Cursor over a received header
pub struct Decoder<'a> {
    buffer: &'a [u8],
    read_pos: usize,
}

impl<'a> Decoder<'a> {
    #[inline(always)]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            read_pos: 0,
        }
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.read_pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Check that the whole header was consumed.
    pub fn finish(self) -> Result<(), ProtocolError> {
        if self.read_pos != self.buffer.len() {
            return Err(ProtocolError::HeaderNotConsumed {
                consumed: self.read_pos,
                len: self.buffer.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.buffer[start..self.read_pos])
    }

    pub fn read_int(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(INT_SIZE)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_int()? != 0)
    }

    /// Inverse of [`Encoder::write_time`]: `sec10 * 10 + usec10 * 10 / 10^6`.
    pub fn read_time(&mut self) -> Result<f64, ProtocolError> {
        let sec10 = self.read_int()?;
        let usec10 = self.read_int()?;
        Ok(f64::from(sec10) * 10.0 + f64::from(usec10) * 10.0 / MILLION)
    }

    fn read_len(&mut self, field: &'static str) -> Result<usize, ProtocolError> {
        let len = self.read_int()?;
        usize::try_from(len).map_err(|_| ProtocolError::NegativeLength { field, len })
    }

    /// Element count of an array whose elements take at least 4 bytes each.
    /// Rejects counts the header cannot possibly hold before allocating.
    fn read_count(&mut self, field: &'static str) -> Result<usize, ProtocolError> {
        let count = self.read_len(field)?;
        let needed = count.saturating_mul(INT_SIZE);
        if needed > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    pub fn read_byte_array(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_len("byte array")?;
        Ok(self.take(len)?.to_vec())
    }

    /// Length 0 decodes as the empty string. Bytes map one-to-one onto
    /// chars (single-byte character set).
    pub fn read_string(&mut self, max_size: usize) -> Result<String, ProtocolError> {
        let len = self.read_len("string")?;
        if len > max_size {
            return Err(ProtocolError::StringTooLong { len, max: max_size });
        }
        Ok(self.take(len)?.iter().map(|&b| char::from(b)).collect())
    }

    pub fn read_string_array(&mut self, max_size: usize) -> Result<Vec<String>, ProtocolError> {
        let count = self.read_count("string array")?;
        (0..count).map(|_| self.read_string(max_size)).collect()
    }

    pub fn read_int_array(&mut self) -> Result<Vec<i32>, ProtocolError> {
        let count = self.read_count("int array")?;
        (0..count).map(|_| self.read_int()).collect()
    }

    pub fn read_view_id(&mut self) -> Result<ViewId, ProtocolError> {
        let ltime = self.read_int()?;
        let endpt = self.read_string(ENDPT_MAX_SIZE)?;
        Ok(ViewId { ltime, endpt })
    }

    pub fn read_view_id_array(&mut self) -> Result<Vec<ViewId>, ProtocolError> {
        let count = self.read_count("view id array")?;
        (0..count).map(|_| self.read_view_id()).collect()
    }

    /// A key is either absent (length 0) or exactly [`KEY_SIZE`] bytes.
    pub fn read_key(&mut self) -> Result<Option<[u8; KEY_SIZE]>, ProtocolError> {
        let len = self.read_int()?;
        match usize::try_from(len) {
            Ok(0) => Ok(None),
            Ok(KEY_SIZE) => {
                let mut key = [0u8; KEY_SIZE];
                key.copy_from_slice(self.take(KEY_SIZE)?);
                Ok(Some(key))
            }
            _ => Err(ProtocolError::BadKeySize(len)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_big_endian() {
        let mut encoder = Encoder::default();
        encoder.write_int(0x0102_0304);
        encoder.write_int(-1);
        assert_eq!(
            encoder.as_bytes(),
            &[1u8, 2, 3, 4, 0xff, 0xff, 0xff, 0xff]
        );

        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_int().unwrap(), 0x0102_0304);
        assert_eq!(decoder.read_int().unwrap(), -1);
        decoder.finish().unwrap();
    }

    #[test]
    fn test_bool_is_int() {
        let mut encoder = Encoder::default();
        encoder.write_bool(true);
        encoder.write_bool(false);
        assert_eq!(encoder.as_bytes(), &[0u8, 0, 0, 1, 0, 0, 0, 0]);

        // Any non-zero value is true on the way in
        let mut decoder = Decoder::new(&[0, 0, 0, 7]);
        assert!(decoder.read_bool().unwrap());
    }

    #[test]
    fn test_time_split() {
        let mut encoder = Encoder::default();
        encoder.write_time(12.5);

        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_int().unwrap(), 1);
        assert_eq!(decoder.read_int().unwrap(), 250_000);

        let mut decoder = Decoder::new(encoder.as_bytes());
        assert!((decoder.read_time().unwrap() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_time_truncates_below_resolution() {
        let mut encoder = Encoder::default();
        // 3us is below the 10us step and is dropped
        encoder.write_time(0.000_003);
        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_time().unwrap(), 0.0);
    }

    #[test]
    fn test_string_and_null() {
        let mut encoder = Encoder::default();
        encoder.write_string(Some("Gmp"));
        encoder.write_string(None);
        encoder.write_string(Some(""));
        assert_eq!(&encoder.as_bytes()[..7], &[0, 0, 0, 3, b'G', b'm', b'p']);
        assert_eq!(&encoder.as_bytes()[7..], &[0u8; 8]);

        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_string(8).unwrap(), "Gmp");
        assert_eq!(decoder.read_string(8).unwrap(), "");
        assert_eq!(decoder.read_string(8).unwrap(), "");
        decoder.finish().unwrap();
    }

    #[test]
    fn test_string_over_max_rejected() {
        let mut encoder = Encoder::default();
        encoder.write_string(Some("0123456789"));
        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(
            decoder.read_string(8),
            Err(ProtocolError::StringTooLong { len: 10, max: 8 })
        );
    }

    #[test]
    fn test_high_bytes_decode_as_latin1() {
        let mut decoder = Decoder::new(&[0, 0, 0, 2, b'a', 0xe9]);
        assert_eq!(decoder.read_string(8).unwrap(), "a\u{e9}");
    }

    #[test]
    fn test_truncated_and_negative_lengths() {
        let mut decoder = Decoder::new(&[0, 0, 0, 9, 1, 2]);
        assert_eq!(
            decoder.read_byte_array(),
            Err(ProtocolError::Truncated {
                needed: 9,
                remaining: 2
            })
        );

        let mut decoder = Decoder::new(&[0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(
            decoder.read_byte_array(),
            Err(ProtocolError::NegativeLength {
                field: "byte array",
                len: -2
            })
        );

        let mut decoder = Decoder::new(&[0, 0]);
        assert!(matches!(
            decoder.read_int(),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_huge_array_count_rejected_before_alloc() {
        let mut decoder = Decoder::new(&[0x7f, 0xff, 0xff, 0xff]);
        assert!(matches!(
            decoder.read_string_array(48),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_arrays() {
        let mut encoder = Encoder::default();
        encoder.write_string_array(&["e1", "e2"]);
        encoder.write_int_array(&[0, 2, 5]);
        encoder.write_int(2);
        encoder.write_view_id(&ViewId::new(3, "e1"));
        encoder.write_view_id(&ViewId::new(4, "e2"));

        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_string_array(48).unwrap(), vec!["e1", "e2"]);
        assert_eq!(decoder.read_int_array().unwrap(), vec![0, 2, 5]);
        assert_eq!(
            decoder.read_view_id_array().unwrap(),
            vec![ViewId::new(3, "e1"), ViewId::new(4, "e2")]
        );
        decoder.finish().unwrap();
    }

    #[test]
    fn test_key_sizes() {
        let mut encoder = Encoder::default();
        encoder.write_byte_array(&[7u8; KEY_SIZE]);
        encoder.write_byte_array(&[]);
        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_key().unwrap(), Some([7u8; KEY_SIZE]));
        assert_eq!(decoder.read_key().unwrap(), None);

        let mut encoder = Encoder::default();
        encoder.write_byte_array(&[7u8; 16]);
        let mut decoder = Decoder::new(encoder.as_bytes());
        assert_eq!(decoder.read_key(), Err(ProtocolError::BadKeySize(16)));
    }

    #[test]
    fn test_finish_detects_leftover() {
        let mut decoder = Decoder::new(&[0, 0, 0, 1, 0, 0, 0, 2]);
        decoder.read_int().unwrap();
        assert_eq!(
            decoder.finish(),
            Err(ProtocolError::HeaderNotConsumed {
                consumed: 4,
                len: 8
            })
        );
    }

    #[test]
    fn test_capacity_doubles() {
        let mut encoder = Encoder::new(16);
        encoder.write_byte_array(&[0u8; 20]);
        assert_eq!(encoder.len(), 24);
        assert!(encoder.capacity() >= 32);
        assert!(!encoder.shrink_if_oversized());
    }

    #[test]
    fn test_shrink_after_large_header() {
        let mut encoder = Encoder::default();
        encoder.write_byte_array(&vec![0u8; HEADER_HIGH_WATER + 1]);
        assert!(encoder.capacity() > HEADER_HIGH_WATER);

        assert!(encoder.shrink_if_oversized());
        assert!(encoder.is_empty());
        assert!(encoder.capacity() < HEADER_HIGH_WATER);
    }
}
