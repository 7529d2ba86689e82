//! The three-mode record serializer.
//!
//! Every structured record (signature descriptors, pipeline descriptors,
//! render passes, shader metadata) is described by one traversal function —
//! its [`Serialize`] impl — which runs in three modes:
//!
//! - [`Measure`]: accumulates the encoded size without touching memory.
//!   Never fails.
//! - [`Writer`]: encodes each field in traversal order into a buffer sized
//!   by a prior measure pass. Finishing anywhere but exactly at the end of
//!   the buffer is a bug, checked by [`Writer::finish`].
//! - [`Reader`]: decodes fields in the same order, allocating owned strings
//!   and vectors. Malformed input surfaces as
//!   [`PipepackError::Serialization`]; the reader never continues past a
//!   failed read.
//!
//! Sharing one traversal across all three modes is what keeps
//! "measure, then write" byte-exact with what "read" expects.
//!
//! Primitives are fixed-width little-endian. Strings are length-prefixed.
//! Enums are `u32` tags validated on decode. [`SerializerMode::tail`]
//! consumes the remainder of the record unprefixed and is used for shader
//! bytecode, which always sits at the end of its record.

use crate::error::{PipepackError, Result};

/// A record that can be measured, written, and read by one traversal.
pub trait Serialize {
    /// Visits every serialized field of `self`, in a fixed order shared by
    /// all three modes.
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()>;
}

/// One of the three serializer modes.
///
/// Implementations visit primitive fields; [`Serialize`] impls compose them
/// into record traversals.
pub trait SerializerMode: Sized {
    /// True for the decoding mode. Traversals branch on this only where a
    /// value must be reconstructed rather than copied (enum tags, optional
    /// fields, sequence lengths).
    const READS: bool;

    /// Visits a `u8` field.
    fn u8(&mut self, v: &mut u8) -> Result<()>;
    /// Visits a `u32` field.
    fn u32(&mut self, v: &mut u32) -> Result<()>;
    /// Visits an `i32` field.
    fn i32(&mut self, v: &mut i32) -> Result<()>;
    /// Visits an `f32` field.
    fn f32(&mut self, v: &mut f32) -> Result<()>;
    /// Visits a `bool` field (one byte; decoding rejects values other than
    /// 0 and 1).
    fn bool(&mut self, v: &mut bool) -> Result<()>;
    /// Visits a length-prefixed UTF-8 string field.
    fn str(&mut self, v: &mut String) -> Result<()>;
    /// Visits a length-prefixed byte-array field.
    fn bytes(&mut self, v: &mut Vec<u8>) -> Result<()>;
    /// Visits an unprefixed byte run extending to the end of the record.
    ///
    /// Must be the last field of a traversal.
    fn tail(&mut self, v: &mut Vec<u8>) -> Result<()>;

    /// Bytes left in the record, or `usize::MAX` when the mode has no
    /// underlying buffer. Used to reject absurd sequence lengths before
    /// allocating.
    fn remaining(&self) -> usize {
        usize::MAX
    }

    /// Visits an optional string as a presence flag plus the string.
    fn opt_str(&mut self, v: &mut Option<String>) -> Result<()> {
        let mut present = v.is_some();
        self.bool(&mut present)?;
        if present {
            let mut s = v.take().unwrap_or_default();
            self.str(&mut s)?;
            *v = Some(s);
        } else {
            *v = None;
        }
        Ok(())
    }

    /// Visits a sequence as a `u32` count followed by the elements.
    fn seq<T: Serialize + Default>(&mut self, items: &mut Vec<T>) -> Result<()> {
        let mut count = items.len() as u32;
        self.u32(&mut count)?;
        if Self::READS {
            if count as usize > self.remaining() {
                return Err(PipepackError::Serialization(format!(
                    "sequence length {count} exceeds remaining data"
                )));
            }
            items.clear();
            items.resize_with(count as usize, T::default);
        }
        for item in items.iter_mut() {
            item.serialize(self)?;
        }
        Ok(())
    }
}

impl Serialize for u32 {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.u32(self)
    }
}

impl Serialize for String {
    fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
        ser.str(self)
    }
}

fn truncated() -> PipepackError {
    PipepackError::Serialization("record ends unexpectedly".into())
}

// --- Measure ---

/// Size-accumulating mode.
#[derive(Debug, Default)]
pub struct Measure {
    size: usize,
}

impl Measure {
    /// Creates a measurer with zero accumulated size.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of bytes the traversed record encodes to.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl SerializerMode for Measure {
    const READS: bool = false;

    fn u8(&mut self, _: &mut u8) -> Result<()> {
        self.size += 1;
        Ok(())
    }

    fn u32(&mut self, _: &mut u32) -> Result<()> {
        self.size += 4;
        Ok(())
    }

    fn i32(&mut self, _: &mut i32) -> Result<()> {
        self.size += 4;
        Ok(())
    }

    fn f32(&mut self, _: &mut f32) -> Result<()> {
        self.size += 4;
        Ok(())
    }

    fn bool(&mut self, _: &mut bool) -> Result<()> {
        self.size += 1;
        Ok(())
    }

    fn str(&mut self, v: &mut String) -> Result<()> {
        self.size += 4 + v.len();
        Ok(())
    }

    fn bytes(&mut self, v: &mut Vec<u8>) -> Result<()> {
        self.size += 4 + v.len();
        Ok(())
    }

    fn tail(&mut self, v: &mut Vec<u8>) -> Result<()> {
        self.size += v.len();
        Ok(())
    }
}

// --- Writer ---

/// Encoding mode over a preallocated buffer.
#[derive(Debug)]
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Creates a writer over `buf`, which must be exactly the measured size
    /// of the record about to be traversed.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Checks that the traversal filled the buffer exactly.
    pub fn finish(self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(PipepackError::Serialization(format!(
                "write cursor stopped at {} of {} measured bytes",
                self.pos,
                self.buf.len()
            )));
        }
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        let end = self.pos + bytes.len();
        let slot = self.buf.get_mut(self.pos..end).ok_or_else(|| {
            PipepackError::Serialization("write overruns measured size".into())
        })?;
        slot.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }
}

impl SerializerMode for Writer<'_> {
    const READS: bool = false;

    fn u8(&mut self, v: &mut u8) -> Result<()> {
        self.put(&[*v])
    }

    fn u32(&mut self, v: &mut u32) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    fn i32(&mut self, v: &mut i32) -> Result<()> {
        self.put(&v.to_le_bytes())
    }

    fn f32(&mut self, v: &mut f32) -> Result<()> {
        self.put(&v.to_bits().to_le_bytes())
    }

    fn bool(&mut self, v: &mut bool) -> Result<()> {
        self.put(&[u8::from(*v)])
    }

    fn str(&mut self, v: &mut String) -> Result<()> {
        self.put(&(v.len() as u32).to_le_bytes())?;
        let bytes = std::mem::take(v);
        self.put(bytes.as_bytes())?;
        *v = bytes;
        Ok(())
    }

    fn bytes(&mut self, v: &mut Vec<u8>) -> Result<()> {
        self.put(&(v.len() as u32).to_le_bytes())?;
        let bytes = std::mem::take(v);
        self.put(&bytes)?;
        *v = bytes;
        Ok(())
    }

    fn tail(&mut self, v: &mut Vec<u8>) -> Result<()> {
        let bytes = std::mem::take(v);
        self.put(&bytes)?;
        *v = bytes;
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

// --- Reader ---

/// Decoding mode over a record's bytes.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over a record's bytes.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// True when every byte of the record has been consumed.
    pub fn is_end(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Checks that the traversal consumed the record exactly.
    pub fn finish(self) -> Result<()> {
        if !self.is_end() {
            return Err(PipepackError::Serialization(format!(
                "{} trailing bytes after record",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(truncated)?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.take(N)?.try_into().map_err(|_| truncated())
    }
}

impl SerializerMode for Reader<'_> {
    const READS: bool = true;

    fn u8(&mut self, v: &mut u8) -> Result<()> {
        *v = self.take_fixed::<1>()?[0];
        Ok(())
    }

    fn u32(&mut self, v: &mut u32) -> Result<()> {
        *v = u32::from_le_bytes(self.take_fixed::<4>()?);
        Ok(())
    }

    fn i32(&mut self, v: &mut i32) -> Result<()> {
        *v = i32::from_le_bytes(self.take_fixed::<4>()?);
        Ok(())
    }

    fn f32(&mut self, v: &mut f32) -> Result<()> {
        *v = f32::from_bits(u32::from_le_bytes(self.take_fixed::<4>()?));
        Ok(())
    }

    fn bool(&mut self, v: &mut bool) -> Result<()> {
        *v = match self.take_fixed::<1>()?[0] {
            0 => false,
            1 => true,
            other => {
                return Err(PipepackError::Serialization(format!(
                    "invalid bool byte ({other})"
                )))
            }
        };
        Ok(())
    }

    fn str(&mut self, v: &mut String) -> Result<()> {
        let len = u32::from_le_bytes(self.take_fixed::<4>()?) as usize;
        let bytes = self.take(len)?;
        *v = std::str::from_utf8(bytes)
            .map_err(|_| PipepackError::Serialization("string is not valid UTF-8".into()))?
            .to_owned();
        Ok(())
    }

    fn bytes(&mut self, v: &mut Vec<u8>) -> Result<()> {
        let len = u32::from_le_bytes(self.take_fixed::<4>()?) as usize;
        *v = self.take(len)?.to_vec();
        Ok(())
    }

    fn tail(&mut self, v: &mut Vec<u8>) -> Result<()> {
        *v = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

// --- Record helpers ---

/// Measures and encodes a record in one call.
///
/// The write pass is checked against the measure pass: a traversal that
/// produces different sizes in different modes is a bug and is reported as a
/// [`PipepackError::Serialization`].
pub fn serialize_record<T: Serialize + Clone>(value: &T) -> Result<Vec<u8>> {
    let mut scratch = value.clone();
    let mut measure = Measure::new();
    scratch.serialize(&mut measure)?;
    let mut buf = vec![0u8; measure.size()];
    let mut writer = Writer::new(&mut buf);
    scratch.serialize(&mut writer)?;
    writer.finish()?;
    Ok(buf)
}

/// Decodes a record, requiring the traversal to consume `bytes` exactly.
pub fn read_record<T: Serialize + Default>(bytes: &[u8]) -> Result<T> {
    let mut value = T::default();
    let mut reader = Reader::new(bytes);
    value.serialize(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Sample {
        id: u32,
        label: String,
        weight: f32,
        enabled: bool,
        payload: Vec<u8>,
    }

    impl Serialize for Sample {
        fn serialize<M: SerializerMode>(&mut self, ser: &mut M) -> Result<()> {
            ser.u32(&mut self.id)?;
            ser.str(&mut self.label)?;
            ser.f32(&mut self.weight)?;
            ser.bool(&mut self.enabled)?;
            ser.tail(&mut self.payload)
        }
    }

    #[test]
    fn measure_matches_write() {
        let sample = Sample {
            id: 7,
            label: "albedo".into(),
            weight: 0.25,
            enabled: true,
            payload: vec![1, 2, 3],
        };
        let mut measure = Measure::new();
        sample.clone().serialize(&mut measure).unwrap();
        let encoded = serialize_record(&sample).unwrap();
        assert_eq!(encoded.len(), measure.size());
    }

    #[test]
    fn round_trip() {
        let sample = Sample {
            id: u32::MAX,
            label: String::new(),
            weight: -1.5,
            enabled: false,
            payload: vec![0xAB; 32],
        };
        let encoded = serialize_record(&sample).unwrap();
        let decoded: Sample = read_record(&encoded).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn truncated_record_fails() {
        let sample = Sample {
            id: 1,
            label: "x".into(),
            ..Sample::default()
        };
        let encoded = serialize_record(&sample).unwrap();
        assert!(read_record::<Sample>(&encoded[..encoded.len() - 3]).is_err());
    }

    #[test]
    fn bogus_sequence_length_is_rejected() {
        // A u32 count far larger than the remaining bytes must fail before
        // allocating.
        let bytes = u32::MAX.to_le_bytes();
        let mut reader = Reader::new(&bytes);
        let mut items: Vec<u32> = Vec::new();
        assert!(reader.seq(&mut items).is_err());
    }
}
