//! Record wire layout.
//!
//! ```text
//! record  := len(u64 LE) | crc32(u32 LE, over payload) | payload
//! payload := magic(u32 LE = "EXR1") | field_count(u32 LE) | field*
//! field   := name_len(u16 LE) | name | kind(u8) | count(u32 LE) | values
//! ```
//!
//! Values are little-endian `i64`/`f32` lists, or length-prefixed byte
//! strings for the bytes kind.

use crate::{
    common::*,
    error::malformed,
    example::RawExample,
    feature::{Feature, FeatureKind},
};

/// Magic prefix of a record payload (ASCII "EXR1").
pub const RECORD_MAGIC: u32 = 0x4558_5231;

/// Upper bound on one record payload. Guards allocations against corrupt
/// length fields.
pub const MAX_PAYLOAD_BYTES: u64 = 1 << 30;

/// Upper bound on a field name.
pub const MAX_FIELD_NAME_BYTES: usize = 1 << 10;

/// Upper bound on the element count of one feature list.
pub const MAX_LIST_LEN: u32 = 1 << 24;

/// CRC32 of a record payload.
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Encode an untyped record into its payload bytes.
pub fn encode_payload(example: &RawExample) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    buf.write_u32::<LittleEndian>(RECORD_MAGIC)?;
    buf.write_u32::<LittleEndian>(example.len() as u32)?;

    for (name, feature) in example {
        ensure!(
            name.len() <= MAX_FIELD_NAME_BYTES,
            "field name of {} bytes exceeds {} bytes",
            name.len(),
            MAX_FIELD_NAME_BYTES
        );
        ensure!(
            feature.len() <= MAX_LIST_LEN as usize,
            "field '{}' exceeds {} elements",
            name,
            MAX_LIST_LEN
        );

        buf.write_u16::<LittleEndian>(name.len() as u16)?;
        buf.extend_from_slice(name.as_bytes());
        buf.write_u8(feature.kind() as u8)?;
        buf.write_u32::<LittleEndian>(feature.len() as u32)?;

        match feature {
            Feature::IntList(values) => {
                for value in values {
                    buf.write_i64::<LittleEndian>(*value)?;
                }
            }
            Feature::FloatList(values) => {
                for value in values {
                    buf.write_f32::<LittleEndian>(*value)?;
                }
            }
            Feature::BytesList(items) => {
                for item in items {
                    buf.write_u32::<LittleEndian>(item.len() as u32)?;
                    buf.extend_from_slice(item);
                }
            }
        }
    }

    Ok(buf)
}

/// Decode a record payload back into the untyped field map.
///
/// Every failure is a [`RecordError::Malformed`](crate::RecordError) kind.
pub fn decode_payload(payload: &[u8]) -> Result<RawExample> {
    let mut cursor = Cursor::new(payload);

    let magic = cursor.read_u32()?;
    if magic != RECORD_MAGIC {
        return Err(malformed(format!("bad record magic {:#010x}", magic)));
    }

    let field_count = cursor.read_u32()?;
    let mut example = RawExample::with_capacity(field_count as usize);

    for _ in 0..field_count {
        let name_len = cursor.read_u16()? as usize;
        if name_len > MAX_FIELD_NAME_BYTES {
            return Err(malformed(format!("field name of {} bytes", name_len)));
        }
        let name = String::from_utf8(cursor.read_bytes(name_len)?)
            .map_err(|_| malformed("field name is not valid UTF-8"))?;

        let tag = cursor.read_u8()?;
        let kind = FeatureKind::from_tag(tag)
            .ok_or_else(|| malformed(format!("unknown feature kind tag {}", tag)))?;

        let count = cursor.read_u32()?;
        if count > MAX_LIST_LEN {
            return Err(malformed(format!(
                "field '{}' claims {} elements",
                name, count
            )));
        }

        let feature = match kind {
            FeatureKind::Int => {
                cursor.check_remaining(count as u64 * 8, &name)?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(cursor.read_i64()?);
                }
                Feature::IntList(values)
            }
            FeatureKind::Float => {
                cursor.check_remaining(count as u64 * 4, &name)?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(cursor.read_f32()?);
                }
                Feature::FloatList(values)
            }
            FeatureKind::Bytes => {
                cursor.check_remaining(count as u64 * 4, &name)?;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let len = cursor.read_u32()? as usize;
                    items.push(cursor.read_bytes(len)?);
                }
                Feature::BytesList(items)
            }
        };

        if example.insert(name.clone(), feature).is_some() {
            return Err(malformed(format!("duplicated field '{}'", name)));
        }
    }

    if cursor.pos != payload.len() {
        return Err(malformed(format!(
            "{} trailing bytes after the last field",
            payload.len() - cursor.pos
        )));
    }

    Ok(example)
}

/// Bounds-checked little-endian reads over a payload slice. All failures are
/// malformed-record errors, never panics.
struct Cursor<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    fn check_remaining(&self, needed: u64, field: &str) -> Result<()> {
        if needed > self.remaining() as u64 {
            return Err(malformed(format!(
                "field '{}' is truncated: {} bytes claimed, {} left",
                field,
                needed,
                self.remaining()
            )));
        }
        Ok(())
    }

    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| malformed("truncated payload"))?;
        let bytes = self.payload[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self
            .pos
            .checked_add(N)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| malformed("truncated payload"))?;
        let mut array = [0u8; N];
        array.copy_from_slice(&self.payload[self.pos..end]);
        self.pos = end;
        Ok(array)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }
}
