use crate::error::DecodeError;

use super::types::{Id, Location, ReferenceTypeId, TypeTag};

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

/// Big-endian payload builder.
#[derive(Debug, Default)]
pub struct JdwpWriter {
    buf: Vec<u8>,
}

impl JdwpWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything written so far. Used when a handler fails half way.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Lists and strings carry a signed 4-byte count on the wire.
    pub fn write_count(&mut self, n: usize) {
        self.write_i32(i32::try_from(n).unwrap_or(i32::MAX));
    }

    pub fn write_string(&mut self, s: &str) {
        // JDWP strings are length-prefixed with a u32 number of bytes.
        self.write_u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_id(&mut self, id: Id) {
        self.write_u64(id.as_u64());
    }

    pub fn write_reference_type(&mut self, ty: ReferenceTypeId) {
        self.write_u8(ty.tag.as_u8());
        self.write_id(ty.id);
    }

    pub fn write_location(&mut self, loc: &Location) {
        self.write_u8(loc.type_tag.as_u8());
        self.write_id(loc.class_id);
        self.write_id(loc.method_id);
        self.write_u64(loc.index);
    }
}

/// Cursor over a command payload.
pub struct JdwpReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> JdwpReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn require(&self, n: usize) -> DecodeResult<()> {
        let underflow = || DecodeError::Truncated {
            needed: n,
            pos: self.pos,
            len: self.buf.len(),
        };
        let end = self.pos.checked_add(n).ok_or_else(underflow)?;
        if end > self.buf.len() {
            return Err(underflow());
        }
        Ok(())
    }

    fn take<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        self.require(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> DecodeResult<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_i16(&mut self) -> DecodeResult<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_u32(&mut self) -> DecodeResult<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> DecodeResult<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_u64(&mut self) -> DecodeResult<u64> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> DecodeResult<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Signed list count; negative values are rejected.
    pub fn read_count(&mut self) -> DecodeResult<usize> {
        let n = self.read_i32()?;
        usize::try_from(n).map_err(|_| DecodeError::InvalidLength(i64::from(n)))
    }

    pub fn read_string(&mut self) -> DecodeResult<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| DecodeError::InvalidString(e.to_string()))
    }

    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        self.require(len)?;
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_id(&mut self) -> DecodeResult<Id> {
        Ok(Id::from_raw(self.read_u64()?))
    }

    pub fn read_type_tag(&mut self) -> DecodeResult<TypeTag> {
        let raw = self.read_u8()?;
        TypeTag::from_u8(raw).ok_or(DecodeError::UnknownTypeTag(raw))
    }

    pub fn read_location(&mut self) -> DecodeResult<Location> {
        Ok(Location {
            type_tag: self.read_type_tag()?,
            class_id: self.read_id()?,
            method_id: self.read_id()?,
            index: self.read_u64()?,
        })
    }
}
