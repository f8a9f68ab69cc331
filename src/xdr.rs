//! Minimal XDR (RFC 4506) primitives: big-endian 4-byte aligned integers,
//! fixed and variable-length opaque data.

use anyhow::{anyhow, Result};

#[derive(Debug, Default)]
pub struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn fixed_opaque(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self.pad(bytes.len());
        self
    }

    pub fn var_opaque(&mut self, bytes: &[u8]) -> &mut Self {
        self.u32(bytes.len() as u32);
        self.fixed_opaque(bytes)
    }

    /// Absent optional (`T*` in XDR).
    pub fn none(&mut self) -> &mut Self {
        self.u32(0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn pad(&mut self, len: usize) {
        let rem = len % 4;
        if rem != 0 {
            self.buf.extend(std::iter::repeat(0_u8).take(4 - rem));
        }
    }
}

pub struct XdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn i64(&mut self) -> Result<i64> {
        let bytes = self.take(8)?;
        let mut arr = [0_u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(arr))
    }

    pub fn fixed_opaque<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.take(N)?;
        let mut arr = [0_u8; N];
        arr.copy_from_slice(bytes);
        self.skip_pad(N)?;
        Ok(arr)
    }

    pub fn var_opaque(&mut self, max_len: usize) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        if len > max_len {
            return Err(anyhow!("opaque length {len} exceeds limit {max_len}"));
        }
        let bytes = self.take(len)?;
        self.skip_pad(len)?;
        Ok(bytes)
    }

    /// Read a union discriminant and require a specific arm.
    pub fn expect_u32(&mut self, expected: u32, what: &str) -> Result<()> {
        let got = self.u32()?;
        if got != expected {
            return Err(anyhow!("unsupported {what} {got} (expected {expected})"));
        }
        Ok(())
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(anyhow!(
                "{} trailing bytes after XDR value",
                self.buf.len() - self.pos
            ));
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| anyhow!("unexpected end of XDR input at byte {}", self.pos))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn skip_pad(&mut self, len: usize) -> Result<()> {
        let rem = len % 4;
        if rem != 0 {
            self.take(4 - rem)?;
        }
        Ok(())
    }
}
