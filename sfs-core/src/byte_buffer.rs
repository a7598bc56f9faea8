//! Big-endian byte buffer with independent read and write cursors.
//!
//! Mirrors the primitive-by-primitive wire codec used to serialize the
//! super block, inodes and directory entries: no serde, just explicit
//! big-endian writes at an advancing cursor. Overrunning the backing
//! buffer is an implementation error, not a runtime condition, so the
//! bounds checks here panic rather than return a `Result`.

pub struct ByteBuffer {
    buf: Vec<u8>,
    reader: usize,
    writer: usize,
}

impl ByteBuffer {
    /// Creates a zero-filled buffer of the given capacity for writing.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            reader: 0,
            writer: 0,
        }
    }

    /// Wraps existing bytes for reading.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let writer = bytes.len();
        Self {
            buf: bytes,
            reader: 0,
            writer,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf[self.writer] = v;
        self.writer += 1;
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_u16(v as u16);
    }

    pub fn write_u16(&mut self, v: u16) {
        let bytes = v.to_be_bytes();
        self.buf[self.writer..self.writer + 2].copy_from_slice(&bytes);
        self.writer += 2;
    }

    pub fn write_u32(&mut self, v: u32) {
        let bytes = v.to_be_bytes();
        self.buf[self.writer..self.writer + 4].copy_from_slice(&bytes);
        self.writer += 4;
    }

    pub fn write_u64(&mut self, v: u64) {
        let bytes = v.to_be_bytes();
        self.buf[self.writer..self.writer + 8].copy_from_slice(&bytes);
        self.writer += 8;
    }

    /// Writes a NUL-terminated string.
    pub fn write_string(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.buf[self.writer..self.writer + bytes.len()].copy_from_slice(bytes);
        self.writer += bytes.len();
        self.write_u8(0);
    }

    pub fn read_u8(&mut self) -> u8 {
        let v = self.buf[self.reader];
        self.reader += 1;
        v
    }

    pub fn read_i16(&mut self) -> i16 {
        self.read_u16() as i16
    }

    pub fn read_u16(&mut self) -> u16 {
        let v = u16::from_be_bytes(self.buf[self.reader..self.reader + 2].try_into().unwrap());
        self.reader += 2;
        v
    }

    pub fn read_u32(&mut self) -> u32 {
        let v = u32::from_be_bytes(self.buf[self.reader..self.reader + 4].try_into().unwrap());
        self.reader += 4;
        v
    }

    pub fn read_u64(&mut self) -> u64 {
        let v = u64::from_be_bytes(self.buf[self.reader..self.reader + 8].try_into().unwrap());
        self.reader += 8;
        v
    }

    /// Reads a NUL-terminated string, stopping at (and consuming) the
    /// terminator.
    pub fn read_string(&mut self) -> String {
        let start = self.reader;
        while self.buf[self.reader] != 0 {
            self.reader += 1;
        }
        let s = String::from_utf8_lossy(&self.buf[start..self.reader]).into_owned();
        self.reader += 1;
        s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        let mut buf = ByteBuffer::new(64);
        buf.write_u64(0xdead_beef_cafe_babe);
        buf.write_u32(42);
        buf.write_u8(7);
        buf.write_i16(-1);
        buf.write_string("entry");

        let mut reader = ByteBuffer::from_bytes(buf.into_bytes());
        assert_eq!(reader.read_u64(), 0xdead_beef_cafe_babe);
        assert_eq!(reader.read_u32(), 42);
        assert_eq!(reader.read_u8(), 7);
        assert_eq!(reader.read_i16(), -1);
        assert_eq!(reader.read_string(), "entry");
    }

    #[test]
    fn empty_string_round_trips() {
        let mut buf = ByteBuffer::new(8);
        buf.write_string("");
        let mut reader = ByteBuffer::from_bytes(buf.into_bytes());
        assert_eq!(reader.read_string(), "");
    }
}
