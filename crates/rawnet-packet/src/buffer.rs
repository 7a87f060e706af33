/// A byte buffer over either a borrowed or a mutably borrowed packet.
///
/// Multi-byte fields are always read and written in network byte order.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl Buffer<'_> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Immutable(packet) => packet,
            Buffer::Mutable(packet) => packet,
        }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Buffer::Immutable(_) => panic!("write operation called on readonly buffer"),
            Buffer::Mutable(packet) => packet,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn read(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    pub fn write(&mut self, offset: usize, val: u8) {
        self.as_slice_mut()[offset] = val;
    }

    pub fn get_bytes<const N: usize>(&self, offset: usize) -> [u8; N] {
        core::array::from_fn(|i| self.read(offset + i))
    }

    pub fn set_bytes<const N: usize>(&mut self, offset: usize, bytes: [u8; N]) {
        self.as_slice_mut()[offset..offset + N].copy_from_slice(&bytes);
    }

    /// Read a big-endian `u16` at `offset`.
    pub fn get_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes(self.get_bytes(offset))
    }

    /// Write `val` as a big-endian `u16` at `offset`.
    pub fn set_u16(&mut self, offset: usize, val: u16) {
        self.set_bytes(offset, val.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_buffer() {
        let buf = [0x12, 0x34, 0x56];
        let buffer = Buffer::Immutable(&buf);
        assert_eq!(&buf, buffer.as_slice());
        assert_eq!(3, buffer.len());
        assert_eq!(0x12, buffer.read(0));
        assert_eq!(0x3456, buffer.get_u16(1));
        assert_eq!([0x12, 0x34], buffer.get_bytes(0));
    }

    #[test]
    fn test_mutable_buffer() {
        let mut buf = [0_u8; 4];
        let mut buffer = Buffer::Mutable(&mut buf);
        buffer.set_u16(0, 0xbeef);
        buffer.write(2, 0x7f);
        buffer.set_bytes(3, [0x01]);
        assert_eq!(&[0xbe, 0xef, 0x7f, 0x01], buffer.as_slice());
        buffer.as_slice_mut().fill(0);
        assert_eq!(0, buffer.get_u16(2));
    }

    #[test]
    #[should_panic(expected = "write operation called on readonly buffer")]
    fn test_immutable_buffer_cannot_write() {
        let buf = [0_u8; 2];
        let mut buffer = Buffer::Immutable(&buf);
        buffer.set_u16(0, 1);
    }
}
