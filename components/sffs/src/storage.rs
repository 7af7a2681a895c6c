/// Raw addressable byte storage, usually an FRAM chip behind a serial bus.
///
/// Both methods return the number of bytes actually transferred. A short
/// count is a legal outcome; the file system reports it to its callers
/// instead of retrying.
pub trait Storage {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize;
    fn write(&mut self, address: u32, data: &[u8]) -> usize;
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        (**self).write(address, data)
    }
}

/// RAM model of a `SIZE` byte chip.
///
/// Addresses wrap at `SIZE` the way the address decoder of a real part
/// ignores the upper address bits, so the capacity probe works against it.
pub struct RamStorage<const SIZE: usize> {
    buf: [u8; SIZE],
}

impl<const SIZE: usize> RamStorage<SIZE> {
    pub const fn new() -> Self {
        Self { buf: [0; SIZE] }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn wrap(address: u32, i: usize) -> usize {
        (address as usize).wrapping_add(i) % SIZE
    }
}

impl<const SIZE: usize> Default for RamStorage<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> Storage for RamStorage<SIZE> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        if SIZE == 0 {
            return 0;
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.buf[Self::wrap(address, i)];
        }
        buf.len()
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        if SIZE == 0 {
            return 0;
        }
        for (i, byte) in data.iter().enumerate() {
            self.buf[Self::wrap(address, i)] = *byte;
        }
        data.len()
    }
}
