use crate::Storage;

/// Sequential cursor over a [`Storage`].
///
/// The stream does no bounds checking at all, it only tracks where the next
/// transfer goes. After every transfer the cursor moves by the number of
/// bytes the storage reported as done.
pub struct Stream<S> {
    storage: S,
    offset: u32,
}

impl<S: Storage> Stream<S> {
    pub const fn new(storage: S) -> Self {
        Self { storage, offset: 0 }
    }

    pub fn seek(&mut self, offset: u32) {
        self.offset = offset;
    }

    pub fn tell(&self) -> u32 {
        self.offset
    }

    /// Move past `count` bytes without touching them.
    pub fn skip(&mut self, count: u32) {
        self.offset = self.offset.wrapping_add(count);
    }

    pub fn read(&mut self, buf: &mut [u8]) -> u32 {
        let done = self.storage.read(self.offset, buf).min(buf.len());
        self.advance(done)
    }

    pub fn write(&mut self, data: &[u8]) -> u32 {
        let done = self.storage.write(self.offset, data).min(data.len());
        self.advance(done)
    }

    pub fn read_at(&mut self, address: u32, buf: &mut [u8]) -> u32 {
        self.seek(address);
        self.read(buf)
    }

    pub fn write_at(&mut self, address: u32, data: &[u8]) -> u32 {
        self.seek(address);
        self.write(data)
    }

    pub fn storage(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn release(self) -> S {
        self.storage
    }

    fn advance(&mut self, done: usize) -> u32 {
        // slices handed in by the file layer fit the 32 bit address space
        let done = done as u32;
        self.offset = self.offset.wrapping_add(done);
        done
    }
}
