use crate::layout::{header_address, FileHeader, Name, WRITTEN_SIZE_OFFSET};
use crate::{Storage, Volume};

/// Token for an open file, checked by the [`Volume`] that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

/// One slot of the handle pool.
#[derive(Default)]
pub(crate) struct OpenFile {
    pub in_use: bool,
    /// Bumped on release, so handles to an earlier occupant stop matching.
    pub generation: u32,
    pub index: u32,
    pub header: FileHeader,
    /// Always within `0..=header.data_written_size`.
    pub cursor: u32,
}

impl OpenFile {
    pub fn release(&mut self) {
        if self.in_use {
            self.in_use = false;
            self.generation = self.generation.wrapping_add(1);
        }
    }

    fn bound_read(&self, count: usize) -> u32 {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let left = self.header.data_written_size.saturating_sub(self.cursor);
        count.min(left)
    }

    fn bound_write(&self, count: usize) -> u32 {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        let left = self.header.data_max_size.saturating_sub(self.cursor);
        count.min(left)
    }
}

/// An open file, borrowed from its [`Volume`].
///
/// Reads stop at the written size, writes stop at the capacity reserved at
/// creation. Both return the number of bytes moved and advance the cursor by
/// exactly that much.
pub struct File<'a, S, const N: usize> {
    volume: &'a mut Volume<S, N>,
    slot: usize,
}

impl<'a, S: Storage, const N: usize> File<'a, S, N> {
    pub(crate) fn new(volume: &'a mut Volume<S, N>, slot: usize) -> Self {
        Self { volume, slot }
    }

    fn open_file(&self) -> &OpenFile {
        &self.volume.slots[self.slot]
    }

    /// Position in the file table.
    pub fn index(&self) -> u32 {
        self.open_file().index
    }

    pub fn name(&self) -> &Name {
        &self.open_file().header.name
    }

    /// Bytes written so far, the high-water mark.
    pub fn size(&self) -> u32 {
        self.open_file().header.data_written_size
    }

    pub fn max_size(&self) -> u32 {
        self.open_file().header.data_max_size
    }

    pub fn tell(&self) -> u32 {
        self.open_file().cursor
    }

    /// Move the cursor to `offset` if it lies before the end of the file.
    ///
    /// Returns the cursor afterwards; a refused seek leaves it where it was.
    pub fn seek(&mut self, offset: u32) -> u32 {
        let file = &mut self.volume.slots[self.slot];
        if offset < file.header.data_written_size {
            file.cursor = offset;
        }
        file.cursor
    }

    pub fn read(&mut self, buf: &mut [u8]) -> u32 {
        let Volume { stream, slots, .. } = &mut *self.volume;
        let file = &mut slots[self.slot];

        let count = file.bound_read(buf.len());
        let address = file.header.data_offset.wrapping_add(file.cursor);
        let done = stream.read_at(address, &mut buf[..count as usize]);
        file.cursor += done;

        trace!(
            "read '{}': {}/{} bytes, cursor {}",
            file.header.name,
            done,
            buf.len(),
            file.cursor
        );
        done
    }

    /// Write at the cursor. Moving past the written size raises it and
    /// rewrites the size field of the file header straight away.
    ///
    /// If that size field can not be written, the size stays where it was
    /// and only the bytes below it count as written.
    pub fn write(&mut self, data: &[u8]) -> u32 {
        let Volume { stream, slots, .. } = &mut *self.volume;
        let file = &mut slots[self.slot];

        let start = file.cursor;
        let count = file.bound_write(data.len());
        let address = file.header.data_offset.wrapping_add(start);
        let mut done = stream.write_at(address, &data[..count as usize]);
        file.cursor += done;

        trace!(
            "write '{}': {}/{} bytes, cursor {}",
            file.header.name,
            done,
            data.len(),
            file.cursor
        );

        let size = file.header.data_written_size;
        if file.cursor > size {
            stream.seek(header_address(file.index));
            stream.skip(WRITTEN_SIZE_OFFSET);
            if stream.write(&file.cursor.to_le_bytes()) == 4 {
                file.header.data_written_size = file.cursor;
            } else {
                // bytes past the stored size would vanish on the next mount
                error!("size of '{}' not persisted", file.header.name);
                stream.seek(header_address(file.index));
                stream.skip(WRITTEN_SIZE_OFFSET);
                stream.write(&size.to_le_bytes());
                done = size.saturating_sub(start);
                file.cursor = start + done;
            }
        }
        done
    }

    /// Seek, then read. Reads nothing if the seek is refused.
    pub fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> u32 {
        if self.seek(offset) != offset {
            return 0;
        }
        self.read(buf)
    }

    /// Position at `offset`, then write. `offset` may equal the size to
    /// append; anything further out writes nothing.
    pub fn write_at(&mut self, offset: u32, data: &[u8]) -> u32 {
        if offset == self.size() {
            self.volume.slots[self.slot].cursor = offset;
        } else if self.seek(offset) != offset {
            return 0;
        }
        self.write(data)
    }

    /// Read the file from the start.
    pub fn load(&mut self, buf: &mut [u8]) -> u32 {
        self.volume.slots[self.slot].cursor = 0;
        self.read(buf)
    }

    /// Write `data` from the start of the file. The size never shrinks.
    pub fn save(&mut self, data: &[u8]) -> u32 {
        self.volume.slots[self.slot].cursor = 0;
        self.write(data)
    }

    pub fn close(self) {
        self.volume.release_slot(self.slot);
    }
}
