use crate::file::{File, Handle, OpenFile};
use crate::layout::{
    header_address, FileHeader, Name, Superblock, HEADER_SIZE,
    PRESENCE_ADDRESS, PRESENCE_PATTERN, PROBE_STRIDE, SUPERBLOCK_SIZE,
};
use crate::{Error, Result, Storage, Stream};

/// Default size of the handle pool.
pub const MAX_OPEN_FILES: usize = 4;

enum State {
    Unformatted,
    Mounted(Superblock),
}

/// A formatted chip, plus the pool of up to `N` open files.
pub struct Volume<S, const N: usize = MAX_OPEN_FILES> {
    pub(crate) stream: Stream<S>,
    pub(crate) slots: [OpenFile; N],
    capacity: Option<u32>,
    state: State,
}

impl<S: Storage, const N: usize> Volume<S, N> {
    pub fn new(storage: S) -> Self {
        Self {
            stream: Stream::new(storage),
            slots: core::array::from_fn(|_| OpenFile::default()),
            capacity: None,
            state: State::Unformatted,
        }
    }

    /// Hand back the storage. Open handles are lost, their data is not.
    pub fn release(self) -> S {
        self.stream.release()
    }

    /// Chip size found by the last successful [`probe`](Self::probe).
    pub fn capacity(&self) -> Option<u32> {
        self.capacity
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state, State::Mounted(_))
    }

    /// Check that the chip answers, then find its size.
    ///
    /// The marker written at `address` is the address itself. Once a probe
    /// address reaches the real capacity, the chip's address decoder folds it
    /// back onto address 0; the marker then shows up there and probing stops.
    /// Every probed word is restored, so the probe does not disturb a
    /// formatted volume. The result is a multiple of [`PROBE_STRIDE`].
    pub fn probe(&mut self) -> Result<u32> {
        match self.read_back(PRESENCE_ADDRESS, PRESENCE_PATTERN) {
            Ok(PRESENCE_PATTERN) => {}
            Ok(_value) => {
                error!("can not read or write storage, got {:08x}", _value);
                return Err(Error::NoDevice);
            }
            Err(_) => {
                error!("storage did not complete presence check");
                return Err(Error::NoDevice);
            }
        }

        let mut address = 0u32;
        while self.read_back(address, address)? == address {
            address = address.checked_add(PROBE_STRIDE).ok_or_else(|| {
                error!("address space exhausted without wraparound");
                Error::Capacity
            })?;
        }
        info!("storage capacity: {} bytes", address);
        self.capacity = Some(address);
        Ok(address)
    }

    /// Backup, write, read back, restore.
    ///
    /// Address 0 holds the complement of `value` while probing. Returns 0 if
    /// `value` replaced it there, the value read back otherwise.
    fn read_back(&mut self, address: u32, value: u32) -> Result<u32> {
        let mut backup = [0u8; 4];
        let mut base = [0u8; 4];
        let mut check = (!value).to_le_bytes();
        let mut wrap = [0u8; 4];

        if self.stream.read_at(address, &mut backup) != 4
            || self.stream.read_at(0, &mut base) != 4
        {
            return Err(Error::Io);
        }
        let probed = self.stream.write_at(0, &(!value).to_le_bytes()) == 4
            && self.stream.write_at(address, &value.to_le_bytes()) == 4
            && self.stream.read_at(address, &mut check) == 4
            && self.stream.read_at(0, &mut wrap) == 4;
        let restored = self.stream.write_at(address, &backup) == 4
            && self.stream.write_at(0, &base) == 4;
        if !(probed && restored) {
            warn!("probe transfer at {:#x} incomplete", address);
            return Err(Error::Io);
        }

        if u32::from_le_bytes(wrap) == value {
            Ok(0)
        } else {
            Ok(u32::from_le_bytes(check))
        }
    }

    /// Read and validate the superblock. Probes the chip first if needed.
    ///
    /// All handles of a previous mount become invalid, also on failure.
    pub fn mount(&mut self) -> Result<()> {
        self.unmount();
        let capacity = match self.capacity {
            Some(capacity) => capacity,
            None => self.probe()?,
        };

        let mut raw = [0u8; SUPERBLOCK_SIZE];
        if self.stream.read_at(0, &mut raw) as usize != SUPERBLOCK_SIZE {
            return Err(Error::Io);
        }
        let Some(superblock) = Superblock::decode(&raw) else {
            info!("no volume found");
            return Err(Error::NotFormatted);
        };
        if !superblock.fits(capacity) {
            error!(
                "volume '{}' does not fit: {} files, data at {:#x}, capacity {:#x}",
                superblock.name, superblock.file_count, superblock.data_mem_start, capacity
            );
            return Err(Error::Corrupt);
        }

        info!(
            "volume '{}' mounted, {} files",
            superblock.name, superblock.file_count
        );
        self.state = State::Mounted(superblock);
        Ok(())
    }

    /// Write an empty volume over the whole chip and mount it.
    pub fn format(&mut self, volume_name: &str) -> Result<()> {
        let name = Name::new(volume_name)?;
        self.unmount();
        let capacity = match self.capacity {
            Some(capacity) => capacity,
            None => self.probe()?,
        };

        let superblock = Superblock {
            name,
            file_count: 0,
            data_mem_start: capacity,
        };
        self.commit(&superblock)?;
        info!("volume '{}' created", superblock.name);
        self.mount()
    }

    fn unmount(&mut self) {
        self.state = State::Unformatted;
        for slot in self.slots.iter_mut() {
            slot.release();
        }
    }

    fn commit(&mut self, superblock: &Superblock) -> Result<()> {
        let raw = superblock.encode();
        if self.stream.write_at(0, &raw) as usize != SUPERBLOCK_SIZE {
            error!("superblock write incomplete");
            return Err(Error::Io);
        }
        Ok(())
    }

    fn superblock(&self) -> Result<&Superblock> {
        match &self.state {
            State::Mounted(superblock) => Ok(superblock),
            State::Unformatted => Err(Error::NotMounted),
        }
    }

    pub fn name(&self) -> Result<&Name> {
        self.superblock().map(|superblock| &superblock.name)
    }

    pub fn file_count(&self) -> Result<u32> {
        self.superblock().map(|superblock| superblock.file_count)
    }

    /// Largest `max_size` the next [`create`](Self::create) accepts.
    pub fn free_space(&self) -> Result<u32> {
        self.superblock().map(Superblock::free_space)
    }

    /// Number of handle slots in use.
    pub fn open_files(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }

    /// Name of the file at `index`.
    pub fn list(&mut self, index: u32) -> Result<Name> {
        self.check_index(index)?;
        self.read_header(index).map(|header| header.name)
    }

    /// Index of the file called `name`, scanning the headers on the chip.
    pub fn find(&mut self, name: &str) -> Result<Option<u32>> {
        let name = Name::new(name)?;
        self.find_name(&name)
    }

    fn find_name(&mut self, name: &Name) -> Result<Option<u32>> {
        let count = self.superblock()?.file_count;
        let mut field = [0u8; 16];
        for index in 0..count {
            if self.stream.read_at(header_address(index), &mut field) != 16 {
                return Err(Error::Io);
            }
            if name.matches(&field) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Reserve `max_size` bytes for a new, empty file and open it.
    pub fn create(&mut self, name: &str, max_size: u32) -> Result<Handle> {
        let name = Name::new(name)?;
        let superblock = self.superblock()?.clone();

        if self.find_name(&name)?.is_some() {
            warn!("file '{}' already exists", name);
            return Err(Error::Exists);
        }
        let slot = self.free_slot()?;
        if !superblock.has_room(max_size) {
            warn!(
                "no space for '{}': {} requested, {} free",
                name,
                max_size,
                superblock.free_space()
            );
            return Err(Error::NoSpace);
        }

        let index = superblock.file_count;
        let header = FileHeader {
            name,
            data_offset: superblock.data_mem_start - max_size,
            data_max_size: max_size,
            data_written_size: 0,
        };
        if self.stream.write_at(header_address(index), &header.encode()) as usize != HEADER_SIZE {
            error!("header write for '{}' incomplete", header.name);
            return Err(Error::Io);
        }

        let updated = Superblock {
            name: superblock.name,
            file_count: index + 1,
            data_mem_start: header.data_offset,
        };
        self.commit(&updated)?;
        self.state = State::Mounted(updated);

        debug!(
            "created '{}' #{} at {:#x}, {} bytes",
            header.name, index, header.data_offset, max_size
        );
        Ok(self.claim(slot, index, header, 0))
    }

    /// Open the file called `name` with the cursor at its end.
    pub fn open(&mut self, name: &str) -> Result<Handle> {
        let name = Name::new(name)?;
        match self.find_name(&name)? {
            Some(index) => self.open_index(index),
            None => {
                debug!("file '{}' not found", name);
                Err(Error::NotFound)
            }
        }
    }

    /// Open the file at `index` with the cursor at its end.
    pub fn open_index(&mut self, index: u32) -> Result<Handle> {
        self.check_index(index)?;
        let slot = self.free_slot()?;
        let header = self.read_header(index)?;
        let cursor = header.data_written_size;
        trace!("opened '{}' #{}, size {}", header.name, index, cursor);
        Ok(self.claim(slot, index, header, cursor))
    }

    /// Access the open file behind `handle`.
    pub fn file(&mut self, handle: Handle) -> Result<File<'_, S, N>> {
        let slot = self.check_handle(handle)?;
        Ok(File::new(self, slot))
    }

    pub fn close(&mut self, handle: Handle) -> Result<()> {
        let slot = self.check_handle(handle)?;
        self.release_slot(slot);
        Ok(())
    }

    pub(crate) fn release_slot(&mut self, slot: usize) {
        self.slots[slot].release();
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index < self.superblock()?.file_count {
            Ok(())
        } else {
            Err(Error::BadIndex)
        }
    }

    fn check_handle(&self, handle: Handle) -> Result<usize> {
        self.superblock()?;
        match self.slots.get(handle.slot) {
            Some(slot) if slot.in_use && slot.generation == handle.generation => Ok(handle.slot),
            _ => Err(Error::BadHandle),
        }
    }

    fn read_header(&mut self, index: u32) -> Result<FileHeader> {
        let mut raw = [0u8; HEADER_SIZE];
        if self.stream.read_at(header_address(index), &mut raw) as usize != HEADER_SIZE {
            return Err(Error::Io);
        }
        Ok(FileHeader::decode(&raw))
    }

    fn free_slot(&self) -> Result<usize> {
        self.slots
            .iter()
            .position(|slot| !slot.in_use)
            .ok_or_else(|| {
                warn!("too many open files");
                Error::NoHandle
            })
    }

    fn claim(&mut self, slot: usize, index: u32, header: FileHeader, cursor: u32) -> Handle {
        let file = &mut self.slots[slot];
        file.in_use = true;
        file.index = index;
        file.header = header;
        file.cursor = cursor;
        Handle {
            slot,
            generation: file.generation,
        }
    }
}
