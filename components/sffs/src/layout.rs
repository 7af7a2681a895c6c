use core::fmt;

use heapless::Vec;

use crate::{Error, Result};

/// `SF01`, read as a big-endian word.
pub const MAGIC: u32 = u32::from_be_bytes(*b"SF01");

/// Longest file or volume name, the on-chip field adds a NUL terminator.
pub const NAME_LEN: usize = 15;
const NAME_FIELD_SIZE: usize = NAME_LEN + 1;

pub const SUPERBLOCK_SIZE: usize = 32;
pub const HEADER_SIZE: usize = 28;

/// Address of the first file header.
pub const FILE_TABLE_START: u32 = SUPERBLOCK_SIZE as u32;

/// Position of `data_written_size` inside a file header.
pub(crate) const WRITTEN_SIZE_OFFSET: u32 = 24;

/// Granularity of the capacity probe.
pub const PROBE_STRIDE: u32 = 256;

pub(crate) const PRESENCE_ADDRESS: u32 = 4;
pub(crate) const PRESENCE_PATTERN: u32 = 0xABAD_DEED;

pub(crate) fn header_address(index: u32) -> u32 {
    FILE_TABLE_START.wrapping_add(index.wrapping_mul(HEADER_SIZE as u32))
}

fn get_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn put_u32(raw: &mut [u8], at: usize, value: u32) {
    raw[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// File or volume name as stored on the chip: up to [`NAME_LEN`] bytes, no NUL.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Name(Vec<u8, NAME_LEN>);

impl Name {
    pub fn new(name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.contains(&0) {
            return Err(Error::BadName);
        }
        Vec::from_slice(bytes).map(Self).map_err(|_| Error::BadName)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `None` if the stored bytes are not UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.0).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares against a raw name field. Two empty names never match, a
    /// zeroed header must not be mistaken for a file.
    pub(crate) fn matches(&self, field: &[u8; NAME_FIELD_SIZE]) -> bool {
        !self.is_empty() && Self::decode(field) == *self
    }

    pub(crate) fn encode(&self) -> [u8; NAME_FIELD_SIZE] {
        let mut field = [0u8; NAME_FIELD_SIZE];
        field[..self.0.len()].copy_from_slice(&self.0);
        field
    }

    pub(crate) fn decode(field: &[u8; NAME_FIELD_SIZE]) -> Self {
        let len = field[..NAME_LEN]
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(NAME_LEN);
        let mut name = Vec::new();
        // `len` is at most NAME_LEN
        name.extend_from_slice(&field[..len]).ok();
        Self(name)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(name) => f.pad(name),
            None => {
                for byte in self.as_bytes() {
                    write!(f, "\\x{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Superblock {
    pub name: Name,
    pub file_count: u32,
    pub data_mem_start: u32,
}

impl Superblock {
    pub fn encode(&self) -> [u8; SUPERBLOCK_SIZE] {
        let mut raw = [0u8; SUPERBLOCK_SIZE];
        put_u32(&mut raw, 0, MAGIC);
        raw[4..20].copy_from_slice(&self.name.encode());
        put_u32(&mut raw, 20, self.file_count);
        put_u32(&mut raw, 24, self.data_mem_start);
        put_u32(&mut raw, 28, MAGIC);
        raw
    }

    /// `None` unless the magic brackets the name on both sides.
    pub fn decode(raw: &[u8; SUPERBLOCK_SIZE]) -> Option<Self> {
        if get_u32(raw, 0) != MAGIC || get_u32(raw, 28) != MAGIC {
            return None;
        }
        let mut name = [0u8; NAME_FIELD_SIZE];
        name.copy_from_slice(&raw[4..20]);
        Some(Self {
            name: Name::decode(&name),
            file_count: get_u32(raw, 20),
            data_mem_start: get_u32(raw, 24),
        })
    }

    /// First byte behind the file table.
    pub fn table_end(&self) -> u64 {
        FILE_TABLE_START as u64 + self.file_count as u64 * HEADER_SIZE as u64
    }

    /// Space left for data once the header of the next file is in place.
    pub fn free_space(&self) -> u32 {
        let reserved = self.table_end() + HEADER_SIZE as u64;
        (self.data_mem_start as u64).saturating_sub(reserved) as u32
    }

    /// Whether one more header plus `max_size` data bytes fit between the
    /// file table and the data area. A full table refuses even empty files.
    pub fn has_room(&self, max_size: u32) -> bool {
        self.table_end() + HEADER_SIZE as u64 + max_size as u64 <= self.data_mem_start as u64
    }

    /// `file_table_end <= data_mem_start <= capacity`
    pub fn fits(&self, capacity: u32) -> bool {
        self.table_end() <= self.data_mem_start as u64 && self.data_mem_start <= capacity
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FileHeader {
    pub name: Name,
    pub data_offset: u32,
    pub data_max_size: u32,
    pub data_written_size: u32,
}

impl FileHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[..16].copy_from_slice(&self.name.encode());
        put_u32(&mut raw, 16, self.data_offset);
        put_u32(&mut raw, 20, self.data_max_size);
        put_u32(&mut raw, WRITTEN_SIZE_OFFSET as usize, self.data_written_size);
        raw
    }

    pub fn decode(raw: &[u8; HEADER_SIZE]) -> Self {
        let mut name = [0u8; NAME_FIELD_SIZE];
        name.copy_from_slice(&raw[..16]);
        Self {
            name: Name::decode(&name),
            data_offset: get_u32(raw, 16),
            data_max_size: get_u32(raw, 20),
            data_written_size: get_u32(raw, WRITTEN_SIZE_OFFSET as usize),
        }
    }
}
