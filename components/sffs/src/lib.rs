#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Simple flat file system for byte-addressable non-volatile memory (FRAM).
//!
//! A single volume spans the whole chip. It holds a fixed number of named
//! files, each with a capacity fixed at creation time. The chip itself is
//! reached through the [`Storage`] trait, which only needs to read and write
//! bytes at an address; bus drivers for SPI and I2C parts live in the `fram`
//! component.
//!
//! # Volume Layout
//! ```text
//! 0            32                              data_mem_start       capacity
//! | superblock | header 0 | header 1 | … ->    free    <- | file 1 | file 0 |
//! ```
//! The file table grows upwards behind the superblock, data regions are
//! carved downwards from the top of the chip.
//!
//! Superblock, at address 0:
//!
//! | bytes   | content                          |
//! |---------|----------------------------------|
//! |  0 - 3  | magic `SF01`                     |
//! |  4 - 19 | volume name, NUL terminated      |
//! | 20 - 23 | number of file headers           |
//! | 24 - 27 | start of the allocated data area |
//! | 28 - 31 | magic `SF01` (again)             |
//!
//! File header, repeated for every file:
//!
//! | bytes   | content                          |
//! |---------|----------------------------------|
//! |  0 - 15 | file name, NUL terminated        |
//! | 16 - 19 | start of the data region         |
//! | 20 - 23 | capacity of the data region      |
//! | 24 - 27 | bytes written (high-water mark)  |
//!
//! All integers are little-endian.
//!
//! # Important Implementation Details
//! * Reads and writes never fail, they clamp: a file can not be read past
//!   its written size nor written past its capacity. Callers compare the
//!   returned count with the requested one.
//! * Growing a file immediately rewrites the 4 byte size field of its header,
//!   so closing a file has nothing left to persist.
//! * Open files are referenced through [`Handle`] tokens which the
//!   [`Volume`] checks on every use; tokens of closed files, or of files
//!   opened before a remount, are rejected.

#[macro_use]
extern crate delog;
generate_macros!();

mod file;
mod layout;
mod storage;
mod stream;
mod volume;

pub use file::{File, Handle};
pub use layout::{
    Name, FILE_TABLE_START, HEADER_SIZE, MAGIC, NAME_LEN, PROBE_STRIDE, SUPERBLOCK_SIZE,
};
pub use storage::{RamStorage, Storage};
pub use stream::Stream;
pub use volume::{Volume, MAX_OPEN_FILES};

#[cfg(test)]
mod tests;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// The chip did not return what was written to it.
    NoDevice,
    /// The capacity probe ran through the address space without wrapping.
    Capacity,
    /// A metadata transfer completed fewer bytes than requested.
    Io,
    /// No superblock, or a superblock with a broken magic.
    NotFormatted,
    /// The superblock describes a layout that does not fit the chip.
    Corrupt,
    /// File operation on a volume that is not mounted.
    NotMounted,
    /// Empty name, name longer than [`NAME_LEN`] bytes or containing NUL.
    BadName,
    Exists,
    NoSpace,
    NotFound,
    BadIndex,
    /// Every handle slot is in use.
    NoHandle,
    /// The handle was closed, or belongs to an earlier mount.
    BadHandle,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::NoDevice => "storage device not responding",
            Self::Capacity => "storage capacity could not be determined",
            Self::Io => "incomplete storage transfer",
            Self::NotFormatted => "no volume found",
            Self::Corrupt => "volume layout does not fit the storage",
            Self::NotMounted => "volume not mounted",
            Self::BadName => "invalid name",
            Self::Exists => "file exists",
            Self::NoSpace => "not enough free space",
            Self::NotFound => "file not found",
            Self::BadIndex => "no file with this index",
            Self::NoHandle => "too many open files",
            Self::BadHandle => "invalid file handle",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

pub type Result<T, E = Error> = core::result::Result<T, E>;
