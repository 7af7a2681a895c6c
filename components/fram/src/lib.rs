//! Drivers for serial FRAM chips, implementing [`sffs::Storage`].
//!
//! FRAM writes complete at bus speed, there is no page buffer and no busy
//! polling. Both drivers leave address wraparound to the chip, which is what
//! the capacity probe of `sffs` relies on.
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate delog;
generate_macros!();

mod i2c;
mod spi;

pub use i2c::{I2cFram, DEFAULT_ADDRESS};
pub use spi::{AddressWidth, Error, SpiFram};
