use core::fmt::Debug;

use embedded_hal::blocking::spi::{Transfer, Write};
use embedded_hal::digital::v2::OutputPin;
use sffs::Storage;

const READ: u8 = 0x03;
const WRITE: u8 = 0x02;
/// Set the write enable latch.
const WREN: u8 = 0x06;
/// Reset the write enable latch.
const WRDI: u8 = 0x04;

/// Number of address bytes following an opcode, depends on the chip size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressWidth {
    /// Up to 64 KiB
    Two = 2,
    /// Up to 16 MiB
    Three = 3,
    Four = 4,
}

impl AddressWidth {
    /// Opcode followed by the big-endian address. Address bits beyond the
    /// width are dropped.
    fn command(self, opcode: u8, address: u32) -> ([u8; 5], usize) {
        let width = self as usize;
        let mut command = [opcode, 0, 0, 0, 0];
        command[1..=width].copy_from_slice(&address.to_be_bytes()[4 - width..]);
        (command, 1 + width)
    }
}

/// Failure of one SPI command.
#[derive(Debug)]
pub enum Error<E, P> {
    Spi(E),
    ChipSelect(P),
}

pub struct SpiFram<SPI, CS> {
    spi: SPI,
    cs: CS,
    width: AddressWidth,
}

impl<SPI, CS, E> SpiFram<SPI, CS>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    E: Debug,
    CS: OutputPin,
    CS::Error: Debug,
{
    /// Takes over the bus and deselects the chip.
    pub fn new(spi: SPI, mut cs: CS, width: AddressWidth) -> Result<Self, CS::Error> {
        cs.set_high()?;
        Ok(Self { spi, cs, width })
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    pub fn address_width(&self) -> AddressWidth {
        self.width
    }

    /// Run `f` with the chip selected. The chip is deselected again even if
    /// the bus fails.
    fn selected<T>(
        &mut self,
        f: impl FnOnce(&mut SPI) -> Result<T, E>,
    ) -> Result<T, Error<E, CS::Error>> {
        self.cs.set_low().map_err(Error::ChipSelect)?;
        let result = f(&mut self.spi).map_err(Error::Spi);
        self.cs.set_high().map_err(Error::ChipSelect)?;
        result
    }

    fn opcode(&mut self, opcode: u8) -> Result<(), Error<E, CS::Error>> {
        self.selected(|spi| spi.write(&[opcode]))
    }

    pub fn read_at(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error<E, CS::Error>> {
        let (command, len) = self.width.command(READ, address);
        self.selected(|spi| {
            spi.write(&command[..len])?;
            buf.fill(0);
            spi.transfer(buf)?;
            Ok(())
        })
    }

    /// Write enable, write, write disable.
    pub fn write_at(&mut self, address: u32, data: &[u8]) -> Result<(), Error<E, CS::Error>> {
        let (command, len) = self.width.command(WRITE, address);
        self.opcode(WREN)?;
        let written = self.selected(|spi| {
            spi.write(&command[..len])?;
            spi.write(data)
        });
        let disabled = self.opcode(WRDI);
        written.and(disabled)
    }
}

impl<SPI, CS, E> Storage for SpiFram<SPI, CS>
where
    SPI: Transfer<u8, Error = E> + Write<u8, Error = E>,
    E: Debug,
    CS: OutputPin,
    CS::Error: Debug,
{
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        trace!("FRr {:x} {:x}", address, buf.len());
        if buf.is_empty() {
            return 0;
        }
        match self.read_at(address, buf) {
            Ok(()) => buf.len(),
            Err(_e) => {
                error!("SPI FRAM read of {} bytes at {:#x} failed: {:?}", buf.len(), address, _e);
                0
            }
        }
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        trace!("FRw {:x} {:x}", address, data.len());
        if data.is_empty() {
            return 0;
        }
        match self.write_at(address, data) {
            Ok(()) => data.len(),
            Err(_e) => {
                error!("SPI FRAM write of {} bytes at {:#x} failed: {:?}", data.len(), address, _e);
                0
            }
        }
    }
}
