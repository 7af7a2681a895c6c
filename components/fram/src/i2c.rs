use core::fmt::Debug;

use embedded_hal::blocking::i2c::{Write, WriteRead};
use sffs::Storage;

/// Device address with all address pins low.
pub const DEFAULT_ADDRESS: u8 = 0x50;

/// Largest read in one transaction.
const READ_BLOCK: usize = 32;
/// Largest write in one transaction, not counting the two address bytes.
const WRITE_BLOCK: usize = 30;

/// Bit 16 of the memory address travels in the device address.
const PAGE_BIT: u8 = 0x01;
const PAGE_SIZE: u32 = 0x1_0000;

/// FRAM with a 16 bit address pointer plus a page select bit, for chips up
/// to 128 KiB.
///
/// Transfers are split into blocks that neither exceed the transaction size
/// nor cross a 64 KiB page. A failing block ends the transfer; the bytes
/// of the blocks before it count as done.
pub struct I2cFram<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> I2cFram<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn device(&self, address: u32) -> u8 {
        if address & PAGE_SIZE != 0 {
            self.address | PAGE_BIT
        } else {
            self.address
        }
    }

    pub fn read_block(&mut self, address: u32, buf: &mut [u8]) -> Result<(), E> {
        let [_, _, high, low] = address.to_be_bytes();
        self.i2c.write_read(self.device(address), &[high, low], buf)
    }

    /// Writes at most [`WRITE_BLOCK`] bytes and returns how many that were.
    pub(crate) fn write_block(&mut self, address: u32, data: &[u8]) -> Result<usize, E> {
        let mut frame = [0u8; 2 + WRITE_BLOCK];
        let len = data.len().min(WRITE_BLOCK);
        let [_, _, high, low] = address.to_be_bytes();
        frame[..2].copy_from_slice(&[high, low]);
        frame[2..][..len].copy_from_slice(&data[..len]);
        self.i2c.write(self.device(address), &frame[..2 + len])?;
        Ok(len)
    }
}

fn block_len(address: u32, remaining: usize, max: usize) -> usize {
    let to_page_end = (PAGE_SIZE - (address % PAGE_SIZE)) as usize;
    remaining.min(max).min(to_page_end)
}

impl<I2C, E> Storage for I2cFram<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        trace!("FRr {:x} {:x}", address, buf.len());
        let mut done = 0;
        while done < buf.len() {
            let at = address.wrapping_add(done as u32);
            let len = block_len(at, buf.len() - done, READ_BLOCK);
            if let Err(_e) = self.read_block(at, &mut buf[done..][..len]) {
                error!(
                    "I2C FRAM read failed, {} requested but got {}: {:?}",
                    buf.len(),
                    done,
                    _e
                );
                break;
            }
            done += len;
        }
        done
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        trace!("FRw {:x} {:x}", address, data.len());
        let mut done = 0;
        while done < data.len() {
            let at = address.wrapping_add(done as u32);
            let len = block_len(at, data.len() - done, WRITE_BLOCK);
            match self.write_block(at, &data[done..][..len]) {
                Ok(written) => done += written,
                Err(_e) => {
                    error!(
                        "I2C FRAM write failed, {} requested but wrote {}: {:?}",
                        data.len(),
                        done,
                        _e
                    );
                    break;
                }
            }
        }
        done
    }
}
