use std::{
    fs::{File, OpenOptions},
    io::{self, Read as _, Seek as _, SeekFrom, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use log::{debug, error, info};
use sffs::{RamStorage, Storage, PROBE_STRIDE};

pub const RAM_SIZE: usize = 0x2000;

pub fn init(image: Option<PathBuf>, size: u32) -> Result<ImageOrRam> {
    if let Some(path) = image {
        let image = ImageStorage::open(&path, size)
            .with_context(|| format!("failed to open image {}", path.display()))?;
        Ok(ImageOrRam::Image(image))
    } else {
        info!("Using {} byte RAM chip", RAM_SIZE);
        Ok(ImageOrRam::Ram(Box::default()))
    }
}

pub enum ImageOrRam {
    Image(ImageStorage),
    Ram(Box<RamStorage<RAM_SIZE>>),
}

impl Storage for ImageOrRam {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        match self {
            Self::Image(image) => image.read(address, buf),
            Self::Ram(ram) => ram.read(address, buf),
        }
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        match self {
            Self::Image(image) => image.write(address, data),
            Self::Ram(ram) => ram.write(address, data),
        }
    }
}

/// Chip image kept in a file.
///
/// Addresses wrap at the file length like on a chip that ignores the upper
/// address bits, so the capacity probe finds the image size.
pub struct ImageStorage {
    file: File,
    len: u64,
}

impl ImageStorage {
    /// Open the image at `path`, creating it with `size` zero bytes if it
    /// does not exist yet. An existing image keeps its length.
    pub fn open(path: &Path, size: u32) -> Result<Self> {
        let file = if path.exists() {
            OpenOptions::new().read(true).write(true).open(path)?
        } else {
            info!("Creating {} byte image {}", size, path.display());
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(path)?;
            file.set_len(size.into())?;
            file
        };

        let len = file.metadata()?.len();
        let stride = u64::from(PROBE_STRIDE);
        if len == 0 || len % stride != 0 || len > u64::from(u32::MAX) {
            bail!("image size {len} is not a multiple of {stride} bytes");
        }
        debug!("Image {} has {} bytes", path.display(), len);
        Ok(Self { file, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    /// Image position of byte `done` of a transfer at `address`, and how
    /// much of the remainder fits before the end of the image.
    fn run(&self, address: u32, done: usize, total: usize) -> (u64, usize) {
        let position = (u64::from(address) + done as u64) % self.len;
        let len = ((self.len - position) as usize).min(total - done);
        (position, len)
    }
}

fn read_run(file: &mut File, position: u64, buf: &mut [u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(position))?;
    file.read_exact(buf)
}

fn write_run(file: &mut File, position: u64, data: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(position))?;
    file.write_all(data)
}

impl Storage for ImageStorage {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        let mut done = 0;
        while done < buf.len() {
            let (position, len) = self.run(address, done, buf.len());
            if let Err(err) = read_run(&mut self.file, position, &mut buf[done..][..len]) {
                error!("Image read at {:#x} failed: {}", position, err);
                break;
            }
            done += len;
        }
        done
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        let mut done = 0;
        while done < data.len() {
            let (position, len) = self.run(address, done, data.len());
            if let Err(err) = write_run(&mut self.file, position, &data[done..][..len]) {
                error!("Image write at {:#x} failed: {}", position, err);
                break;
            }
            done += len;
        }
        done
    }
}
