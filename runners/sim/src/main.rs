mod store;


use std::{
    io::{self, Write as _},
    path::PathBuf,
    process,
};

use anyhow::{bail, Context as _, Result};
use clap::{CommandFactory as _, Parser, Subcommand};
use clap_num::maybe_hex;
use dialoguer::Confirm;
use log::{debug, info};
use sffs::{Storage, Volume};

const DEFAULT_SIZE: u32 = 0x2000;
const DEMO_VOLUME: &str = "VOL1";
const DEMO_FILE: &str = "a.txt";

/// Simulated FRAM chip running the simple flat file system.
#[derive(Parser, Debug)]
#[command(about, author, disable_version_flag = true)]
struct Args {
    /// Print version information.
    #[arg(short = 'V', long)]
    version: bool,

    /// Chip image file (default: use RAM).
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Size of a newly created image in bytes, a multiple of 256.
    #[arg(short, long, value_parser = maybe_hex::<u32>, default_value_t = DEFAULT_SIZE)]
    size: u32,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Write an empty volume over the whole chip.
    Format {
        name: String,

        /// Overwrite an existing volume without asking.
        #[arg(short, long)]
        yes: bool,
    },
    /// Show name, capacity and usage of the volume.
    Info,
    /// List all files.
    Ls,
    /// Reserve space for a new, empty file.
    Create {
        name: String,
        #[arg(value_parser = maybe_hex::<u32>)]
        size: u32,
    },
    /// Write DATA to a file, appending unless an offset is given.
    Write {
        name: String,
        data: String,
        #[arg(short, long, value_parser = maybe_hex::<u32>)]
        offset: Option<u32>,
    },
    /// Print a file.
    Cat {
        name: String,
        #[arg(short, long, value_parser = maybe_hex::<u32>)]
        offset: Option<u32>,
        #[arg(short, long, value_parser = maybe_hex::<u32>)]
        len: Option<u32>,
    },
    /// Format the chip, then create, append to and read back a file.
    Demo,
}

fn main() {
    pretty_env_logger::init();

    let args = Args::parse();
    if args.version {
        print_version();
        return;
    }
    let Some(command) = args.command else {
        Args::command().print_help().ok();
        process::exit(2);
    };

    let result = store::init(args.image, args.size)
        .and_then(|storage| exec(storage, command, &mut io::stdout().lock()));
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn print_version() {
    let crate_name = clap::crate_name!();
    let crate_version = clap::crate_version!();
    println!("{} {}", crate_name, crate_version);
}

fn exec<S: Storage>(storage: S, command: Command, out: &mut impl io::Write) -> Result<()> {
    let mut volume: Volume<S> = Volume::new(storage);
    debug!("Executing {:?}", command);

    match command {
        Command::Format { name, yes } => format(&mut volume, &name, yes, out),
        Command::Info => info(&mut volume, out),
        Command::Ls => ls(&mut volume, out),
        Command::Create { name, size } => create(&mut volume, &name, size, out),
        Command::Write { name, data, offset } => {
            write(&mut volume, &name, data.as_bytes(), offset, out)
        }
        Command::Cat { name, offset, len } => cat(&mut volume, &name, offset, len, out),
        Command::Demo => demo(&mut volume, out),
    }
}

fn mount<S: Storage>(volume: &mut Volume<S>) -> Result<()> {
    volume
        .mount()
        .context("no usable volume, run the format command first")
}

fn format<S: Storage>(
    volume: &mut Volume<S>,
    name: &str,
    yes: bool,
    out: &mut impl io::Write,
) -> Result<()> {
    if !yes && volume.mount().is_ok() {
        let prompt = format!(
            "Replace volume '{}' and its {} files?",
            volume.name()?,
            volume.file_count()?
        );
        if !Confirm::new().with_prompt(prompt).interact()? {
            bail!("format aborted");
        }
    }

    volume.format(name)?;
    writeln!(
        out,
        "Formatted '{}', {} bytes free",
        volume.name()?,
        volume.free_space()?
    )?;
    Ok(())
}

fn info<S: Storage>(volume: &mut Volume<S>, out: &mut impl io::Write) -> Result<()> {
    mount(volume)?;
    writeln!(out, "Volume:   {}", volume.name()?)?;
    writeln!(out, "Capacity: {} bytes", volume.capacity().unwrap_or_default())?;
    writeln!(out, "Files:    {}", volume.file_count()?)?;
    writeln!(out, "Free:     {} bytes", volume.free_space()?)?;
    Ok(())
}

fn ls<S: Storage>(volume: &mut Volume<S>, out: &mut impl io::Write) -> Result<()> {
    mount(volume)?;
    for index in 0..volume.file_count()? {
        let handle = volume.open_index(index)?;
        let file = volume.file(handle)?;
        writeln!(
            out,
            "{:>3}  {:<15}  {:>8} / {}",
            index,
            file.name(),
            file.size(),
            file.max_size()
        )?;
        file.close();
    }
    Ok(())
}

fn create<S: Storage>(
    volume: &mut Volume<S>,
    name: &str,
    size: u32,
    out: &mut impl io::Write,
) -> Result<()> {
    mount(volume)?;
    let handle = volume
        .create(name, size)
        .with_context(|| format!("failed to create '{name}'"))?;
    volume.close(handle)?;
    writeln!(
        out,
        "Created '{}' with {} bytes, {} bytes free",
        name,
        size,
        volume.free_space()?
    )?;
    Ok(())
}

fn write<S: Storage>(
    volume: &mut Volume<S>,
    name: &str,
    data: &[u8],
    offset: Option<u32>,
    out: &mut impl io::Write,
) -> Result<()> {
    mount(volume)?;
    let handle = volume
        .open(name)
        .with_context(|| format!("failed to open '{name}'"))?;
    let mut file = volume.file(handle)?;
    let written = match offset {
        Some(offset) => file.write_at(offset, data),
        None => file.write(data),
    };
    let (size, max_size) = (file.size(), file.max_size());
    file.close();

    writeln!(out, "Wrote {written} bytes, size {size} of {max_size}")?;
    if written as usize != data.len() {
        bail!("only {} of {} bytes written", written, data.len());
    }
    Ok(())
}

fn cat<S: Storage>(
    volume: &mut Volume<S>,
    name: &str,
    offset: Option<u32>,
    len: Option<u32>,
    out: &mut impl io::Write,
) -> Result<()> {
    mount(volume)?;
    let handle = volume
        .open(name)
        .with_context(|| format!("failed to open '{name}'"))?;
    let mut file = volume.file(handle)?;
    let size = file.size();
    let offset = offset.unwrap_or(0);
    if offset > 0 && offset >= size {
        bail!("offset {offset} is beyond the end of '{name}' ({size} bytes)");
    }

    let left = size.saturating_sub(offset);
    let len = len.map_or(left, |len| len.min(left));
    let mut buf = vec![0; len as usize];
    let read = file.read_at(offset, &mut buf);
    file.close();

    out.write_all(&buf[..read as usize])?;
    Ok(())
}

fn demo<S: Storage>(volume: &mut Volume<S>, out: &mut impl io::Write) -> Result<()> {
    let capacity = volume.probe()?;
    info!("Running demo on {} byte chip", capacity);
    volume.format(DEMO_VOLUME)?;

    let handle = volume.create(DEMO_FILE, 100)?;
    let written = volume.file(handle)?.write(&[b'a'; 50]);
    volume.close(handle)?;
    writeln!(out, "Created '{DEMO_FILE}' for 100 bytes, wrote {written}")?;

    let handle = volume.open(DEMO_FILE)?;
    let mut file = volume.file(handle)?;
    let appended = file.write(&[b'b'; 60]);
    writeln!(
        out,
        "Reopened '{DEMO_FILE}' and appended {appended} of 60 bytes, size {} of {}",
        file.size(),
        file.max_size()
    )?;
    file.close();

    let handle = volume.open_index(0)?;
    let mut file = volume.file(handle)?;
    let mut buf = [0; 128];
    let read = file.load(&mut buf);
    writeln!(
        out,
        "Read {read} bytes from file #{}: {}",
        file.index(),
        String::from_utf8_lossy(&buf[..read as usize])
    )?;
    file.close();

    writeln!(out, "{} bytes free", volume.free_space()?)?;
    Ok(())
}
