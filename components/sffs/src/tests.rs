use std::ops::Range;
use std::vec::Vec;

use quickcheck::TestResult;
use rand::{thread_rng, Rng};

use crate::layout::{FileHeader, Superblock};
use crate::{
    Error, Name, RamStorage, Storage, Stream, Volume, FILE_TABLE_START, HEADER_SIZE, MAGIC,
    PROBE_STRIDE, SUPERBLOCK_SIZE,
};

const CHIP_SIZE: usize = 4096;

/// Chip of arbitrary size whose address decoder wraps at `data.len()`.
struct SimChip {
    data: Vec<u8>,
    writes: Vec<(u32, usize)>,
}

impl SimChip {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            writes: Vec::new(),
        }
    }

    fn random(size: usize) -> Self {
        let mut chip = Self::new(size);
        thread_rng().fill(chip.data.as_mut_slice());
        chip
    }
}

impl Storage for SimChip {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        let len = self.data.len();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.data[(address as usize + i) % len];
        }
        buf.len()
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        let len = self.data.len();
        for (i, byte) in data.iter().enumerate() {
            self.data[(address as usize + i) % len] = *byte;
        }
        self.writes.push((address, data.len()));
        data.len()
    }
}

/// Bus with nothing attached: reads float high, writes vanish.
struct Floating;

impl Storage for Floating {
    fn read(&mut self, _address: u32, buf: &mut [u8]) -> usize {
        buf.fill(0xff);
        buf.len()
    }

    fn write(&mut self, _address: u32, data: &[u8]) -> usize {
        data.len()
    }
}

/// Wraps a chip and truncates every write starting in `range` to `limit`
/// bytes once `armed` is set.
struct Truncating<'a> {
    chip: &'a mut SimChip,
    range: Range<u32>,
    limit: usize,
    armed: bool,
}

impl Storage for Truncating<'_> {
    fn read(&mut self, address: u32, buf: &mut [u8]) -> usize {
        self.chip.read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> usize {
        if self.armed && self.range.contains(&address) {
            let len = data.len().min(self.limit);
            self.chip.write(address, &data[..len])
        } else {
            self.chip.write(address, data)
        }
    }
}

fn formatted(chip: &mut SimChip) -> Volume<&mut SimChip> {
    let mut volume = Volume::new(chip);
    volume.format("VOL1").expect("format failed");
    volume
}

fn metadata(chip: &SimChip, files: u32) -> Vec<u8> {
    let end = SUPERBLOCK_SIZE + files as usize * HEADER_SIZE;
    chip.data[..end].to_vec()
}

#[test]
fn probe_finds_capacity() {
    let mut storage = RamStorage::<CHIP_SIZE>::new();
    let mut volume: Volume<_> = Volume::new(&mut storage);
    assert_eq!(volume.capacity(), None);
    assert_eq!(volume.probe(), Ok(CHIP_SIZE as u32));
    assert_eq!(volume.capacity(), Some(CHIP_SIZE as u32));
}

#[test]
fn ram_storage_wraps() {
    let mut storage = RamStorage::<256>::new();
    assert_eq!(storage.write(254, b"wrap"), 4);
    assert_eq!(&storage.as_bytes()[..2], b"ap");
    assert_eq!(&storage.as_bytes()[254..], b"wr");

    storage.as_bytes_mut().fill(0x5a);
    let mut buf = [0u8; 3];
    assert_eq!(storage.read(0x1_0000, &mut buf), 3);
    assert_eq!(buf, [0x5a; 3]);
}

#[test]
fn stream_cursor() {
    let mut stream = Stream::new(RamStorage::<256>::new());
    stream.seek(10);
    assert_eq!(stream.write(b"abc"), 3);
    assert_eq!(stream.tell(), 13);
    stream.skip(2);
    assert_eq!(stream.write(b"de"), 2);
    assert_eq!(stream.tell(), 17);

    let mut buf = [0u8; 7];
    assert_eq!(stream.read_at(10, &mut buf), 7);
    assert_eq!(&buf, b"abc\0\0de");
    assert_eq!(stream.tell(), 17);
    assert_eq!(&stream.storage().as_bytes()[10..13], b"abc");
    assert_eq!(&stream.release().as_bytes()[15..17], b"de");
}

quickcheck::quickcheck! {
    fn probe_reports_wrap_address(strides: u8) -> TestResult {
        if strides == 0 {
            return TestResult::discard();
        }
        let size = strides as usize * PROBE_STRIDE as usize;
        let mut chip = SimChip::new(size);
        let mut volume: Volume<_> = Volume::new(&mut chip);
        TestResult::from_bool(volume.probe() == Ok(size as u32))
    }
}

#[test]
fn probe_leaves_contents_alone() {
    let mut chip = SimChip::random(8192);
    let before = chip.data.clone();
    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.probe(), Ok(8192));
    drop(volume);
    assert_eq!(chip.data, before);
}

#[test]
fn probe_keeps_formatted_volume() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("keep", 64).unwrap();
    volume.file(handle).unwrap().write(b"still here");
    drop(volume);

    let mut volume: Volume<_> = Volume::new(&mut chip);
    volume.mount().unwrap();
    let handle = volume.open("keep").unwrap();
    let mut buf = [0u8; 10];
    assert_eq!(volume.file(handle).unwrap().load(&mut buf), 10);
    assert_eq!(&buf, b"still here");
}

#[test]
fn probe_ignores_stale_marker_at_zero() {
    let mut chip = SimChip::new(CHIP_SIZE);
    chip.data[..4].copy_from_slice(&PROBE_STRIDE.to_le_bytes());
    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.probe(), Ok(CHIP_SIZE as u32));
    drop(volume);
    assert_eq!(&chip.data[..4], &PROBE_STRIDE.to_le_bytes());

    let mut chip = SimChip::new(CHIP_SIZE);
    chip.data[..4].copy_from_slice(&(CHIP_SIZE as u32).to_le_bytes());
    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.probe(), Ok(CHIP_SIZE as u32));
}

#[test]
fn probe_without_device() {
    let mut volume: Volume<_> = Volume::new(Floating);
    assert_eq!(volume.probe(), Err(Error::NoDevice));
    assert_eq!(volume.format("VOL1"), Err(Error::NoDevice));
    assert!(!volume.is_mounted());
    assert_eq!(volume.capacity(), None);
}

#[test]
fn mount_blank_chip() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.mount(), Err(Error::NotFormatted));
    assert!(!volume.is_mounted());
    assert_eq!(volume.capacity(), Some(CHIP_SIZE as u32));

    assert_eq!(volume.create("a.txt", 10), Err(Error::NotMounted));
    assert_eq!(volume.open("a.txt"), Err(Error::NotMounted));
    assert_eq!(volume.open_index(0), Err(Error::NotMounted));
    assert_eq!(volume.free_space(), Err(Error::NotMounted));
    assert_eq!(volume.list(0), Err(Error::NotMounted));
    assert!(volume.name().is_err());
}

#[test]
fn mount_checks_trailing_magic() {
    let mut chip = SimChip::new(CHIP_SIZE);
    drop(formatted(&mut chip));
    chip.data[SUPERBLOCK_SIZE - 1] ^= 0x01;

    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.mount(), Err(Error::NotFormatted));
}

#[test]
fn mount_rejects_oversized_layout() {
    let mut chip = SimChip::new(CHIP_SIZE);
    drop(formatted(&mut chip));

    // data area claimed to end beyond the chip
    let mut raw = [0u8; SUPERBLOCK_SIZE];
    raw.copy_from_slice(&chip.data[..SUPERBLOCK_SIZE]);
    let mut superblock = Superblock::decode(&raw).unwrap();
    superblock.data_mem_start = 2 * CHIP_SIZE as u32;
    chip.data[..SUPERBLOCK_SIZE].copy_from_slice(&superblock.encode());

    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.mount(), Err(Error::Corrupt));
}

#[test]
fn format_and_remount() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let volume = formatted(&mut chip);
    assert!(volume.is_mounted());
    assert_eq!(volume.name().unwrap(), "VOL1");
    assert_eq!(volume.file_count(), Ok(0));
    drop(volume);

    let mut volume: Volume<_> = Volume::new(&mut chip);
    volume.mount().unwrap();
    assert_eq!(volume.name().unwrap(), "VOL1");
    assert_eq!(volume.file_count(), Ok(0));
}

#[test]
fn format_rejects_bad_names() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume: Volume<_> = Volume::new(&mut chip);
    assert_eq!(volume.format(""), Err(Error::BadName));
    assert_eq!(volume.format("sixteen-chars-xx"), Err(Error::BadName));
    assert_eq!(volume.format("nul\0inside"), Err(Error::BadName));
    assert_eq!(volume.format("fifteen-chars-x"), Ok(()));
}

#[test]
fn superblock_layout() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    volume.create("a.txt", 100).unwrap();
    drop(volume);

    let data = &chip.data;
    assert_eq!(&data[0..4], &MAGIC.to_le_bytes());
    assert_eq!(&data[4..9], b"VOL1\0");
    assert_eq!(&data[20..24], &1u32.to_le_bytes());
    assert_eq!(&data[24..28], &(CHIP_SIZE as u32 - 100).to_le_bytes());
    assert_eq!(&data[28..32], &MAGIC.to_le_bytes());

    let header = &data[32..32 + HEADER_SIZE];
    assert_eq!(&header[0..6], b"a.txt\0");
    assert_eq!(&header[16..20], &(CHIP_SIZE as u32 - 100).to_le_bytes());
    assert_eq!(&header[20..24], &100u32.to_le_bytes());
    assert_eq!(&header[24..28], &0u32.to_le_bytes());
}

#[test]
fn header_codec() {
    let header = FileHeader {
        name: Name::new("log.bin").unwrap(),
        data_offset: 0x1f00,
        data_max_size: 0x100,
        data_written_size: 0x42,
    };
    assert_eq!(FileHeader::decode(&header.encode()), header);
}

#[test]
fn end_to_end() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);

    let handle = volume.create("a.txt", 100).unwrap();
    let data = [0x5au8; 60];
    assert_eq!(volume.file(handle).unwrap().write(&data[..50]), 50);
    volume.close(handle).unwrap();

    let handle = volume.open("a.txt").unwrap();
    let mut file = volume.file(handle).unwrap();
    assert_eq!(file.size(), 50);
    assert_eq!(file.write(&data), 50);
    file.close();

    let handle = volume.open_index(0).unwrap();
    let file = volume.file(handle).unwrap();
    assert_eq!(file.name(), "a.txt");
    assert_eq!(file.size(), 100);
    assert_eq!(file.max_size(), 100);
}

quickcheck::quickcheck! {
    fn round_trip(data: Vec<u8>, slack: u16) -> bool {
        let mut chip = SimChip::new(0x4000);
        let mut volume = formatted(&mut chip);
        let size = (data.len() + slack as usize % 1024) as u32;

        let handle = volume.create("data", size).unwrap();
        let written = volume.file(handle).unwrap().write(&data);
        volume.close(handle).unwrap();
        drop(volume);

        let mut volume: Volume<_> = Volume::new(&mut chip);
        volume.mount().unwrap();
        let handle = volume.open("data").unwrap();
        let mut file = volume.file(handle).unwrap();
        let mut buf = vec![0u8; data.len()];
        let read = file.load(&mut buf);

        written as usize == data.len() && read as usize == data.len() && buf == data
    }

    fn write_clamps_to_capacity(max_size: u8, extra: u8) -> bool {
        let mut chip = SimChip::new(CHIP_SIZE);
        let mut volume = formatted(&mut chip);
        let handle = volume.create("capped", max_size as u32).unwrap();
        let mut file = volume.file(handle).unwrap();

        let data = vec![0xa5u8; max_size as usize + extra as usize];
        file.write(&data) == max_size as u32
            && file.size() == max_size as u32
            && file.tell() == max_size as u32
            && file.write(&data) == 0
    }

    fn free_space_accounting(sizes: Vec<u8>) -> bool {
        let mut chip = SimChip::new(CHIP_SIZE * 4);
        let mut volume = formatted(&mut chip);
        let capacity = volume.capacity().unwrap();
        let sizes: Vec<u32> = sizes.into_iter().take(32).map(u32::from).collect();

        for (i, size) in sizes.iter().enumerate() {
            let handle = volume.create(&format!("f{i}"), *size).unwrap();
            volume.close(handle).unwrap();
        }

        let used: u32 = sizes.iter().sum();
        let headers = (sizes.len() as u32 + 1) * HEADER_SIZE as u32;
        volume.free_space() == Ok(capacity - FILE_TABLE_START - used - headers)
    }
}

#[test]
fn seek_stays_below_size() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("seek", 64).unwrap();
    let mut file = volume.file(handle).unwrap();

    // empty file, nothing to seek to
    assert_eq!(file.seek(0), 0);
    assert_eq!(file.write(b"0123456789"), 10);

    assert_eq!(file.seek(3), 3);
    assert_eq!(file.seek(10), 3);
    assert_eq!(file.seek(40), 3);
    assert_eq!(file.tell(), 3);
    assert_eq!(file.seek(9), 9);

    let mut buf = [0u8; 8];
    assert_eq!(file.read(&mut buf), 1);
    assert_eq!(buf[0], b'9');
    assert_eq!(file.read(&mut buf), 0);
}

#[test]
fn read_stops_at_size() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("short", 64).unwrap();
    let mut file = volume.file(handle).unwrap();
    file.write(b"hello");

    let mut buf = [0u8; 64];
    assert_eq!(file.load(&mut buf), 5);
    assert_eq!(&buf[..5], b"hello");
    assert_eq!(file.tell(), 5);
}

#[test]
fn overwrite_keeps_high_water_mark() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("hwm", 32).unwrap();
    let mut file = volume.file(handle).unwrap();

    assert_eq!(file.write(b"abcdefgh"), 8);
    assert_eq!(file.save(b"XY"), 2);
    assert_eq!(file.size(), 8);
    assert_eq!(file.tell(), 2);

    let mut buf = [0u8; 8];
    assert_eq!(file.load(&mut buf), 8);
    assert_eq!(&buf, b"XYcdefgh");
}

#[test]
fn positioned_io() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("pos", 16).unwrap();
    let mut file = volume.file(handle).unwrap();

    // appending at the size is allowed, beyond it is not
    assert_eq!(file.write_at(0, b"abcd"), 4);
    assert_eq!(file.write_at(4, b"efgh"), 4);
    assert_eq!(file.write_at(9, b"zz"), 0);
    assert_eq!(file.write_at(2, b"CD"), 2);
    assert_eq!(file.size(), 8);

    let mut buf = [0u8; 3];
    assert_eq!(file.read_at(1, &mut buf), 3);
    assert_eq!(&buf, b"bCD");
    assert_eq!(file.read_at(8, &mut buf), 0);
}

#[test]
fn open_positions_at_end() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("append", 32).unwrap();
    volume.file(handle).unwrap().write(b"one");
    volume.close(handle).unwrap();

    let handle = volume.open("append").unwrap();
    let mut file = volume.file(handle).unwrap();
    assert_eq!(file.tell(), 3);
    file.write(b"two");

    let mut buf = [0u8; 6];
    assert_eq!(file.load(&mut buf), 6);
    assert_eq!(&buf, b"onetwo");
}

#[test]
fn duplicate_create_changes_nothing() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("a.txt", 100).unwrap();
    volume.file(handle).unwrap().write(b"payload");
    volume.close(handle).unwrap();
    volume.create("b.txt", 50).unwrap();
    let free = volume.free_space().unwrap();
    drop(volume);
    let before = metadata(&chip, 2);

    let mut volume: Volume<_> = Volume::new(&mut chip);
    volume.mount().unwrap();
    assert_eq!(volume.create("a.txt", 10), Err(Error::Exists));
    assert_eq!(volume.create("b.txt", 10), Err(Error::Exists));
    assert_eq!(volume.file_count(), Ok(2));
    assert_eq!(volume.free_space(), Ok(free));
    drop(volume);

    assert_eq!(metadata(&chip, 2), before);
}

#[test]
fn create_without_space() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let free = volume.free_space().unwrap();
    assert_eq!(
        free,
        CHIP_SIZE as u32 - FILE_TABLE_START - HEADER_SIZE as u32
    );

    assert_eq!(volume.create("big", free + 1), Err(Error::NoSpace));
    assert_eq!(volume.file_count(), Ok(0));
    assert_eq!(volume.free_space(), Ok(free));

    let handle = volume.create("big", free).unwrap();
    assert_eq!(volume.free_space(), Ok(0));
    assert_eq!(volume.create("none", 1), Err(Error::NoSpace));
    // no room left for another header
    assert_eq!(volume.create("empty", 0), Err(Error::NoSpace));
    assert_eq!(volume.file_count(), Ok(1));

    let mut file = volume.file(handle).unwrap();
    let data = vec![0x11u8; free as usize];
    assert_eq!(file.write(&data), free);
}

#[test]
fn create_rejects_bad_names() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    assert_eq!(volume.create("", 10), Err(Error::BadName));
    assert_eq!(volume.create("a-name-too-long!", 10), Err(Error::BadName));
    assert_eq!(volume.file_count(), Ok(0));
}

#[test]
fn lookup_by_name_and_index() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    for name in ["alpha", "beta", "gamma"] {
        let handle = volume.create(name, 16).unwrap();
        volume.close(handle).unwrap();
    }

    assert_eq!(volume.find("beta"), Ok(Some(1)));
    assert_eq!(volume.find("delta"), Ok(None));
    assert_eq!(volume.list(2).unwrap(), "gamma");
    assert_eq!(volume.list(3), Err(Error::BadIndex));
    assert_eq!(volume.open_index(3), Err(Error::BadIndex));
    assert_eq!(volume.open("delta"), Err(Error::NotFound));

    let handle = volume.open("gamma").unwrap();
    assert_eq!(volume.file(handle).unwrap().index(), 2);
}

#[test]
fn empty_names_never_match() {
    let empty = Name::default();
    assert!(!empty.matches(&[0u8; 16]));

    let x = Name::new("x").unwrap();
    let mut field = x.encode();
    assert!(x.matches(&field));
    field[1] = b'y';
    assert!(!x.matches(&field));

    // a full field carries no terminator
    let long = Name::new("fifteen-chars-x").unwrap();
    assert!(long.matches(&long.encode()));
    assert_eq!(Name::decode(&long.encode()), long);
}

#[test]
fn handle_pool_is_bounded() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume: Volume<_, 2> = Volume::new(&mut chip);
    volume.format("VOL1").unwrap();

    let first = volume.create("one", 8).unwrap();
    let second = volume.create("two", 8).unwrap();
    assert_eq!(volume.open_files(), 2);
    assert_eq!(volume.create("three", 8), Err(Error::NoHandle));
    assert_eq!(volume.open("one"), Err(Error::NoHandle));
    assert_eq!(volume.file_count(), Ok(2));

    volume.close(first).unwrap();
    let again = volume.open("one").unwrap();
    assert_ne!(again, first);
    assert_eq!(volume.file(second).unwrap().name(), "two");
}

#[test]
fn stale_handles_are_rejected() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    let handle = volume.create("a.txt", 8).unwrap();

    volume.close(handle).unwrap();
    assert!(matches!(volume.file(handle), Err(Error::BadHandle)));
    assert_eq!(volume.close(handle), Err(Error::BadHandle));

    let reopened = volume.open("a.txt").unwrap();
    assert!(volume.file(reopened).is_ok());
    volume.mount().unwrap();
    assert!(matches!(volume.file(reopened), Err(Error::BadHandle)));

    let handle = volume.open("a.txt").unwrap();
    volume.format("VOL2").unwrap();
    assert!(matches!(volume.file(handle), Err(Error::BadHandle)));
    assert_eq!(volume.file_count(), Ok(0));
}

#[test]
fn growth_commits_only_size_field() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume = formatted(&mut chip);
    volume.create("a.txt", 100).unwrap();
    let handle = volume.create("b.txt", 100).unwrap();

    let data_b = CHIP_SIZE as u32 - 200;
    let size_field = FILE_TABLE_START + HEADER_SIZE as u32 + 24;

    volume.stream.storage().writes.clear();
    volume.file(handle).unwrap().write(b"12345");
    assert_eq!(volume.stream.storage().writes, [(data_b, 5usize), (size_field, 4)]);

    // rewriting below the high-water mark leaves the header alone
    volume.stream.storage().writes.clear();
    volume.file(handle).unwrap().save(b"abc");
    assert_eq!(volume.stream.storage().writes, [(data_b, 3usize)]);
    drop(volume);

    assert_eq!(&chip.data[size_field as usize..][..4], &5u32.to_le_bytes());
}

#[test]
fn short_data_write() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume: Volume<_> = Volume::new(Truncating {
        chip: &mut chip,
        range: CHIP_SIZE as u32 / 2..u32::MAX,
        limit: 3,
        armed: false,
    });
    volume.format("VOL1").unwrap();
    let handle = volume.create("flaky", 64).unwrap();
    volume.stream.storage().armed = true;

    let mut file = volume.file(handle).unwrap();
    assert_eq!(file.write(b"0123456789"), 3);
    assert_eq!(file.tell(), 3);
    assert_eq!(file.size(), 3);
    assert_eq!(file.write(b"3456789"), 3);
    assert_eq!(file.size(), 6);

    let mut buf = [0u8; 10];
    assert_eq!(file.load(&mut buf), 6);
    assert_eq!(&buf[..6], b"012345");
}

#[test]
fn short_metadata_write_keeps_superblock() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume: Volume<_> = Volume::new(Truncating {
        chip: &mut chip,
        range: 0..u32::MAX,
        limit: 4,
        armed: false,
    });
    volume.format("VOL1").unwrap();
    volume.stream.storage().armed = true;

    assert_eq!(volume.create("a.txt", 10), Err(Error::Io));
    assert_eq!(volume.file_count(), Ok(0));
    drop(volume);

    let mut volume: Volume<_> = Volume::new(&mut chip);
    volume.mount().unwrap();
    assert_eq!(volume.file_count(), Ok(0));
    assert_eq!(volume.find("a.txt"), Ok(None));
}

#[test]
fn failed_size_commit_reports_shortfall() {
    let mut chip = SimChip::new(CHIP_SIZE);
    let mut volume: Volume<_> = Volume::new(Truncating {
        chip: &mut chip,
        range: 0..CHIP_SIZE as u32 / 2,
        limit: 0,
        armed: false,
    });
    volume.format("VOL1").unwrap();
    let handle = volume.create("a.txt", 64).unwrap();
    assert_eq!(volume.file(handle).unwrap().write(b"hello"), 5);

    volume.stream.storage().armed = true;
    let mut file = volume.file(handle).unwrap();
    assert_eq!(file.write(b" world"), 0);
    assert_eq!(file.size(), 5);
    assert_eq!(file.tell(), 5);

    // overwriting below the stored size needs no commit
    assert_eq!(file.write_at(1, b"ELLO!!"), 4);
    assert_eq!(file.size(), 5);
    assert_eq!(file.tell(), 5);
    file.close();
    drop(volume);

    let mut volume: Volume<_> = Volume::new(&mut chip);
    volume.mount().unwrap();
    let handle = volume.open("a.txt").unwrap();
    let mut file = volume.file(handle).unwrap();
    assert_eq!(file.size(), 5);
    let mut buf = [0u8; 8];
    assert_eq!(file.load(&mut buf), 5);
    assert_eq!(&buf[..5], b"hELLO");
}
