#![allow(dead_code)]

//! Builds synthetic HAC5 dumps for the integration tests.

pub const HEADER_LEN: usize = 6;
pub const RING_START: usize = 0x0800;
pub const RING_END: usize = 0x10000;
pub const RECORD_LEN: usize = 0x10;
pub const NEXT_FREE_POINTER: usize = 0x0382;

/// Pack one sample word from raw field values.
pub fn word(pulse: i16, altitude: i16, distance_units: u16) -> u16 {
    ((pulse as u16 & 0x0F) << 12) | ((altitude as u16 & 0x3F) << 6) | (distance_units & 0x3F)
}

#[derive(Debug, Clone)]
pub struct TourFixture {
    pub profile: u8,
    pub interval_code: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub start_distance: u32,
    pub start_altitude: i16,
    pub start_pulse: u8,
    pub temperature: i8,
    pub cadence: u8,
    pub marker: u8,
    /// Words of each continuation record.
    pub blocks: Vec<[u16; 6]>,
    pub terminal_words: [u16; 6],
    /// Value of the terminal record's cadence byte.
    pub terminal_time: u8,
    pub recorded_distance: u16,
    pub recorded_up: u16,
    pub recorded_down: u16,
}

impl Default for TourFixture {
    /// Bike 1, 20 s interval, one full block plus two terminal slices.
    fn default() -> Self {
        Self {
            profile: 0,
            interval_code: 3,
            month: 6,
            day: 1,
            hour: 8,
            minute: 15,
            start_distance: 12345,
            start_altitude: 100,
            start_pulse: 60,
            temperature: 18,
            cadence: 80,
            marker: 0xFF,
            blocks: vec![[word(1, 2, 5); 6]],
            terminal_words: [
                word(-1, -3, 5),
                word(-1, -3, 5),
                0xFFFF,
                0xFFFF,
                0xFFFF,
                0xFFFF,
            ],
            terminal_time: 30,
            recorded_distance: 400,
            recorded_up: 12,
            recorded_down: 6,
        }
    }
}

/// Where a fixture tour landed in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Zeroed dump that tours are appended to, wrapping like the device does.
#[derive(Debug, Clone)]
pub struct DumpBuilder {
    bytes: Vec<u8>,
    cursor: usize,
}

impl Default for DumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DumpBuilder {
    pub fn new() -> Self {
        let mut bytes = vec![0u8; HEADER_LEN + RING_END + 2];
        bytes[..4].copy_from_slice(b"AFRO");
        bytes[4] = 0x03;
        Self {
            bytes,
            cursor: RING_START,
        }
    }

    /// Continue appending at `offset`.
    pub fn at(mut self, offset: usize) -> Self {
        self.cursor = offset;
        self
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn next_offset(offset: usize) -> usize {
        if offset + RECORD_LEN >= RING_END {
            RING_START
        } else {
            offset + RECORD_LEN
        }
    }

    pub fn write_record(&mut self, offset: usize, record: [u8; RECORD_LEN]) {
        let at = HEADER_LEN + offset;
        self.bytes[at..at + RECORD_LEN].copy_from_slice(&record);
    }

    pub fn write_le16(&mut self, offset: usize, value: u16) {
        let at = HEADER_LEN + offset;
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    fn push_record(&mut self, record: [u8; RECORD_LEN]) -> usize {
        let offset = self.cursor;
        self.write_record(offset, record);
        self.cursor = Self::next_offset(offset);
        offset
    }

    fn sample_record(tag: u8, tour: &TourFixture, third: u8, words: &[u16; 6]) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];
        record[0] = tag;
        record[1] = tour.temperature as u8;
        record[2] = third;
        record[3] = tour.marker;
        for (index, value) in words.iter().enumerate() {
            record[4 + 2 * index..6 + 2 * index].copy_from_slice(&value.to_le_bytes());
        }
        record
    }

    /// Append `AA`, the sample records, `CC` and `DD` with matching pointers.
    pub fn push_tour(&mut self, tour: &TourFixture) -> Placement {
        // AA, every block and CC precede the end record.
        let mut end_offset = self.cursor;
        for _ in 0..tour.blocks.len() + 2 {
            end_offset = Self::next_offset(end_offset);
        }

        let mut start = [0u8; RECORD_LEN];
        start[0] = 0xAA;
        start[1] = (tour.profile << 4) | (tour.interval_code & 0x0F);
        start[2..4].copy_from_slice(&(end_offset as u16).to_le_bytes());
        start[4] = tour.minute;
        start[5] = tour.hour;
        start[6] = tour.day;
        start[7] = tour.month;
        start[8..12].copy_from_slice(&tour.start_distance.to_le_bytes());
        start[12..14].copy_from_slice(&tour.start_altitude.to_le_bytes());
        start[14] = tour.start_pulse;
        let start_offset = self.push_record(start);

        for block in &tour.blocks {
            self.push_record(Self::sample_record(0xBB, tour, tour.cadence, block));
        }
        self.push_record(Self::sample_record(
            0xCC,
            tour,
            tour.terminal_time,
            &tour.terminal_words,
        ));

        let mut end = [0u8; RECORD_LEN];
        end[0] = 0xDD;
        end[2..4].copy_from_slice(&(start_offset as u16).to_le_bytes());
        end[8..10].copy_from_slice(&tour.recorded_distance.to_le_bytes());
        end[10..12].copy_from_slice(&tour.recorded_up.to_le_bytes());
        end[12..14].copy_from_slice(&tour.recorded_down.to_le_bytes());
        let written_end = self.push_record(end);
        debug_assert_eq!(written_end, end_offset);

        Placement {
            start_offset,
            end_offset,
        }
    }

    /// Store the next-free pointer at the current cursor and seal the checksum.
    pub fn finish(self) -> Vec<u8> {
        let cursor = self.cursor;
        self.finish_with_next_free(cursor)
    }

    pub fn finish_with_next_free(mut self, next_free: usize) -> Vec<u8> {
        self.write_le16(NEXT_FREE_POINTER, next_free as u16);
        seal(&mut self.bytes);
        self.bytes
    }
}

/// Recompute the trailing checksum word after the dump was edited.
pub fn seal(bytes: &mut [u8]) {
    let data_end = HEADER_LEN + RING_END;
    let sum = bytes[HEADER_LEN..data_end]
        .chunks(2)
        .fold(0u16, |sum, pair| {
            sum.wrapping_add(u16::from_le_bytes([pair[0], pair[1]]))
        });
    bytes[data_end..data_end + 2].copy_from_slice(&sum.to_le_bytes());
}

/// Two tours from the same June day, oldest written first.
pub fn two_tour_dump() -> (Vec<u8>, [Placement; 2]) {
    let mut builder = DumpBuilder::new();
    let older = builder.push_tour(&TourFixture::default());
    let newer = builder.push_tour(&TourFixture {
        hour: 17,
        minute: 40,
        start_distance: 12745,
        profile: 4,
        ..TourFixture::default()
    });
    (builder.finish(), [older, newer])
}
