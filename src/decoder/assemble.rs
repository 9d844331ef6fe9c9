use crate::decoder::cursor::{EndRecord, SampleKind, SampleRecord, SessionSpan, StartRecord};
use crate::decoder::sample::decode_word;
use crate::decoder::types::{Channel, FormatVariant, Offset, Sample, Session, StartTime};

/// Running totals used to decide which sensors were connected.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelSums {
    distance: u64,
    pulse: u64,
    cadence: u64,
    temperature: u64,
}

impl ChannelSums {
    fn absent(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| {
                let sum = match channel {
                    Channel::Distance => self.distance,
                    Channel::Pulse => self.pulse,
                    Channel::Cadence => self.cadence,
                    Channel::Temperature => self.temperature,
                };
                sum == 0
            })
            .collect()
    }
}

/// Builds one [`Session`] from its start record and sample records.
///
/// Deltas are accumulated into absolute values as records are pushed. The
/// first push also emits the synthetic start sample carrying the baseline
/// pulse and altitude.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    variant: FormatVariant,
    start: StartTime,
    start_record: StartRecord,
    samples: Vec<Sample>,
    elapsed: u32,
    pulse: i32,
    altitude: i32,
    distance: u32,
    last_cadence: u8,
    ascent: u32,
    descent: u32,
    sums: ChannelSums,
}

impl SessionBuilder {
    pub fn new(start_record: &StartRecord, year: i32, variant: FormatVariant) -> Self {
        Self {
            variant,
            start: StartTime {
                year,
                month: start_record.month,
                day: start_record.day,
                hour: start_record.hour,
                minute: start_record.minute,
            },
            start_record: start_record.clone(),
            samples: Vec::new(),
            elapsed: 0,
            pulse: start_record.start_pulse.into(),
            altitude: start_record.start_altitude.into(),
            distance: 0,
            last_cadence: 0,
            ascent: 0,
            descent: 0,
            sums: ChannelSums::default(),
        }
    }

    /// Number of valid slices in a record.
    fn slice_count(&self, record: &SampleRecord) -> usize {
        let words = record.words.len();
        match record.kind {
            SampleKind::Continuation => words,
            SampleKind::Terminal => {
                let count = usize::from(record.cadence) / usize::from(self.start_record.time_interval) + 1;
                count.min(words)
            }
        }
    }

    pub fn push_record(&mut self, record: &SampleRecord) {
        let count = self.slice_count(record);
        let terminal = record.is_terminal();
        // The terminal record's cadence byte holds the end time, not a cadence.
        let cadence = if terminal { self.last_cadence } else { record.cadence };

        if self.samples.is_empty() {
            self.samples.push(Sample {
                elapsed: 0,
                duration: 0,
                pulse_delta: 0,
                altitude_delta: 0,
                distance_delta: 0,
                pulse: self.pulse,
                altitude: self.altitude,
                distance: 0,
                cadence,
                temperature: record.temperature,
                marker: None,
            });
        }

        for (index, word) in record.words.iter().take(count).enumerate() {
            let delta = decode_word(*word);

            let duration = if terminal && index + 1 == count {
                u16::from(record.cadence) % self.variant.terminal_time_modulus
            } else {
                self.start_record.time_interval
            };
            let marker = (index == 0 && record.marker != self.variant.no_marker)
                .then_some(record.marker);

            self.elapsed += u32::from(duration);
            self.pulse += i32::from(delta.pulse);
            self.altitude += i32::from(delta.altitude);
            self.distance += u32::from(delta.distance);

            if delta.altitude > 0 {
                self.ascent += delta.altitude.unsigned_abs() as u32;
            } else {
                self.descent += delta.altitude.unsigned_abs() as u32;
            }

            self.sums.distance += u64::from(delta.distance);
            self.sums.pulse += u64::from(self.pulse.unsigned_abs());
            self.sums.cadence += u64::from(cadence);
            self.sums.temperature += u64::from(record.temperature.unsigned_abs());

            self.samples.push(Sample {
                elapsed: self.elapsed,
                duration,
                pulse_delta: delta.pulse,
                altitude_delta: delta.altitude,
                distance_delta: delta.distance,
                pulse: self.pulse,
                altitude: self.altitude,
                distance: self.distance,
                cadence,
                temperature: record.temperature,
                marker,
            });
        }

        if !terminal {
            self.last_cadence = record.cadence;
        }
    }

    pub fn finish(self, start_offset: Offset, end_offset: Offset, end: &EndRecord) -> Session {
        Session {
            start: self.start,
            profile: self.start_record.profile,
            time_interval: self.start_record.time_interval,
            start_distance: self.start_record.start_distance,
            start_altitude: self.start_record.start_altitude,
            start_pulse: self.start_record.start_pulse,
            samples: self.samples,
            ascent: self.ascent,
            descent: self.descent,
            recorded_distance: end.distance,
            recorded_ascent: end.altitude_up,
            recorded_descent: end.altitude_down,
            start_offset,
            end_offset,
            absent: self.sums.absent(),
        }
    }
}

/// Turn a validated ring span into a session whose start falls in `year`.
pub fn assemble_session(span: &SessionSpan, year: i32, variant: FormatVariant) -> Session {
    let mut builder = SessionBuilder::new(&span.start, year, variant);
    for record in &span.samples {
        builder.push_record(record);
    }
    builder.finish(span.start_offset, span.end_offset, &span.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::types::DeviceProfile;

    fn start_record(interval: u16) -> StartRecord {
        StartRecord {
            profile: DeviceProfile::Bike1,
            time_interval: interval,
            end_pointer: 0x0840,
            minute: 30,
            hour: 9,
            day: 12,
            month: 6,
            start_distance: 12_000,
            start_altitude: 100,
            start_pulse: 60,
        }
    }

    fn end_record() -> EndRecord {
        EndRecord {
            start_pointer: 0x0800,
            distance: 0,
            altitude_up: 0,
            altitude_down: 0,
        }
    }

    fn word(pulse: i16, altitude: i16, distance_units: u16) -> u16 {
        ((pulse as u16 & 0x0F) << 12) | ((altitude as u16 & 0x3F) << 6) | (distance_units & 0x3F)
    }

    fn record(kind: SampleKind, cadence: u8, marker: u8, words: [u16; 6]) -> SampleRecord {
        SampleRecord {
            kind,
            temperature: 18,
            cadence,
            marker,
            words: words.to_vec(),
        }
    }

    #[test]
    fn first_sample_carries_the_baseline() {
        let mut builder = SessionBuilder::new(&start_record(20), 2024, FormatVariant::HAC5);
        builder.push_record(&record(SampleKind::Terminal, 0, 0xFF, [word(1, 1, 1); 6]));
        let session = builder.finish(0x0800, 0x0820, &end_record());

        let first = &session.samples[0];
        assert_eq!(first.elapsed, 0);
        assert_eq!(first.pulse, 60);
        assert_eq!(first.altitude, 100);
        assert_eq!(first.distance, 0);
        assert_eq!(session.samples.len(), 2);
    }

    #[test]
    fn markers_attach_to_the_first_slice_only() {
        let mut builder = SessionBuilder::new(&start_record(20), 2024, FormatVariant::HAC5);
        builder.push_record(&record(SampleKind::Continuation, 80, 3, [0; 6]));
        builder.push_record(&record(SampleKind::Terminal, 0, 0xFF, [0; 6]));
        let session = builder.finish(0x0800, 0x0830, &end_record());

        let markers: Vec<_> = session.samples.iter().map(|sample| sample.marker).collect();
        assert_eq!(markers[1], Some(3));
        assert!(markers.iter().enumerate().all(|(i, m)| i == 1 || m.is_none()));
    }

    #[test]
    fn terminal_record_limits_slices_and_sets_final_duration() {
        let mut builder = SessionBuilder::new(&start_record(5), 2024, FormatVariant::HAC5);
        // 13 / 5 + 1 = 3 slices, last one lasts 13 % 20 seconds
        builder.push_record(&record(SampleKind::Terminal, 13, 0xFF, [word(0, 0, 1); 6]));
        let session = builder.finish(0x0800, 0x0820, &end_record());

        let durations: Vec<_> = session.samples.iter().map(|sample| sample.duration).collect();
        assert_eq!(durations, vec![0, 5, 5, 13]);
        assert_eq!(session.duration_seconds(), 23);
        assert_eq!(session.distance_meters(), 30);
    }

    #[test]
    fn terminal_count_is_capped_at_record_capacity() {
        let mut builder = SessionBuilder::new(&start_record(2), 2024, FormatVariant::HAC5);
        builder.push_record(&record(SampleKind::Terminal, 200, 0xFF, [0; 6]));
        let session = builder.finish(0x0800, 0x0820, &end_record());
        assert_eq!(session.samples.len(), 7);
    }

    #[test]
    fn ascent_and_descent_follow_altitude_deltas() {
        let words = [
            word(0, 5, 0),
            word(0, -3, 0),
            word(0, 17, 0),
            word(0, -20, 0),
            word(0, 0, 0),
            word(0, 2, 0),
        ];
        let mut builder = SessionBuilder::new(&start_record(20), 2024, FormatVariant::HAC5);
        builder.push_record(&record(SampleKind::Continuation, 0, 0xFF, words));
        builder.push_record(&record(SampleKind::Terminal, 0, 0xFF, [0; 6]));
        let session = builder.finish(0x0800, 0x0830, &end_record());

        // 17 expands to 23, -20 expands to -44
        assert_eq!(session.ascent, 5 + 23 + 2);
        assert_eq!(session.descent, 3 + 44);
        assert_eq!(session.samples.last().unwrap().altitude, 100 + 5 - 3 + 23 - 44 + 2);
    }

    #[test]
    fn silent_channels_are_marked_absent() {
        let mut builder = SessionBuilder::new(&start_record(20), 2024, FormatVariant::HAC5);
        let mut flat = record(SampleKind::Continuation, 0, 0xFF, [0; 6]);
        flat.temperature = 0;
        builder.push_record(&flat);
        let mut terminal = record(SampleKind::Terminal, 0, 0xFF, [0; 6]);
        terminal.temperature = 0;
        builder.push_record(&terminal);
        let session = builder.finish(0x0800, 0x0830, &end_record());

        // pulse stays at the baseline of 60, so only the other channels are absent
        assert_eq!(
            session.absent,
            vec![Channel::Distance, Channel::Cadence, Channel::Temperature]
        );
        assert!(session.has_sensor(Channel::Pulse));
    }

    #[test]
    fn terminal_slices_reuse_the_previous_cadence() {
        let mut builder = SessionBuilder::new(&start_record(20), 2024, FormatVariant::HAC5);
        builder.push_record(&record(SampleKind::Continuation, 85, 0xFF, [0; 6]));
        builder.push_record(&record(SampleKind::Terminal, 25, 0xFF, [0; 6]));
        let session = builder.finish(0x0800, 0x0830, &end_record());

        assert!(session.samples.iter().all(|sample| sample.cadence == 85));
        assert_eq!(session.samples.last().unwrap().duration, 5);
    }
}
