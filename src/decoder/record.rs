use crate::decoder::identity::SessionIdentity;
use crate::decoder::types::{Channel, Sample, Session};
use serde::Serialize;

/// Export shape of one tour, handed to storage or serialized for download.
///
/// Series are column-oriented. A channel without a sensor is `None` as a whole
/// instead of a column of zeros.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourRecord {
    pub tour_id: SessionIdentity,
    /// ISO-8601 local start time, absent when the stored date is invalid.
    pub start_time: Option<String>,
    pub start_year: i32,
    pub start_month: u8,
    pub start_day: u8,
    pub start_hour: u8,
    pub start_minute: u8,
    pub device_mode: String,
    pub device_time_interval: u16,
    pub start_distance: u32,
    pub start_altitude: i16,
    pub start_pulse: u8,
    pub altitude_up: u32,
    pub altitude_down: u32,
    pub device_altitude_up: u16,
    pub device_altitude_down: u16,
    pub device_distance: u16,
    pub time: Vec<u32>,
    pub altitude: Vec<i32>,
    pub distance: Option<Vec<u32>>,
    pub pulse: Option<Vec<i32>>,
    pub cadence: Option<Vec<u8>>,
    pub temperature: Option<Vec<i8>>,
    pub markers: Vec<MarkerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerRecord {
    pub serie_index: usize,
    pub time: u32,
    pub label: String,
}

fn column<T>(
    session: &Session,
    channel: Channel,
    value: impl Fn(&Sample) -> T,
) -> Option<Vec<T>> {
    session
        .has_sensor(channel)
        .then(|| session.samples.iter().map(value).collect())
}

impl Session {
    pub fn to_tour_record(&self, identity: SessionIdentity) -> TourRecord {
        TourRecord {
            tour_id: identity,
            start_time: self
                .start
                .to_naive()
                .map(|start| start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            start_year: self.start.year,
            start_month: self.start.month,
            start_day: self.start.day,
            start_hour: self.start.hour,
            start_minute: self.start.minute,
            device_mode: self.profile.name().to_string(),
            device_time_interval: self.time_interval,
            start_distance: self.start_distance,
            start_altitude: self.start_altitude,
            start_pulse: self.start_pulse,
            altitude_up: self.ascent,
            altitude_down: self.descent,
            device_altitude_up: self.recorded_ascent,
            device_altitude_down: self.recorded_descent,
            device_distance: self.recorded_distance,
            time: self.samples.iter().map(|sample| sample.elapsed).collect(),
            altitude: self.samples.iter().map(|sample| sample.altitude).collect(),
            distance: column(self, Channel::Distance, |sample| sample.distance),
            pulse: column(self, Channel::Pulse, |sample| sample.pulse),
            cadence: column(self, Channel::Cadence, |sample| sample.cadence),
            temperature: column(self, Channel::Temperature, |sample| sample.temperature),
            markers: self
                .samples
                .iter()
                .enumerate()
                .filter_map(|(index, sample)| {
                    sample.marker.map(|marker| MarkerRecord {
                        serie_index: index,
                        time: sample.elapsed,
                        label: marker.to_string(),
                    })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::types::{DeviceProfile, StartTime};

    fn session() -> Session {
        let sample = |elapsed: u32, marker: Option<u8>| Sample {
            elapsed,
            duration: 20,
            pulse_delta: 0,
            altitude_delta: 0,
            distance_delta: 10,
            pulse: 70,
            altitude: 200,
            distance: elapsed / 2,
            cadence: 0,
            temperature: 12,
            marker,
        };
        Session {
            start: StartTime {
                year: 2023,
                month: 9,
                day: 30,
                hour: 17,
                minute: 45,
            },
            profile: DeviceProfile::Bike2,
            time_interval: 20,
            start_distance: 5_000,
            start_altitude: 200,
            start_pulse: 70,
            samples: vec![sample(0, None), sample(20, Some(4)), sample(40, None)],
            ascent: 0,
            descent: 0,
            recorded_distance: 20,
            recorded_ascent: 0,
            recorded_descent: 0,
            start_offset: 0x0800,
            end_offset: 0x0830,
            absent: vec![Channel::Cadence],
        }
    }

    #[test]
    fn export_drops_absent_channels_and_keeps_markers() {
        let session = session();
        let record = session.to_tour_record(SessionIdentity::of(&session));

        assert_eq!(record.start_time.as_deref(), Some("2023-09-30T17:45:00"));
        assert_eq!(record.time, vec![0, 20, 40]);
        assert_eq!(record.cadence, None);
        assert_eq!(record.pulse, Some(vec![70, 70, 70]));
        assert_eq!(
            record.markers,
            vec![MarkerRecord {
                serie_index: 1,
                time: 20,
                label: "4".to_string()
            }]
        );
    }

    #[test]
    fn export_serializes_absent_channels_as_null() {
        let session = session();
        let json = serde_json::to_value(session.to_tour_record(SessionIdentity::of(&session)))
            .expect("tour record should serialize");

        assert!(json["cadence"].is_null());
        assert_eq!(json["device_mode"], "Bike 2");
        assert_eq!(json["tour_id"], SessionIdentity::of(&session).value());
    }

    #[test]
    fn invalid_dates_export_without_start_time() {
        let mut session = session();
        session.start.month = 13;
        let record = session.to_tour_record(SessionIdentity::of(&session));
        assert_eq!(record.start_time, None);
        assert_eq!(record.start_month, 13);
    }
}
