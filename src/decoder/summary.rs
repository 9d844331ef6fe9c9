use crate::decoder::types::{Channel, Sample, Session, TourSummary};

/// Convert a decoded tour into overview metrics.
///
/// Channels without a sensor produce `None` instead of statistics over zeros.
pub fn derive_tour_summary(session: &Session) -> TourSummary {
    let recorded: &[Sample] = session.samples.get(1..).unwrap_or(&[]);

    let pulses: Vec<i32> = if session.has_sensor(Channel::Pulse) {
        recorded.iter().map(|sample| sample.pulse).collect()
    } else {
        Vec::new()
    };
    let pulse_min = pulses.iter().copied().reduce(i32::min);
    let pulse_max = pulses.iter().copied().reduce(i32::max);
    let pulse_mean = if pulses.is_empty() {
        None
    } else {
        Some(pulses.iter().map(|&pulse| f64::from(pulse)).sum::<f64>() / pulses.len() as f64)
    };

    let altitudes = session.samples.iter().map(|sample| sample.altitude);
    let altitude_min = altitudes.clone().reduce(i32::min);
    let altitude_max = altitudes.reduce(i32::max);

    let has_distance = session.has_sensor(Channel::Distance);
    let duration_seconds = (!session.samples.is_empty()).then(|| session.duration_seconds());
    let distance_meters = has_distance.then(|| session.distance_meters());
    let speed_mean = if has_distance {
        derive_speed_mean(&compute_distance_based_speeds(&session.samples))
    } else {
        None
    };

    TourSummary {
        duration_seconds,
        profile: Some(session.profile.name().to_string()),
        distance_meters,
        pulse_min,
        pulse_mean,
        pulse_max,
        altitude_min,
        altitude_max,
        ascent: session.ascent,
        descent: session.descent,
        speed_mean,
    }
}

/// Mean of per-slice speeds in metres per second.
fn derive_speed_mean(speeds: &[f64]) -> Option<f64> {
    if speeds.is_empty() {
        return None;
    }
    Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
}

fn compute_distance_based_speeds(samples: &[Sample]) -> Vec<f64> {
    let mut speeds: Vec<f64> = Vec::new();
    for window in samples.windows(2) {
        if let [first, second] = window {
            let dt = f64::from(second.elapsed) - f64::from(first.elapsed);
            let dd = f64::from(second.distance) - f64::from(first.distance);
            if dt > 0.0 {
                speeds.push(dd.max(0.0) / dt);
            }
        }
    }
    speeds
}
