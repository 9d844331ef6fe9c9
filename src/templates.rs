use crate::import::Admission;
use crate::{ProcessedDump, ProcessedUpload, TourView};

fn format_duration(seconds: Option<u32>) -> String {
    match seconds {
        Some(total) => {
            let hours = total / 3600;
            let minutes = (total % 3600) / 60;
            let seconds = total % 60;

            if hours > 0 {
                format!("{}h {:02}m {:02}s", hours, minutes, seconds)
            } else {
                format!("{}m {:02}s", minutes, seconds)
            }
        }
        None => "—".to_string(),
    }
}

fn format_distance(meters: Option<u32>) -> String {
    match meters {
        Some(distance) if distance >= 1000 => format!("{:.2} km", f64::from(distance) / 1000.0),
        Some(distance) => format!("{} m", distance),
        None => "—".to_string(),
    }
}

fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(value) if value > 0.0 => format!("{:.1} km/h", value * 3.6),
        _ => "—".to_string(),
    }
}

fn format_pulse(value: Option<f64>) -> String {
    match value {
        Some(pulse) if pulse.is_finite() && pulse > 0.0 => format!("{:.0} bpm", pulse.round()),
        _ => "—".to_string(),
    }
}

fn format_altitude(min: Option<i32>, max: Option<i32>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("{} – {} m", min, max),
        _ => "—".to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_landing_page() -> String {
    include_str!("../templates/landing.html").to_string()
}

fn render_tour_row(tour: &TourView) -> String {
    let summary = &tour.summary;
    let status = match tour.admission {
        Admission::New => "New",
        Admission::AlreadyImported => "Already imported",
    };
    let absent = if tour.absent.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = tour
            .absent
            .iter()
            .map(|channel| format!("{channel:?}").to_lowercase())
            .collect();
        format!("<p class=\"muted\">No sensor: {}</p>", names.join(", "))
    };

    format!(
        "<tr><td>{}<br><span class=\"muted\">#{}</span></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>+{} / -{} m</td><td>{}</td><td>{} / {} / {}</td><td>{}</td><td>{}{}</td></tr>",
        tour.start,
        tour.identity,
        summary.profile.as_deref().unwrap_or("Unknown"),
        format_duration(summary.duration_seconds),
        format_distance(summary.distance_meters),
        format_speed(summary.speed_mean),
        summary.ascent,
        summary.descent,
        format_altitude(summary.altitude_min, summary.altitude_max),
        format_pulse(summary.pulse_min.map(f64::from)),
        format_pulse(summary.pulse_mean),
        format_pulse(summary.pulse_max.map(f64::from)),
        tour.sample_count,
        status,
        absent
    )
}

fn render_dump(body: &mut String, dump: &ProcessedDump) {
    body.push_str("<section class=\"results-card\">");
    body.push_str(&format!(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Device dump</p><h2>{}</h2></div></div>",
        escape(&dump.file_name)
    ));

    match &dump.result {
        Err(message) => {
            body.push_str(&format!(
                "<p class=\"error\">Could not decode this file: {}</p>",
                escape(message)
            ));
        }
        Ok(overview) => {
            body.push_str(&format!(
                "<p class=\"muted\">{} tour(s) found. {}</p>",
                overview.tours.len(),
                escape(&overview.outcome)
            ));
            if !overview.tours.is_empty() {
                body.push_str("<div class=\"table-wrapper\"><table><thead><tr><th>Start</th><th>Profile</th><th>Duration</th><th>Distance</th><th>Speed (mean)</th><th>Altitude up/down</th><th>Altitude range</th><th>Pulse (min / mean / max)</th><th>Samples</th><th>Status</th></tr></thead><tbody>");
                for tour in &overview.tours {
                    body.push_str(&render_tour_row(tour));
                }
                body.push_str("</tbody></table></div>");
            }
        }
    }

    body.push_str("</section>");
}

pub fn render_processed_upload(upload: &ProcessedUpload, download_url: &str) -> String {
    let mut body = String::new();

    let tour_count: usize = upload
        .dumps
        .iter()
        .filter_map(|dump| dump.result.as_ref().ok())
        .map(|overview| overview.tours.len())
        .sum();

    body.push_str("<section class=\"results-card\">");
    body.push_str(&format!(
        "<div class=\"results-header\"><div><p class=\"eyebrow\">Tour Overview</p><h2>{} tour(s) from {} file(s)</h2></div>",
        tour_count,
        upload.dumps.len()
    ));
    body.push_str(&format!(
        "<a class=\"cta\" download=tours.json href={download_url}>Download decoded tours</a>"
    ));
    body.push_str("</div>");
    body.push_str("</section>");

    for dump in &upload.dumps {
        render_dump(&mut body, dump);
    }

    body
}
