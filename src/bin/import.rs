use clap::Parser;
use rustyhac::decoder::{DecodeOptions, WalkOutcome, derive_tour_summary};
use rustyhac::import::{ImportReport, TourRegistry, decode_files};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Decode HAC5 device dumps and list the tours they contain.
#[derive(Debug, Parser)]
#[command(name = "rustyhac-import", version)]
struct Args {
    /// Dump files to decode.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Year of the newest tour; defaults to each file's modification year.
    #[arg(long)]
    import_year: Option<i32>,

    /// Decode files whose checksum does not match.
    #[arg(long)]
    skip_checksum: bool,

    /// Print the imported tours as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rustyhac=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let options = DecodeOptions {
        import_year: args.import_year,
        skip_checksum: args.skip_checksum,
    };

    let files = decode_files(&args.files, &options);
    let mut registry = TourRegistry::new();
    let mut report = ImportReport::default();
    let mut failures = 0usize;

    for file in &files {
        let decoded = match &file.result {
            Ok(decoded) => decoded,
            Err(err) => {
                failures += 1;
                eprintln!("{}: {err}", file.path.display());
                continue;
            }
        };
        if let WalkOutcome::Aborted(err) = &decoded.outcome {
            eprintln!("{}: partial import, {err}", file.path.display());
        }
        report.merge(registry.admit_file(decoded));

        if !args.json {
            println!("{}", file.path.display());
            for tour in &decoded.sessions {
                let summary = derive_tour_summary(&tour.session);
                println!(
                    "  {}  {:<10} {:>6} s {:>7} m  +{}/-{} m  {} samples  #{}",
                    tour.session.start,
                    tour.session.profile,
                    summary.duration_seconds.unwrap_or(0),
                    summary.distance_meters.unwrap_or(0),
                    summary.ascent,
                    summary.descent,
                    tour.session.samples.len(),
                    tour.identity
                );
            }
        }
    }

    if args.json {
        let tours: Vec<_> = report
            .imported
            .iter()
            .filter_map(|identity| registry.get(identity))
            .collect();
        println!("{}", serde_json::to_string_pretty(&tours)?);
    } else {
        println!(
            "{} tour(s) imported, {} duplicate(s) skipped, {} file(s) failed",
            report.imported.len(),
            report.duplicates.len(),
            failures
        );
    }

    if failures == files.len() {
        anyhow::bail!("no file could be decoded");
    }
    Ok(())
}
