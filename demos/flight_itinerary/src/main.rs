// Writes flight_schedule.ics from the built-in itinerary, or from the JSON
// file given as first argument.

use chrono::{Datelike, Local};
use mailcal::itinerary::{builtin_itinerary, load_segments, write_ics};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

const OUTPUT: &str = "flight_schedule.ics";

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let segments = match std::env::args().nth(1) {
        Some(path) => match load_segments(&path) {
            Ok(segments) => segments,
            Err(e) => {
                error!(error = %e, "Failed to load itinerary");
                std::process::exit(1);
            }
        },
        None => builtin_itinerary(),
    };
    info!(segments = segments.len(), "Exporting itinerary");

    if let Err(e) = write_ics(OUTPUT, &segments, Local::now().year()) {
        error!(error = %e, "Failed to write calendar");
        std::process::exit(1);
    }
}
