// The `itinerary` module exports flight segments as an iCalendar file.

use chrono::NaiveDateTime;
use icalendar::{Calendar, Component, Event, EventLike};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ItineraryError {
    #[error("Flight {flight}: cannot parse '{value}' as a date and time: {source}")]
    Date {
        flight: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid itinerary JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One booked flight, as printed on the booking confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub flight_number: String,
    pub route: String,
    /// Month and day with a weekday marker, e.g. `12月28日(木)`.
    pub date: String,
    /// `HH:MM`
    pub departure_time: String,
    pub arrival_time: String,
    pub class: String,
    pub ticket_type: String,
    pub reservation_number: String,
    pub confirmation_number: String,
    pub seat_selection_link: String,
}

impl FlightSegment {
    fn description(&self) -> String {
        format!(
            "Route: {}\nClass: {}\nTicket Type: {}\nReservation Number: {}\nConfirmation Number: {}",
            self.route, self.class, self.ticket_type, self.reservation_number, self.confirmation_number
        )
    }

    fn at(&self, time: &str, year: i32) -> Result<NaiveDateTime, ItineraryError> {
        // weekday marker is informational only
        let day = self.date.split(['(', '（']).next().unwrap_or(&self.date).trim();
        let value = format!("{year}年{day}{}", time.trim());
        NaiveDateTime::parse_from_str(&value, "%Y年%m月%d日%H:%M").map_err(|source| {
            ItineraryError::Date {
                flight: self.flight_number.clone(),
                value: format!("{} {}", self.date, time),
                source,
            }
        })
    }

    pub fn departure(&self, year: i32) -> Result<NaiveDateTime, ItineraryError> {
        self.at(&self.departure_time, year)
    }

    pub fn arrival(&self, year: i32) -> Result<NaiveDateTime, ItineraryError> {
        self.at(&self.arrival_time, year)
    }
}

const SEAT_SELECTION_LINK: &str = "https://www.airtrip.jp/booking/confirm/getlink.php/?utm_source=email&utm_medium=boardingguidemail&utm_campaign=boardingguidemail";

/// The round trip shipped with the exporter.
pub fn builtin_itinerary() -> Vec<FlightSegment> {
    vec![
        FlightSegment {
            flight_number: "ANAI263".to_string(),
            route: "東京(羽田)→福岡".to_string(),
            date: "12月28日(木)".to_string(),
            departure_time: "16:25".to_string(),
            arrival_time: "18:30".to_string(),
            class: "普通席".to_string(),
            ticket_type: "ANA SUPER VALUE55".to_string(),
            reservation_number: "0595".to_string(),
            confirmation_number: "450-029-052".to_string(),
            seat_selection_link: SEAT_SELECTION_LINK.to_string(),
        },
        FlightSegment {
            flight_number: "ANA1076".to_string(),
            route: "福岡→東京(羽田)".to_string(),
            date: "01月04日(木)".to_string(),
            departure_time: "09:55".to_string(),
            arrival_time: "11:30".to_string(),
            class: "普通席".to_string(),
            ticket_type: "ANA SUPER VALUE55".to_string(),
            reservation_number: "0326".to_string(),
            confirmation_number: "227-077-106".to_string(),
            seat_selection_link: SEAT_SELECTION_LINK.to_string(),
        },
    ]
}

/// Reads a JSON array of segments.
pub fn load_segments(path: impl AsRef<Path>) -> Result<Vec<FlightSegment>, ItineraryError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ItineraryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// One VEVENT per segment; every date is placed in `year`.
pub fn itinerary_calendar(segments: &[FlightSegment], year: i32) -> Result<Calendar, ItineraryError> {
    let mut calendar = Calendar::new();
    for segment in segments {
        let event = Event::new()
            .summary(&format!("Flight: {}", segment.flight_number))
            .description(&segment.description())
            .starts(segment.departure(year)?)
            .ends(segment.arrival(year)?)
            .location(&segment.route)
            .add_property("URL", &segment.seat_selection_link)
            .done();
        calendar.push(event);
    }
    Ok(calendar.done())
}

pub fn write_ics(
    path: impl AsRef<Path>,
    segments: &[FlightSegment],
    year: i32,
) -> Result<(), ItineraryError> {
    let path = path.as_ref();
    let calendar = itinerary_calendar(segments, year)?;
    std::fs::write(path, calendar.to_string()).map_err(|source| ItineraryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), events = segments.len(), "Itinerary written");
    Ok(())
}
