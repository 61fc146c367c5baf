use async_trait::async_trait;
use insightbot_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::{http_client, read_json, Coordinates, Geocoder, Place, ToolAdapter, ToolRequest};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

static PLACE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:in|at|for|near)\s+").unwrap());

const TRAILING_WORDS: &[&str] = &[
    "today", "tomorrow", "now", "right", "tonight", "currently", "this", "week", "weekend",
    "morning", "evening", "afternoon",
];

const MAX_PLACE_WORDS: usize = 4;

/// Abbreviations whose trailing `.` is part of the place name ("St. Louis").
const ABBREVIATIONS: &[&str] = &["st", "ste", "ft", "mt", "pt"];

fn is_abbreviation(word: &str) -> bool {
    ABBREVIATIONS.contains(&word.trim_end_matches('.').to_lowercase().as_str())
}

/// Byte offset of the first clause break. A `.` only breaks when followed by
/// whitespace or end of input and it does not close an abbreviation.
fn clause_end(tail: &str) -> usize {
    for (i, c) in tail.char_indices() {
        match c {
            '?' | '!' | ',' | ';' => return i,
            '.' => {
                let at_boundary = tail[i + 1..].chars().next().map_or(true, char::is_whitespace);
                let word = tail[..i].rsplit(char::is_whitespace).next().unwrap_or_default();
                if at_boundary && !is_abbreviation(word) {
                    return i;
                }
            }
            _ => {}
        }
    }
    tail.len()
}

fn trim_word(word: &str) -> &str {
    let word = word
        .trim_matches(|c: char| !c.is_alphanumeric() && !matches!(c, '-' | '\'' | '.'))
        .trim_start_matches('.');
    if is_abbreviation(word) {
        word
    } else {
        word.trim_end_matches('.')
    }
}

/// Pull a place name out of a weather question such as
/// "what's the weather in New Delhi today?".
///
/// The last `in|at|for|near` marker wins, so "weather for tomorrow in Pune"
/// yields "Pune".
pub fn extract_place(query: &str) -> Option<String> {
    let tail_start = PLACE_MARKER.find_iter(query).last()?.end();
    let tail = &query[tail_start..];

    let mut words: Vec<&str> = tail[..clause_end(tail)]
        .split_whitespace()
        .map(trim_word)
        .take_while(|w| !w.is_empty())
        .collect();

    while let Some(last) = words.last() {
        if TRAILING_WORDS.contains(&last.to_lowercase().as_str()) {
            words.pop();
        } else {
            break;
        }
    }
    words.truncate(MAX_PLACE_WORDS);

    let place = words.join(" ");
    let starts_with_letter = place.chars().next().is_some_and(char::is_alphabetic);
    if starts_with_letter {
        Some(place)
    } else {
        None
    }
}

/// Current conditions from Open-Meteo (no key required).
pub struct OpenMeteoWeather {
    client: Client,
    api_base: String,
}

impl OpenMeteoWeather {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(10))?,
            api_base: FORECAST_URL.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.to_string();
        self
    }
}

pub fn format_current(data: &Value) -> String {
    let current = &data["current_weather"];
    match (current["temperature"].as_f64(), current["windspeed"].as_f64()) {
        (Some(t), Some(w)) => format!("Temperature: {}°C, Windspeed: {} km/h", t, w),
        _ => "Weather data not available.".to_string(),
    }
}

#[async_trait]
impl ToolAdapter for OpenMeteoWeather {
    fn name(&self) -> &'static str {
        "open_meteo_weather"
    }

    async fn invoke(&self, request: &ToolRequest) -> Result<String> {
        let at = request.coordinates()?;
        info!(%at, "Open-Meteo forecast");

        let response = self
            .client
            .get(&self.api_base)
            .query(&[
                ("latitude", at.latitude.to_string()),
                ("longitude", at.longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Weather request failed for {}: {}", at, e)))?;

        let data = read_json("Open-Meteo", response).await?;
        Ok(format_current(&data))
    }
}

/// Place-name lookup against the Open-Meteo geocoding API.
pub struct OpenMeteoGeocoder {
    client: Client,
}

impl OpenMeteoGeocoder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_secs(10))?,
        })
    }
}

pub fn parse_place(data: &Value) -> Option<Place> {
    let first = data["results"].as_array()?.first()?;
    Some(Place {
        name: first["name"].as_str().unwrap_or_default().to_string(),
        country: first["country"].as_str().map(str::to_string),
        coordinates: Coordinates {
            latitude: first["latitude"].as_f64()?,
            longitude: first["longitude"].as_f64()?,
        },
    })
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    async fn locate(&self, place: &str) -> Result<Option<Place>> {
        let response = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", place), ("count", "1")])
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Geocoding failed for '{}': {}", place, e)))?;

        let data = read_json("Open-Meteo geocoding", response).await?;
        let found = parse_place(&data);
        debug!(place, found = found.is_some(), "Geocoding completed");
        Ok(found)
    }
}
