use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Forecast document as returned by weatherapi.com.
///
/// Field names mirror the API JSON so the same type is used to parse responses
/// and to serialize cached payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDocument {
    pub location: LocationInfo,
    pub current: CurrentConditions,
    /// Absent on `current.json` responses.
    #[serde(default)]
    pub forecast: Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "localtime")]
    pub local_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition: Condition,
    pub wind_kph: f64,
    pub wind_dir: String,
    pub humidity: u8,
    #[serde(rename = "feelslike_c")]
    pub feels_like_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    pub icon: String,
    pub code: i32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Forecast {
    #[serde(rename = "forecastday")]
    pub days: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub day: DaySummary,
    pub astro: Astro,
    #[serde(rename = "hour", default)]
    pub hours: Vec<HourForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    #[serde(rename = "maxtemp_c")]
    pub max_temp_c: f64,
    #[serde(rename = "mintemp_c")]
    pub min_temp_c: f64,
    pub condition: Condition,
    #[serde(rename = "daily_chance_of_rain")]
    pub chance_of_rain: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Astro {
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourForecast {
    pub time: String,
    pub temp_c: f64,
    pub condition: Condition,
}

/// Search result from the location autocomplete endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSuggestion {
    pub id: i64,
    pub name: String,
    pub region: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl LocationSuggestion {
    /// Query string that pins the lookup to this suggestion's coordinates.
    pub fn coordinate_query(&self) -> String {
        coordinate_query(self.lat, self.lon)
    }

    pub fn label(&self) -> String {
        if self.region.is_empty() {
            format!("{}, {}", self.name, self.country)
        } else {
            format!("{}, {}, {}", self.name, self.region, self.country)
        }
    }
}

/// A position reported by the location provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, recorded_at: Utc::now() }
    }

    pub fn coordinate_query(&self) -> String {
        coordinate_query(self.latitude, self.longitude)
    }
}

/// `"lat,lon"` in the form the weather API accepts for `q`.
pub fn coordinate_query(lat: f64, lon: f64) -> String {
    format!("{lat},{lon}")
}

/// One cached weather document plus its cache metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSnapshot {
    pub location_key: String,
    pub fetched_at_millis: i64,
    /// JSON-serialized [`WeatherDocument`].
    pub payload: String,
    pub is_current_location: bool,
}

impl WeatherSnapshot {
    pub fn from_document(
        document: &WeatherDocument,
        fetched_at: DateTime<Utc>,
        is_current_location: bool,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            location_key: document.location.name.clone(),
            fetched_at_millis: fetched_at.timestamp_millis(),
            payload: serde_json::to_string(document)?,
            is_current_location,
        })
    }

    pub fn document(&self) -> serde_json::Result<WeatherDocument> {
        serde_json::from_str(&self.payload)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn condition(text: &str) -> Condition {
        Condition { text: text.to_string(), icon: "//cdn.weatherapi.com/113.png".into(), code: 1000 }
    }

    pub fn document(name: &str) -> WeatherDocument {
        WeatherDocument {
            location: LocationInfo {
                name: name.to_string(),
                region: "City of London, Greater London".into(),
                country: "United Kingdom".into(),
                lat: 51.52,
                lon: -0.11,
                local_time: "2024-09-08 14:05".into(),
            },
            current: CurrentConditions {
                temp_c: 18.0,
                temp_f: 64.4,
                condition: condition("Partly cloudy"),
                wind_kph: 11.2,
                wind_dir: "WSW".into(),
                humidity: 72,
                feels_like_c: 17.5,
            },
            forecast: Forecast {
                days: vec![ForecastDay {
                    date: NaiveDate::from_ymd_opt(2024, 9, 8).unwrap(),
                    day: DaySummary {
                        max_temp_c: 20.1,
                        min_temp_c: 12.4,
                        condition: condition("Patchy rain nearby"),
                        chance_of_rain: 86,
                    },
                    astro: Astro { sunrise: "06:29 AM".into(), sunset: "07:31 PM".into() },
                    hours: vec![HourForecast {
                        time: "2024-09-08 00:00".into(),
                        temp_c: 14.0,
                        condition: condition("Clear"),
                    }],
                }],
            },
        }
    }
}
