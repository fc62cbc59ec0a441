//! Human-readable rendering of weather documents.

use std::fmt::Write;

use chrono::{DateTime, Local};
use weather_core::WeatherDocument;

pub fn render_weather(doc: &WeatherDocument) -> String {
    let loc = &doc.location;
    let cur = &doc.current;
    let mut out = String::new();

    let _ = writeln!(out, "{}, {}, {} (local time {})", loc.name, loc.region, loc.country, loc.local_time);
    let _ = writeln!(
        out,
        "  {:.1}°C / {:.1}°F, {} (feels like {:.1}°C)",
        cur.temp_c, cur.temp_f, cur.condition.text, cur.feels_like_c
    );
    let _ = writeln!(
        out,
        "  Wind {:.1} km/h {}, humidity {}%",
        cur.wind_kph, cur.wind_dir, cur.humidity
    );

    for day in &doc.forecast.days {
        let _ = writeln!(
            out,
            "  {}  {:>5.1}° / {:>5.1}°  {:>3}% rain  {}  (sunrise {}, sunset {})",
            day.date.format("%a %d %b"),
            day.day.max_temp_c,
            day.day.min_temp_c,
            day.day.chance_of_rain,
            day.day.condition.text,
            day.astro.sunrise,
            day.astro.sunset,
        );
    }

    out
}

pub fn render_cached_at(fetched_at_millis: i64) -> String {
    match DateTime::from_timestamp_millis(fetched_at_millis) {
        Some(at) => format!("(cached {})", at.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
        None => "(cached at an unknown time)".to_string(),
    }
}
