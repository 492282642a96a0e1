//! Builtin weather capabilities
//!
//! Demonstration capability set backed by an embedded location table with
//! deterministically synthesized observations. As far as the protocol core
//! is concerned each handler is an opaque async function; swapping in a real
//! weather provider means replacing these handlers at registration time.

use crate::capability::{
    Capability, CapabilityError, CapabilityExample, CapabilityHandler, CapabilityRegistry,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Embedded location table: (name, country, latitude, longitude)
const LOCATIONS: &[(&str, &str, f64, f64)] = &[
    ("Paris", "France", 48.8566, 2.3522),
    ("Paris", "United States", 33.6609, -95.5555),
    ("Paris", "Canada", 43.2000, -80.3833),
    ("Buenos Aires", "Argentina", -34.6037, -58.3816),
    ("Madrid", "Spain", 40.4168, -3.7038),
    ("London", "United Kingdom", 51.5074, -0.1278),
    ("Berlin", "Germany", 52.5200, 13.4050),
    ("Tokyo", "Japan", 35.6762, 139.6503),
    ("Sydney", "Australia", -33.8688, 151.2093),
    ("New York", "United States", 40.7128, -74.0060),
    ("Lima", "Peru", -12.0464, -77.0428),
    ("Nairobi", "Kenya", -1.2921, 36.8219),
];

const CONDITIONS: &[&str] = &["Clear", "Partly cloudy", "Overcast", "Rain", "Thunderstorm"];

fn find_locations(query: &str, limit: usize) -> Vec<Value> {
    let needle = query.to_lowercase();
    LOCATIONS
        .iter()
        .filter(|(name, _, _, _)| name.to_lowercase().contains(&needle))
        .take(limit)
        .map(|(name, country, lat, lon)| {
            json!({
                "name": name,
                "country": country,
                "latitude": lat,
                "longitude": lon,
            })
        })
        .collect()
}

/// Deterministic pseudo-observation derived from coordinates and a day index
fn synth_observation(lat: f64, lon: f64, day: i64) -> Value {
    let seed = (lat.abs() * 7.0 + lon.abs() * 13.0 + day as f64 * 3.0) as i64;
    let temperature = 30.0 - lat.abs() * 0.5 + (seed % 7) as f64;
    let condition = CONDITIONS[(seed % CONDITIONS.len() as i64).unsigned_abs() as usize];
    json!({
        "temperature": (temperature * 10.0).round() / 10.0,
        "condition": condition,
        "humidity": 40 + seed.rem_euclid(50),
        "wind_speed": 5 + seed.rem_euclid(25),
    })
}

fn lookup(location: &str) -> Result<(&'static str, &'static str, f64, f64), CapabilityError> {
    let needle = location.to_lowercase();
    LOCATIONS
        .iter()
        .find(|(name, _, _, _)| name.to_lowercase() == needle)
        .copied()
        .ok_or_else(|| CapabilityError::Execution(format!("Unknown location: {location}")))
}

/// `search_locations` handler
pub struct SearchLocationsCapability;

#[async_trait]
impl CapabilityHandler for SearchLocationsCapability {
    async fn execute(&self, input: &Value) -> Result<Value, CapabilityError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::Execution("Query is required".to_string()))?;
        let limit = input.get("limit").and_then(Value::as_u64).unwrap_or(5) as usize;

        let locations = find_locations(query, limit);
        let count = locations.len();
        Ok(json!({
            "locations": locations,
            "count": count,
            "status": "success",
        }))
    }
}

/// `get_current_weather` handler
pub struct CurrentWeatherCapability;

#[async_trait]
impl CapabilityHandler for CurrentWeatherCapability {
    async fn execute(&self, input: &Value) -> Result<Value, CapabilityError> {
        let location = input
            .get("location")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::Execution("Location is required".to_string()))?;

        let (name, country, lat, lon) = lookup(location)?;
        Ok(json!({
            "location": {"name": name, "country": country, "latitude": lat, "longitude": lon},
            "current_weather": synth_observation(lat, lon, 0),
            "status": "success",
            "generated_at": Utc::now().to_rfc3339(),
        }))
    }
}

/// `get_forecast` handler
pub struct ForecastCapability;

#[async_trait]
impl CapabilityHandler for ForecastCapability {
    async fn execute(&self, input: &Value) -> Result<Value, CapabilityError> {
        let location = input
            .get("location")
            .and_then(Value::as_str)
            .ok_or_else(|| CapabilityError::Execution("Location is required".to_string()))?;
        let days = input.get("days").and_then(Value::as_i64).unwrap_or(7);

        let (name, country, lat, lon) = lookup(location)?;
        let today = Utc::now().date_naive();
        let daily: Vec<Value> = (0..days)
            .map(|day| {
                let mut entry = synth_observation(lat, lon, day);
                entry["date"] = json!((today + Duration::days(day)).to_string());
                entry
            })
            .collect();

        Ok(json!({
            "location": {"name": name, "country": country},
            "forecast": {"days": days, "daily_data": daily},
            "status": "success",
        }))
    }
}

/// Register the builtin weather capability set in registration order
pub fn register_weather_capabilities(
    registry: &mut CapabilityRegistry,
) -> Result<(), CapabilityError> {
    registry.register(
        search_locations_descriptor(),
        Arc::new(SearchLocationsCapability),
    )?;
    registry.register(
        current_weather_descriptor(),
        Arc::new(CurrentWeatherCapability),
    )?;
    registry.register(forecast_descriptor(), Arc::new(ForecastCapability))?;
    Ok(())
}

fn search_locations_descriptor() -> Capability {
    Capability {
        name: "search_locations".to_string(),
        description: "Search locations by name".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search term"},
                "limit": {
                    "type": "integer",
                    "description": "Maximum results",
                    "default": 5,
                    "minimum": 1,
                    "maximum": 20
                }
            },
            "required": ["query"]
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "locations": {"type": "array"},
                "count": {"type": "integer"},
                "status": {"type": "string"}
            }
        }),
        examples: vec![CapabilityExample {
            input: json!({"query": "Paris", "limit": 3}),
            output: json!({
                "locations": [
                    {"name": "Paris", "country": "France"},
                    {"name": "Paris", "country": "United States"}
                ],
                "count": 2,
                "status": "success"
            }),
        }],
    }
}

fn current_weather_descriptor() -> Capability {
    Capability {
        name: "get_current_weather".to_string(),
        description: "Get current weather for a specific location".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "Location name (city, country)"
                }
            },
            "required": ["location"]
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "location": {"type": "object"},
                "current_weather": {"type": "object"},
                "status": {"type": "string"},
                "generated_at": {"type": "string"}
            }
        }),
        examples: vec![CapabilityExample {
            input: json!({"location": "Buenos Aires"}),
            output: json!({
                "location": {"name": "Buenos Aires", "country": "Argentina"},
                "current_weather": {
                    "temperature": 22.5,
                    "condition": "Clear",
                    "humidity": 65
                },
                "status": "success"
            }),
        }],
    }
}

fn forecast_descriptor() -> Capability {
    Capability {
        name: "get_forecast".to_string(),
        description: "Get the weather forecast for a location".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "location": {"type": "string", "description": "Location name"},
                "days": {
                    "type": "integer",
                    "description": "Number of days (1-16)",
                    "minimum": 1,
                    "maximum": 16,
                    "default": 7
                }
            },
            "required": ["location"]
        }),
        output_schema: json!({
            "type": "object",
            "properties": {
                "location": {"type": "object"},
                "forecast": {"type": "object"},
                "status": {"type": "string"}
            }
        }),
        examples: vec![CapabilityExample {
            input: json!({"location": "Madrid", "days": 3}),
            output: json!({
                "location": {"name": "Madrid", "country": "Spain"},
                "forecast": {"days": 3, "daily_data": []},
                "status": "success"
            }),
        }],
    }
}
