use std::fmt;

use csv_async::StringRecord;
use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// A position on the Earth's surface in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

// Column positions in the OpenFlights airports.dat format
const NAME_FIELD: usize = 1;
const CITY_FIELD: usize = 2;
const COUNTRY_FIELD: usize = 3;
const LATITUDE_FIELD: usize = 6;
const LONGITUDE_FIELD: usize = 7;

#[derive(Clone, Debug, PartialEq)]
pub struct Airport {
    pub name: String,
    pub city: String,
    pub country: String,
    pub location: Coordinate,
}

impl Airport {
    /// Builds an airport from one OpenFlights record.
    ///
    /// Text columns are taken as the CSV reader yields them, surrounding
    /// quotes removed and otherwise untouched.
    ///
    /// Returns `None` when the latitude or longitude column is missing or is
    /// not a finite number, the feed has plenty of those.
    pub fn from_record(record: &StringRecord) -> Option<Self> {
        let latitude = parse_degrees(record.get(LATITUDE_FIELD)?)?;
        let longitude = parse_degrees(record.get(LONGITUDE_FIELD)?)?;

        Some(Airport {
            name: record.get(NAME_FIELD).unwrap_or_default().to_string(),
            city: record.get(CITY_FIELD).unwrap_or_default().to_string(),
            country: record.get(COUNTRY_FIELD).unwrap_or_default().to_string(),
            location: Coordinate::new(latitude, longitude),
        })
    }
}

fn parse_degrees(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Slippy-map tile address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileCoordinate {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Body returned by the OpenSky `states/all` endpoint.
///
/// `states` is `null` when nothing is flying inside the requested box.
#[derive(Debug, Deserialize)]
pub struct StateList {
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub states: Option<Vec<FlightState>>,
}

/// One aircraft as reported by OpenSky.
///
/// OpenSky sends each state vector as a positional array (17 elements, 18
/// when the category is requested). It is decoded once here so nothing else
/// has to index raw arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlightState {
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub baro_altitude: Option<f64>,
    pub on_ground: bool,
    pub velocity: Option<f64>,
}

impl FlightState {
    pub fn position(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Callsign without OpenSky's space padding, or the ICAO24 address when
    /// the transponder did not send one.
    pub fn identifier(&self) -> &str {
        match self.callsign.as_deref().map(str::trim) {
            Some(callsign) if !callsign.is_empty() => callsign,
            _ => &self.icao24,
        }
    }
}

impl<'de> Deserialize<'de> for FlightState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(StateVectorVisitor)
    }
}

struct StateVectorVisitor;

impl<'de> Visitor<'de> for StateVectorVisitor {
    type Value = FlightState;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an OpenSky state vector array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<FlightState, A::Error>
    where
        A: SeqAccess<'de>,
    {
        // 0: icao24
        let icao24: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        // 1: callsign, 2: origin country
        let callsign: Option<String> = seq.next_element::<Option<String>>()?.flatten();
        let origin_country: String = seq
            .next_element::<Option<String>>()?
            .flatten()
            .unwrap_or_default();
        // 3: time_position, 4: last_contact
        seq.next_element::<IgnoredAny>()?;
        seq.next_element::<IgnoredAny>()?;
        // 5: longitude, 6: latitude, 7: baro_altitude
        let longitude = seq.next_element::<Option<f64>>()?.flatten();
        let latitude = seq.next_element::<Option<f64>>()?.flatten();
        let baro_altitude = seq.next_element::<Option<f64>>()?.flatten();
        // 8: on_ground, 9: velocity
        let on_ground = seq
            .next_element::<Option<bool>>()?
            .flatten()
            .unwrap_or(false);
        let velocity = seq.next_element::<Option<f64>>()?.flatten();

        // Drain the rest (track, vertical rate, sensors, squawk, ...)
        while seq.next_element::<IgnoredAny>()?.is_some() {}

        Ok(FlightState {
            icao24,
            callsign,
            origin_country,
            longitude,
            latitude,
            baro_altitude,
            on_ground,
            velocity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_airport_from_record_keeps_columns() {
        let record = StringRecord::from(vec![
            "1",
            "Goroka Airport",
            "Goroka",
            "Papua New Guinea",
            "GKA",
            "AYGA",
            "-6.081689834590001",
            "145.391998291",
            "5282",
        ]);

        let airport = Airport::from_record(&record).unwrap();
        assert_eq!(airport.name, "Goroka Airport");
        assert_eq!(airport.city, "Goroka");
        assert_eq!(airport.country, "Papua New Guinea");
        assert_eq!(airport.location.latitude, -6.081689834590001);
        assert_eq!(airport.location.longitude, 145.391998291);
    }

    #[test]
    fn test_airport_from_record_rejects_bad_coordinates() {
        let bad_latitude = StringRecord::from(vec!["1", "A", "B", "C", "", "", "north", "10.0"]);
        let missing_longitude = StringRecord::from(vec!["1", "A", "B", "C", "", "", "10.0"]);
        let not_finite = StringRecord::from(vec!["1", "A", "B", "C", "", "", "NaN", "10.0"]);

        assert!(Airport::from_record(&bad_latitude).is_none());
        assert!(Airport::from_record(&missing_longitude).is_none());
        assert!(Airport::from_record(&not_finite).is_none());
    }

    #[test]
    fn test_state_list_decodes_positional_arrays() {
        let body = json!({
            "time": 1700000000,
            "states": [
                ["4b1815", "SWR123  ", "Switzerland", 1700000000, 1700000001,
                 8.55, 47.45, 1234.5, false, 120.0, 90.0, 0.0, null, 1300.0, "1000", false, 0],
                ["3c6444", null, "Germany", null, 1700000001,
                 null, null, null, true, null, null, null, null, null, null, false, 0, 1]
            ]
        });

        let list: StateList = serde_json::from_value(body).unwrap();
        let states = list.states.unwrap();
        assert_eq!(list.time, 1700000000);
        assert_eq!(states.len(), 2);

        assert_eq!(states[0].identifier(), "SWR123");
        assert_eq!(states[0].origin_country, "Switzerland");
        assert_eq!(states[0].position(), Some(Coordinate::new(47.45, 8.55)));
        assert_eq!(states[0].baro_altitude, Some(1234.5));

        assert_eq!(states[1].identifier(), "3c6444");
        assert!(states[1].on_ground);
        assert_eq!(states[1].position(), None);
    }

    #[test]
    fn test_state_list_null_states() {
        let list: StateList = serde_json::from_str(r#"{"time": 1, "states": null}"#).unwrap();
        assert!(list.states.is_none());

        let list: StateList = serde_json::from_str(r#"{"time": 1}"#).unwrap();
        assert!(list.states.is_none());
    }
}
