use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::{Client, ClientBuilder};

use crate::directory::DEFAULT_AIRPORTS_URL;
use crate::flights::DEFAULT_OPENSKY_URL;
use crate::map::{DEFAULT_MAP_WIDTH, DEFAULT_TILE_SERVER, DEFAULT_ZOOM};
use crate::location::parse_degrees;
use crate::models::Coordinate;

pub const DEFAULT_LOCATOR_URL: &str = "http://ip-api.com/json/?fields=status,message,lat,lon";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Find the closest airport and the nearest live flight to you.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// How many times to poll the location service before asking for coordinates
    #[arg(long, default_value_t = 10)]
    pub location_attempts: u32,

    /// Delay between two location polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Skip automatic location and ask for coordinates straight away
    #[arg(long, default_value_t = false)]
    pub no_auto_locate: bool,

    /// Use this latitude instead of locating the device
    #[arg(long, requires = "longitude", allow_negative_numbers = true, value_parser = parse_latitude)]
    pub latitude: Option<f64>,

    /// Use this longitude instead of locating the device
    #[arg(long, requires = "latitude", allow_negative_numbers = true, value_parser = parse_longitude)]
    pub longitude: Option<f64>,

    /// IP geolocation endpoint used to locate the device
    #[arg(long, default_value = DEFAULT_LOCATOR_URL)]
    pub locator_url: String,

    /// OpenFlights airports.dat location
    #[arg(long, default_value = DEFAULT_AIRPORTS_URL)]
    pub airports_url: String,

    /// OpenSky REST API base URL
    #[arg(long, default_value = DEFAULT_OPENSKY_URL)]
    pub opensky_url: String,

    /// Slippy-map tile server base URL
    #[arg(long, default_value = DEFAULT_TILE_SERVER)]
    pub tile_server: String,

    /// Map tile zoom level
    #[arg(long, default_value_t = DEFAULT_ZOOM, value_parser = clap::value_parser!(u8).range(0..=19))]
    pub zoom: u8,

    /// Where to save the downloaded map tile
    #[arg(short, long, default_value = "airport.png")]
    pub output: PathBuf,

    /// Width of the rendered map, in terminal columns
    #[arg(long, default_value_t = DEFAULT_MAP_WIDTH, value_parser = clap::value_parser!(u32).range(1..))]
    pub map_width: u32,

    /// HTTP timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Hide the download progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// More diagnostics on stderr, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_latitude(input: &str) -> Result<f64, String> {
    parse_degrees("Latitude", input, 90.0).map_err(|e| e.to_string())
}

fn parse_longitude(input: &str) -> Result<f64, String> {
    parse_degrees("Longitude", input, 180.0).map_err(|e| e.to_string())
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Coordinates given on the command line, if any.
    pub fn fixed_location(&self) -> Option<Coordinate> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// HTTP client shared by every request of the run.
    pub fn http_client(&self) -> reqwest::Result<Client> {
        ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(self.timeout))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["closest_airport"]);

        assert_eq!(config.location_attempts, 10);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.zoom, 14);
        assert_eq!(config.map_width, 18);
        assert_eq!(config.output, PathBuf::from("airport.png"));
        assert_eq!(config.fixed_location(), None);
        assert_eq!(config.log_level(), "warn");
    }

    #[test]
    fn test_fixed_location() {
        let config = Config::parse_from([
            "closest_airport",
            "--latitude",
            "-33.9",
            "--longitude",
            "151.2",
            "-vv",
        ]);

        assert_eq!(config.fixed_location(), Some(Coordinate::new(-33.9, 151.2)));
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn test_latitude_requires_longitude() {
        assert!(Config::try_parse_from(["closest_airport", "--latitude", "10"]).is_err());
    }

    #[test]
    fn test_fixed_location_out_of_range() {
        let args = ["closest_airport", "--latitude", "500", "--longitude", "10"];
        assert!(Config::try_parse_from(args).is_err());

        let args = ["closest_airport", "--latitude", "10", "--longitude", "NaN"];
        assert!(Config::try_parse_from(args).is_err());

        let args = ["closest_airport", "--latitude", "-90", "--longitude", "180"];
        let config = Config::try_parse_from(args).unwrap();
        assert_eq!(config.fixed_location(), Some(Coordinate::new(-90.0, 180.0)));
    }

    #[test]
    fn test_zoom_range() {
        assert!(Config::try_parse_from(["closest_airport", "--zoom", "25"]).is_err());
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
