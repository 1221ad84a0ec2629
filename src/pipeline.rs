//! The run, step by step: Location, Directory, Nearest, FlightLookup and
//! MapRender.
//!
//! Every user-facing line goes to the `out` writer handed in by the caller.
//! Directory and location failures end the run; flight and map failures are
//! printed and the run carries on.

use std::io::{BufRead, Write};

use colored::Colorize;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::Config;
use crate::directory::{load_airports, DirectoryError};
use crate::flights::{locate_nearest_flight, states_request, FlightLookup};
use crate::geo::tile_for;
use crate::location::{resolve_location, IpLocator, LocationError};
use crate::map::{download_tile, render_tile, tile_url, MapError};
use crate::models::{Airport, Coordinate};
use crate::nearest::{nearest_airport, EmptyResultError};

#[derive(Debug)]
pub enum PipelineError {
    Location(LocationError),
    Directory(DirectoryError),
    Empty(EmptyResultError),
    Output(std::io::Error),
}

impl From<LocationError> for PipelineError {
    fn from(error: LocationError) -> Self {
        PipelineError::Location(error)
    }
}

impl From<DirectoryError> for PipelineError {
    fn from(error: DirectoryError) -> Self {
        PipelineError::Directory(error)
    }
}

impl From<EmptyResultError> for PipelineError {
    fn from(error: EmptyResultError) -> Self {
        PipelineError::Empty(error)
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(error: std::io::Error) -> Self {
        PipelineError::Output(error)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PipelineError::Location(e) => write!(f, "{}", e),
            PipelineError::Directory(e) => write!(f, "{}", e),
            PipelineError::Empty(e) => write!(f, "{}", e),
            PipelineError::Output(e) => write!(f, "Console error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Location(e) => Some(e),
            PipelineError::Directory(e) => Some(e),
            PipelineError::Empty(e) => Some(e),
            PipelineError::Output(e) => Some(e),
        }
    }
}

/// What a completed run found.
#[derive(Debug)]
pub struct Report {
    pub airport: Airport,
    pub distance_km: f64,
    pub flight: Option<FlightLookup>,
    pub map_rendered: bool,
}

/// Location step: command-line coordinates, then the location service,
/// then manual entry.
pub async fn locate<R, W>(
    config: &Config,
    client: &Client,
    input: &mut R,
    out: &mut W,
) -> Result<Coordinate, PipelineError>
where
    R: BufRead,
    W: Write,
{
    if let Some(coordinate) = config.fixed_location() {
        writeln!(out, "Your location: {}", coordinate.to_string().bold())?;
        return Ok(coordinate);
    }

    let locator = if config.no_auto_locate {
        None
    } else {
        Some(IpLocator::start(client.clone(), config.locator_url.clone()))
    };

    let coordinate = resolve_location(
        locator.as_ref(),
        config.location_attempts,
        config.poll_interval(),
        input,
        out,
    )
    .await?;

    Ok(coordinate)
}

/// Runs every step after the location is known.
pub async fn run<W: Write>(
    config: &Config,
    client: &Client,
    user: &Coordinate,
    out: &mut W,
) -> Result<Report, PipelineError> {
    let airports = load_airports(client, &config.airports_url, !config.no_progress).await?;
    info!("Loaded {} airports", airports.len());

    let (airport, distance_km) = closest_airport(user, &airports, out)?;
    let flight = nearest_flight(config, client, user, out).await?;
    let map_rendered = render_map(config, client, &airport, out).await?;

    Ok(Report {
        airport,
        distance_km,
        flight,
        map_rendered,
    })
}

fn closest_airport<W: Write>(
    user: &Coordinate,
    airports: &[Airport],
    out: &mut W,
) -> Result<(Airport, f64), PipelineError> {
    let (airport, distance_km) = nearest_airport(user, airports)?;

    writeln!(out, "Closest airport: {}", airport.name.green().bold())?;
    writeln!(out, "City: {}", airport.city)?;
    writeln!(out, "Country: {}", airport.country)?;
    writeln!(out, "Distance: {:.1} km", distance_km)?;

    Ok((airport.clone(), distance_km))
}

/// Flight lookup step, `None` when the lookup itself failed.
async fn nearest_flight<W: Write>(
    config: &Config,
    client: &Client,
    user: &Coordinate,
    out: &mut W,
) -> Result<Option<FlightLookup>, PipelineError> {
    let request = match states_request(client, &config.opensky_url, user) {
        Ok(request) => request,
        Err(e) => {
            writeln!(out, "{} {}", "Error:".red(), e)?;
            return Ok(None);
        }
    };
    writeln!(out, "{}", request.url())?;

    let lookup = match locate_nearest_flight(client, request, user).await {
        Ok(lookup) => lookup,
        Err(e) => {
            writeln!(out, "{} {}", "Error:".red(), e)?;
            return Ok(None);
        }
    };

    match &lookup {
        FlightLookup::Found { flight, distance } => {
            writeln!(
                out,
                "The closest flight is {} at a distance of {:.4}°",
                flight.identifier().cyan().bold(),
                distance
            )?;

            let mut details = Vec::new();
            if !flight.origin_country.is_empty() {
                details.push(flight.origin_country.clone());
            }
            match (flight.on_ground, flight.baro_altitude) {
                (true, _) => details.push("on ground".to_string()),
                (false, Some(altitude)) => details.push(format!("{:.0} m", altitude)),
                (false, None) => {}
            }
            if let Some(velocity) = flight.velocity {
                details.push(format!("{:.0} m/s", velocity));
            }
            if !details.is_empty() {
                writeln!(out, "  ({})", details.join(", "))?;
            }
        }
        FlightLookup::NoFlights => writeln!(out, "No flights found in the area")?,
        FlightLookup::Unavailable { status } => writeln!(
            out,
            "{} {} - {}",
            "Error:".red(),
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )?,
    }

    Ok(Some(lookup))
}

/// Map step, `false` when no map could be shown.
async fn render_map<W: Write>(
    config: &Config,
    client: &Client,
    airport: &Airport,
    out: &mut W,
) -> Result<bool, PipelineError> {
    let tile = tile_for(&airport.location, config.zoom);
    let url = tile_url(&config.tile_server, &tile);
    debug!("Map tile {} at {}", tile, url);

    let rendered: Result<String, MapError> = async {
        download_tile(client, &url, &config.output).await?;
        render_tile(&config.output, config.map_width)
    }
    .await;

    match rendered {
        Ok(canvas) => {
            write!(out, "{}", canvas)?;
            Ok(true)
        }
        Err(e) => {
            writeln!(out, "{} {}", "Error:".red(), e)?;
            Ok(false)
        }
    }
}
