use std::io::{BufRead, Write};
use std::num::ParseFloatError;
use std::time::Duration;

use colored::Colorize;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::Coordinate;

#[derive(Debug)]
pub enum LocationError {
    Parse {
        field: &'static str,
        input: String,
        source: ParseFloatError,
    },
    OutOfRange {
        field: &'static str,
        value: f64,
    },
    Io(std::io::Error),
}

impl From<std::io::Error> for LocationError {
    fn from(error: std::io::Error) -> Self {
        LocationError::Io(error)
    }
}

impl std::fmt::Display for LocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LocationError::Parse { field, input, source } => {
                write!(f, "Invalid {} '{}': {}", field, input, source)
            }
            LocationError::OutOfRange { field, value } => {
                write!(f, "{} {} is out of range", field, value)
            }
            LocationError::Io(error) => write!(f, "Console error: {}", error),
        }
    }
}

impl std::error::Error for LocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LocationError::Parse { source, .. } => Some(source),
            LocationError::Io(error) => Some(error),
            LocationError::OutOfRange { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationStatus {
    Initializing,
    Ready,
    Disabled,
}

/// A source of the device position that is polled, never pushed.
pub trait LocationService {
    fn status(&self) -> LocationStatus;
    fn position(&self) -> Option<Coordinate>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum LocatorState {
    Initializing,
    Ready(Coordinate),
    Disabled,
}

/// Answer from an ip-api.com style geolocation endpoint.
#[derive(Debug, Deserialize)]
struct IpLocation {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Location service backed by IP geolocation.
///
/// The lookup runs in a background task started by [`IpLocator::start`];
/// the result is published on a watch channel that `status()` reads.
pub struct IpLocator {
    state: watch::Receiver<LocatorState>,
    join_handle: JoinHandle<()>,
}

impl IpLocator {
    pub fn start(client: Client, url: String) -> Self {
        let (tx, rx) = watch::channel(LocatorState::Initializing);

        let join_handle = tokio::spawn(async move {
            let state = match lookup(&client, &url).await {
                Ok(coordinate) => {
                    info!("IP geolocation resolved to {}", coordinate);
                    LocatorState::Ready(coordinate)
                }
                Err(error) => {
                    warn!("IP geolocation unavailable: {}", error);
                    LocatorState::Disabled
                }
            };

            // The receiver is gone if the caller already gave up
            let _ = tx.send(state);
        });

        IpLocator {
            state: rx,
            join_handle,
        }
    }
}

type LookupError = Box<dyn std::error::Error + Send + Sync>;

async fn lookup(client: &Client, url: &str) -> Result<Coordinate, LookupError> {
    let answer: IpLocation = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    debug!("IP geolocation answer: {:?}", answer);

    if answer.status != "success" {
        let message = answer.message.unwrap_or_else(|| answer.status.clone());
        return Err(format!("lookup failed: {}", message).into());
    }

    match (answer.lat, answer.lon) {
        (Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)),
        _ => Err("lookup returned no coordinates".into()),
    }
}

impl LocationService for IpLocator {
    fn status(&self) -> LocationStatus {
        match *self.state.borrow() {
            LocatorState::Initializing => LocationStatus::Initializing,
            LocatorState::Ready(_) => LocationStatus::Ready,
            LocatorState::Disabled => LocationStatus::Disabled,
        }
    }

    fn position(&self) -> Option<Coordinate> {
        match *self.state.borrow() {
            LocatorState::Ready(coordinate) => Some(coordinate),
            _ => None,
        }
    }
}

impl Drop for IpLocator {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

/// Polls `service` every `interval` until it is ready, up to `attempts` times.
///
/// Returns `None` when the service never became ready or reported itself
/// disabled.
pub async fn poll_location<S, W>(
    service: &S,
    attempts: u32,
    interval: Duration,
    out: &mut W,
) -> Result<Option<Coordinate>, LocationError>
where
    S: LocationService + ?Sized,
    W: Write,
{
    let mut try_count = 0;
    loop {
        match service.status() {
            LocationStatus::Ready => break,
            LocationStatus::Disabled => {
                debug!("location service disabled after {} attempts", try_count);
                break;
            }
            LocationStatus::Initializing if try_count >= attempts => break,
            LocationStatus::Initializing => {}
        }

        writeln!(out, "Waiting for location...")?;
        tokio::time::sleep(interval).await;
        try_count += 1;
    }

    if service.status() == LocationStatus::Ready {
        Ok(service.position())
    } else {
        Ok(None)
    }
}

/// Asks for latitude and longitude on the console.
pub fn prompt_coordinate<R, W>(input: &mut R, out: &mut W) -> Result<Coordinate, LocationError>
where
    R: BufRead,
    W: Write,
{
    let latitude = prompt_degrees(input, out, "Latitude", 90.0)?;
    let longitude = prompt_degrees(input, out, "Longitude", 180.0)?;

    Ok(Coordinate::new(latitude, longitude))
}

fn prompt_degrees<R, W>(
    input: &mut R,
    out: &mut W,
    field: &'static str,
    limit: f64,
) -> Result<f64, LocationError>
where
    R: BufRead,
    W: Write,
{
    write!(out, "{}: ", field)?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();

    parse_degrees(field, line, limit)
}

/// Parses decimal degrees and checks them against `±limit`.
///
/// `NaN` and infinities fall outside every range and are rejected too.
pub fn parse_degrees(field: &'static str, input: &str, limit: f64) -> Result<f64, LocationError> {
    let input = input.trim();
    let value: f64 = input.parse().map_err(|source| LocationError::Parse {
        field,
        input: input.to_string(),
        source,
    })?;

    if !(-limit..=limit).contains(&value) {
        return Err(LocationError::OutOfRange { field, value });
    }

    Ok(value)
}

/// Polls the service and falls back to manual entry when it gives nothing.
pub async fn resolve_location<S, R, W>(
    service: Option<&S>,
    attempts: u32,
    interval: Duration,
    input: &mut R,
    out: &mut W,
) -> Result<Coordinate, LocationError>
where
    S: LocationService + ?Sized,
    R: BufRead,
    W: Write,
{
    let automatic = match service {
        Some(service) => poll_location(service, attempts, interval, out).await?,
        None => None,
    };

    let coordinate = match automatic {
        Some(coordinate) => coordinate,
        None => {
            writeln!(
                out,
                "{}",
                "Unable to determine location automatically. Please enter your coordinates manually."
                    .yellow()
            )?;
            prompt_coordinate(input, out)?
        }
    };

    writeln!(out, "Your location: {}", coordinate.to_string().bold())?;

    Ok(coordinate)
}
