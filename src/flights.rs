//! Nearest live flight lookup against the OpenSky `states/all` endpoint.
//!
//! The lookup is best-effort: a non-success status is reported back as
//! [`FlightLookup::Unavailable`] rather than an error.

use reqwest::{Client, Request, Response, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::geo::planar_degrees;
use crate::models::{Coordinate, FlightState, StateList};

pub const DEFAULT_OPENSKY_URL: &str = "https://opensky-network.org/api";

/// Half the side of the search box, in degrees.
pub const SEARCH_RADIUS_DEG: f64 = 1.0;

#[derive(Debug)]
pub enum FlightError {
    RequestError(reqwest::Error),
}

impl From<reqwest::Error> for FlightError {
    fn from(error: reqwest::Error) -> Self {
        FlightError::RequestError(error)
    }
}

impl std::fmt::Display for FlightError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FlightError::RequestError(e) if e.is_decode() => {
                write!(f, "Unexpected flight data: {}", e)
            }
            FlightError::RequestError(e) => write!(f, "Flight lookup failed: {}", e),
        }
    }
}

impl std::error::Error for FlightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlightError::RequestError(e) => Some(e),
        }
    }
}

/// Query parameters understood by OpenSky for an area search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lomin: f64,
    pub lamax: f64,
    pub lomax: f64,
}

impl BoundingBox {
    pub fn around(center: &Coordinate, radius: f64) -> Self {
        BoundingBox {
            lamin: center.latitude - radius,
            lomin: center.longitude - radius,
            lamax: center.latitude + radius,
            lomax: center.longitude + radius,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum FlightLookup {
    Found { flight: FlightState, distance: f64 },
    NoFlights,
    Unavailable { status: StatusCode },
}

/// Builds the `states/all` request for the box around `user`.
pub fn states_request(
    client: &Client,
    base_url: &str,
    user: &Coordinate,
) -> reqwest::Result<Request> {
    let url = format!("{}/states/all", base_url.trim_end_matches('/'));

    client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .query(&BoundingBox::around(user, SEARCH_RADIUS_DEG))
        .build()
}

/// Sends a prepared states request and picks the closest flight out of
/// the answer.
pub async fn locate_nearest_flight(
    client: &Client,
    request: Request,
    user: &Coordinate,
) -> Result<FlightLookup, FlightError> {
    let response: Response = client.execute(request).await?;

    let status = response.status();
    if !status.is_success() {
        debug!("OpenSky answered {}", status);
        return Ok(FlightLookup::Unavailable { status });
    }

    let state_list: StateList = response.json().await?;
    let time = state_list.time;
    let flights = state_list.states.unwrap_or_default();
    debug!("OpenSky returned {} state vectors at {}", flights.len(), time);

    Ok(match nearest_flight(user, &flights) {
        Some((flight, distance)) => FlightLookup::Found {
            flight: flight.clone(),
            distance,
        },
        None => FlightLookup::NoFlights,
    })
}

/// Closest positioned flight by planar distance on raw degrees. The first
/// one wins on a tie.
pub fn nearest_flight<'a>(
    user: &Coordinate,
    flights: &'a [FlightState],
) -> Option<(&'a FlightState, f64)> {
    let mut closest: Option<(&FlightState, f64)> = None;

    for flight in flights {
        let Some(position) = flight.position() else {
            continue;
        };

        let distance = planar_degrees(user, &position);
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((flight, distance)),
        }
    }

    closest
}
