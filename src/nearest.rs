use crate::geo::great_circle_km;
use crate::models::{Airport, Coordinate};

/// No airport survived loading, so there is nothing to pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyResultError;

impl std::fmt::Display for EmptyResultError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "No airports with valid coordinates were loaded")
    }
}

impl std::error::Error for EmptyResultError {}

/// Returns the airport closest to `user` along the Earth's surface, with
/// its distance in kilometres. The first one wins on a tie.
pub fn nearest_airport<'a>(
    user: &Coordinate,
    airports: &'a [Airport],
) -> Result<(&'a Airport, f64), EmptyResultError> {
    let mut closest: Option<(&Airport, f64)> = None;

    for airport in airports {
        let distance = great_circle_km(user, &airport.location);
        match closest {
            Some((_, best)) if distance >= best => {}
            _ => closest = Some((airport, distance)),
        }
    }

    closest.ok_or(EmptyResultError)
}
