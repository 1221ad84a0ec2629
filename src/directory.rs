use std::time::{Duration, Instant};

use reqwest::{Client, Response};

use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use futures::stream::{StreamExt, TryStreamExt};

use csv_async::{AsyncReaderBuilder, ErrorKind, StringRecord};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, trace, warn};

use crate::models::Airport;

pub const DEFAULT_AIRPORTS_URL: &str =
    "https://raw.githubusercontent.com/jpatokal/openflights/master/data/airports.dat";

// Errors that can occur
#[derive(Debug)]
pub enum DirectoryError {
    RequestError(reqwest::Error),
    CsvError(csv_async::Error),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(error: reqwest::Error) -> Self {
        DirectoryError::RequestError(error)
    }
}

impl From<csv_async::Error> for DirectoryError {
    fn from(error: csv_async::Error) -> Self {
        DirectoryError::CsvError(error)
    }
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DirectoryError::RequestError(e) => write!(f, "Failed to download airports: {}", e),
            DirectoryError::CsvError(e) => write!(f, "Failed to read airports: {}", e),
        }
    }
}

impl std::error::Error for DirectoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DirectoryError::RequestError(e) => Some(e),
            DirectoryError::CsvError(e) => Some(e),
        }
    }
}

/// Downloads the airport dataset at `url` and parses it.
///
/// Any transport failure or non-success status is returned as an error,
/// there is no retry.
pub async fn load_airports(
    client: &Client,
    url: &str,
    show_progress: bool,
) -> Result<Vec<Airport>, DirectoryError> {
    // Send a GET request to the URL
    let response: Response = client.get(url).send().await?.error_for_status()?;

    let progress_bar = progress_bar(response.content_length(), show_progress);

    // Start a timer
    let start: Instant = Instant::now();

    // Get the response as a stream of bytes, ticking the bar on every chunk
    let bar = progress_bar.clone();
    let bytes_stream = response
        .bytes_stream()
        .inspect_ok(move |chunk| bar.inc(chunk.len() as u64))
        .map_err(std::io::Error::other);

    // Convert the stream of bytes to an AsyncRead
    let stream_reader = StreamReader::new(bytes_stream);

    let airports = parse_airports(stream_reader).await;
    progress_bar.finish_and_clear();
    let airports = airports?;

    // Stop the timer
    let duration: Duration = start.elapsed();
    debug!("Parsed {} airports in {:?}", airports.len(), duration);

    Ok(airports)
}

fn progress_bar(content_length: Option<u64>, show_progress: bool) -> ProgressBar {
    if !show_progress {
        return ProgressBar::hidden();
    }

    match content_length {
        Some(length) => {
            let bar = ProgressBar::new(length);
            if let Ok(style) = ProgressStyle::with_template(
                "Loading airports [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                bar.set_style(style.progress_chars("=> "));
            }
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Loading airports...");
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        }
    }
}

/// Parses OpenFlights records from `reader`.
///
/// Rows without a usable latitude or longitude are dropped, as are rows
/// the CSV reader cannot decode. Only I/O errors abort the load.
pub async fn parse_airports<R>(reader: R) -> Result<Vec<Airport>, DirectoryError>
where
    R: AsyncRead + Unpin + Send,
{
    // Create a CSV reader, the file has no header row
    let mut csv_reader = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .create_reader(reader);

    let mut records = csv_reader.records();

    // Create a vector to store the airports
    let mut airports: Vec<Airport> = Vec::new();
    let mut skipped: usize = 0;

    // Iterate over the records
    while let Some(record) = records.next().await {
        let record: StringRecord = match record {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable airport record: {}", e);
                skipped += 1;
                continue;
            }
        };

        match Airport::from_record(&record) {
            Some(airport) => airports.push(airport),
            None => {
                trace!("Skipping airport record without coordinates: {:?}", record);
                skipped += 1;
            }
        }
    }

    debug!("Kept {} airports, skipped {} records", airports.len(), skipped);

    // Return the vector
    Ok(airports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    use crate::models::Coordinate;

    const SAMPLE: &str = r#"1,"Goroka Airport","Goroka","Papua New Guinea","GKA","AYGA",-6.081689834590001,145.391998291,5282,10,"U","Pacific/Port_Moresby","airport","OurAirports"
2,"Madang Airport","Madang","Papua New Guinea","MAG","AYMD",-5.20707988739,145.789001465,20,10,"U","Pacific/Port_Moresby","airport","OurAirports"
3,"Broken Row","Nowhere","Atlantis","\N","\N",\N,\N,0,0,"U","\N","airport","OurAirports"
4,"Short Row","Nowhere"
5,"Nadzab Airport","Nadzab","Papua New Guinea","LAE","AYNZ",-6.569803,146.725977,239,10,"U","Pacific/Port_Moresby","airport","OurAirports"
"#;

    #[tokio::test]
    async fn test_parse_airports_keeps_fields() {
        let airports = parse_airports(SAMPLE.as_bytes()).await.unwrap();

        assert_eq!(airports.len(), 3);
        assert_eq!(
            airports[0],
            Airport {
                name: "Goroka Airport".to_string(),
                city: "Goroka".to_string(),
                country: "Papua New Guinea".to_string(),
                location: Coordinate::new(-6.081689834590001, 145.391998291),
            }
        );
        assert_eq!(airports[1].name, "Madang Airport");
        assert_eq!(airports[2].city, "Nadzab");
    }

    #[tokio::test]
    async fn test_parse_airports_skips_malformed_rows() {
        let data = "1,A,B,C,,,north,east\n2,D,E,F,,,1.0\n3,G,H,I,,,,\n";
        let airports = parse_airports(data.as_bytes()).await.unwrap();

        assert!(airports.is_empty());
    }

    #[tokio::test]
    async fn test_parse_airports_skips_invalid_utf8() {
        let data: &[u8] = b"1,\"\xff\xfe\",\"Nowhere\",\"None\",,,1.0,2.0\n\
                            2,\"Good\",\"Goodville\",\"Goodland\",,,3.0,4.0\n";
        let airports = parse_airports(data).await.unwrap();

        assert_eq!(airports.len(), 1);
        assert_eq!(airports[0].name, "Good");
        assert_eq!(airports[0].location, Coordinate::new(3.0, 4.0));
    }

    #[tokio::test]
    async fn test_parse_airports_name_with_comma() {
        let data = r#"7,"Narsarsuaq Airport, South","Narssarssuaq","Greenland","UAK","BGBW",61.1604995728,-45.4259986877,112,-3,"E","America/Godthab","airport","OurAirports""#;
        let airports = parse_airports(data.as_bytes()).await.unwrap();

        assert_eq!(airports.len(), 1);
        assert_eq!(airports[0].name, "Narsarsuaq Airport, South");
        assert_eq!(airports[0].country, "Greenland");
    }

    #[tokio::test]
    async fn test_load_airports() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET).path("/airports.dat");
                then.status(200).body(SAMPLE);
            })
            .await;

        let airports = load_airports(&Client::new(), &server.url("/airports.dat"), false)
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(airports.len(), 3);
    }

    #[tokio::test]
    async fn test_load_airports_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/airports.dat");
                then.status(404);
            })
            .await;

        let result = load_airports(&Client::new(), &server.url("/airports.dat"), false).await;

        assert!(matches!(result, Err(DirectoryError::RequestError(_))));
    }
}
