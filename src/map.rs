//! Map tile download and terminal rendering.

use std::fmt::Write as _;
use std::path::Path;

use colored::Colorize;
use image::imageops::FilterType;
use image::RgbImage;
use reqwest::Client;
use tracing::debug;

use crate::models::TileCoordinate;

pub const DEFAULT_TILE_SERVER: &str = "https://tile.openstreetmap.org";
pub const DEFAULT_ZOOM: u8 = 14;
pub const DEFAULT_MAP_WIDTH: u32 = 18;

#[derive(Debug)]
pub enum MapError {
    DownloadError(reqwest::Error),
    WriteError(std::io::Error),
    ReadError(std::io::Error),
    ImageDecodeError(image::ImageError),
}

impl From<reqwest::Error> for MapError {
    fn from(error: reqwest::Error) -> Self {
        MapError::DownloadError(error)
    }
}

impl From<std::io::Error> for MapError {
    fn from(error: std::io::Error) -> Self {
        MapError::WriteError(error)
    }
}

impl From<image::ImageError> for MapError {
    fn from(error: image::ImageError) -> Self {
        MapError::ImageDecodeError(error)
    }
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MapError::DownloadError(e) => write!(f, "Failed to download map tile: {}", e),
            MapError::WriteError(e) => write!(f, "Failed to save map tile: {}", e),
            MapError::ReadError(e) => write!(f, "Failed to read map tile: {}", e),
            MapError::ImageDecodeError(e) => write!(f, "Failed to decode map tile: {}", e),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::DownloadError(e) => Some(e),
            MapError::WriteError(e) => Some(e),
            MapError::ReadError(e) => Some(e),
            MapError::ImageDecodeError(e) => Some(e),
        }
    }
}

pub fn tile_url(server: &str, tile: &TileCoordinate) -> String {
    format!(
        "{}/{}/{}/{}.png",
        server.trim_end_matches('/'),
        tile.zoom,
        tile.x,
        tile.y
    )
}

/// Fetches `url` and writes the body to `path`, replacing any previous file.
pub async fn download_tile(client: &Client, url: &str, path: &Path) -> Result<(), MapError> {
    let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;
    debug!("Got {} bytes of map tile from {}", bytes.len(), url);

    tokio::fs::write(path, &bytes).await?;

    Ok(())
}

/// Loads the image at `path` and renders it `width` characters wide.
///
/// The format is sniffed from the file content, whatever the file is named.
///
/// Each line packs two pixel rows into an upper half block, the top pixel
/// as foreground color and the bottom one as background.
pub fn render_tile(path: &Path, width: u32) -> Result<String, MapError> {
    let bytes = std::fs::read(path).map_err(MapError::ReadError)?;
    let image = image::load_from_memory(&bytes)?.to_rgb8();
    Ok(render_image(&image, width))
}

fn render_image(image: &RgbImage, width: u32) -> String {
    let width = width.max(1);
    let (source_width, source_height) = image.dimensions();
    if source_width == 0 || source_height == 0 {
        return String::new();
    }

    // Keep the aspect ratio, rounded up to a whole terminal line
    let height = ((source_height as u64 * width as u64) / source_width as u64).max(1) as u32;
    let height = height + height % 2;

    let scaled = image::imageops::resize(image, width, height, FilterType::Triangle);

    let mut canvas = String::new();
    for row in (0..height).step_by(2) {
        for column in 0..width {
            let top = scaled.get_pixel(column, row);
            let bottom = scaled.get_pixel(column, row + 1);
            let cell = "▀"
                .truecolor(top[0], top[1], top[2])
                .on_truecolor(bottom[0], bottom[1], bottom[2]);
            let _ = write!(canvas, "{}", cell);
        }
        canvas.push('\n');
    }

    canvas
}
