//! National Hurricane Center active storms feed.

use super::record::{Classification, StormLinks, StormLocation, StormMovement, StormRecord};
use crate::config::SourceSettings;
use crate::errors::UpstreamError;
use crate::providers::http;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const SERVICE: &str = "nhc-storm-feed";

/// Supplies the current list of active storms.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StormSource: Send + Sync {
    /// Returns every active storm. An empty list is a valid answer.
    async fn active_storms(&self) -> Result<Vec<StormRecord>, UpstreamError>;
}

/// A scalar that may arrive as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> Option<String> {
        let text = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLink {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    kmz_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStorm {
    #[serde(default)]
    id: Option<Scalar>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    classification: Option<String>,
    #[serde(default)]
    intensity: Option<Scalar>,
    #[serde(default)]
    pressure: Option<Scalar>,
    #[serde(default)]
    latitude: Option<String>,
    #[serde(default)]
    longitude: Option<String>,
    #[serde(default)]
    latitude_numeric: Option<Scalar>,
    #[serde(default)]
    longitude_numeric: Option<Scalar>,
    #[serde(default)]
    movement_dir: Option<Scalar>,
    #[serde(default)]
    movement_speed: Option<Scalar>,
    #[serde(default)]
    last_update: Option<String>,
    #[serde(default)]
    public_advisory: Option<RawLink>,
    #[serde(default)]
    forecast_graphics: Option<RawLink>,
    #[serde(default)]
    forecast_track: Option<RawLink>,
    #[serde(default)]
    track_cone: Option<RawLink>,
    #[serde(default)]
    forecast_discussion: Option<RawLink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeed {
    #[serde(default)]
    active_storms: Option<Vec<RawStorm>>,
}

fn link_url(link: Option<RawLink>) -> Option<String> {
    link.and_then(|l| l.url)
}

fn link_kmz(link: Option<RawLink>) -> Option<String> {
    link.and_then(|l| l.kmz_file)
}

impl From<RawStorm> for StormRecord {
    fn from(raw: RawStorm) -> Self {
        Self {
            id: raw.id.and_then(Scalar::into_text),
            name: raw.name,
            classification: Classification::from_code(raw.classification),
            wind_mph: raw.intensity.and_then(Scalar::into_text),
            pressure_mb: raw.pressure.and_then(Scalar::into_text),
            location: StormLocation {
                latitude: raw.latitude_numeric.as_ref().and_then(Scalar::to_f64),
                longitude: raw.longitude_numeric.as_ref().and_then(Scalar::to_f64),
                latitude_text: raw.latitude,
                longitude_text: raw.longitude,
            },
            movement: StormMovement {
                direction_degrees: raw.movement_dir.and_then(Scalar::into_text),
                speed_knots: raw.movement_speed.and_then(Scalar::into_text),
            },
            last_update: raw.last_update,
            links: StormLinks {
                public_advisory: link_url(raw.public_advisory),
                forecast_graphics: link_url(raw.forecast_graphics),
                forecast_track_kmz: link_kmz(raw.forecast_track),
                track_cone_kmz: link_kmz(raw.track_cone),
                forecast_discussion: link_url(raw.forecast_discussion),
            },
        }
    }
}

/// Parses a feed document into storm records.
///
/// # Errors
///
/// Fails only if the body is not JSON of the expected shape; absent fields
/// are tolerated.
pub fn parse_feed(body: &str) -> Result<Vec<StormRecord>, UpstreamError> {
    let feed: RawFeed =
        serde_json::from_str(body).map_err(|e| UpstreamError::decode(SERVICE, e.to_string()))?;
    Ok(feed
        .active_storms
        .unwrap_or_default()
        .into_iter()
        .map(StormRecord::from)
        .collect())
}

/// Reads `CurrentStorms.json`.
#[derive(Debug, Clone)]
pub struct NhcStormFeed {
    client: reqwest::Client,
    url: String,
}

impl NhcStormFeed {
    /// Creates a feed client from settings.
    #[must_use]
    pub fn new(settings: &SourceSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            url: settings.storm_feed_url.clone(),
        }
    }
}

#[async_trait]
impl StormSource for NhcStormFeed {
    async fn active_storms(&self) -> Result<Vec<StormRecord>, UpstreamError> {
        let response = http::send(SERVICE, self.client.get(&self.url)).await?;
        let body = http::read_text(SERVICE, response).await?;
        let storms = parse_feed(&body)?;
        debug!(count = storms.len(), "Fetched active storms");
        Ok(storms)
    }
}
