//! Normalized storm records.

use crate::config::Locale;
use crate::errors::SchemaError;
use crate::state::{decode_structured, FieldKind, FieldType, FieldValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storm category derived from the feed's classification code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StormKind {
    /// `HU`
    Hurricane,
    /// `TS`
    TropicalStorm,
    /// `TD`
    TropicalDepression,
    /// `SD`
    TropicalDisturbance,
    /// Any other or missing code.
    Other,
}

impl StormKind {
    /// Maps a classification code. Unknown codes become [`StormKind::Other`].
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("HU") => Self::Hurricane,
            Some("TS") => Self::TropicalStorm,
            Some("TD") => Self::TropicalDepression,
            Some("SD") => Self::TropicalDisturbance,
            _ => Self::Other,
        }
    }

    /// Returns the human-readable label.
    #[must_use]
    pub fn label(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Hurricane, Locale::Portuguese) => "Furacão",
            (Self::Hurricane, Locale::English) => "Hurricane",
            (Self::TropicalStorm, Locale::Portuguese) => "Tempestade Tropical",
            (Self::TropicalStorm, Locale::English) => "Tropical Storm",
            (Self::TropicalDepression, Locale::Portuguese) => "Depressão Tropical",
            (Self::TropicalDepression, Locale::English) => "Tropical Depression",
            (Self::TropicalDisturbance, Locale::Portuguese) => "Distúrbio Tropical",
            (Self::TropicalDisturbance, Locale::English) => "Tropical Disturbance",
            (Self::Other, Locale::Portuguese) => "Outro",
            (Self::Other, Locale::English) => "Other",
        }
    }
}

impl fmt::Display for StormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(Locale::English))
    }
}

/// Raw classification code plus its derived kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Code as reported, e.g. `HU`.
    pub code: Option<String>,
    /// Derived kind.
    pub kind: StormKind,
}

impl Classification {
    /// Classifies a raw code.
    #[must_use]
    pub fn from_code(code: Option<String>) -> Self {
        let kind = StormKind::from_code(code.as_deref());
        Self { code, kind }
    }

    /// Returns the label in `locale`.
    #[must_use]
    pub fn label(&self, locale: Locale) -> &'static str {
        self.kind.label(locale)
    }
}

/// Position of the storm center.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StormLocation {
    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,
    /// Latitude as text, e.g. `25.1N`.
    pub latitude_text: Option<String>,
    /// Longitude as text, e.g. `80.4W`.
    pub longitude_text: Option<String>,
}

/// Direction and speed of motion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormMovement {
    /// Heading in degrees, as reported.
    pub direction_degrees: Option<String>,
    /// Speed in knots, as reported.
    pub speed_knots: Option<String>,
}

/// Product links published for the storm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StormLinks {
    /// Public advisory page.
    pub public_advisory: Option<String>,
    /// Forecast graphics page.
    pub forecast_graphics: Option<String>,
    /// Forecast track KMZ file.
    pub forecast_track_kmz: Option<String>,
    /// Track cone KMZ file.
    pub track_cone_kmz: Option<String>,
    /// Forecast discussion page.
    pub forecast_discussion: Option<String>,
}

/// One active storm.
///
/// Intensity and movement keep the feed's text so prompts quote it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StormRecord {
    /// Feed identifier, e.g. `al052024`.
    pub id: Option<String>,
    /// Storm name.
    pub name: Option<String>,
    /// Classification.
    pub classification: Classification,
    /// Maximum sustained wind in mph.
    pub wind_mph: Option<String>,
    /// Minimum central pressure in mb.
    pub pressure_mb: Option<String>,
    /// Position.
    #[serde(default)]
    pub location: StormLocation,
    /// Motion.
    #[serde(default)]
    pub movement: StormMovement,
    /// Time of the last advisory, as reported.
    pub last_update: Option<String>,
    /// Product links.
    #[serde(default)]
    pub links: StormLinks,
}

impl StormRecord {
    /// Creates a record with only a name and classification code.
    #[must_use]
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            classification: Classification::from_code(Some(code.into())),
            wind_mph: None,
            pressure_mb: None,
            location: StormLocation::default(),
            movement: StormMovement::default(),
            last_update: None,
            links: StormLinks::default(),
        }
    }
}

impl FieldType for Vec<StormRecord> {
    const KIND: FieldKind = FieldKind::Structured;

    fn from_field_value(field: &str, value: FieldValue) -> Result<Self, SchemaError> {
        decode_structured(field, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(StormKind::from_code(Some("HU")), StormKind::Hurricane);
        assert_eq!(StormKind::from_code(Some("TS")), StormKind::TropicalStorm);
        assert_eq!(StormKind::from_code(Some("TD")), StormKind::TropicalDepression);
        assert_eq!(StormKind::from_code(Some("SD")), StormKind::TropicalDisturbance);
    }

    #[test]
    fn test_unknown_code_is_other() {
        assert_eq!(StormKind::from_code(Some("PTC")), StormKind::Other);
        assert_eq!(StormKind::from_code(None), StormKind::Other);
        assert_eq!(
            Classification::from_code(Some("EX".to_string())).label(Locale::Portuguese),
            "Outro"
        );
    }

    #[test]
    fn test_localized_labels() {
        assert_eq!(StormKind::Hurricane.label(Locale::Portuguese), "Furacão");
        assert_eq!(StormKind::Hurricane.label(Locale::English), "Hurricane");
        assert_eq!(StormKind::TropicalStorm.to_string(), "Tropical Storm");
    }

    #[test]
    fn test_structured_field_value() {
        let storms = vec![StormRecord::new("Milton", "HU")];
        let value = FieldValue::Structured(serde_json::to_value(&storms).unwrap());

        let decoded = <Vec<StormRecord>>::from_field_value("storms_data", value).unwrap();
        assert_eq!(decoded, storms);
    }

    #[test]
    fn test_text_value_rejected() {
        let err = <Vec<StormRecord>>::from_field_value("storms_data", FieldValue::from("x"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidValue { .. } | SchemaError::KindMismatch { .. }));
    }
}
