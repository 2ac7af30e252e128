//! Core data types for the aircraft feed.

use serde::{Deserialize, Deserializer};

/// One provider-reported aircraft state.
///
/// Every field is optional: the provider omits whatever it has not observed,
/// and absence is a valid state rather than an error. Values are kept as the
/// provider's textual rendering because the downstream wire format emits them
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AircraftRecord {
    /// Provider-assigned numeric identifier for this aircraft session.
    #[serde(default, rename = "Id", deserialize_with = "scalar_opt")]
    pub id: Option<String>,
    /// ICAO 24-bit address, hex encoded.
    #[serde(default, rename = "Icao", deserialize_with = "scalar_opt")]
    pub hex_ident: Option<String>,
    #[serde(default, rename = "Call", deserialize_with = "scalar_opt")]
    pub callsign: Option<String>,
    /// Altitude in feet.
    #[serde(default, rename = "Alt", deserialize_with = "scalar_opt")]
    pub altitude: Option<String>,
    /// Ground speed in knots.
    #[serde(default, rename = "Spd", deserialize_with = "scalar_opt")]
    pub ground_speed: Option<String>,
    /// Track angle in degrees.
    #[serde(default, rename = "Trak", deserialize_with = "scalar_opt")]
    pub track: Option<String>,
    #[serde(default, rename = "Lat", deserialize_with = "scalar_opt")]
    pub latitude: Option<String>,
    #[serde(default, rename = "Long", deserialize_with = "scalar_opt")]
    pub longitude: Option<String>,
    /// Vertical rate in feet per minute.
    #[serde(default, rename = "Vsi", deserialize_with = "scalar_opt")]
    pub vertical_rate: Option<String>,
    #[serde(default, rename = "Sqk", deserialize_with = "scalar_opt")]
    pub squawk: Option<String>,
    /// Registration mark (tail number).
    #[serde(default, rename = "Reg", deserialize_with = "scalar_opt")]
    pub registration: Option<String>,
    /// ICAO airframe type designator.
    #[serde(default, rename = "Type", deserialize_with = "scalar_opt")]
    pub airframe_type: Option<String>,
    #[serde(default, rename = "Mdl", deserialize_with = "scalar_opt")]
    pub model: Option<String>,
    #[serde(default, rename = "Year", deserialize_with = "scalar_opt")]
    pub year: Option<String>,
}

impl AircraftRecord {
    pub fn hex(&self) -> &str {
        self.hex_ident.as_deref().unwrap_or("")
    }

    pub fn reg(&self) -> &str {
        self.registration.as_deref().unwrap_or("")
    }

    pub fn airframe(&self) -> &str {
        self.airframe_type.as_deref().unwrap_or("")
    }
}

/// Top-level feed payload: a snapshot of aircraft currently in view.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AircraftList {
    #[serde(default, rename = "acList")]
    pub ac_list: Vec<AircraftRecord>,
}

/// Deserialize a scalar of any JSON type into its textual rendering.
///
/// Provider deployments disagree about scalar types (altitude may arrive as
/// `3500` or `"3500"`), so accept both and keep the text.
fn scalar_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Flag(bool),
    }

    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Scalar::Text(s) => s,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(x) => x.to_string(),
        Scalar::Flag(b) => b.to_string(),
    }))
}
