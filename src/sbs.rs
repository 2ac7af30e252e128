//! SBS BaseStation wire format.
//!
//! The downstream consumer expects the BaseStation socket format: one ASCII
//! line per update, comma-separated, newline-terminated. A transmission line
//! has 22 fields:
//!
//! ```text
//! MSG,3,SessionID,AircraftID,HexIdent,FlightID,DateGen,TimeGen,DateLog,TimeLog,
//! Callsign,Altitude,GroundSpeed,Track,Latitude,Longitude,VerticalRate,Squawk,
//! Alert,Emergency,SPI,IsOnGround
//! ```
//!
//! The feed carries no message timestamps, so the four date/time fields are
//! always empty, and the four trailing status flags are always `0`. Field
//! count and positions are fixed; a value the feed did not report renders as
//! an empty string in its slot.

use crate::types::AircraftRecord;

/// Fields per line, `MSG` included.
pub const FIELD_COUNT: usize = 22;

/// Transmission message subtype: airborne position.
const TRANSMISSION_TYPE: u32 = 3;

/// Convert one aircraft record into one BaseStation line.
///
/// Total over all inputs: missing fields become empty strings, never errors.
/// The output is byte-exact wire contract; do not reorder or reformat.
pub fn convert(record: &AircraftRecord) -> String {
    let id = text(&record.id);
    format!(
        "MSG,{msg_type},{id},{id},{hex},{id},,,,,{call},{alt},{gs},{trk},{lat},{lon},{vr},{squawk},0,0,0,0\n",
        msg_type = TRANSMISSION_TYPE,
        id = id,
        hex = text(&record.hex_ident),
        call = text(&record.callsign),
        alt = text(&record.altitude),
        gs = text(&record.ground_speed),
        trk = text(&record.track),
        lat = text(&record.latitude),
        lon = text(&record.longitude),
        vr = text(&record.vertical_rate),
        squawk = text(&record.squawk),
    )
}

fn text(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AircraftRecord {
        AircraftRecord {
            id: Some("7".to_string()),
            hex_ident: Some("A1B2C3".to_string()),
            callsign: Some("NZ123".to_string()),
            altitude: Some("3500".to_string()),
            ground_speed: Some("210".to_string()),
            track: Some("090".to_string()),
            latitude: Some("-41.62".to_string()),
            longitude: Some("173.85".to_string()),
            vertical_rate: Some("0".to_string()),
            squawk: Some("4532".to_string()),
            registration: Some("ZK-XYZ".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_convert_full_record() {
        let line = convert(&sample_record());
        assert_eq!(
            line,
            "MSG,3,7,7,A1B2C3,7,,,,,NZ123,3500,210,090,-41.62,173.85,0,4532,0,0,0,0\n"
        );
    }

    #[test]
    fn test_convert_empty_record() {
        let line = convert(&AircraftRecord::default());
        assert_eq!(line, "MSG,3,,,,,,,,,,,,,,,,,0,0,0,0\n");
    }

    #[test]
    fn test_field_count_is_fixed() {
        for record in [AircraftRecord::default(), sample_record()] {
            let line = convert(&record);
            assert!(line.ends_with('\n'));
            let body = line.trim_end_matches('\n');
            assert!(!body.contains('\n'));
            assert_eq!(body.split(',').count(), FIELD_COUNT);
        }
    }

    #[test]
    fn test_partial_record_keeps_positions() {
        let record = AircraftRecord {
            hex_ident: Some("C81D50".to_string()),
            squawk: Some("1200".to_string()),
            ..Default::default()
        };
        let line = convert(&record);
        let fields: Vec<&str> = line.trim_end_matches('\n').split(',').collect();
        assert_eq!(fields[4], "C81D50");
        assert_eq!(fields[17], "1200");
        assert_eq!(fields[10], "");
        assert_eq!(fields[21], "0");
    }
}
