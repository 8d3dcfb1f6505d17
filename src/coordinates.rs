//! GPS text normalization.
//!
//! Accepts the three notations dispatchers paste in practice and turns them
//! into a validated [`Coordinate`]:
//!
//! - decimal degrees: `40.7128, -74.0060`
//! - cardinal directions: `40.7128 N, 74.0060 W`
//! - degrees/minutes/seconds: `40°42'46.3"N, 74°00'21.6"W`

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::{Coordinate, is_valid_latitude, is_valid_longitude};

static DECIMAL_DEGREES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+\.?\d*)\s*,\s*(-?\d+\.?\d*)$").expect("decimal pattern is valid")
});

static CARDINAL_DEGREES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+\.?\d*)\s*([NS]),?\s*(\d+\.?\d*)\s*([EW])$")
        .expect("cardinal pattern is valid")
});

static DMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^(\d+)°(\d+)'?(\d*\.?\d*)"?\s*([NS]),?\s*(\d+)°(\d+)'?(\d*\.?\d*)"?\s*([EW])$"#,
    )
    .expect("DMS pattern is valid")
});

/// Parses coordinate text, trying decimal, cardinal and DMS notation in that order.
///
/// A notation that matches but yields an out-of-range position counts as no
/// match. `None` means the position cannot be displayed; it is not an error.
pub fn parse_coordinates(text: &str) -> Option<Coordinate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    parse_decimal_degrees(text)
        .or_else(|| parse_cardinal_degrees(text))
        .or_else(|| parse_dms(text))
}

/// Renders a position with six decimals, or `"Invalid coordinates"`.
pub fn format_coordinates(lat: f64, lng: f64) -> String {
    if !is_valid_latitude(lat) || !is_valid_longitude(lng) {
        return "Invalid coordinates".to_string();
    }
    // +0.0 folds negative zero so it renders without a sign
    format!("{:.6}, {:.6}", lat + 0.0, lng + 0.0)
}

fn parse_decimal_degrees(text: &str) -> Option<Coordinate> {
    let caps = DECIMAL_DEGREES.captures(text)?;
    let lat = caps[1].parse::<f64>().ok()?;
    let lng = caps[2].parse::<f64>().ok()?;
    Coordinate::new(lat, lng)
}

fn parse_cardinal_degrees(text: &str) -> Option<Coordinate> {
    let caps = CARDINAL_DEGREES.captures(text)?;
    let lat = caps[1].parse::<f64>().ok()?;
    let lng = caps[3].parse::<f64>().ok()?;
    Coordinate::new(signed(lat, &caps[2]), signed(lng, &caps[4]))
}

fn parse_dms(text: &str) -> Option<Coordinate> {
    let caps = DMS.captures(text)?;
    let lat = dms_to_decimal(&caps, 1)?;
    let lng = dms_to_decimal(&caps, 5)?;
    Coordinate::new(signed(lat, &caps[4]), signed(lng, &caps[8]))
}

/// Reads degrees, minutes and seconds starting at capture group `first`.
fn dms_to_decimal(caps: &Captures<'_>, first: usize) -> Option<f64> {
    let degrees = caps[first].parse::<u32>().ok()?;
    let minutes = caps[first + 1].parse::<u32>().ok()?;
    let seconds = caps
        .get(first + 2)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);
    Some(f64::from(degrees) + f64::from(minutes) / 60.0 + seconds / 3600.0)
}

fn signed(magnitude: f64, direction: &str) -> f64 {
    if direction.eq_ignore_ascii_case("S") || direction.eq_ignore_ascii_case("W") {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Coordinate, lat: f64, lng: f64) {
        assert!(
            (actual.latitude - lat).abs() < 1e-4 && (actual.longitude - lng).abs() < 1e-4,
            "expected ({lat}, {lng}), got {actual:?}"
        );
    }

    #[test]
    fn test_decimal_degrees() {
        let coord = parse_coordinates("40.7128, -74.0060").expect("decimal should parse");
        assert_eq!(coord.latitude, 40.7128);
        assert_eq!(coord.longitude, -74.006);

        let coord = parse_coordinates("  -33.8688,151.2093 ").expect("untrimmed should parse");
        assert_close(coord, -33.8688, 151.2093);
    }

    #[test]
    fn test_cardinal_directions() {
        let coord = parse_coordinates("40.7128 N, 74.0060 W").expect("cardinal should parse");
        assert_eq!(coord.latitude, 40.7128);
        assert_eq!(coord.longitude, -74.006);

        let coord = parse_coordinates("33.8688s 151.2093e").expect("lowercase should parse");
        assert_close(coord, -33.8688, 151.2093);
    }

    #[test]
    fn test_dms() {
        let coord =
            parse_coordinates("40°42'46.3\"N, 74°00'21.6\"W").expect("DMS should parse");
        assert_close(coord, 40.71286, -74.006);
    }

    #[test]
    fn test_dms_without_seconds() {
        let coord = parse_coordinates("51°30'N 0°7'W").expect("DMS without seconds");
        assert_close(coord, 51.5, -0.116_667);
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        assert!(parse_coordinates("200, 50").is_none());
        assert!(parse_coordinates("45, 181").is_none());
        assert!(parse_coordinates("91 N, 10 E").is_none());
    }

    #[test]
    fn test_unrecognized_text() {
        assert!(parse_coordinates("not coordinates").is_none());
        assert!(parse_coordinates("").is_none());
        assert!(parse_coordinates("40.7128").is_none());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_coordinates(40.7128, -74.006), "40.712800, -74.006000");
        assert_eq!(format_coordinates(999.0, 0.0), "Invalid coordinates");
        assert_eq!(format_coordinates(0.0, f64::NAN), "Invalid coordinates");
        assert_eq!(format_coordinates(-0.0, 0.0), "0.000000, 0.000000");
    }
}
