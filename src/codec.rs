//! Compact string form of points used by the preference store.
//!
//! A point is written `"<lat>,<lon>"` and a path joins points with `|`.
//! Decoding never fails loudly: malformed input yields `None`, and a bad
//! segment inside a path is dropped.

use crate::entities::GeoPoint;

const POINT_SEPARATOR: char = ',';
const LIST_SEPARATOR: &str = "|";

pub fn encode(point: &GeoPoint) -> String {
    format!("{}{}{}", point.latitude, POINT_SEPARATOR, point.longitude)
}

pub fn decode(value: &str) -> Option<GeoPoint> {
    let mut parts = value.split(POINT_SEPARATOR);

    let latitude: f64 = parts.next()?.trim().parse().ok()?;
    let longitude: f64 = parts.next()?.trim().parse().ok()?;

    if parts.next().is_some() {
        return None;
    }

    GeoPoint::new(latitude, longitude).ok()
}

pub fn encode_list(points: &[GeoPoint]) -> String {
    points
        .iter()
        .map(encode)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

pub fn decode_list(value: Option<&str>) -> Option<Vec<GeoPoint>> {
    let value = value?;

    Some(value.split(LIST_SEPARATOR).filter_map(decode).collect())
}

#[test]
fn point_format() {
    assert_eq!(encode(&GeoPoint::new_unchecked(40.0, -3.5)), "40,-3.5");
    assert_eq!(
        decode("40.4168,-3.7038"),
        Some(GeoPoint::new_unchecked(40.4168, -3.7038))
    );
    assert_eq!(decode(" 1.5 , 2 "), Some(GeoPoint::new_unchecked(1.5, 2.0)));
}

#[test]
fn malformed_points_decode_to_none() {
    assert_eq!(decode("abc"), None);
    assert_eq!(decode(""), None);
    assert_eq!(decode("1"), None);
    assert_eq!(decode("1,2,3"), None);
    assert_eq!(decode("1,x"), None);
    assert_eq!(decode("95,0"), None);
    assert_eq!(decode("NaN,0"), None);
}

#[test]
fn bad_segments_are_dropped() {
    assert_eq!(
        decode_list(Some("1,2|bad|3,4")),
        Some(vec![
            GeoPoint::new_unchecked(1.0, 2.0),
            GeoPoint::new_unchecked(3.0, 4.0)
        ])
    );
    assert_eq!(decode_list(Some("")), Some(vec![]));
    assert_eq!(decode_list(None), None);
}

#[test]
fn lists_survive_a_round_trip() {
    let path = vec![
        GeoPoint::new_unchecked(40.0, -3.0),
        GeoPoint::new_unchecked(40.000123456789, -3.000987654321),
        GeoPoint::new_unchecked(-89.99999, 179.99999),
        GeoPoint::new_unchecked(0.1 + 0.2, -0.0),
    ];

    let encoded = encode_list(&path);
    assert_eq!(encoded.matches('|').count(), 3);
    assert_eq!(decode_list(Some(&encoded)), Some(path));
    assert_eq!(encode_list(&[]), "");
}
