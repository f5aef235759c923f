use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    api::RouteAPI,
    config::Config,
    entities::GeoPoint,
    error::{invalid_input_error, upstream_error, Error},
};

const WALKING_DIRECTIONS_PATH: &str = "v2/directions/foot-walking";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Geometry {
    /// `[lon, lat]` pairs, optionally followed by an elevation.
    #[serde(default)]
    pub coordinates: Vec<Vec<f64>>,
}

impl RouteResponse {
    /// Points of the first feature, in `(lat, lon)` order.
    pub fn into_points(self) -> Vec<GeoPoint> {
        let feature = match self.features.into_iter().next() {
            Some(feature) => feature,
            None => return vec![],
        };

        feature
            .geometry
            .coordinates
            .iter()
            .filter_map(|pair| match pair.as_slice() {
                [lon, lat, ..] => GeoPoint::new(*lat, *lon).ok(),
                _ => None,
            })
            .collect()
    }
}

pub fn parse_route_response(body: &str) -> Result<Vec<GeoPoint>, Error> {
    let data: RouteResponse = serde_json::from_str(body)?;

    Ok(data.into_points())
}

/// The service takes coordinates longitude first.
pub fn lon_lat(point: &GeoPoint) -> String {
    format!("{},{}", point.longitude, point.latitude)
}

#[derive(Clone)]
pub struct OpenRouteService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenRouteService {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_base, api_key)
    }

    pub fn with_client(
        client: reqwest::Client,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_base.clone(), config.api_key.clone())
    }

    fn walking_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            WALKING_DIRECTIONS_PATH
        )
    }
}

impl fmt::Debug for OpenRouteService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouteService")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RouteAPI for OpenRouteService {
    #[tracing::instrument(skip(self))]
    async fn walking_route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, Error> {
        let res = self
            .client
            .get(self.walking_url())
            .query(&[("api_key", self.api_key.as_str())])
            .query(&[("start", lon_lat(&start))])
            .query(&[("end", lon_lat(&end))])
            .send()
            .await?;

        let status_code = res.status().as_u16();

        if (400..500).contains(&status_code) {
            tracing::warn!("directions service rejected the request: {}", status_code);
            return Err(invalid_input_error());
        } else if !res.status().is_success() {
            return Err(upstream_error(status_code));
        }

        let body = res.text().await?;

        parse_route_response(&body)
    }
}

#[test]
fn first_feature_is_swapped_to_lat_lon() {
    let body = r#"{
        "features": [
            { "geometry": { "coordinates": [[10.0, 50.0], [10.1, 50.1]] } },
            { "geometry": { "coordinates": [[0.0, 0.0]] } }
        ]
    }"#;

    assert_eq!(
        parse_route_response(body).unwrap(),
        vec![
            GeoPoint::new_unchecked(50.0, 10.0),
            GeoPoint::new_unchecked(50.1, 10.1)
        ]
    );
}

#[test]
fn no_features_is_an_empty_route() {
    assert_eq!(parse_route_response(r#"{"features": []}"#).unwrap(), vec![]);
    assert_eq!(parse_route_response(r#"{"type": "FeatureCollection"}"#).unwrap(), vec![]);
    assert_eq!(
        parse_route_response(r#"{"features": [{"geometry": {"coordinates": []}}]}"#).unwrap(),
        vec![]
    );
}

#[test]
fn short_pairs_are_skipped_and_elevation_ignored() {
    let body = r#"{"features": [{"geometry": {"coordinates": [[-3.0, 40.0, 650.2], [1.0], [-3.01, 40.01]]}}]}"#;

    assert_eq!(
        parse_route_response(body).unwrap(),
        vec![
            GeoPoint::new_unchecked(40.0, -3.0),
            GeoPoint::new_unchecked(40.01, -3.01)
        ]
    );
}

#[test]
fn malformed_body_is_a_parse_error() {
    use crate::error::ErrorKind;

    let err = parse_route_response("<html>502</html>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn request_coordinates_are_lon_first() {
    assert_eq!(lon_lat(&GeoPoint::new_unchecked(40.0, -3.5)), "-3.5,40");

    let service = OpenRouteService::new("https://api.openrouteservice.org/", "secret-key");
    assert_eq!(
        service.walking_url(),
        "https://api.openrouteservice.org/v2/directions/foot-walking"
    );
    assert!(!format!("{:?}", service).contains("secret-key"));
}
