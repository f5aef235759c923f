use std::env;

use crate::codec;
use crate::entities::GeoPoint;
use crate::error::{config_error, Error};

pub const DEFAULT_API_BASE: &str = "https://api.openrouteservice.org";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://palaksa.db?mode=rwc";
pub const DEFAULT_NAMESPACE: &str = "PalaksaPrefs";

#[derive(Clone, PartialEq)]
pub struct Config {
    pub api_base: String,
    pub api_key: String,
    pub database_url: String,
    pub namespace: String,
    pub location: Option<GeoPoint>,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENROUTESERVICE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| config_error("OPENROUTESERVICE_API_KEY is not set"))?;

        let location = match lookup("PALAKSA_LOCATION") {
            Some(value) => Some(
                codec::decode(&value)
                    .ok_or_else(|| config_error(format!("invalid PALAKSA_LOCATION: {}", value)))?,
            ),
            None => None,
        };

        Ok(Self {
            api_base: lookup("OPENROUTESERVICE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            api_key,
            database_url: lookup("PALAKSA_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            namespace: lookup("PALAKSA_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.into()),
            location,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base", &self.api_base)
            .field("database_url", &self.database_url)
            .field("namespace", &self.namespace)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
fn lookup_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }
}

#[test]
fn defaults_apply_when_only_the_key_is_set() {
    let config = Config::from_lookup(lookup_from(&[("OPENROUTESERVICE_API_KEY", "abc")])).unwrap();

    assert_eq!(config.api_key, "abc");
    assert_eq!(config.api_base, DEFAULT_API_BASE);
    assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    assert_eq!(config.location, None);
}

#[test]
fn missing_key_is_a_config_error() {
    use crate::error::ErrorKind;

    let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let err = Config::from_lookup(lookup_from(&[("OPENROUTESERVICE_API_KEY", "  ")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn location_is_parsed_lat_first() {
    let config = Config::from_lookup(lookup_from(&[
        ("OPENROUTESERVICE_API_KEY", "abc"),
        ("PALAKSA_LOCATION", "40.4168,-3.7038"),
        ("PALAKSA_NAMESPACE", "test"),
    ]))
    .unwrap();

    assert_eq!(config.location, Some(GeoPoint::new_unchecked(40.4168, -3.7038)));
    assert_eq!(config.namespace, "test");

    assert!(Config::from_lookup(lookup_from(&[
        ("OPENROUTESERVICE_API_KEY", "abc"),
        ("PALAKSA_LOCATION", "here"),
    ]))
    .is_err());
}
