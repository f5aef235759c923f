use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    api::LocationAPI,
    entities::GeoPoint,
    error::{location_error, Error},
};

/// Location source whose fix is supplied by hand, e.g. from configuration
/// or a terminal command. Reports an error once it has been marked
/// unavailable.
#[derive(Debug, Default)]
pub struct ManualLocation {
    fix: Mutex<Fix>,
}

#[derive(Debug, Default)]
enum Fix {
    #[default]
    Unknown,
    Known(GeoPoint),
    Unavailable(String),
}

impl ManualLocation {
    pub fn new(fix: Option<GeoPoint>) -> Self {
        let fix = match fix {
            Some(point) => Fix::Known(point),
            None => Fix::Unknown,
        };

        Self {
            fix: Mutex::new(fix),
        }
    }

    pub async fn set(&self, point: GeoPoint) {
        *self.fix.lock().await = Fix::Known(point);
    }

    pub async fn fail(&self, reason: impl Into<String>) {
        *self.fix.lock().await = Fix::Unavailable(reason.into());
    }
}

#[async_trait]
impl LocationAPI for ManualLocation {
    async fn last_location(&self) -> Result<Option<GeoPoint>, Error> {
        match &*self.fix.lock().await {
            Fix::Unknown => Ok(None),
            Fix::Known(point) => Ok(Some(*point)),
            Fix::Unavailable(reason) => Err(location_error(reason.clone())),
        }
    }
}

#[tokio::test]
async fn reports_the_latest_fix() {
    let location = ManualLocation::new(None);
    assert_eq!(location.last_location().await.unwrap(), None);

    let here = GeoPoint::new_unchecked(40.0, -3.0);
    location.set(here).await;
    assert_eq!(location.last_location().await.unwrap(), Some(here));

    location.fail("gps off").await;
    let err = location.last_location().await.unwrap_err();
    assert_eq!(err.kind(), crate::error::ErrorKind::Location);
}
