use async_trait::async_trait;
use std::sync::Arc;

use crate::entities::GeoPoint;
use crate::error::Error;

#[async_trait]
pub trait RouteAPI {
    /// Ordered walking path from `start` to `end`. An empty path means the
    /// service found no route.
    async fn walking_route(&self, start: GeoPoint, end: GeoPoint) -> Result<Vec<GeoPoint>, Error>;
}

#[async_trait]
pub trait LocationAPI {
    /// Last known device position, `None` when no fix is available yet.
    async fn last_location(&self) -> Result<Option<GeoPoint>, Error>;
}

pub type DynRouteAPI = Arc<dyn RouteAPI + Send + Sync>;
pub type DynLocationAPI = Arc<dyn LocationAPI + Send + Sync>;

/// Route lookup that never fails: errors are logged and reported as an empty
/// path.
#[tracing::instrument(skip(api))]
pub async fn fetch_walking_route(
    api: &(dyn RouteAPI + Send + Sync),
    start: GeoPoint,
    end: GeoPoint,
) -> Vec<GeoPoint> {
    match api.walking_route(start, end).await {
        Ok(points) => {
            if points.is_empty() {
                tracing::warn!("directions service returned no route points");
            } else {
                tracing::info!("route calculated with {} points", points.len());
            }
            points
        }
        Err(err) => {
            tracing::error!("failed to calculate route: {}", err);
            vec![]
        }
    }
}
