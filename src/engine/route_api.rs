use super::{Engine, Event};

use uuid::Uuid;

use crate::{entities::GeoPoint, error::Error};

impl Engine {
    pub(super) fn tap(&mut self, point: GeoPoint) {
        match self.state.tap(point) {
            Ok(()) => tracing::info!(
                "destination selected: lat={}, lon={}",
                point.latitude,
                point.longitude
            ),
            Err(_) => tracing::warn!("tap ignored, map is not ready"),
        }
    }

    pub(super) fn compute_route(&mut self) {
        let request = match self.state.begin_route() {
            Ok(request) => request,
            Err(_) => {
                tracing::warn!("route requested without origin and destination");
                return;
            }
        };

        tracing::info!(
            "calculating route from ({}, {}) to ({}, {})",
            request.start.latitude,
            request.start.longitude,
            request.end.latitude,
            request.end.longitude
        );

        let routes = self.routes.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let result = routes.walking_route(request.start, request.end).await;
            let event = Event::RouteResolved {
                token: request.token,
                result,
            };

            if sender.send(event).await.is_err() {
                tracing::debug!("engine stopped before route arrived");
            }
        });
    }

    pub(super) fn route_resolved(&mut self, token: Uuid, result: Result<Vec<GeoPoint>, Error>) {
        match &result {
            Ok(points) if points.is_empty() => {
                tracing::warn!("directions service returned no route points")
            }
            Ok(points) => tracing::info!("route calculated with {} points", points.len()),
            Err(err) => tracing::error!("failed to calculate route: {}", err),
        }

        if !self.state.complete_route(token, result) {
            tracing::info!(%token, "discarding stale route result");
        }
    }

    pub(super) async fn clear(&mut self) {
        self.state.clear();

        if let Err(err) = self.persistence.clear().await {
            tracing::error!("failed to clear saved route: {}", err);
        }
    }
}
