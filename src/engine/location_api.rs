use super::{Engine, Event};

use crate::{entities::GeoPoint, error::Error};

impl Engine {
    pub(super) fn grant_permission(&mut self) {
        match self.state.grant_permission() {
            Ok(()) => {
                tracing::info!("location permission granted");
                self.spawn_location_lookup();
            }
            Err(_) => tracing::warn!("permission already granted"),
        }
    }

    pub(super) fn deny_permission(&mut self) {
        match self.state.deny_permission() {
            Ok(()) => tracing::info!("location permission denied"),
            Err(_) => tracing::warn!("permission denial ignored, already granted"),
        }
    }

    pub(super) fn request_location(&mut self) {
        if !self.state.can_request_location() {
            tracing::warn!("cannot request location without permission");
            return;
        }

        self.spawn_location_lookup();
    }

    pub(super) fn location_resolved(&mut self, result: Result<Option<GeoPoint>, Error>) {
        match result {
            Ok(Some(location)) => match self.state.set_location(location) {
                Ok(()) => tracing::info!(
                    "current location updated: lat={}, lon={}",
                    location.latitude,
                    location.longitude
                ),
                Err(_) => tracing::warn!("location arrived without permission, ignored"),
            },
            Ok(None) => tracing::warn!("no location fix available"),
            Err(err) => tracing::error!("failed to obtain location: {}", err),
        }
    }

    pub(super) fn spawn_location_lookup(&self) {
        let locations = self.locations.clone();
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let result = locations.last_location().await;

            if sender.send(Event::LocationResolved(result)).await.is_err() {
                tracing::debug!("engine stopped before location arrived");
            }
        });
    }
}
