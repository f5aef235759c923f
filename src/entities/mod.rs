mod app_state;
mod geo_point;
mod route_state;

pub use app_state::{AppState, RouteRequest, Status};
pub use geo_point::GeoPoint;
pub use route_state::RouteState;
