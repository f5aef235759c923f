pub mod location;
pub mod openrouteservice;
