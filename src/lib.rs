pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod external;
pub mod map;
pub mod persistence;
