pub mod config;
pub mod db;
pub mod error;
pub mod mapping;
pub mod model;
pub mod normalize;
pub mod notion;
pub mod stats;
pub mod sync;
