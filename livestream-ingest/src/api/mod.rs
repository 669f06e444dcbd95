//! HTTP control surface for livestream-ingest

pub mod health;
pub mod mirror;
pub mod participants;
pub mod results;
pub mod watch;

pub use health::health_routes;
pub use mirror::mirror_routes;
pub use participants::participant_routes;
pub use results::result_routes;
pub use watch::watch_routes;
