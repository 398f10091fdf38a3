//! HTTP API handlers for ddb-api

pub mod contributions;
pub mod discourse_parts;
pub mod discourses;
pub mod health;
pub mod users;

pub use contributions::contribution_routes;
pub use discourse_parts::discourse_part_routes;
pub use discourses::discourse_routes;
pub use health::health_routes;
pub use users::user_routes;
