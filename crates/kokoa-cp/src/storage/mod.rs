//! SQLite storage for the Kokoa control plane.
//!
//! The store is the only writer of origins, routes and edge nodes. Writes go
//! through a single-writer lock; reads use the pool directly.

mod db;
mod models;
mod queries;


pub use db::ControlPlaneDatabase;
pub use kokoa_core::db::DatabaseError;
pub use kokoa_core::proxy_map::RouteWithOrigin;
pub use models::*;
