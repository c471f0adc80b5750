// src/core/ovsdb/mod.rs

//! The switch-database side of the server: typed rows mirroring the OVSDB
//! schema subset OF-CONFIG governs, the client replica, the transaction
//! layer, and the read-only renderers.

pub mod client;
pub mod render;
pub mod schema;
pub mod txn;

pub use client::OvsdbClient;
pub use schema::DbState;
pub use txn::Txn;
