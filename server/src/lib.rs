// storefront_server/src/lib.rs

//! HTTP and GraphQL front end for the storefront: configuration, Postgres
//! storage, authentication and the process wiring used by the binary.

pub mod app;
pub mod config;
pub mod db;
pub mod errors;
pub mod graphql;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod web;
