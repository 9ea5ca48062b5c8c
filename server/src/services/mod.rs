// storefront_server/src/services/mod.rs

pub mod auth_service;
