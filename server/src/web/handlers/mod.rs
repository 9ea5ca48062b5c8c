// storefront_server/src/web/handlers/mod.rs

pub mod auth_handlers;
pub mod catalog_handlers;
pub mod graphql_handlers;
pub mod order_handlers;
pub mod product_handlers;
