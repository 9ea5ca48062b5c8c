// storefront_core/src/models/mod.rs

//! Records of the data layer and the views built over them.
//!
//! These are plain structs; each storage backend maps its own rows into them.

pub mod order;
pub mod product;
pub mod user;

pub use order::{LineItem, LineItemInput, LineItemView, NewLineItem, Order, OrderPrefetch, OrderView, OrdersReport};
pub use product::{Category, PopularProduct, Product, ProductInput, ProductPatch, ProductWrite, Tag};
pub use user::{generate_key, NewUser, Session, User, Viewer};
