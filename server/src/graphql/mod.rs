// storefront_server/src/graphql/mod.rs

pub mod mutation;
pub mod query;
pub mod schema;
pub mod types;

pub use mutation::Mutation;
pub use query::Query;
pub use schema::{create_schema, to_graphql_error, GraphQLContext, StorefrontSchema};
