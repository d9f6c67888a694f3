pub mod mutate;
pub mod post;
pub mod query;
