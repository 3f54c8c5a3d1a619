pub mod btree;
pub mod schema;

pub use btree::*;
pub use schema::*;
