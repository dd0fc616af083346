pub mod apply;
pub mod charset;
pub mod extract;
pub mod migrate;
pub mod schema;
pub mod unpack;
pub mod validate;
