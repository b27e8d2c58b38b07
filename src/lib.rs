pub mod definition;
pub mod digest;
pub mod error;
pub mod form;
pub mod openrosa;
pub mod registry;
pub mod schema;
pub mod server;
pub mod storage;
