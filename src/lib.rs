pub mod config;
pub mod ids;
pub mod mapping;
pub mod master;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod schema;
