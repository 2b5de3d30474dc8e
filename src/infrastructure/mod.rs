pub mod blob;
pub mod http;
pub mod search;
