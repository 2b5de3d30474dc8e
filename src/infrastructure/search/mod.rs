pub mod index_writer;
pub mod knowledge_api;
