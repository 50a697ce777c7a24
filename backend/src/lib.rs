pub mod config;
pub mod error;
pub mod models;
pub mod openai;
pub mod rag;
pub mod server;
pub mod session;
pub mod status;
