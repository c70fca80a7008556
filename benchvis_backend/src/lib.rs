pub mod agent;
pub mod config;
pub mod database;
pub mod http_client;
pub mod llm_client;
pub mod memory;
pub mod personality;
pub mod profiles;
pub mod runtime;
