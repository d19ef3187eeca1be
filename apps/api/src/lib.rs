pub mod chat;
pub mod config;
pub mod db;
pub mod diagnosis;
pub mod errors;
pub mod extract;
pub mod llm_client;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
