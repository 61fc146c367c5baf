pub mod ask;
pub mod chat;
pub mod client;
pub mod config_cmd;
pub mod gateway;
pub mod index_cmd;
