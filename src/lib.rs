pub mod agents;
pub mod config;
pub mod context;
pub mod errors;
pub mod firewall;
pub mod init;
pub mod llm;
pub mod orchestrator;
pub mod ui;
pub mod util;
