pub mod app;
pub mod channel;
pub mod config;
pub mod debounce;
pub mod error;
pub mod layout;
pub mod message;
pub mod registry;
pub mod render;
pub mod session;
pub mod settings;
pub mod storage;
