pub mod app;
pub mod auth;
pub mod config;
pub mod docs;
pub mod game;
pub mod roles;
pub mod session;
pub mod state;
pub mod storage;
pub mod users;
