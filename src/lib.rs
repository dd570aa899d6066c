pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
