pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod response;
pub mod routes;
pub mod settings;
pub mod state;
pub mod users;
pub mod validation;
