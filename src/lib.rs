pub mod auth;
pub mod axum_http;
pub mod config;
pub mod services;
pub mod usecases;
