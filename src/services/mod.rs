pub mod app_services;
pub mod code_purge;
