pub mod collaborators;
pub mod config;
pub mod error;
pub mod idgen;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod services;
