//! Suivi des plans de traitement des cultures et consultation des prix de marché

pub mod config;
pub mod db;
pub mod market;
pub mod models;
pub mod recommendations;
pub mod services;
pub mod utils;
