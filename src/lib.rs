pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod fingerprint;
pub mod geo;
pub mod model;
pub mod models;
pub mod policy;
pub mod registration;
pub mod routes;
pub mod service;
pub mod store;
pub mod utils;
