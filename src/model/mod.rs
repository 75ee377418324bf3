pub mod apperror;
pub mod config;
pub mod constraints;
pub mod entities;
pub mod models;
