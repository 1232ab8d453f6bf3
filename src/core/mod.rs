//! Core domain models and business logic for profile editing

pub mod auth;
pub mod config;
pub mod db;
pub mod notifications;
pub mod profile;
pub mod storage;
pub mod validation;
