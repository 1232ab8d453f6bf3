//! Profile Editor - user profile form service
//!
//! Lets an authenticated user change their name, email, avatar and password,
//! with field-level validation, avatar storage, bcrypt hashing and flash
//! notifications, served over an axum HTTP API.

pub mod core;
