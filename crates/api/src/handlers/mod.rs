//! Request handlers for the REST surface.
//!
//! Handlers delegate to the stream service and map errors via
//! [`AppError`](crate::error::AppError).

pub mod models;
