//! qsl-axum: serves a [`QslApp`](qsl_core::QslApp) over HTTP.
//!
//! Every registered service gets a REST router (CRUD plus declared custom
//! methods) answering with `{success, data}` envelopes.

pub mod app;
mod error;
pub mod params;
pub mod rest;
pub mod state;

pub use error::QslAxumError;
pub use state::QslAxumState;

pub use app::{axum, AxumApp};
