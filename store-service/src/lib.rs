//! FMSTYLE store service: invoice totals, discount codes and invoice export.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod money;
pub mod services;
pub mod startup;

pub use startup::{build_router, AppState, Application};
