//! # stratus-core
//!
//! Core types for the Stratus protocol-selection middleware.
//!
//! This crate provides:
//! - Error types (`SelectError`)
//! - Selection parameters (`SelectParam`) and the boundary enums
//! - Affine cost functions (`LinearFunc`)
//! - Human-readable size units (`units`)
//! - Opaque worker and configuration handles (`Worker`, `EpConfigKey`,
//!   `RkeyConfigKey`)

mod error;
mod param;
mod perf;
mod worker;

pub mod units;

pub use error::SelectError;
pub use param::{DtClass, MemType, OpFlags, OpId, SelectParam};
pub use perf::LinearFunc;
pub use worker::{CfgIndex, EpConfigKey, RkeyConfigKey, Worker};
