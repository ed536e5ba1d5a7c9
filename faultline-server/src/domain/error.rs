//! Canonical failure record and the catalog of named failure variants.
//!
//! Everything that can go wrong while serving a request ends up as an
//! [`AppError`] before it is reported. Raising code builds one through the
//! constructors in [`factory`]; failures from third-party crates are turned
//! into one by the normalizer in the application layer.

mod catalog;
mod entity;
mod factory;

pub(crate) use catalog::ErrorKind;
pub(crate) use entity::{AppError, Cause, Origin, StatusClass};
