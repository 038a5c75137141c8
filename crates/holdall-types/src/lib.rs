//! Foundation types for holdall.
//!
//! This crate provides the identity, temporal, and naming types shared by
//! every other holdall crate.
//!
//! # Key Types
//!
//! - [`Oid`]: persisted-object identity assigned by the object database
//! - [`ContainedId`]: identifier of an object within its container
//! - [`ModTime`]: monotonic last-modified timestamp with max-merge semantics
//! - [`fields`]: well-known external field names and synthetic-key checks

pub mod contained_id;
pub mod error;
pub mod fields;
pub mod modtime;
pub mod oid;

pub use contained_id::ContainedId;
pub use error::TypeError;
pub use fields::is_synthetic_key;
pub use modtime::{ModTime, Timestamp};
pub use oid::Oid;
