//! # DeskBridge Testkit
//!
//! Shared fixtures for testing against a staging area: ready-made engines
//! over in-memory or temporary file stores, and realistic sample records
//! for every object type.
//!
//! ## Example
//!
//! ```
//! use deskbridge_core::ObjectType;
//! use deskbridge_testkit::{records, with_staging};
//!
//! with_staging(|engine| {
//!     engine
//!         .save(ObjectType::Product, &[records::product("SKU-1")])
//!         .unwrap();
//!     assert_eq!(engine.list_pending_for_dispatch().unwrap().len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod fixtures;
pub mod records;

pub use fixtures::{with_file_staging, with_staging, TestStaging, TEST_CONNECTION};
