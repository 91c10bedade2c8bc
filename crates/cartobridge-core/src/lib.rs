//! # Cartobridge Core
//!
//! Core types, error handling, and configuration for the cartobridge map bridge.
//!
//! - **Types**: `MapId`, coordinates, bounds, camera positions and screen geometry.
//! - **Camera**: parsing of the list-shaped camera update descriptors.
//! - **Codec**: `MethodCall`, argument accessors and the single-use `MethodResult`
//!   reply slot.
//! - **Options**: partial map and annotation option maps.
//! - **Errors**: `thiserror` enums with stable wire codes.
//! - **Configuration**: YAML files with `CARTOBRIDGE__*` environment overrides.
//!
//! ## Example
//!
//! ```
//! use cartobridge_core::camera::CameraUpdate;
//! use cartobridge_core::types::LatLng;
//! use serde_json::json;
//!
//! let update = CameraUpdate::from_value(&json!(["newLatLng", [52.5, 13.4]]), 1.0).unwrap();
//! assert_eq!(update, CameraUpdate::NewLatLng(LatLng::new(52.5, 13.4)));
//! ```

pub mod camera;
pub mod codec;
pub mod config;
pub mod error;
pub mod options;
pub mod types;

pub use codec::{Args, MethodCall, MethodResult, Response};
pub use config::AppConfig;
pub use error::{BridgeError, Result};
pub use types::{CameraPosition, LatLng, LatLngBounds, MapId};
