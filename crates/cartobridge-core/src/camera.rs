//! Camera update descriptors.
//!
//! The host describes camera changes as lists whose first element names the
//! kind, e.g. `["newLatLngZoom", [52.5, 13.4], 12.0]`. Pixel-valued arguments
//! are given in logical pixels and scaled by the device pixel ratio here, so
//! the rest of the bridge only sees physical pixels.

use crate::error::ArgumentError;
use crate::types::{CameraPosition, EdgePadding, LatLng, LatLngBounds, ScreenPoint};
use serde_json::Value;

/// A parsed camera change.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraUpdate {
    NewCameraPosition(CameraPosition),
    NewLatLng(LatLng),
    NewLatLngBounds {
        bounds: LatLngBounds,
        padding: EdgePadding,
    },
    NewLatLngZoom {
        target: LatLng,
        zoom: f64,
    },
    ScrollBy {
        dx: f64,
        dy: f64,
    },
    ZoomBy {
        amount: f64,
        focus: Option<ScreenPoint>,
    },
    ZoomIn,
    ZoomOut,
    ZoomTo(f64),
    BearingTo(f64),
    TiltTo(f64),
}

impl CameraUpdate {
    /// Parses a list descriptor, scaling pixel arguments by `pixel_ratio`.
    ///
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] describing the first unusable element.
    pub fn from_value(value: &Value, pixel_ratio: f64) -> Result<Self, ArgumentError> {
        let list = value
            .as_array()
            .ok_or_else(|| ArgumentError::wrong_type("cameraUpdate", "list"))?;
        let kind = list
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| ArgumentError::missing("cameraUpdate[0]"))?;

        let number = |index: usize| -> Result<f64, ArgumentError> {
            list.get(index)
                .and_then(Value::as_f64)
                .ok_or_else(|| ArgumentError::wrong_type(format!("{}[{}]", kind, index), "number"))
        };
        let latlng = |index: usize| -> Result<LatLng, ArgumentError> {
            list.get(index)
                .and_then(LatLng::from_value)
                .ok_or_else(|| ArgumentError::wrong_type(format!("{}[{}]", kind, index), "[lat, lng]"))
        };
        let pixels = |index: usize| -> Result<f64, ArgumentError> { Ok(number(index)? * pixel_ratio) };

        let update = match kind {
            "newCameraPosition" => {
                let position = list
                    .get(1)
                    .and_then(CameraPosition::from_value)
                    .ok_or_else(|| ArgumentError::wrong_type("newCameraPosition[1]", "camera position"))?;
                CameraUpdate::NewCameraPosition(position)
            }
            "newLatLng" => CameraUpdate::NewLatLng(latlng(1)?),
            "newLatLngBounds" => {
                let bounds = list
                    .get(1)
                    .and_then(LatLngBounds::from_value)
                    .ok_or_else(|| ArgumentError::wrong_type("newLatLngBounds[1]", "bounds"))?;
                let padding = if list.len() >= 6 {
                    EdgePadding::new(pixels(2)?, pixels(3)?, pixels(4)?, pixels(5)?)
                } else {
                    EdgePadding::uniform(pixels(2)?)
                };
                CameraUpdate::NewLatLngBounds { bounds, padding }
            }
            "newLatLngZoom" => CameraUpdate::NewLatLngZoom {
                target: latlng(1)?,
                zoom: number(2)?,
            },
            "scrollBy" => CameraUpdate::ScrollBy {
                dx: pixels(1)?,
                dy: pixels(2)?,
            },
            "zoomBy" => {
                let focus = if list.len() > 2 {
                    let point = list
                        .get(2)
                        .and_then(Value::as_array)
                        .filter(|p| p.len() >= 2)
                        .ok_or_else(|| ArgumentError::wrong_type("zoomBy[2]", "[x, y]"))?;
                    let x = point[0].as_f64().ok_or_else(|| ArgumentError::wrong_type("zoomBy[2][0]", "number"))?;
                    let y = point[1].as_f64().ok_or_else(|| ArgumentError::wrong_type("zoomBy[2][1]", "number"))?;
                    Some(ScreenPoint::new(x * pixel_ratio, y * pixel_ratio))
                } else {
                    None
                };
                CameraUpdate::ZoomBy {
                    amount: number(1)?,
                    focus,
                }
            }
            "zoomIn" => CameraUpdate::ZoomIn,
            "zoomOut" => CameraUpdate::ZoomOut,
            "zoomTo" => CameraUpdate::ZoomTo(number(1)?),
            "bearingTo" => CameraUpdate::BearingTo(number(1)?),
            "tiltTo" => CameraUpdate::TiltTo(number(1)?),
            other => {
                return Err(ArgumentError::invalid(
                    "cameraUpdate",
                    format!("unknown camera update kind '{}'", other),
                ))
            }
        };
        Ok(update)
    }

    /// Descriptor kind, as it appears on the channel.
    pub fn kind(&self) -> &'static str {
        match self {
            CameraUpdate::NewCameraPosition(_) => "newCameraPosition",
            CameraUpdate::NewLatLng(_) => "newLatLng",
            CameraUpdate::NewLatLngBounds { .. } => "newLatLngBounds",
            CameraUpdate::NewLatLngZoom { .. } => "newLatLngZoom",
            CameraUpdate::ScrollBy { .. } => "scrollBy",
            CameraUpdate::ZoomBy { .. } => "zoomBy",
            CameraUpdate::ZoomIn => "zoomIn",
            CameraUpdate::ZoomOut => "zoomOut",
            CameraUpdate::ZoomTo(_) => "zoomTo",
            CameraUpdate::BearingTo(_) => "bearingTo",
            CameraUpdate::TiltTo(_) => "tiltTo",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_lat_lng_zoom() {
        let update = CameraUpdate::from_value(&json!(["newLatLngZoom", [1.0, 2.0], 12.5]), 1.0).unwrap();
        assert_eq!(
            update,
            CameraUpdate::NewLatLngZoom {
                target: LatLng::new(1.0, 2.0),
                zoom: 12.5
            }
        );
        assert_eq!(update.kind(), "newLatLngZoom");
    }

    #[test]
    fn test_bounds_padding_scaled() {
        let value = json!(["newLatLngBounds", [[0.0, 0.0], [1.0, 1.0]], 10.0]);
        match CameraUpdate::from_value(&value, 2.0).unwrap() {
            CameraUpdate::NewLatLngBounds { padding, .. } => {
                assert_eq!(padding, EdgePadding::uniform(20.0));
            }
            other => panic!("unexpected {:?}", other),
        }

        let value = json!(["newLatLngBounds", [[0.0, 0.0], [1.0, 1.0]], 1.0, 2.0, 3.0, 4.0]);
        match CameraUpdate::from_value(&value, 3.0).unwrap() {
            CameraUpdate::NewLatLngBounds { padding, .. } => {
                assert_eq!(padding, EdgePadding::new(3.0, 6.0, 9.0, 12.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zoom_by_with_focus() {
        let update = CameraUpdate::from_value(&json!(["zoomBy", 1.5, [10.0, 20.0]]), 2.0).unwrap();
        assert_eq!(
            update,
            CameraUpdate::ZoomBy {
                amount: 1.5,
                focus: Some(ScreenPoint::new(20.0, 40.0))
            }
        );
        let update = CameraUpdate::from_value(&json!(["zoomBy", -1.0]), 2.0).unwrap();
        assert_eq!(update, CameraUpdate::ZoomBy { amount: -1.0, focus: None });
    }

    #[test]
    fn test_simple_kinds() {
        assert_eq!(CameraUpdate::from_value(&json!(["zoomIn"]), 1.0).unwrap(), CameraUpdate::ZoomIn);
        assert_eq!(CameraUpdate::from_value(&json!(["tiltTo", 30]), 1.0).unwrap(), CameraUpdate::TiltTo(30.0));
        assert_eq!(
            CameraUpdate::from_value(&json!(["scrollBy", 5, -5]), 1.5).unwrap(),
            CameraUpdate::ScrollBy { dx: 7.5, dy: -7.5 }
        );
    }

    #[test]
    fn test_malformed_descriptors() {
        assert!(CameraUpdate::from_value(&json!("zoomIn"), 1.0).is_err());
        assert!(CameraUpdate::from_value(&json!([]), 1.0).is_err());
        assert!(CameraUpdate::from_value(&json!(["warpTo", 1]), 1.0).is_err());
        assert!(CameraUpdate::from_value(&json!(["zoomTo"]), 1.0).is_err());
        assert!(CameraUpdate::from_value(&json!(["newLatLng", [1.0]]), 1.0).is_err());
    }
}
