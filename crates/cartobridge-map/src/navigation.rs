//! Turn-by-turn navigation requests handed to a backend.

use cartobridge_core::config::NavigationConfig;
use cartobridge_core::types::{CameraPosition, LatLng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PROFILE: &str = "driving";
pub const DEFAULT_LANGUAGE: &str = "zh-Hans";
pub const GEOMETRY_POLYLINE6: &str = "polyline6";
pub const OVERVIEW_FULL: &str = "full";
pub const VOICE_UNITS_METRIC: &str = "metric";

/// Directions request options, as a directions service expects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOptions {
    pub base_url: String,
    pub user: String,
    pub profile: String,
    /// `[lng, lat]` pairs, origin first.
    pub coordinates: Vec<[f64; 2]>,
    pub language: String,
    pub voice_instructions: bool,
    pub banner_instructions: bool,
    pub geometries: String,
    pub overview: String,
    pub voice_units: String,
    pub steps: bool,
    pub access_token: String,
    pub request_uuid: String,
}

/// Everything a navigation UI needs to start a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub route_options: RouteOptions,
    /// The directions response the route was chosen from.
    pub directions_response: Value,
    pub simulate_route: bool,
    pub initial_camera: CameraPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_tips: Option<String>,
}

impl NavigationRequest {
    /// Builds a request from the trip endpoints and the configured service parameters.
    pub fn new(
        config: &NavigationConfig,
        start: LatLng,
        end: LatLng,
        profile: &str,
        language: &str,
        directions_response: Value,
        start_tips: Option<String>,
    ) -> Self {
        let route_options = RouteOptions {
            base_url: config.base_url.clone(),
            user: config.user.clone(),
            profile: profile.to_string(),
            coordinates: vec![
                [start.longitude, start.latitude],
                [end.longitude, end.latitude],
            ],
            language: language.to_string(),
            voice_instructions: true,
            banner_instructions: true,
            geometries: GEOMETRY_POLYLINE6.to_string(),
            overview: OVERVIEW_FULL.to_string(),
            voice_units: VOICE_UNITS_METRIC.to_string(),
            steps: true,
            access_token: config.access_token.clone(),
            request_uuid: config.request_uuid.clone(),
        };
        Self {
            route_options,
            directions_response,
            simulate_route: config.simulate_route,
            initial_camera: CameraPosition {
                bearing: 0.0,
                target: start,
                tilt: 0.0,
                zoom: config.initial_zoom,
            },
            start_tips,
        }
    }
}
