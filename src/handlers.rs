//! Request handlers: validate, authenticate, fan the query loop over the
//! registry (strictly sequentially), assemble the combined response. Each
//! request re-derives credentials and a fresh token; there is no state
//! shared between invocations beyond the HTTP client itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{response::IntoResponse, Extension, Json};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::auth;
use crate::config::Config;
use crate::credentials::ServiceAccount;
use crate::datasets::{self, DATASETS};
use crate::error::RelayError;
use crate::query::{thumbnail_expression, thumbnail_request, ComputeClient, DatasetResult};

const CUSTOM_SCALE_NOTE: &str = "custom scale applied uniformly to all datasets";
const DEFAULT_SCALE_NOTE: &str = "no scale requested, per-dataset default resolutions used";

const DEFAULT_DIMENSION: u32 = 512;
const MAX_DIMENSION: u32 = 2048;

#[derive(Clone)]
pub struct AppState {
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
struct SensorRequest {
    lat: f64,
    lon: f64,
    scale: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ImageRequest {
    lat: f64,
    lon: f64,
    dataset: String,
    width: Option<u32>,
    height: Option<u32>,
    year: Option<i32>,
    scale: Option<f64>,
}

#[derive(Serialize)]
struct Coordinates {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct ScaleInfo {
    requested: Option<f64>,
    note: &'static str,
}

#[derive(Serialize)]
struct SensorResponse {
    coordinates: Coordinates,
    scale: ScaleInfo,
    datasets: BTreeMap<&'static str, DatasetResult>,
    timestamp: String,
}

#[derive(Serialize)]
struct Visualization {
    bands: &'static [&'static str],
    min: f64,
    max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    palette: Option<&'static [&'static str]>,
}

#[derive(Serialize)]
struct Dimensions {
    width: u32,
    height: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    coordinates: Coordinates,
    dataset: String,
    image_url: String,
    visualization: Visualization,
    dimensions: Dimensions,
}

/// POST `/`, `/sensor`, `/sensor-data`
pub async fn sensor(
    Extension(state): Extension<AppState>,
    body: String,
) -> Result<impl IntoResponse, RelayError> {
    let request: SensorRequest = parse_body(&body)?;
    validate_coordinates(request.lat, request.lon)?;
    validate_scale(request.scale)?;

    let account = ServiceAccount::from_config(&state.config)?;
    let token = auth::fetch_access_token(&state.http, &state.config.token_url, &account).await?;
    let compute = ComputeClient {
        http: &state.http,
        api_base: &state.config.api_base,
        project_id: &account.project_id,
        token: &token,
    };

    // One round trip per registry entry, in order. A failing dataset lands
    // as an error entry and the loop keeps going.
    let mut results = BTreeMap::new();
    for dataset in &DATASETS {
        let result = compute.query_dataset(dataset, request.scale).await;
        results.insert(dataset.name, result);
    }

    let response = SensorResponse {
        coordinates: Coordinates {
            lat: request.lat,
            lon: request.lon,
        },
        scale: ScaleInfo {
            requested: request.scale,
            note: scale_note(request.scale),
        },
        datasets: results,
        timestamp: Utc::now().to_rfc3339(),
    };

    Ok(Json(response))
}

/// POST `/image`
pub async fn image(
    Extension(state): Extension<AppState>,
    body: String,
) -> Result<impl IntoResponse, RelayError> {
    let request: ImageRequest = parse_body(&body)?;
    validate_coordinates(request.lat, request.lon)?;
    validate_scale(request.scale)?;

    let dataset = datasets::find(&request.dataset).ok_or_else(|| {
        let known = DATASETS.iter().map(|d| d.name).collect::<Vec<_>>().join(", ");
        RelayError::Validation(format!("unknown dataset '{}', expected one of: {known}", request.dataset))
    })?;

    let width = validate_dimension("width", request.width)?;
    let height = validate_dimension("height", request.height)?;

    let account = ServiceAccount::from_config(&state.config)?;
    let token = auth::fetch_access_token(&state.http, &state.config.token_url, &account).await?;
    let compute = ComputeClient {
        http: &state.http,
        api_base: &state.config.api_base,
        project_id: &account.project_id,
        token: &token,
    };

    let scale = request.scale.unwrap_or(dataset.default_scale);
    let expression = thumbnail_expression(
        dataset,
        request.lat,
        request.lon,
        scale,
        width,
        height,
        request.year,
    );
    let image_url = compute
        .create_thumbnail(&thumbnail_request(expression, width, height))
        .await?;

    let response = ImageResponse {
        coordinates: Coordinates {
            lat: request.lat,
            lon: request.lon,
        },
        dataset: dataset.name.to_string(),
        image_url,
        visualization: Visualization {
            bands: dataset.vis.bands,
            min: dataset.vis.min,
            max: dataset.vis.max,
            palette: dataset.vis.palette,
        },
        dimensions: Dimensions { width, height },
    };

    Ok(Json(response))
}

/// Fallback for unmatched routes. The method check wins over the path
/// check: anything other than POST is 405 no matter the path, and only a
/// POST to an unknown path is 404. Both carry the JSON error shape.
pub async fn fallback(method: axum::http::Method) -> impl IntoResponse {
    let (status, message) = if method == axum::http::Method::POST {
        (axum::http::StatusCode::NOT_FOUND, "not found")
    } else {
        (axum::http::StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    };
    (status, Json(serde_json::json!({ "error": message })))
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, RelayError> {
    serde_json::from_str(body).map_err(|e| RelayError::Validation(format!("invalid request body: {e}")))
}

fn validate_coordinates(lat: f64, lon: f64) -> Result<(), RelayError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(RelayError::Validation(format!(
            "lat must be a number between -90 and 90, got {lat}"
        )));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(RelayError::Validation(format!(
            "lon must be a number between -180 and 180, got {lon}"
        )));
    }
    Ok(())
}

fn validate_scale(scale: Option<f64>) -> Result<(), RelayError> {
    if let Some(scale) = scale {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RelayError::Validation(format!(
                "scale must be a positive number of meters, got {scale}"
            )));
        }
    }
    Ok(())
}

fn validate_dimension(field: &str, value: Option<u32>) -> Result<u32, RelayError> {
    let value = value.unwrap_or(DEFAULT_DIMENSION);
    if value == 0 || value > MAX_DIMENSION {
        return Err(RelayError::Validation(format!(
            "{field} must be between 1 and {MAX_DIMENSION} pixels, got {value}"
        )));
    }
    Ok(value)
}

fn scale_note(scale: Option<f64>) -> &'static str {
    match scale {
        Some(_) => CUSTOM_SCALE_NOTE,
        None => DEFAULT_SCALE_NOTE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_bounds_are_inclusive() {
        assert!(validate_coordinates(90.0, 180.0).is_ok());
        assert!(validate_coordinates(-90.0, -180.0).is_ok());
        assert!(validate_coordinates(100.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn scale_must_be_positive_when_present() {
        assert!(validate_scale(None).is_ok());
        assert!(validate_scale(Some(0.5)).is_ok());
        assert!(validate_scale(Some(0.0)).is_err());
        assert!(validate_scale(Some(-10.0)).is_err());
        assert!(validate_scale(Some(f64::NAN)).is_err());
    }

    #[test]
    fn dimensions_default_and_cap() {
        assert_eq!(validate_dimension("width", None).unwrap(), DEFAULT_DIMENSION);
        assert_eq!(validate_dimension("width", Some(64)).unwrap(), 64);
        assert!(validate_dimension("width", Some(0)).is_err());
        assert!(validate_dimension("height", Some(MAX_DIMENSION + 1)).is_err());
    }

    #[test]
    fn body_parsing_rejects_missing_and_mistyped_fields() {
        assert!(parse_body::<SensorRequest>(r#"{"lat": 1.0, "lon": 2.0}"#).is_ok());
        assert!(parse_body::<SensorRequest>(r#"{"lat": 1.0}"#).is_err());
        assert!(parse_body::<SensorRequest>(r#"{"lat": "high", "lon": 2.0}"#).is_err());
        assert!(parse_body::<SensorRequest>("not json").is_err());

        let err = parse_body::<SensorRequest>("{").unwrap_err();
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[test]
    fn scale_note_reflects_the_request() {
        assert_eq!(scale_note(Some(120.0)), CUSTOM_SCALE_NOTE);
        assert_eq!(scale_note(None), DEFAULT_SCALE_NOTE);
    }
}
