//! Upstream query execution against the Earth Engine REST API. Expressions
//! are the serialized function-call graphs `value:compute` expects: a flat
//! `values` table of invocations referencing each other by index, plus the
//! index of the result node.
//!
//! Dataset queries run one at a time and never abort the batch: a rejected
//! or unreachable upstream is recorded in that dataset's slot and the loop
//! moves on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::datasets::{Dataset, DatasetKind};
use crate::error::RelayError;
use crate::scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

/// Outcome of one dataset query. A failed call never carries `payload`;
/// a successful one never carries `error`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetResult {
    pub status: QueryStatus,
    pub remote_id: &'static str,
    pub kind: DatasetKind,
    pub bands: &'static [&'static str],
    pub scale: f64,
    pub default_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Default)]
struct ExpressionBuilder {
    values: serde_json::Map<String, Value>,
}

impl ExpressionBuilder {
    fn push(&mut self, node: Value) -> String {
        let key = self.values.len().to_string();
        self.values.insert(key.clone(), node);
        key
    }

    fn finish(self, result: String) -> Value {
        json!({ "result": result, "values": Value::Object(self.values) })
    }
}

fn invoke(name: &str, arguments: Value) -> Value {
    json!({
        "functionInvocationValue": {
            "functionName": name,
            "arguments": arguments,
        }
    })
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

fn reference(key: &str) -> Value {
    json!({ "valueReference": key })
}

/// load -> [collection-first ->] select-bands. Collections take whatever the
/// service surfaces as the first item; there is intentionally no date filter
/// here, so "first" carries no recency guarantee.
pub fn dataset_expression(dataset: &Dataset) -> Value {
    let mut builder = ExpressionBuilder::default();
    let image = load_image(&mut builder, dataset, None);
    let selected = builder.push(invoke(
        "Image.select",
        json!({
            "input": reference(&image),
            "bandSelectors": constant(json!(dataset.bands)),
        }),
    ));
    builder.finish(selected)
}

/// Visualization expression for `/image`: the same load chain, optionally
/// restricted to one calendar year, clipped to a box around the requested
/// point sized to cover `width x height` pixels at the effective scale.
pub fn thumbnail_expression(
    dataset: &Dataset,
    lat: f64,
    lon: f64,
    scale: f64,
    width: u32,
    height: u32,
    year: Option<i32>,
) -> Value {
    let mut builder = ExpressionBuilder::default();
    let image = load_image(&mut builder, dataset, year);

    let selected = builder.push(invoke(
        "Image.select",
        json!({
            "input": reference(&image),
            "bandSelectors": constant(json!(dataset.bands)),
        }),
    ));

    let point = builder.push(invoke(
        "GeometryConstructors.Point",
        json!({ "coordinates": constant(json!([lon, lat])) }),
    ));
    let radius = scale * f64::from(width.max(height)) / 2.0;
    let region = builder.push(invoke(
        "Geometry.buffer",
        json!({
            "geometry": reference(&point),
            "distance": constant(json!(radius)),
        }),
    ));
    let clipped = builder.push(invoke(
        "Image.clip",
        json!({
            "input": reference(&selected),
            "geometry": reference(&region),
        }),
    ));

    let vis = &dataset.vis;
    let mut arguments = serde_json::Map::new();
    arguments.insert("image".to_string(), reference(&clipped));
    arguments.insert("bands".to_string(), constant(json!(vis.bands)));
    arguments.insert("min".to_string(), constant(json!([vis.min])));
    arguments.insert("max".to_string(), constant(json!([vis.max])));
    if let Some(palette) = vis.palette {
        arguments.insert("palette".to_string(), constant(json!(palette)));
    }
    let visualized = builder.push(invoke("Image.visualize", Value::Object(arguments)));

    builder.finish(visualized)
}

fn load_image(builder: &mut ExpressionBuilder, dataset: &Dataset, year: Option<i32>) -> String {
    match dataset.kind {
        DatasetKind::Image => builder.push(invoke(
            "Image.load",
            json!({ "id": constant(json!(dataset.remote_id)) }),
        )),
        DatasetKind::Collection => {
            let mut collection = builder.push(invoke(
                "ImageCollection.load",
                json!({ "id": constant(json!(dataset.remote_id)) }),
            ));
            if let Some(year) = year {
                let filter = builder.push(invoke(
                    "Filter.date",
                    json!({
                        "start": constant(json!(format!("{year}-01-01"))),
                        "end": constant(json!(format!("{}-01-01", year + 1))),
                    }),
                ));
                collection = builder.push(invoke(
                    "Collection.filter",
                    json!({
                        "collection": reference(&collection),
                        "filter": reference(&filter),
                    }),
                ));
            }
            builder.push(invoke(
                "Collection.first",
                json!({ "collection": reference(&collection) }),
            ))
        }
    }
}

/// Per-request view of the compute API: one bearer token, one project.
pub struct ComputeClient<'a> {
    pub http: &'a reqwest::Client,
    pub api_base: &'a str,
    pub project_id: &'a str,
    pub token: &'a str,
}

impl ComputeClient<'_> {
    /// Query one dataset. All failure modes (transport, non-2xx, bad JSON)
    /// end up in the result's `error` slot rather than propagating.
    pub async fn query_dataset(&self, dataset: &Dataset, scale_override: Option<f64>) -> DatasetResult {
        let scale = scale_override.unwrap_or(dataset.default_scale);
        let expression = dataset_expression(dataset);

        match self.compute_value(&json!({ "expression": expression })).await {
            Ok(payload) => DatasetResult {
                status: QueryStatus::Success,
                remote_id: dataset.remote_id,
                kind: dataset.kind,
                bands: dataset.bands,
                scale,
                default_scale: dataset.default_scale,
                scene_id: scene::extract_scene_id(dataset.name, &payload),
                payload: Some(payload),
                error: None,
            },
            Err(message) => {
                tracing::warn!(dataset = dataset.name, "upstream query failed: {message}");
                DatasetResult {
                    status: QueryStatus::Error,
                    remote_id: dataset.remote_id,
                    kind: dataset.kind,
                    bands: dataset.bands,
                    scale,
                    default_scale: dataset.default_scale,
                    scene_id: None,
                    payload: None,
                    error: Some(message),
                }
            }
        }
    }

    async fn compute_value(&self, body: &Value) -> Result<Value, String> {
        let url = format!(
            "{}/v1/projects/{}/value:compute",
            self.api_base, self.project_id
        );

        let res = self
            .http
            .post(&url)
            .bearer_auth(self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(format!("{status}: {text}"));
        }

        res.json::<Value>().await.map_err(|e| e.to_string())
    }

    /// Create a thumbnail and return its pixel-fetch URL. Unlike dataset
    /// queries this is a single-shot call, so rejection surfaces as an error.
    pub async fn create_thumbnail(&self, body: &Value) -> Result<String, RelayError> {
        let url = format!("{}/v1/projects/{}/thumbnails", self.api_base, self.project_id);

        let res = self
            .http
            .post(&url)
            .bearer_auth(self.token)
            .json(body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(RelayError::Upstream { status, body });
        }

        #[derive(Deserialize)]
        struct ThumbnailResponse {
            name: String,
        }

        let created: ThumbnailResponse = res.json().await?;
        Ok(format!("{}/v1/{}:getPixels", self.api_base, created.name))
    }
}

/// Request body for a thumbnail creation call.
pub fn thumbnail_request(expression: Value, width: u32, height: u32) -> Value {
    json!({
        "expression": expression,
        "fileFormat": "PNG",
        "grid": { "dimensions": { "width": width, "height": height } },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets;

    fn function_names(expression: &Value) -> Vec<String> {
        expression["values"]
            .as_object()
            .unwrap()
            .values()
            .filter_map(|node| node["functionInvocationValue"]["functionName"].as_str())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn image_expression_is_load_then_select() {
        let srtm = datasets::find("SRTM Digital Elevation").unwrap();
        let expression = dataset_expression(srtm);

        let names = function_names(&expression);
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Image.load".to_string()));
        assert!(names.contains(&"Image.select".to_string()));

        let result_key = expression["result"].as_str().unwrap();
        let result = &expression["values"][result_key]["functionInvocationValue"];
        assert_eq!(result["functionName"], "Image.select");
        assert_eq!(
            result["arguments"]["bandSelectors"]["constantValue"],
            json!(["elevation"])
        );
    }

    #[test]
    fn collection_expression_takes_first_item() {
        let s2 = datasets::find("Sentinel-2 Surface Reflectance").unwrap();
        let expression = dataset_expression(s2);

        let names = function_names(&expression);
        assert!(names.contains(&"ImageCollection.load".to_string()));
        assert!(names.contains(&"Collection.first".to_string()));
        // No date filter: "first" is whatever the service returns first.
        assert!(!names.contains(&"Collection.filter".to_string()));
    }

    #[test]
    fn thumbnail_expression_filters_by_year_for_collections() {
        let s2 = datasets::find("Sentinel-2 Surface Reflectance").unwrap();

        let with_year = thumbnail_expression(s2, -2.8, -60.3, 10.0, 512, 512, Some(2023));
        let names = function_names(&with_year);
        assert!(names.contains(&"Filter.date".to_string()));
        assert!(names.contains(&"Collection.filter".to_string()));
        assert!(names.contains(&"Image.visualize".to_string()));

        let without_year = thumbnail_expression(s2, -2.8, -60.3, 10.0, 512, 512, None);
        assert!(!function_names(&without_year).contains(&"Filter.date".to_string()));
    }

    #[test]
    fn thumbnail_expression_centers_on_the_point() {
        let srtm = datasets::find("SRTM Digital Elevation").unwrap();
        let expression = thumbnail_expression(srtm, -2.8, -60.3, 30.0, 256, 128, None);

        let point = expression["values"]
            .as_object()
            .unwrap()
            .values()
            .find(|node| node["functionInvocationValue"]["functionName"] == "GeometryConstructors.Point")
            .unwrap();
        assert_eq!(
            point["functionInvocationValue"]["arguments"]["coordinates"]["constantValue"],
            json!([-60.3, -2.8])
        );

        // Buffer radius covers the larger pixel dimension at the given scale.
        let buffer = expression["values"]
            .as_object()
            .unwrap()
            .values()
            .find(|node| node["functionInvocationValue"]["functionName"] == "Geometry.buffer")
            .unwrap();
        assert_eq!(
            buffer["functionInvocationValue"]["arguments"]["distance"]["constantValue"],
            json!(30.0 * 256.0 / 2.0)
        );
    }

    #[test]
    fn value_references_resolve_within_the_expression() {
        for dataset in &datasets::DATASETS {
            let expression = dataset_expression(dataset);
            let values = expression["values"].as_object().unwrap();
            assert!(values.contains_key(expression["result"].as_str().unwrap()));

            for node in values.values() {
                let arguments = node["functionInvocationValue"]["arguments"].as_object().unwrap();
                for argument in arguments.values() {
                    if let Some(reference) = argument.get("valueReference") {
                        assert!(values.contains_key(reference.as_str().unwrap()));
                    }
                }
            }
        }
    }

    #[test]
    fn thumbnail_request_carries_dimensions() {
        let body = thumbnail_request(json!({}), 640, 480);
        assert_eq!(body["fileFormat"], "PNG");
        assert_eq!(body["grid"]["dimensions"]["width"], 640);
        assert_eq!(body["grid"]["dimensions"]["height"], 480);
    }
}
