//! Best-effort scene-ID extraction for Sentinel datasets. The acquisition
//! identifier can live in several places depending on how the asset was
//! ingested, so the probes run in priority order and the first non-empty
//! string wins. A miss is a normal outcome, never an error.

use serde_json::Value;

type Probe = fn(&Value) -> Option<&str>;

const PROBES: [Probe; 4] = [
    |payload| payload.get("id").and_then(Value::as_str),
    |payload| property(payload, "system:index"),
    |payload| property(payload, "GRANULE_ID"),
    |payload| property(payload, "PRODUCT_ID"),
];

fn property<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get("properties").and_then(|p| p.get(key)).and_then(Value::as_str)
}

pub fn extract_scene_id(dataset_name: &str, payload: &Value) -> Option<String> {
    if !dataset_name.contains("Sentinel") {
        return None;
    }

    PROBES
        .iter()
        .filter_map(|probe| probe(payload))
        .find(|candidate| !candidate.is_empty())
        .map(|candidate| {
            // Asset ids are slash-separated paths; the scene id is the tail.
            candidate.rsplit('/').next().unwrap_or(candidate).to_string()
        })
}
