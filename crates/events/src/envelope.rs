use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Fills in `event_id`, `timestamp`, and `source` on a publish payload if
/// the caller didn't already set them, mirroring `publish_event`'s
/// auto-enrichment in the original messaging module. Only operates on
/// object payloads — a non-object payload is returned unchanged since
/// there's nowhere to add the fields.
pub fn enrich(mut payload: Value, source: &str) -> Value {
    let Some(obj) = payload.as_object_mut() else {
        return payload;
    };

    obj.entry("event_id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

    obj.entry("timestamp").or_insert_with(|| {
        let now: DateTime<Utc> = Utc::now();
        Value::String(now.to_rfc3339())
    });

    obj.entry("source")
        .or_insert_with(|| Value::String(source.to_string()));

    payload
}
