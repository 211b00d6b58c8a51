//! JSON feature collections: `GeoJSON` (WFS / OGC API Features), Esri
//! `features[].attributes` and Esri identify `results[]`.

use serde_json::Value;

use crate::{FieldValue, ParseError, RawFeature};

/// Splits a JSON body into raw features.
///
/// # Errors
///
/// * [`ParseError::Json`] if the body is not JSON
/// * [`ParseError::ServiceException`] if the body is an error object
/// * [`ParseError::Malformed`] if the body is JSON of an unknown shape
pub fn features(text: &str) -> Result<Vec<RawFeature>, ParseError> {
    let root: Value = serde_json::from_str(text)?;

    if let Some(error) = root.get("error").or_else(|| root.get("exception"))
        && !error.is_null()
    {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(ParseError::ServiceException { message });
    }

    let items: Vec<&Value> = if let Some(array) = root.as_array() {
        array.iter().collect()
    } else if let Some(array) = root.get("features").and_then(Value::as_array) {
        array.iter().collect()
    } else if let Some(array) = root.get("results").and_then(Value::as_array) {
        array.iter().collect()
    } else if root.get("properties").is_some() || root.get("attributes").is_some() {
        vec![&root]
    } else {
        return Err(ParseError::Malformed {
            message: "JSON has no features, results or properties".to_string(),
        });
    };

    Ok(items.into_iter().filter_map(feature_from_item).collect())
}

/// Converts one JSON feature item into a [`RawFeature`].
fn feature_from_item(item: &Value) -> Option<RawFeature> {
    let properties = item
        .get("properties")
        .or_else(|| item.get("attributes"))
        .unwrap_or(item)
        .as_object()?;

    let layer = item
        .get("layerName")
        .and_then(Value::as_str)
        .or_else(|| {
            // GeoServer ids look like `typeName.fid`
            item.get("id")
                .and_then(Value::as_str)
                .and_then(|id| id.rsplit_once('.').map(|(layer, _)| layer))
        });

    let mut feature = RawFeature::new(layer);
    insert_scalars(&mut feature, properties);
    // One level of nesting, e.g. `{"bodenrichtwert": {"wert": 200}}`
    for value in properties.values() {
        if let Value::Object(inner) = value {
            insert_scalars(&mut feature, inner);
        }
    }

    (!feature.is_empty()).then_some(feature)
}

fn insert_scalars(feature: &mut RawFeature, object: &serde_json::Map<String, Value>) {
    for (key, value) in object {
        match value {
            Value::String(s) => feature.insert_text(key, s),
            Value::Number(n) => {
                if let Some(n) = n.as_f64() {
                    feature.insert(key, FieldValue::Number(n));
                }
            }
            Value::Bool(b) => feature.insert_text(key, &b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => {}
        }
    }
}
