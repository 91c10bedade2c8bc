//! Builders for style expressions.
//!
//! Expressions are plain JSON arrays (`["get", "mag"]`); these helpers keep
//! call sites readable and the arrays well formed.

use serde_json::{json, Value};

/// `["get", key]`
pub fn get(key: &str) -> Value {
    json!(["get", key])
}

/// `["zoom"]`
pub fn zoom() -> Value {
    json!(["zoom"])
}

/// `["heatmap-density"]`
pub fn heatmap_density() -> Value {
    json!(["heatmap-density"])
}

/// `["literal", value]`
pub fn literal(value: impl Into<Value>) -> Value {
    json!(["literal", value.into()])
}

/// `["==", lhs, rhs]`
pub fn eq(lhs: Value, rhs: impl Into<Value>) -> Value {
    json!(["==", lhs, rhs.into()])
}

/// `["interpolate", ["linear"], input, stop0, out0, stop1, out1, ...]`
pub fn interpolate_linear<I, V>(input: Value, stops: I) -> Value
where
    I: IntoIterator<Item = (f64, V)>,
    V: Into<Value>,
{
    let mut expr = vec![json!("interpolate"), json!(["linear"]), input];
    for (stop, output) in stops {
        expr.push(json!(stop));
        expr.push(output.into());
    }
    Value::Array(expr)
}

/// `["interpolate", ["exponential", base], input, stop0, out0, ...]`
pub fn interpolate_exponential<I, V>(base: f64, input: Value, stops: I) -> Value
where
    I: IntoIterator<Item = (f64, V)>,
    V: Into<Value>,
{
    let mut expr = vec![json!("interpolate"), json!(["exponential", base]), input];
    for (stop, output) in stops {
        expr.push(json!(stop));
        expr.push(output.into());
    }
    Value::Array(expr)
}

/// `["rgba", r, g, b, a]`
pub fn rgba(r: u8, g: u8, b: u8, a: f64) -> Value {
    json!(["rgba", r, g, b, a])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_by_zoom() {
        let expr = interpolate_linear(zoom(), [(0.0, 1), (18.0, 3)]);
        assert_eq!(expr, json!(["interpolate", ["linear"], ["zoom"], 0.0, 1, 18.0, 3]));
    }

    #[test]
    fn test_nested_get() {
        let expr = interpolate_linear(get("mag"), [(0.0, 0.0), (6.0, 1.0)]);
        assert_eq!(expr[2], json!(["get", "mag"]));
        assert_eq!(eq(get("kind"), "poi"), json!(["==", ["get", "kind"], "poi"]));
    }
}
