//! Feature filter expressions used by rendered-feature queries.
//!
//! Both the legacy form (`["==", "kind", "poi"]`) and the expression form
//! (`["==", ["get", "kind"], "poi"]`) are accepted. Supported operators are
//! `==`, `!=`, `has`, `!has`, `in`, `!in`, `all`, `any`, `none` and `!`.
//! In the legacy form the keys `$type` and `$id` select the geometry type
//! and the feature id.

use geojson::{feature::Id, Feature, Value as GeoValue};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while compiling a filter expression.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("Filter must be a list or a bool, got {0}")]
    NotAList(String),

    #[error("Empty filter expression")]
    Empty,

    #[error("Unsupported filter operator '{0}'")]
    UnsupportedOperator(String),

    #[error("Operator '{op}' expects {expected}")]
    Arity { op: String, expected: &'static str },

    #[error("Unsupported accessor {0}")]
    BadAccessor(String),
}

/// What a comparison reads from the feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Property(String),
    GeometryType,
    Id,
}

impl Accessor {
    fn parse(value: &Value) -> Result<Self, FilterError> {
        match value {
            Value::String(key) => Ok(match key.as_str() {
                "$type" => Accessor::GeometryType,
                "$id" => Accessor::Id,
                _ => Accessor::Property(key.clone()),
            }),
            Value::Array(list) => match (list.first().and_then(Value::as_str), list.get(1)) {
                (Some("get"), Some(Value::String(key))) if list.len() == 2 => {
                    Ok(Accessor::Property(key.clone()))
                }
                (Some("geometry-type"), None) => Ok(Accessor::GeometryType),
                (Some("id"), None) => Ok(Accessor::Id),
                _ => Err(FilterError::BadAccessor(value.to_string())),
            },
            other => Err(FilterError::BadAccessor(other.to_string())),
        }
    }

    fn read(&self, feature: &Feature) -> Option<Value> {
        match self {
            Accessor::Property(key) => feature
                .properties
                .as_ref()
                .and_then(|p| p.get(key))
                .cloned(),
            Accessor::GeometryType => feature
                .geometry
                .as_ref()
                .map(|g| Value::String(geometry_type(&g.value).to_string())),
            Accessor::Id => feature.id.as_ref().map(|id| match id {
                Id::String(s) => Value::String(s.clone()),
                Id::Number(n) => Value::Number(n.clone()),
            }),
        }
    }
}

/// Geometry type name as the filter language spells it.
fn geometry_type(value: &GeoValue) -> &'static str {
    match value {
        GeoValue::Point(_) | GeoValue::MultiPoint(_) => "Point",
        GeoValue::LineString(_) | GeoValue::MultiLineString(_) => "LineString",
        GeoValue::Polygon(_) | GeoValue::MultiPolygon(_) => "Polygon",
        GeoValue::GeometryCollection(_) => "GeometryCollection",
    }
}

/// A compiled filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureFilter {
    Literal(bool),
    Eq(Accessor, Value),
    Ne(Accessor, Value),
    Has(Accessor),
    NotHas(Accessor),
    In(Accessor, Vec<Value>),
    NotIn(Accessor, Vec<Value>),
    All(Vec<FeatureFilter>),
    Any(Vec<FeatureFilter>),
    None(Vec<FeatureFilter>),
    Not(Box<FeatureFilter>),
}

impl FeatureFilter {
    /// Compiles a JSON filter expression.
    pub fn parse(value: &Value) -> Result<Self, FilterError> {
        let list = match value {
            Value::Bool(b) => return Ok(FeatureFilter::Literal(*b)),
            Value::Array(list) => list,
            other => return Err(FilterError::NotAList(other.to_string())),
        };
        let op = list
            .first()
            .and_then(Value::as_str)
            .ok_or(FilterError::Empty)?;
        let args = &list[1..];

        let arity = |expected: &'static str| FilterError::Arity {
            op: op.to_string(),
            expected,
        };

        let filter = match op {
            "==" | "!=" => {
                if args.len() != 2 {
                    return Err(arity("two operands"));
                }
                let (accessor, operand) = comparison_operands(&args[0], &args[1])?;
                if op == "==" {
                    FeatureFilter::Eq(accessor, operand)
                } else {
                    FeatureFilter::Ne(accessor, operand)
                }
            }
            "has" | "!has" => {
                if args.len() != 1 {
                    return Err(arity("one key"));
                }
                let accessor = Accessor::parse(&args[0])?;
                if op == "has" {
                    FeatureFilter::Has(accessor)
                } else {
                    FeatureFilter::NotHas(accessor)
                }
            }
            "in" | "!in" => {
                if args.is_empty() {
                    return Err(arity("a key and values"));
                }
                let accessor = Accessor::parse(&args[0])?;
                let values = match &args[1..] {
                    [Value::Array(lit)] if lit.first().and_then(Value::as_str) == Some("literal") => lit
                        .get(1)
                        .and_then(Value::as_array)
                        .cloned()
                        .ok_or_else(|| arity("a literal list"))?,
                    rest => rest.to_vec(),
                };
                if op == "in" {
                    FeatureFilter::In(accessor, values)
                } else {
                    FeatureFilter::NotIn(accessor, values)
                }
            }
            "all" | "any" | "none" => {
                let children = args.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                match op {
                    "all" => FeatureFilter::All(children),
                    "any" => FeatureFilter::Any(children),
                    _ => FeatureFilter::None(children),
                }
            }
            "!" => {
                if args.len() != 1 {
                    return Err(arity("one operand"));
                }
                FeatureFilter::Not(Box::new(Self::parse(&args[0])?))
            }
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        };
        Ok(filter)
    }

    /// Evaluates the filter against one feature.
    pub fn evaluate(&self, feature: &Feature) -> bool {
        match self {
            FeatureFilter::Literal(b) => *b,
            FeatureFilter::Eq(accessor, expected) => accessor
                .read(feature)
                .map_or(false, |actual| values_equal(&actual, expected)),
            FeatureFilter::Ne(accessor, expected) => !accessor
                .read(feature)
                .map_or(false, |actual| values_equal(&actual, expected)),
            FeatureFilter::Has(accessor) => accessor.read(feature).is_some(),
            FeatureFilter::NotHas(accessor) => accessor.read(feature).is_none(),
            FeatureFilter::In(accessor, values) => accessor
                .read(feature)
                .map_or(false, |actual| values.iter().any(|v| values_equal(&actual, v))),
            FeatureFilter::NotIn(accessor, values) => !accessor
                .read(feature)
                .map_or(false, |actual| values.iter().any(|v| values_equal(&actual, v))),
            FeatureFilter::All(children) => children.iter().all(|c| c.evaluate(feature)),
            FeatureFilter::Any(children) => children.iter().any(|c| c.evaluate(feature)),
            FeatureFilter::None(children) => !children.iter().any(|c| c.evaluate(feature)),
            FeatureFilter::Not(child) => !child.evaluate(feature),
        }
    }

    /// Human-readable form for logs.
    pub fn describe(&self) -> String {
        let join = |children: &[FeatureFilter]| {
            children.iter().map(|c| c.describe()).collect::<Vec<_>>().join(", ")
        };
        match self {
            FeatureFilter::Literal(b) => b.to_string(),
            FeatureFilter::Eq(a, v) => format!("{:?} == {}", a, v),
            FeatureFilter::Ne(a, v) => format!("{:?} != {}", a, v),
            FeatureFilter::Has(a) => format!("has({:?})", a),
            FeatureFilter::NotHas(a) => format!("!has({:?})", a),
            FeatureFilter::In(a, vs) => format!("{:?} in {:?}", a, vs),
            FeatureFilter::NotIn(a, vs) => format!("{:?} !in {:?}", a, vs),
            FeatureFilter::All(c) => format!("ALL({})", join(c)),
            FeatureFilter::Any(c) => format!("ANY({})", join(c)),
            FeatureFilter::None(c) => format!("NONE({})", join(c)),
            FeatureFilter::Not(c) => format!("NOT({})", c.describe()),
        }
    }
}

/// Accepts `[accessor, value]` and `[value, accessor]`.
fn comparison_operands(lhs: &Value, rhs: &Value) -> Result<(Accessor, Value), FilterError> {
    let is_get = |v: &Value| matches!(v.as_array().and_then(|l| l.first()).and_then(Value::as_str), Some("get" | "geometry-type" | "id"));
    if !is_get(lhs) && is_get(rhs) {
        Ok((Accessor::parse(rhs)?, lhs.clone()))
    } else {
        Ok((Accessor::parse(lhs)?, rhs.clone()))
    }
}

/// JSON equality with integers and floats compared numerically.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::Geometry;
    use serde_json::json;

    fn poi(kind: &str, mag: f64) -> Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("kind".into(), json!(kind));
        properties.insert("mag".into(), json!(mag));
        Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeoValue::Point(vec![13.4, 52.5]))),
            id: Some(Id::String("poi-1".into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }

    #[test]
    fn test_equality_forms() {
        let feature = poi("police", 2.0);
        let legacy = FeatureFilter::parse(&json!(["==", "kind", "police"])).unwrap();
        let expression = FeatureFilter::parse(&json!(["==", ["get", "kind"], "police"])).unwrap();
        let reversed = FeatureFilter::parse(&json!(["==", "police", ["get", "kind"]])).unwrap();
        assert!(legacy.evaluate(&feature));
        assert!(expression.evaluate(&feature));
        assert!(reversed.evaluate(&feature));

        let numeric = FeatureFilter::parse(&json!(["==", "mag", 2])).unwrap();
        assert!(numeric.evaluate(&feature));

        let ne = FeatureFilter::parse(&json!(["!=", "kind", "embassy"])).unwrap();
        assert!(ne.evaluate(&feature));
    }

    #[test]
    fn test_has_and_in() {
        let feature = poi("embassy", 1.0);
        assert!(FeatureFilter::parse(&json!(["has", "mag"])).unwrap().evaluate(&feature));
        assert!(FeatureFilter::parse(&json!(["!has", "name"])).unwrap().evaluate(&feature));
        assert!(FeatureFilter::parse(&json!(["in", "kind", "police", "embassy"]))
            .unwrap()
            .evaluate(&feature));
        assert!(FeatureFilter::parse(&json!(["in", ["get", "kind"], ["literal", ["embassy"]]]))
            .unwrap()
            .evaluate(&feature));
        assert!(!FeatureFilter::parse(&json!(["!in", "kind", "embassy"]))
            .unwrap()
            .evaluate(&feature));
    }

    #[test]
    fn test_combinators_and_specials() {
        let feature = poi("police", 5.0);
        let filter = FeatureFilter::parse(&json!([
            "all",
            ["==", "$type", "Point"],
            ["any", ["==", "kind", "embassy"], ["==", "$id", "poi-1"]],
            ["none", ["has", "hidden"]],
            ["!", ["==", "mag", 1]]
        ]))
        .unwrap();
        assert!(filter.evaluate(&feature));
        assert!(filter.describe().starts_with("ALL("));
    }

    #[test]
    fn test_rejects_unsupported() {
        assert_eq!(
            FeatureFilter::parse(&json!([">", "mag", 1])),
            Err(FilterError::UnsupportedOperator(">".into()))
        );
        assert_eq!(FeatureFilter::parse(&json!([])), Err(FilterError::Empty));
        assert!(FeatureFilter::parse(&json!("kind")).is_err());
        assert!(FeatureFilter::parse(&json!(["==", "kind"])).is_err());
        assert_eq!(FeatureFilter::parse(&json!(true)), Ok(FeatureFilter::Literal(true)));
    }
}
