use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Field-name suffixes of reference placeholders, which never take part in comparisons.
const AUXILIARY_SUFFIXES: &[&str] = &["Ref", "Refs", "Selector"];

/// Copies observed values into unset spec fields and remembers whether anything changed.
///
/// A field is only ever assigned while it is unset, so re-running against the same observation is
/// a no-op and a user's later edit is never overwritten.
#[derive(Debug, Default)]
pub struct LateInitializer {
    changed: bool,
}

impl LateInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option<T>(&mut self, field: &mut Option<T>, observed: Option<T>) {
        if field.is_none() && observed.is_some() {
            *field = observed;
            self.changed = true;
        }
    }

    pub fn vec<T>(&mut self, field: &mut Vec<T>, observed: Vec<T>) {
        if field.is_empty() && !observed.is_empty() {
            *field = observed;
            self.changed = true;
        }
    }

    /// Like `option`, but an empty observed map counts as unset.
    pub fn map(
        &mut self,
        field: &mut Option<BTreeMap<String, String>>,
        observed: BTreeMap<String, String>,
    ) {
        if !observed.is_empty() {
            self.option(field, Some(observed));
        }
    }

    /// Whether any field was assigned.
    pub fn changed(&self) -> bool {
        self.changed
    }
}

/// Whether two parameter sets describe the same desired state.
///
/// Both sides are compared as JSON with reference/selector fields dropped, unset values and empty
/// collections treated alike, and every list compared without regard to order.
pub fn equivalent<T: Serialize>(desired: &T, current: &T) -> bool {
    match (serde_json::to_value(desired), serde_json::to_value(current)) {
        (Ok(desired), Ok(current)) => normalize(desired) == normalize(current),
        _ => false,
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| !AUXILIARY_SUFFIXES.iter().any(|s| k.ends_with(s)))
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect(),
        ),
        Value::Array(items) => {
            let mut items: Vec<Value> = items
                .into_iter()
                .map(normalize)
                .filter(|v| !is_empty(v))
                .collect();
            items.sort_by_key(|v| v.to_string());
            Value::Array(items)
        }
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use models::managed::Reference;
    use serde::Serialize;

    #[derive(Serialize, Default, Clone)]
    #[serde(rename_all = "camelCase")]
    struct Params {
        version: Option<String>,
        subnets: Vec<String>,
        subnet_refs: Option<Vec<Reference>>,
        labels: Option<BTreeMap<String, String>>,
    }

    #[test]
    fn test_late_initializer_only_fills_unset_fields() {
        let mut params = Params {
            version: Some("1.29".to_string()),
            ..Default::default()
        };

        let mut li = LateInitializer::new();
        li.option(&mut params.version, Some("1.30".to_string()));
        assert!(!li.changed());
        li.vec(&mut params.subnets, vec!["subnet-a".to_string()]);
        li.map(&mut params.labels, btreemap! {});
        assert!(li.changed());
        assert_eq!(params.version.as_deref(), Some("1.29"));
        assert_eq!(params.subnets, vec!["subnet-a".to_string()]);
        assert_eq!(params.labels, None);

        let mut again = LateInitializer::new();
        again.vec(&mut params.subnets, vec!["subnet-b".to_string()]);
        assert!(!again.changed());
    }

    #[test]
    fn test_equivalent() {
        let base = Params {
            version: Some("1.29".to_string()),
            subnets: vec!["a".to_string(), "b".to_string()],
            subnet_refs: None,
            labels: None,
        };

        let test_cases = vec![
            (base.clone(), true),
            (
                Params {
                    subnets: vec!["b".to_string(), "a".to_string()],
                    ..base.clone()
                },
                true,
            ),
            (
                Params {
                    subnet_refs: Some(vec![Reference::new("subnet")]),
                    ..base.clone()
                },
                true,
            ),
            (
                Params {
                    labels: Some(btreemap! {}),
                    ..base.clone()
                },
                true,
            ),
            (
                Params {
                    version: Some("1.30".to_string()),
                    ..base.clone()
                },
                false,
            ),
            (
                Params {
                    subnets: vec!["a".to_string()],
                    ..base.clone()
                },
                false,
            ),
        ];

        for (other, expected) in test_cases {
            assert_eq!(equivalent(&other, &base), expected);
        }
    }
}
