//! Dot-separated paths addressing values inside a guild record.

use std::{fmt, str::FromStr};

use serde_json::{Map, Value};

use crate::dao::storage::StoreError;

/// Dot-separated location of a value inside a guild record, e.g. `players.456`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityPath(Vec<String>);

impl EntityPath {
    /// Build a path from already separated segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty() || s.contains('.')) {
            return Err(StoreError::InvalidPath(segments.join(".")));
        }
        Ok(Self(segments))
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Value at this path, if every segment exists.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(root, |node, segment| node.as_object()?.get(segment))
    }

    /// Store `value` at this path, creating intermediate objects as needed.
    ///
    /// Fails when an existing intermediate value is not an object.
    pub fn assign(&self, root: &mut Value, value: Value) -> Result<(), StoreError> {
        let (last, parents) = self
            .0
            .split_last()
            .ok_or_else(|| StoreError::InvalidPath(self.to_string()))?;

        let mut node = root;
        for segment in parents {
            let object = node
                .as_object_mut()
                .ok_or_else(|| StoreError::InvalidPath(self.to_string()))?;
            node = object
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        let object = node
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidPath(self.to_string()))?;
        object.insert(last.clone(), value);
        Ok(())
    }
}

impl FromStr for EntityPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(StoreError::InvalidPath(s.to_owned()));
        }
        Self::from_segments(s.split('.'))
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_and_displays() {
        let path: EntityPath = "players.456.safari".parse().unwrap();
        assert_eq!(path.segments(), ["players", "456", "safari"]);
        assert_eq!(path.to_string(), "players.456.safari");
    }

    #[test]
    fn rejects_empty_segments() {
        for raw in ["", ".", "players.", ".players", "players..456"] {
            assert!(raw.parse::<EntityPath>().is_err(), "{raw:?} should fail");
        }
    }

    #[test]
    fn resolve_walks_objects_only() {
        let guild = json!({"players": {"456": {"age": "21"}}, "list": [1, 2]});

        let age: EntityPath = "players.456.age".parse().unwrap();
        assert_eq!(age.resolve(&guild), Some(&json!("21")));

        let missing: EntityPath = "players.789".parse().unwrap();
        assert_eq!(missing.resolve(&guild), None);

        let through_array: EntityPath = "list.0".parse().unwrap();
        assert_eq!(through_array.resolve(&guild), None);
    }

    #[test]
    fn assign_creates_intermediate_objects() {
        let mut guild = json!({"players": {}});
        let path: EntityPath = "players.456.safari.currency".parse().unwrap();

        path.assign(&mut guild, json!(100)).unwrap();

        assert_eq!(guild, json!({"players": {"456": {"safari": {"currency": 100}}}}));
    }

    #[test]
    fn assign_refuses_to_overwrite_scalars_on_the_way() {
        let mut guild = json!({"players": {"456": "legacy"}});
        let path: EntityPath = "players.456.age".parse().unwrap();

        assert!(path.assign(&mut guild, json!("21")).is_err());
        assert_eq!(guild["players"]["456"], "legacy");
    }
}
