// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A source location (byte offsets into the pattern code) that produced an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl Location {
    pub fn new(start: usize, end: usize) -> Location {
        Location { start, end }
    }
}

/// Provenance and per-event metadata carried alongside a hap's value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Where in the code this event came from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// Per-event velocity, multiplies the gain of the triggered voice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,

    /// Anything else a producer attached.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Context {
    pub fn with_locations(locations: Vec<Location>) -> Context {
        Context {
            locations,
            ..Default::default()
        }
    }

    /// Merges two contexts. Fields of `other` win, except `locations`, which are
    /// concatenated (ours first).
    pub fn combine(&self, other: &Context) -> Context {
        let mut extra = self.extra.clone();
        for (key, value) in &other.extra {
            extra.insert(key.clone(), value.clone());
        }
        Context {
            locations: self
                .locations
                .iter()
                .chain(other.locations.iter())
                .copied()
                .collect(),
            velocity: other.velocity.or(self.velocity),
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_combine_merges_and_concatenates_locations() {
        let mut a = Context::with_locations(vec![Location::new(0, 2)]);
        a.velocity = Some(0.5);
        a.extra.insert("color".to_string(), json!("red"));
        a.extra.insert("id".to_string(), json!(1));

        let mut b = Context::with_locations(vec![Location::new(5, 7)]);
        b.extra.insert("id".to_string(), json!(2));

        let combined = a.combine(&b);
        assert_eq!(
            combined.locations,
            vec![Location::new(0, 2), Location::new(5, 7)]
        );
        assert_eq!(combined.velocity, Some(0.5));
        assert_eq!(combined.extra.get("color"), Some(&json!("red")));
        assert_eq!(combined.extra.get("id"), Some(&json!(2)));
    }

    #[test]
    fn test_deserialize_with_extra_fields() {
        let context: Context = serde_json::from_value(json!({
            "velocity": 0.7,
            "locations": [{"start": 1, "end": 4}],
            "track": "drums",
        }))
        .unwrap();
        assert_eq!(context.velocity, Some(0.7));
        assert_eq!(context.locations, vec![Location::new(1, 4)]);
        assert_eq!(context.extra.get("track"), Some(&json!("drums")));
    }
}
