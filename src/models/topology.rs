//! Linear stop topology.
//!
//! Stops form a single ordered line. The distance between two stops is the
//! difference of their positions, and the vehicle always moves one stop at a
//! time toward its target.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{DispatchError, DispatchResult};

/// Position of a stop in the topology.
///
/// Ordering follows the stop sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopId(usize);

impl StopId {
    pub fn new(idx: usize) -> Self {
        Self(idx)
    }

    /// Zero-based position in the sequence.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An ordered, immutable sequence of named stops.
///
/// # Example
/// ```
/// use shuttle_dispatch::models::Topology;
///
/// let line = Topology::new(["A", "B", "C", "D"]).unwrap();
/// let a = line.stop("A").unwrap();
/// let d = line.stop("D").unwrap();
/// assert_eq!(line.distance(a, d).unwrap(), 3);
/// assert_eq!(line.name(line.neighbor(a, d).unwrap()), Some("B"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Topology {
    names: Vec<String>,
    index: HashMap<String, StopId>,
}

impl Topology {
    /// Builds a topology from stop names in line order.
    ///
    /// Fails with `InvalidTopology` on an empty sequence, a blank name or a
    /// repeated name.
    pub fn new<I, S>(names: I) -> DispatchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DispatchError::InvalidTopology(
                "at least one stop is required".into(),
            ));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(DispatchError::InvalidTopology(format!(
                    "stop at position {pos} has an empty name"
                )));
            }
            if index.insert(name.clone(), StopId(pos)).is_some() {
                return Err(DispatchError::InvalidTopology(format!(
                    "duplicate stop name '{name}'"
                )));
            }
        }

        Ok(Self { names, index })
    }

    /// Number of stops.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The first stop of the line, where the vehicle starts.
    pub fn first(&self) -> StopId {
        StopId(0)
    }

    /// Resolves a stop name.
    pub fn stop(&self, name: &str) -> DispatchResult<StopId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| DispatchError::InvalidStop(name.to_string()))
    }

    /// Name of a stop, `None` if the id is out of range.
    pub fn name(&self, stop: StopId) -> Option<&str> {
        self.names.get(stop.0).map(String::as_str)
    }

    /// Whether the id denotes a stop of this topology.
    pub fn contains(&self, stop: StopId) -> bool {
        stop.0 < self.names.len()
    }

    /// All stops in line order.
    pub fn stops(&self) -> impl Iterator<Item = StopId> + '_ {
        (0..self.names.len()).map(StopId)
    }

    /// Checks that `stop` belongs to this topology.
    pub fn check(&self, stop: StopId) -> DispatchResult<StopId> {
        if self.contains(stop) {
            Ok(stop)
        } else {
            Err(DispatchError::InvalidStop(stop.to_string()))
        }
    }

    /// `|index(a) - index(b)|`.
    pub fn distance(&self, a: StopId, b: StopId) -> DispatchResult<usize> {
        self.check(a)?;
        self.check(b)?;
        Ok(span(a, b))
    }

    /// Adjacent stop on the way from `current` toward `towards`.
    ///
    /// Returns `current` when both are the same stop.
    pub fn neighbor(&self, current: StopId, towards: StopId) -> DispatchResult<StopId> {
        self.check(current)?;
        self.check(towards)?;
        Ok(match current.cmp(&towards) {
            std::cmp::Ordering::Less => StopId(current.0 + 1),
            std::cmp::Ordering::Greater => StopId(current.0 - 1),
            std::cmp::Ordering::Equal => current,
        })
    }

    /// Human-readable label for logs: the name, or the raw id if unknown.
    pub fn label(&self, stop: StopId) -> String {
        self.name(stop)
            .map(str::to_string)
            .unwrap_or_else(|| stop.to_string())
    }
}

/// Distance between two stops already known to be valid.
#[inline]
fn span(a: StopId, b: StopId) -> usize {
    a.0.abs_diff(b.0)
}

impl TryFrom<Vec<String>> for Topology {
    type Error = DispatchError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(names)
    }
}

impl From<Topology> for Vec<String> {
    fn from(topology: Topology) -> Self {
        topology.names
    }
}

impl Default for Topology {
    /// The four-stop line `A, B, C, D`.
    fn default() -> Self {
        let names: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.clone(), StopId(pos)))
            .collect();
        Self { names, index }
    }
}
