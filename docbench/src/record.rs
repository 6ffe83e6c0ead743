//! Generation of synthetic [`Record`]s and their identifiers.
//!
//! Every record has [`FIELD_COUNT`] fields named `data0` to `data19`. Each value is a string of
//! [`VALUE_LEN`] lowercase hex characters, assembled from four random 128-bit blocks. All fields
//! of a record share the same four blocks, but every field concatenates them in a different order,
//! so no two values within a record are equal.

use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// The number of fields of every generated record.
pub const FIELD_COUNT: usize = 20;

/// The length of every field value, in characters.
pub const VALUE_LEN: usize = 128;

/// Distinct orderings of the four blocks, one per field.
const ORDERINGS: [[usize; 4]; FIELD_COUNT] = [
    [0, 1, 2, 3],
    [0, 1, 3, 2],
    [0, 2, 1, 3],
    [0, 2, 3, 1],
    [0, 3, 1, 2],
    [0, 3, 2, 1],
    [1, 0, 2, 3],
    [1, 0, 3, 2],
    [1, 2, 0, 3],
    [1, 2, 3, 0],
    [1, 3, 0, 2],
    [1, 3, 2, 0],
    [2, 0, 1, 3],
    [2, 0, 3, 1],
    [2, 1, 0, 3],
    [2, 1, 3, 0],
    [2, 3, 0, 1],
    [2, 3, 1, 0],
    [3, 0, 1, 2],
    [3, 0, 2, 1],
];

/// Returns the name of the field with the given index, such as `data7`.
pub fn field_name(index: usize) -> String {
    format!("data{index}")
}

/// Generates a new globally unique document identifier.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A synthetic document: a flat map from field names to string values.
///
/// Serializes as a JSON object with the fields `data0` to `data19`.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    /// Creates a record from the values of its fields, in field index order.
    pub fn from_values(values: Vec<String>) -> Self {
        Self { values }
    }

    /// Returns the value of the field with the given index.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// Iterates over `(index, value)` pairs in field order.
    pub fn values(&self) -> impl Iterator<Item = (usize, &str)> {
        self.values.iter().map(String::as_str).enumerate()
    }

    /// Iterates over `(name, value)` pairs in field order.
    pub fn fields(&self) -> impl Iterator<Item = (String, &str)> {
        self.values().map(|(index, value)| (field_name(index), value))
    }

    /// The number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.fields()).finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(&name, value)?;
        }
        map.end()
    }
}

/// A record paired with the identifier it is written under.
///
/// The record is shared so that it can be kept for the record log while the document is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// The unique identifier of the document.
    pub id: String,
    /// The contents of the document.
    pub record: Arc<Record>,
}

impl Document {
    /// Generates a fresh document with a new identifier.
    pub fn generate(generator: &mut RecordGenerator) -> Self {
        Self {
            id: generate_id(),
            record: Arc::new(generator.record()),
        }
    }
}

/// Generates random [`Record`]s.
///
/// The generator owns its randomness source and never blocks or fails.
#[derive(Debug, Clone)]
pub struct RecordGenerator {
    rng: SmallRng,
}

impl RecordGenerator {
    /// Creates a generator seeded from OS entropy mixed with the current time in nanoseconds.
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos() as u64);
        Self::seeded(rand::random::<u64>() ^ nanos)
    }

    /// Creates a generator with a fixed seed, producing a reproducible sequence of records.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Generates the next record.
    pub fn record(&mut self) -> Record {
        let blocks: [String; 4] =
            std::array::from_fn(|_| format!("{:032x}", self.rng.random::<u128>()));

        let values = ORDERINGS
            .iter()
            .map(|ordering| ordering.iter().map(|&block| blocks[block].as_str()).collect())
            .collect();

        Record { values }
    }
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new()
    }
}
