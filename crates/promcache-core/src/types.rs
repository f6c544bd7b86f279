//! Query value model: labels, points, series, and typed query results.
//!
//! Mirrors the shapes a PromQL engine hands back. Instant queries produce a
//! `Vector` (one sample per label set), range queries a `Matrix` (a sorted
//! point sequence per label set).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single label name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

/// A label set, kept sorted by name so equality means "same series".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(Vec<Label>);

impl Labels {
    pub fn new(mut labels: Vec<Label>) -> Self {
        labels.sort();
        labels.dedup_by(|a, b| a.name == b.name);
        Self(labels)
    }

    /// Build a label set from `(name, value)` pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|(name, value)| Label {
                    name: (*name).to_string(),
                    value: (*value).to_string(),
                })
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Labels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}=\"{}\"", label.name, label.value)?;
        }
        write!(f, "}}")
    }
}

/// A timestamped sample value. Timestamps are milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub t: i64,
    pub v: f64,
}

impl Point {
    pub fn new(t: i64, v: f64) -> Self {
        Self { t, v }
    }
}

/// One label set with its points, sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metric: Labels,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(metric: Labels, points: Vec<Point>) -> Self {
        Self { metric, points }
    }
}

/// Range-query result shape.
pub type Matrix = Vec<Series>;

/// One label set at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: Labels,
    pub point: Point,
}

/// Instant-query result shape.
pub type Vector = Vec<Sample>;

/// A typed query value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum Value {
    Vector(Vector),
    Matrix(Matrix),
    Scalar(Point),
    String { t: i64, value: String },
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Vector(_) => ValueKind::Vector,
            Self::Matrix(_) => ValueKind::Matrix,
            Self::Scalar(_) => ValueKind::Scalar,
            Self::String { .. } => ValueKind::String,
        }
    }
}

/// Value type tag as reported by the query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    None,
    Vector,
    Matrix,
    Scalar,
    String,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Vector => write!(f, "vector"),
            Self::Matrix => write!(f, "matrix"),
            Self::Scalar => write!(f, "scalar"),
            Self::String => write!(f, "string"),
        }
    }
}

/// Result of evaluating a query, as handed over by the query engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl QueryResult {
    pub fn vector(vector: Vector) -> Self {
        Self {
            value: Some(Value::Vector(vector)),
            warnings: Vec::new(),
        }
    }

    pub fn matrix(matrix: Matrix) -> Self {
        Self {
            value: Some(Value::Matrix(matrix)),
            warnings: Vec::new(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.value.as_ref().map_or(ValueKind::None, Value::kind)
    }

    /// Take the value as a matrix.
    pub fn into_matrix(self) -> Result<Matrix> {
        match self.value {
            Some(Value::Matrix(m)) => Ok(m),
            other => Err(Error::MalformedResult(format!(
                "expected matrix, got {}",
                other.as_ref().map_or(ValueKind::None, Value::kind)
            ))),
        }
    }

    /// Take the value as a vector.
    pub fn into_vector(self) -> Result<Vector> {
        match self.value {
            Some(Value::Vector(v)) => Ok(v),
            other => Err(Error::MalformedResult(format!(
                "expected vector, got {}",
                other.as_ref().map_or(ValueKind::None, Value::kind)
            ))),
        }
    }
}

/// Store each sample as a one-point series.
pub fn vector_to_matrix(vector: Vector) -> Matrix {
    vector
        .into_iter()
        .map(|s| Series {
            metric: s.metric,
            points: vec![s.point],
        })
        .collect()
}
