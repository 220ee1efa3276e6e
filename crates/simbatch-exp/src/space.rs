use std::iter::FusedIterator;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use simbatch_core::{BatchError, ErrorInfo};

/// One named sweep dimension with a fixed, ordered list of candidate values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    name: String,
    values: Vec<Value>,
}

impl Axis {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully resolved combination: exactly one value per declared axis, keyed in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterPoint(IndexMap<String, Value>);

impl ParameterPoint {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParameterPoint {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Ordered set of axes whose cartesian product defines a campaign.
///
/// Enumeration behaves like a mixed-radix counter in which the last declared
/// axis varies fastest, the same order as nested loops with the first
/// declared axis outermost.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterSpace {
    axes: Vec<Axis>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a new axis. Values are stored exactly as given.
    pub fn add_axis<I, V>(&mut self, name: impl Into<String>, values: I) -> Result<(), BatchError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let name = name.into();
        if self.axis(&name).is_some() {
            return Err(BatchError::AxisNameConflict(
                ErrorInfo::new("space.axis_conflict", "axis already declared")
                    .with_context("name", name),
            ));
        }
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(BatchError::InvalidAxis(
                ErrorInfo::new("space.axis_empty", "axis requires at least one value")
                    .with_context("name", name),
            ));
        }
        let addressable = self
            .axes
            .iter()
            .try_fold(values.len(), |acc, axis| acc.checked_mul(axis.len()));
        if addressable.is_none() {
            return Err(BatchError::InvalidAxis(
                ErrorInfo::new("space.too_large", "number of points exceeds usize::MAX")
                    .with_context("name", name)
                    .with_context("axes", (self.axes.len() + 1).to_string()),
            ));
        }
        self.axes.push(Axis { name, values });
        Ok(())
    }

    /// Declares a single-valued axis.
    pub fn add_fixed(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), BatchError> {
        self.add_axis(name, std::iter::once(value.into()))
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.name == name)
    }

    /// Product of every axis length, `0` when no axis is declared.
    ///
    /// [`ParameterSpace::add_axis`] rejects axes whose product would not fit
    /// in `usize`, so this never overflows.
    pub fn size(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.iter().map(Axis::len).product()
    }

    /// Decodes the point at enumeration position `index`.
    pub fn point(&self, index: usize) -> Option<ParameterPoint> {
        if index >= self.size() {
            return None;
        }
        let mut digits = vec![0usize; self.axes.len()];
        let mut rest = index;
        for (slot, axis) in digits.iter_mut().zip(&self.axes).rev() {
            *slot = rest % axis.len();
            rest /= axis.len();
        }
        let values = self
            .axes
            .iter()
            .zip(digits)
            .map(|(axis, digit)| (axis.name.clone(), axis.values[digit].clone()))
            .collect();
        Some(ParameterPoint(values))
    }

    /// Lazily yields every point in enumeration order. Each call starts over.
    pub fn enumerate(&self) -> Points<'_> {
        Points {
            space: self,
            next: 0,
            end: self.size(),
        }
    }
}

/// Iterator returned by [`ParameterSpace::enumerate`].
#[derive(Debug, Clone)]
pub struct Points<'a> {
    space: &'a ParameterSpace,
    next: usize,
    end: usize,
}

impl Iterator for Points<'_> {
    type Item = ParameterPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let point = self.space.point(self.next);
        self.next += 1;
        point
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Points<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        self.end -= 1;
        self.space.point(self.end)
    }
}

impl ExactSizeIterator for Points<'_> {}

impl FusedIterator for Points<'_> {}
