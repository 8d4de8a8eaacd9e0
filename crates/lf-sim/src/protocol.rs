//! Piecewise-constant parameter schedules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// One protocol segment: parameter overrides held for `duration`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub duration: f64,
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

/// Ordered list of segments applied back to back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Protocol {
    segments: Vec<Segment>,
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment. The duration must be strictly positive.
    pub fn segment<I, S>(mut self, duration: f64, overrides: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let segment = Segment {
            duration,
            overrides: overrides.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        };
        check_segment(&segment)?;
        self.segments.push(segment);
        Ok(self)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Start time of every segment, relative to the protocol start.
    pub fn boundaries(&self) -> Vec<f64> {
        self.segments
            .iter()
            .scan(0.0, |t, s| {
                let start = *t;
                *t += s.duration;
                Some(start)
            })
            .collect()
    }

    /// Check every segment, e.g. after deserialization.
    pub fn validate(&self) -> SimResult<()> {
        self.segments.iter().try_for_each(check_segment)
    }
}

fn check_segment(segment: &Segment) -> SimResult<()> {
    if !(segment.duration.is_finite() && segment.duration > 0.0) {
        return Err(SimError::InvalidArg {
            what: format!(
                "protocol segment duration must be positive, got {}",
                segment.duration
            ),
        });
    }
    if let Some((name, v)) = segment.overrides.iter().find(|(_, v)| !v.is_finite()) {
        return Err(SimError::InvalidArg {
            what: format!("non-finite override {name} = {v}"),
        });
    }
    Ok(())
}
