//! Per-entity, time-ordered sample sequences.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{EntityId, Sample, Timestamp};

/// Ordered samples for one entity.
///
/// Timestamps are non-decreasing. Ties are allowed and keep their input
/// order. A trajectory is rebuilt for every analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    entity_id: EntityId,
    samples: Vec<Sample>,
}

impl Trajectory {
    /// Build from samples that must already be in timestamp order.
    ///
    /// Fails with `InvalidCoordinate` on the first bad fix and with
    /// `UnsortedTrajectory` on the first timestamp that goes backwards.
    pub fn from_sorted(
        entity_id: impl Into<EntityId>,
        samples: Vec<Sample>,
    ) -> Result<Self, CoreError> {
        let entity_id = entity_id.into();
        for sample in &samples {
            sample.coordinate.validate()?;
        }
        check_order(&entity_id, &samples, TimeOrder::NonDecreasing)?;
        Ok(Self { entity_id, samples })
    }

    /// Build from samples in arbitrary order, sorting them stably by time.
    pub fn from_unsorted(
        entity_id: impl Into<EntityId>,
        mut samples: Vec<Sample>,
    ) -> Result<Self, CoreError> {
        samples.sort_by_key(|s| s.timestamp);
        Self::from_sorted(entity_id, samples)
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Latest sample at or before `instant`, if any.
    pub fn latest_at(&self, instant: Timestamp) -> Option<&Sample> {
        let end = self.samples.partition_point(|s| s.timestamp <= instant);
        end.checked_sub(1).map(|i| &self.samples[i])
    }
}

/// How strictly consecutive timestamps must increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrder {
    /// Equal timestamps allowed.
    NonDecreasing,
    /// Every timestamp must be later than its predecessor.
    StrictlyIncreasing,
}

/// Verify sample order, reporting the index of the first offending sample.
pub fn check_order(
    entity_id: &str,
    samples: &[Sample],
    ordering: TimeOrder,
) -> Result<(), CoreError> {
    let offending = samples.windows(2).position(|pair| match ordering {
        TimeOrder::NonDecreasing => pair[1].timestamp < pair[0].timestamp,
        TimeOrder::StrictlyIncreasing => pair[1].timestamp <= pair[0].timestamp,
    });
    match offending {
        Some(i) => Err(CoreError::UnsortedTrajectory {
            entity_id: entity_id.to_string(),
            index: i + 1,
        }),
        None => Ok(()),
    }
}
