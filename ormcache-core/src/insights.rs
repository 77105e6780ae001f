//! Best-effort observability events emitted by the coordinator.
//!
//! Insights are informational only: a consumer that never subscribes to
//! them must see identical cache behavior to one that does, and a slow or
//! panicking subscriber must never affect `execute_read`/`execute_write`.

use crate::shape::ShapeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InsightEvent {
    Hit {
        shape_id: ShapeId,
        timestamp: DateTime<Utc>,
    },
    Miss {
        shape_id: ShapeId,
        timestamp: DateTime<Utc>,
        dependencies_summary: DependenciesSummary,
    },
    Evict {
        shape_id: ShapeId,
        timestamp: DateTime<Utc>,
    },
}

/// A coarse summary of the dependencies the engine registered for a query,
/// as reported by `add_query`. Carried on `miss` events only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesSummary {
    pub model_count: u64,
    pub record_count: u64,
}

impl InsightEvent {
    pub fn shape_id(&self) -> &ShapeId {
        match self {
            Self::Hit { shape_id, .. } | Self::Miss { shape_id, .. } | Self::Evict { shape_id, .. } => shape_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Hit { timestamp, .. } | Self::Miss { timestamp, .. } | Self::Evict { timestamp, .. } => *timestamp,
        }
    }
}
