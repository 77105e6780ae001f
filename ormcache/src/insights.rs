//! The best-effort subscriber hook for [`InsightEvent`]s.

use ormcache_core::InsightEvent;

/// Receives cache insight events. Implementations must be cheap and
/// non-blocking: the coordinator calls this inline on the hot path and a
/// slow or panicking sink must never be allowed to affect
/// `execute_read`/`execute_write` behavior.
pub trait InsightSink: Send + Sync {
    fn emit(&self, event: InsightEvent);
}

/// The default sink: drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInsightSink;

impl InsightSink for NoopInsightSink {
    fn emit(&self, _event: InsightEvent) {}
}

impl<F> InsightSink for F
where
    F: Fn(InsightEvent) + Send + Sync,
{
    fn emit(&self, event: InsightEvent) {
        self(event)
    }
}
