//! Per-run progress events.
//!
//! The pipeline emits one event per state transition to the run's sink.
//! Sink failures are logged by the pipeline and never change the outcome.

use std::sync::mpsc::Sender;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::extraction::ExtractionResult;
use crate::models::enums::ExtractionStatus;

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Progress receiver disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub report_id: Uuid,
    pub status: ExtractionStatus,
    pub message: Option<String>,
    /// Attached to the final `completed` event.
    pub result: Option<ExtractionResult>,
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn status(report_id: Uuid, status: ExtractionStatus, message: &str) -> Self {
        Self {
            report_id,
            status,
            message: Some(message.to_string()),
            result: None,
            error: None,
        }
    }

    pub fn completed(report_id: Uuid, message: &str, result: ExtractionResult) -> Self {
        Self {
            result: Some(result),
            ..Self::status(report_id, ExtractionStatus::Completed, message)
        }
    }

    pub fn failed(report_id: Uuid, error: &str) -> Self {
        Self {
            report_id,
            status: ExtractionStatus::Failed,
            message: None,
            result: None,
            error: Some(error.to_string()),
        }
    }
}

/// Receives a run's progress events in order.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent) -> Result<(), ProgressError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: ProgressEvent) -> Result<(), ProgressError> {
        Ok(())
    }
}

impl ProgressSink for Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) -> Result<(), ProgressError> {
        self.send(event).map_err(|_| ProgressError::Disconnected)
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(ProgressEvent),
{
    fn emit(&self, event: ProgressEvent) -> Result<(), ProgressError> {
        (self.0)(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc;

    #[test]
    fn channel_sink_delivers_in_order() {
        let (tx, rx) = mpsc::channel();
        let id = Uuid::new_v4();
        tx.emit(ProgressEvent::status(id, ExtractionStatus::Extracting, "Reading"))
            .unwrap();
        tx.emit(ProgressEvent::failed(id, "boom")).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ExtractionStatus::Extracting);
        assert_eq!(events[1].error.as_deref(), Some("boom"));
    }

    #[test]
    fn dropped_receiver_is_disconnected() {
        let (tx, rx) = mpsc::channel::<ProgressEvent>();
        drop(rx);
        let err = tx
            .emit(ProgressEvent::status(Uuid::new_v4(), ExtractionStatus::Saving, "x"))
            .unwrap_err();
        assert!(matches!(err, ProgressError::Disconnected));
    }

    #[test]
    fn fn_sink_calls_closure() {
        let seen = RefCell::new(Vec::new());
        let sink = FnSink(|e: ProgressEvent| seen.borrow_mut().push(e.status));
        sink.emit(ProgressEvent::completed(
            Uuid::new_v4(),
            "done",
            ExtractionResult::empty(),
        ))
        .unwrap();
        assert_eq!(*seen.borrow(), vec![ExtractionStatus::Completed]);
    }

    #[test]
    fn event_serializes_camel_case() {
        let event = ProgressEvent::status(Uuid::nil(), ExtractionStatus::Extracting, "Reading");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reportId"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["status"], "extracting");
    }
}
