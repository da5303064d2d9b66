//! # Trace recording for agent society runs
//!
//! Runs are observable at two levels:
//!
//! - Structured logs through the `tracing` crate, emitted by every module.
//! - An in-memory record of traces and spans, kept by a [`TraceRecorder`], that can
//!   be exported as JSON once a run finishes.
//!
//! A **trace** covers one full run (a leader election, an arena session). A **span**
//! covers one agent executor call inside it. Spans are recorded by wrapping any
//! executor with [`RecordingLayer`]:
//!
//! ```rust
//! use tower::Layer;
//! use tower_agora::executor::MockExecutor;
//! use tower_agora::trace::{RecordingLayer, TraceRecorder};
//!
//! let recorder = TraceRecorder::new();
//! let _executor = RecordingLayer::new(recorder.clone()).layer(MockExecutor::new());
//! assert!(recorder.spans().is_empty());
//! ```
//!
//! The recorder tracks a single active trace; spans recorded while no trace is
//! active get a fresh trace id of their own.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::{BoxError, Layer, Service};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::Result;
use crate::executor::{ExecuteRequest, ExecutionResult};

/// Identifier of one end-to-end run.
pub type TraceId = String;

/// Identifier of one unit of work inside a trace.
pub type SpanId = String;

pub fn gen_trace_id() -> TraceId {
    format!("trace_{}", Uuid::new_v4().simple())
}

pub fn gen_span_id() -> SpanId {
    format!("span_{}", Uuid::new_v4().simple())
}

/// Kind of work a span covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpanKind {
    /// One agent executor call.
    Agent { agent_name: String },
    /// Application-specific work.
    Custom { name: String, data: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub trace_id: TraceId,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    pub span_id: SpanId,
    pub trace_id: TraceId,
    pub kind: SpanKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SpanRecord {
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    traces: Vec<TraceRecord>,
    open: Vec<SpanRecord>,
    finished: Vec<SpanRecord>,
    active: Option<TraceId>,
}

/// Shared, clonable store of traces and finished spans.
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a named trace and make it the active one.
    pub fn begin_trace(&self, name: impl Into<String>) -> TraceId {
        let trace_id = gen_trace_id();
        let name = name.into();
        info!(trace_id = %trace_id, name = %name, "trace started");
        let mut state = self.state();
        state.traces.push(TraceRecord {
            trace_id: trace_id.clone(),
            name,
            started_at: Utc::now(),
            ended_at: None,
        });
        state.active = Some(trace_id.clone());
        trace_id
    }

    pub fn end_trace(&self, trace_id: &str) {
        let mut state = self.state();
        if let Some(t) = state.traces.iter_mut().find(|t| t.trace_id == trace_id) {
            t.ended_at = Some(Utc::now());
        }
        if state.active.as_deref() == Some(trace_id) {
            state.active = None;
        }
        debug!(trace_id = %trace_id, "trace ended");
    }

    /// Run `fut` inside a named trace.
    pub async fn in_trace<F, T>(&self, name: impl Into<String>, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let trace_id = self.begin_trace(name);
        let out = fut.await;
        if let Err(e) = &out {
            error!(trace_id = %trace_id, error = %e, "trace failed");
        }
        self.end_trace(&trace_id);
        out
    }

    pub fn start_span(&self, kind: SpanKind) -> SpanId {
        let span_id = gen_span_id();
        let mut state = self.state();
        let trace_id = state.active.clone().unwrap_or_else(gen_trace_id);
        state.open.push(SpanRecord {
            span_id: span_id.clone(),
            trace_id,
            kind,
            started_at: Utc::now(),
            ended_at: None,
            error: None,
        });
        span_id
    }

    pub fn end_span(&self, span_id: &str) {
        self.finish(span_id, None);
    }

    pub fn fail_span(&self, span_id: &str, error: String) {
        self.finish(span_id, Some(error));
    }

    fn finish(&self, span_id: &str, error: Option<String>) {
        let mut state = self.state();
        if let Some(idx) = state.open.iter().position(|s| s.span_id == span_id) {
            let mut span = state.open.swap_remove(idx);
            span.ended_at = Some(Utc::now());
            span.error = error;
            debug!(span_id = %span_id, duration_ms = ?span.duration_ms(), "span finished");
            state.finished.push(span);
        }
    }

    pub fn traces(&self) -> Vec<TraceRecord> {
        self.state().traces.clone()
    }

    /// Finished spans in completion order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.state().finished.clone()
    }

    /// `{ "traces": [...], "spans": [...] }`
    pub fn export(&self) -> Value {
        let state = self.state();
        json!({
            "traces": state.traces,
            "spans": state.finished,
        })
    }

    /// Write the export as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let body = serde_json::to_string_pretty(&self.export())?;
        std::fs::write(path.as_ref(), body)?;
        info!(path = %path.as_ref().display(), "trace written");
        Ok(())
    }
}

/// Layer recording one span per executor call.
#[derive(Clone)]
pub struct RecordingLayer {
    recorder: TraceRecorder,
}

impl RecordingLayer {
    pub fn new(recorder: TraceRecorder) -> Self {
        Self { recorder }
    }
}

#[derive(Clone)]
pub struct Recording<E> {
    inner: E,
    recorder: TraceRecorder,
}

impl<E> Layer<E> for RecordingLayer {
    type Service = Recording<E>;
    fn layer(&self, inner: E) -> Self::Service {
        Recording {
            inner,
            recorder: self.recorder.clone(),
        }
    }
}

impl<E> Service<ExecuteRequest> for Recording<E>
where
    E: Service<ExecuteRequest, Response = ExecutionResult, Error = BoxError>,
    E::Future: Send + 'static,
{
    type Response = ExecutionResult;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ExecuteRequest) -> Self::Future {
        let span_id = self.recorder.start_span(SpanKind::Agent {
            agent_name: req.identity.name.clone(),
        });
        let guard = OpenSpan {
            recorder: self.recorder.clone(),
            span_id: Some(span_id),
        };
        let fut = self.inner.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(out) => {
                    guard.finish(None);
                    Ok(out)
                }
                Err(e) => {
                    guard.finish(Some(e.to_string()));
                    Err(e)
                }
            }
        })
    }
}

/// Span still in flight. Dropping it unfinished marks the span cancelled.
struct OpenSpan {
    recorder: TraceRecorder,
    span_id: Option<SpanId>,
}

impl OpenSpan {
    fn finish(mut self, error: Option<String>) {
        if let Some(span_id) = self.span_id.take() {
            self.recorder.finish(&span_id, error);
        }
    }
}

impl Drop for OpenSpan {
    fn drop(&mut self) {
        if let Some(span_id) = self.span_id.take() {
            self.recorder.fail_span(&span_id, "cancelled".to_string());
        }
    }
}
