//! Monitoring run loop: capture, detect, encode, match, record, annotate.
//!
//! Single-threaded and synchronous. Each frame runs its full
//! detect → encode → match → record sequence before the stop flag is
//! checked, so a stop request never cuts a frame short.

use crate::annotate::{Annotation, FrameView};
use crate::sink::{EventSink, SinkError};
use crate::stop::StopFlag;
use facewatch_core::{
    DetectorError, FaceDetect, FaceEncode, FaceObservation, FirstMatchMatcher, Frame, Matcher,
    RecognizerError, Registry,
};
use facewatch_hw::FrameSource;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("event sink: {0}")]
    Sink(#[from] SinkError),
    #[error(
        "embedding space mismatch: registry holds {expected} embeddings, encoder produced {actual}"
    )]
    EmbeddingMismatch { expected: String, actual: String },
}

/// Lifecycle of one [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Initializing,
    Running,
    Stopped,
}

/// Why the run loop ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source stopped producing frames.
    EndOfStream,
    /// The stop flag was raised.
    StopRequested,
}

/// Read-only state shared by every frame of a run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub registry: Registry,
    pub tolerance: f32,
    pub matcher: FirstMatchMatcher,
}

impl PipelineContext {
    pub fn new(registry: Registry, tolerance: f32) -> Self {
        Self { registry, tolerance, matcher: FirstMatchMatcher }
    }
}

/// Outcome of one processed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub faces: usize,
    pub events: usize,
    pub snapshots: usize,
}

/// Totals for a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub faces: u64,
    pub events: u64,
    pub snapshots: u64,
    pub reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self { frames: 0, faces: 0, events: 0, snapshots: 0, reason: StopReason::EndOfStream }
    }

    fn add(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.faces += report.faces as u64;
        self.events += report.events as u64;
        self.snapshots += report.snapshots as u64;
    }
}

pub struct Pipeline<D, E, K, V> {
    context: PipelineContext,
    detector: D,
    encoder: E,
    sink: K,
    view: V,
    state: PipelineState,
}

impl<D, E, K, V> Pipeline<D, E, K, V>
where
    D: FaceDetect,
    E: FaceEncode,
    K: EventSink,
    V: FrameView,
{
    pub fn new(context: PipelineContext, detector: D, encoder: E, sink: K, view: V) -> Self {
        Self { context, detector, encoder, sink, view, state: PipelineState::Idle }
    }

    #[cfg(test)]
    fn state(&self) -> PipelineState {
        self.state
    }

    /// Run until the source ends or `stop` is raised.
    ///
    /// The source is released and the sink closed on every exit path,
    /// including fatal errors.
    pub fn run<S: FrameSource>(
        mut self,
        mut source: S,
        stop: &StopFlag,
    ) -> Result<RunSummary, PipelineError> {
        let outcome = self.drive(&mut source, stop);
        self.halt(&mut source);
        let closed = self.sink.close();

        let summary = outcome?;
        closed?;
        tracing::info!(
            frames = summary.frames,
            faces = summary.faces,
            events = summary.events,
            snapshots = summary.snapshots,
            reason = ?summary.reason,
            "monitoring stopped"
        );
        Ok(summary)
    }

    /// `Idle` through `Running`: prepare the sink, confirm the source, loop.
    fn drive<S: FrameSource>(
        &mut self,
        source: &mut S,
        stop: &StopFlag,
    ) -> Result<RunSummary, PipelineError> {
        self.transition(PipelineState::Initializing);
        self.sink.prepare()?;
        if !source.is_open() {
            return Err(PipelineError::CaptureUnavailable("capture source is not open".into()));
        }
        if let Some(space) = self.context.registry.space() {
            tracing::debug!(identities = self.context.registry.len(), %space, "registry ready");
        }

        self.transition(PipelineState::Running);
        let mut summary = RunSummary::new();

        loop {
            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::info!(reason = %e, "frame stream ended");
                    summary.reason = StopReason::EndOfStream;
                    break;
                }
            };

            let report = self.process_frame(&frame)?;
            summary.add(&report);

            if stop.is_raised() {
                summary.reason = StopReason::StopRequested;
                break;
            }
        }

        Ok(summary)
    }

    /// Release the source and enter `Stopped`.
    fn halt<S: FrameSource>(&mut self, source: &mut S) {
        source.release();
        self.transition(PipelineState::Stopped);
    }

    /// Detect, label and record every face in `frame`, then hand the frame
    /// to the view.
    ///
    /// Produces exactly one event per detected face. Only unknown faces are
    /// cropped for a snapshot, from the raw frame.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport, PipelineError> {
        let faces = self.detector.locate(frame)?;
        let mut report = FrameReport { faces: faces.len(), ..FrameReport::default() };
        let mut annotations = Vec::with_capacity(faces.len());

        for bbox in faces {
            let embedding = self.encoder.embed(frame, &bbox)?;
            let registry = &self.context.registry;
            if !registry.accepts(&embedding) {
                return Err(PipelineError::EmbeddingMismatch {
                    expected: registry.space().unwrap_or_default(),
                    actual: embedding.space(),
                });
            }

            let tolerance = self.context.tolerance;
            let result = self.context.matcher.compare(&embedding, registry.identities(), tolerance);
            let observation = FaceObservation { bbox, embedding, result };

            let crop = if observation.is_unknown() { frame.crop(&observation.bbox) } else { None };
            let recorded = self.sink.record(observation.label(), crop.as_ref())?;
            tracing::debug!(
                frame = frame.sequence,
                event_id = recorded.event_id,
                label = observation.label(),
                distance = ?observation.result.distance,
                "face recorded"
            );
            report.events += 1;
            if recorded.snapshot.is_some() {
                report.snapshots += 1;
            }

            let FaceObservation { bbox, result, .. } = observation;
            annotations.push(Annotation { bbox, label: result.label });
        }

        if let Err(e) = self.view.show(frame, &annotations) {
            tracing::warn!(frame = frame.sequence, error = %e, "view update failed");
        }

        Ok(report)
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }
}
