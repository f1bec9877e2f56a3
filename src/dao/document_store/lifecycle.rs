//! Lifecycle state machine of the loaded document.

use thiserror::Error;

/// Phases the per-process document can be in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorePhase {
    /// Nothing has been read from disk yet.
    Unloaded,
    /// The first load is reading and validating the file.
    Loading,
    /// Steady state: the in-memory document serves reads.
    Loaded,
    /// A commit is in flight.
    Saving,
    /// Load validation failed; the store refuses service until restarted.
    Failed(String),
}

impl StorePhase {
    /// Short lowercase label for logs and health output.
    pub fn label(&self) -> &'static str {
        match self {
            StorePhase::Unloaded => "unloaded",
            StorePhase::Loading => "loading",
            StorePhase::Loaded => "loaded",
            StorePhase::Saving => "saving",
            StorePhase::Failed(_) => "failed",
        }
    }

    /// Whether a document is in memory and being served.
    pub fn is_serving(&self) -> bool {
        matches!(self, StorePhase::Loaded | StorePhase::Saving)
    }
}

/// Events driving the document lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// Begin reading the file.
    LoadStarted,
    /// The document passed validation and is installed.
    LoadCompleted,
    /// Reading hit an I/O error; another attempt may follow.
    LoadAborted,
    /// The file failed validation or parsing.
    LoadRejected(String),
    /// Begin committing a candidate document.
    SaveStarted,
    /// The commit finished; `committed` is false when it was rejected or failed.
    SaveFinished { committed: bool },
}

/// Error returned when an event cannot be applied from the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {}", .from.label())]
pub struct InvalidTransition {
    /// The phase the lifecycle was in when the event arrived.
    pub from: StorePhase,
    /// The event that cannot be applied from this phase.
    pub event: StoreEvent,
}

/// Snapshot of the lifecycle for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: StorePhase,
    /// Number of commits that reached disk in this process.
    pub generation: u64,
}

/// Document lifecycle: `Unloaded -> Loading -> Loaded <-> Saving`, with a terminal `Failed`.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    phase: StorePhase,
    generation: u64,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            phase: StorePhase::Unloaded,
            generation: 0,
        }
    }
}

impl Lifecycle {
    /// Lifecycle of a store that has not read its file yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> StorePhase {
        self.phase.clone()
    }

    /// Phase and generation together.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase.clone(),
            generation: self.generation,
        }
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: StoreEvent) -> Result<StorePhase, InvalidTransition> {
        let next = self.compute_transition(&event)?;
        if matches!(event, StoreEvent::SaveFinished { committed: true }) {
            self.generation += 1;
        }
        self.phase = next;
        Ok(self.phase.clone())
    }

    fn compute_transition(&self, event: &StoreEvent) -> Result<StorePhase, InvalidTransition> {
        let next = match (&self.phase, event) {
            (StorePhase::Unloaded, StoreEvent::LoadStarted) => StorePhase::Loading,
            (StorePhase::Loading, StoreEvent::LoadCompleted) => StorePhase::Loaded,
            (StorePhase::Loading, StoreEvent::LoadAborted) => StorePhase::Unloaded,
            (StorePhase::Loading, StoreEvent::LoadRejected(reason)) => {
                StorePhase::Failed(reason.clone())
            }
            (StorePhase::Loaded, StoreEvent::SaveStarted) => StorePhase::Saving,
            (StorePhase::Saving, StoreEvent::SaveFinished { .. }) => StorePhase::Loaded,
            (from, event) => {
                return Err(InvalidTransition {
                    from: from.clone(),
                    event: event.clone(),
                });
            }
        };

        Ok(next)
    }
}
