//! Supervisor: owns the shared resources and drains the ring
//!
//! Lifecycle: `Created -> Running -> Terminating -> Destroyed`. Creation
//! happens in [`Supervisor::start`], the read loop in [`Supervisor::run`],
//! and destruction when the supervisor is dropped; the ring's handles release
//! exactly the resources that were created, on every exit path.
//!
//! Termination signals are routed to the run's phase from the moment the
//! ring exists until the supervisor is dropped. A signal that arrived
//! earlier is picked up by `start`, so the run never opens.

use std::fmt;
use std::time::Duration;

use colored::*;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cli::OutputFormat;
use crate::shm::{Phase, ResourceNames, Ring, ShmError, Take};
use crate::signals::{PhaseBinding, bind_phase_unchecked, take_pending_termination};
use crate::solution::Candidate;

/// Where the supervisor is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Created,
    Running,
    Terminating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Created => write!(f, "created"),
            Stage::Running => write!(f, "running"),
            Stage::Terminating => write!(f, "terminating"),
        }
    }
}

/// Why the read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A generator found an ordering with no back-edges
    Acyclic,
    /// The phase left `Running` for another reason (signal)
    Terminated,
}

/// Receives the supervisor's progress reports
pub trait Reporter {
    /// A solution strictly smaller than every earlier one arrived
    fn new_best(&mut self, candidate: &Candidate);

    /// A zero-edge solution arrived
    fn acyclic(&mut self);
}

/// Prints progress to stdout in the chosen format
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    format: OutputFormat,
}

impl ConsoleReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// The line printed for a new best solution
    pub fn format_best(&self, candidate: &Candidate) -> String {
        match self.format {
            OutputFormat::Text => {
                let mut line = format!("New solution with {} edges:", candidate.edge_count());
                for edge in candidate.edges() {
                    line.push_str(&format!(" {}", edge));
                }
                if candidate.is_truncated() {
                    line.push_str(&format!(
                        " {}",
                        format!("(truncated, {} of {} shown)", candidate.edges().len(), candidate.edge_count()).yellow()
                    ));
                }
                line
            }
            OutputFormat::Json => json!({
                "edge_count": candidate.edge_count(),
                "truncated": candidate.is_truncated(),
                "edges": candidate.edges().iter().map(|e| [e.from, e.to]).collect::<Vec<_>>(),
            })
            .to_string(),
        }
    }

    /// The line printed when the graph turns out to be acyclic
    pub fn format_acyclic(&self) -> String {
        match self.format {
            OutputFormat::Text => "The graph is acyclic!".green().to_string(),
            OutputFormat::Json => json!({ "acyclic": true }).to_string(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn new_best(&mut self, candidate: &Candidate) {
        println!("{}", self.format_best(candidate));
    }

    fn acyclic(&mut self) {
        println!("{}", self.format_acyclic());
    }
}

/// Tracks the smallest solution seen so far
#[derive(Debug, Clone, Default)]
pub struct BestSolution {
    best: Option<Candidate>,
}

impl BestSolution {
    /// Record `candidate` if it is strictly smaller; returns whether it was recorded
    pub fn offer(&mut self, candidate: &Candidate) -> bool {
        if candidate.improves_on(self.edge_count()) {
            self.best = Some(*candidate);
            return true;
        }
        false
    }

    pub fn edge_count(&self) -> Option<usize> {
        self.best.as_ref().map(Candidate::edge_count)
    }
}

/// The coordinating process: resource owner and single ring reader
#[derive(Debug)]
pub struct Supervisor {
    // Declared before `ring` so the handler is unbound before the unmap.
    _signals: PhaseBinding<'static>,
    ring: Ring,
    stage: Stage,
    best: BestSolution,
    received: u64,
}

impl Supervisor {
    /// Create all shared resources and open the run.
    ///
    /// Fails fast if any resource already exists or cannot be created; the
    /// resources created before the failure are released again.
    pub fn start(names: &ResourceNames, poll_interval: Option<Duration>) -> Result<Self, ShmError> {
        debug!(?names, "Supervisor::start: called");
        let ring = Ring::create(names, poll_interval)?;
        // SAFETY: the binding is stored in `_signals`, which is dropped before `ring`.
        let signals = unsafe { bind_phase_unchecked(ring.state()) };
        let mut supervisor = Self {
            _signals: signals,
            ring,
            stage: Stage::Created,
            best: BestSolution::default(),
            received: 0,
        };

        // A signal after the binding has already stored Terminating, and
        // advancing never moves the phase backwards.
        if take_pending_termination() || supervisor.ring.state().advance_phase(Phase::Running) != Phase::Initializing {
            info!("Termination requested during startup");
            supervisor.terminate();
            return Ok(supervisor);
        }
        supervisor.stage = Stage::Running;
        info!(region = %names.region, "Supervisor running");
        Ok(supervisor)
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of solutions read from the ring
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Drain the ring until the graph is found acyclic or the run is terminated.
    ///
    /// Returns `Terminated` at once if the run was terminated before the loop
    /// started.
    pub fn run<P: Reporter>(&mut self, reporter: &mut P) -> Result<Outcome, ShmError> {
        debug!("Supervisor::run: called");
        let result = drain(&self.ring, &mut self.best, &mut self.received, reporter);
        // Every exit path, error included, leaves the run terminating.
        self.terminate();
        result
    }

    /// Move the run to `Terminating` and wake a writer parked on a full ring
    pub fn terminate(&mut self) {
        if self.stage == Stage::Terminating {
            return;
        }
        let previous = self.ring.state().advance_phase(Phase::Terminating);
        debug!(%previous, "Supervisor::terminate: phase advanced");
        if let Err(e) = self.ring.wake_writers() {
            warn!(error = %e, "Could not wake blocked writers");
        }
        self.stage = Stage::Terminating;
    }
}

fn drain<P: Reporter>(
    ring: &Ring,
    best: &mut BestSolution,
    received: &mut u64,
    reporter: &mut P,
) -> Result<Outcome, ShmError> {
    let mut reader = ring.reader();
    while ring.phase() == Phase::Running {
        let candidate = match reader.take()? {
            Take::Solution(candidate) => candidate,
            Take::ShuttingDown => break,
        };
        *received += 1;

        if candidate.is_acyclic() {
            info!("Received zero-edge solution, graph is acyclic");
            best.offer(&candidate);
            reporter.acyclic();
            return Ok(Outcome::Acyclic);
        }

        if best.offer(&candidate) {
            info!(edge_count = candidate.edge_count(), "New best solution");
            reporter.new_best(&candidate);
        }
    }
    info!(phase = %ring.phase(), "Supervisor stopped reading");
    Ok(Outcome::Terminated)
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.terminate();
        info!(received = self.received, best = ?self.best.edge_count(), "Supervisor destroyed");
    }
}
