//! Single-threaded pull driver.
//!
//! The driver owns its operators and moves pages one hop at a time,
//! respecting `needs_input` and propagating `finish` exactly once per
//! seam. Operators never block in `get_output`; the driver decides when to
//! yield. Cancellation is cooperative and checked between polls; on every
//! exit path each operator is closed exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use millrace_core::error::{Error, Result};
use millrace_core::id::PipelineId;
use millrace_core::page::Page;
use millrace_operators::Operator;

/// Cooperative cancellation flag shared between a driver and its owner.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Drives one pipeline of operators to completion, collecting the last
/// operator's output pages.
pub struct Driver {
    pipeline: PipelineId,
    operators: Vec<Box<dyn Operator>>,
    finish_sent: Vec<bool>,
    cancel: CancellationToken,
    deadline: Option<Duration>,
}

impl Driver {
    pub fn new(pipeline: PipelineId, operators: Vec<Box<dyn Operator>>) -> Result<Self> {
        if operators.is_empty() {
            return Err(Error::ContractViolation(
                "a pipeline needs at least one operator".into(),
            ));
        }
        let finish_sent = vec![false; operators.len()];
        Ok(Self {
            pipeline,
            operators,
            finish_sent,
            cancel: CancellationToken::new(),
            deadline: None,
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deadline measured from the start of `run`; overrunning it cancels
    /// the pipeline. Timeouts belong to the driver, never to operators.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Drive the pipeline to completion and return the sink's pages in
    /// arrival order.
    pub fn run(mut self) -> Result<Vec<Page>> {
        let started = Instant::now();
        let result = self.run_loop(started);
        self.close_all();
        match &result {
            Ok(pages) => {
                debug!(pipeline = %self.pipeline, pages = pages.len(), "pipeline complete")
            }
            Err(err) => debug!(pipeline = %self.pipeline, %err, "pipeline aborted"),
        }
        result
    }

    fn run_loop(&mut self, started: Instant) -> Result<Vec<Page>> {
        let mut collected = Vec::new();
        let last = self.operators.len() - 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    return Err(Error::Cancelled);
                }
            }

            for i in 0..last {
                let (upstream, downstream) = self.operators.split_at_mut(i + 1);
                let prev = &mut upstream[i];
                let next = &mut downstream[0];

                if next.needs_input() && !prev.is_finished() {
                    if let Some(page) = prev.get_output()? {
                        trace!(
                            pipeline = %self.pipeline,
                            from = prev.name(),
                            to = next.name(),
                            rows = page.position_count(),
                            "page moved"
                        );
                        next.add_input(page)?;
                    }
                }

                if prev.is_finished() && !self.finish_sent[i + 1] {
                    next.finish()?;
                    self.finish_sent[i + 1] = true;
                }
            }

            while let Some(page) = self.operators[last].get_output()? {
                collected.push(page);
            }
            if self.operators[last].is_finished() {
                return Ok(collected);
            }
        }
    }

    fn close_all(&mut self) {
        for operator in &mut self.operators {
            operator.close();
        }
    }
}
