//! The operator protocol.

use millrace_core::error::Result;
use millrace_core::page::Page;

/// The push/pull contract composing operators into a driver.
///
/// Invariants:
/// - `add_input` is only legal while `needs_input()` returns true.
/// - `finish` is legal once per draining transition; finishing an already
///   finished operator is a contract violation.
/// - `get_output` never blocks: it returns a page or `None` immediately.
///   The driver decides when to yield.
/// - `close` releases held resources; the driver calls it exactly once on
///   every exit path, including cancellation.
pub trait Operator: Send {
    /// Stable operator name for tracing.
    fn name(&self) -> &'static str;

    /// Whether the operator can accept another page right now.
    fn needs_input(&self) -> bool;

    /// Hand a page to the operator.
    fn add_input(&mut self, page: Page) -> Result<()>;

    /// Signal that no more input will arrive.
    fn finish(&mut self) -> Result<()>;

    /// Whether the operator is fully drained.
    fn is_finished(&self) -> bool;

    /// Pull zero or one output page.
    fn get_output(&mut self) -> Result<Option<Page>>;

    /// Release held resources.
    fn close(&mut self);
}
