//! Collaborators injected into the kernel by its host.

use std::cell::RefCell;
use std::rc::Rc;

/// Asynchronously delivers a named unit.
///
/// `load` must not call back into the graph synchronously. It triggers an
/// out-of-band action expected to eventually call `define` for `name`
/// (directly, or by evaluating a unit that defines several modules).
/// Failures are not reported to the kernel.
pub trait Fetcher {
    fn load(&mut self, name: &str);
}

impl<F> Fetcher for F
where
    F: FnMut(&str),
{
    fn load(&mut self, name: &str) {
        self(name)
    }
}

/// Names the unit currently being evaluated, for `define` calls that carry
/// no explicit id.
pub trait CurrentUnit {
    fn current_unit_name(&self) -> Option<String>;
}

impl<F> CurrentUnit for F
where
    F: Fn() -> Option<String>,
{
    fn current_unit_name(&self) -> Option<String> {
        self()
    }
}

/// No unit is ever being evaluated; anonymous `define` calls fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCurrentUnit;

impl CurrentUnit for NoCurrentUnit {
    fn current_unit_name(&self) -> Option<String> {
        None
    }
}

/// A fetcher that only records requests.
///
/// Clones share the same log, so a host can keep one handle and give the
/// other to the graph, then deliver the requested units itself.
#[derive(Debug, Clone, Default)]
pub struct RecordingFetcher {
    requests: Rc<RefCell<Vec<String>>>,
}

impl RecordingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Drain the requests recorded since the last call.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }
}

impl Fetcher for RecordingFetcher {
    fn load(&mut self, name: &str) {
        self.requests.borrow_mut().push(name.to_string());
    }
}
