//! Output variables and dirty-state notification
//!
//! A [`Variable`] is the handoff point between the extraction core and the
//! display layer: extractors mark it dirty after producing a fresh value,
//! and the host polls the flag on its own cadence to decide what to redraw.

use std::cell::Cell;
use std::rc::Rc;

/// A named output slot owned by the host.
///
/// The host keeps the owning `Rc`; extractors hold only a `Weak` reference,
/// so reconfiguring the host side never leaves the core with dangling state.
/// Single-threaded by design — the core is call-driven and never shares a
/// `Variable` across threads.
#[derive(Debug)]
pub struct Variable {
    name: String,
    dirty: Cell<bool>,
}

impl Variable {
    /// Create a new variable with no fresh data pending.
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            dirty: Cell::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal that a fresh value is available for this variable.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Clear the dirty flag, returning whether fresh data had arrived
    /// since the last call.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_flag_lifecycle() {
        let var = Variable::new("cpu_temp");
        assert_eq!(var.name(), "cpu_temp");
        assert!(!var.is_dirty());

        var.mark_dirty();
        assert!(var.is_dirty());

        assert!(var.take_dirty());
        assert!(!var.is_dirty());
        assert!(!var.take_dirty());
    }
}
