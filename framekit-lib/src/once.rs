//! Single-assignment slot with take-once semantics.

use std::cell::RefCell;

/// Holds at most one value; whoever takes it first wins.
///
/// Competing completion paths each call [`OnceSlot::take`] before acting,
/// and a path that finds the slot empty must do nothing.
pub struct OnceSlot<T> {
    value: RefCell<Option<T>>,
}

impl<T> OnceSlot<T> {
    pub fn empty() -> Self {
        Self {
            value: RefCell::new(None),
        }
    }

    /// A slot that already holds `value`.
    pub fn with(value: T) -> Self {
        Self {
            value: RefCell::new(Some(value)),
        }
    }

    /// Store a value. Returns the rejected value if the slot is occupied.
    pub fn fill(&self, value: T) -> Result<(), T> {
        let mut slot = self.value.borrow_mut();
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        Ok(())
    }

    pub fn take(&self) -> Option<T> {
        self.value.borrow_mut().take()
    }

    pub fn is_filled(&self) -> bool {
        self.value.borrow().is_some()
    }
}

impl<T> Default for OnceSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}
