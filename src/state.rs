//! Save-state serialization contract shared by every stateful component.

use lr35902_common::error::Error;

/// Implemented by every component whose internal state must survive a
/// save/restore round trip (registers, memory banks, timers, ...).
///
/// The byte layout is private to each component: callers treat the result
/// of [`StateComponent::state`] as an opaque blob and hand it back to
/// [`StateComponent::set_state`] unmodified.
pub trait StateComponent {
    fn state(&self) -> Result<Vec<u8>, Error>;
    fn set_state(&mut self, data: &[u8]) -> Result<(), Error>;
}
