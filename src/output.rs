//! The context's output slot.
//!
//! A handler registers the object that represents the final result of the run
//! with [`Context::out`](crate::Context::out). After every handler the engine
//! asks that object whether it has been written; once it has, the rest of the
//! chain is skipped.

use std::any::Any;

/// Gives trait objects access to their concrete type. Implemented for every
/// `'static` type; never implement it yourself.
pub trait AsAny: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
    fn into_any(self: Box<Self>) -> Box<dyn Any> { self }
}

/// Implemented by values placed in the output slot.
///
/// The default `written` reports `false`, so any type can be stored as output
/// without taking part in early stopping.
pub trait Output: AsAny + Send {
    /// Whether the result has been fully produced.
    fn written(&self) -> bool {
        false
    }
}

impl Output for String {}
impl Output for Vec<u8> {}

/// An in-memory output that counts as written once anything was pushed to it.
///
/// ```rust
/// use ware::{Buffer, Output};
///
/// let mut buf = Buffer::default();
/// assert!(!buf.written());
/// buf.push("done");
/// assert!(buf.written());
/// assert_eq!(buf.as_str(), "done");
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buffer {
    body: String,
}

impl Buffer {
    pub fn push(&mut self, s: &str) {
        self.body.push_str(s);
    }

    pub fn as_str(&self) -> &str { &self.body }
    pub fn into_string(self) -> String { self.body }
}

impl Output for Buffer {
    fn written(&self) -> bool {
        !self.body.is_empty()
    }
}
