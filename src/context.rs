//! Per-run execution state and the run loop.
//!
//! # Execution model
//!
//! The loop invokes the handler under the cursor, advances the cursor and
//! repeats until it has passed the action. [`Context::next`] advances the
//! cursor and re-enters the same loop *synchronously*, so code a handler runs
//! after `next()` returns executes only once the whole rest of the chain has
//! finished:
//!
//! ```text
//! run()                         cursor
//! ├─ H1 "foo"                      0
//! │  └─ next() ─ loop              1
//! │     ├─ H2 "bar"                1
//! │     │  └─ next() ─ loop        2
//! │     │     └─ action "bat"      2 → 3   loop ends
//! │     │  "baz"                           H2 returns, 3 → 4
//! │  "ban"                                 H1 returns, 4 → 5
//! result: foobarbatbazban
//! ```
//!
//! After every handler the loop asks the output slot whether it was written
//! and stops if so.
//!
//! # Failure
//!
//! The first error of a run is recorded on the context. Every loop frame that
//! is still on the stack stops, even when a handler ignored what `next()`
//! returned, and [`Context::run`] returns the recorded error. Handlers waiting
//! in `next()` see [`Error::Aborted`]; calling `next()` again after that runs
//! nothing, and values returned after the failure never reach the
//! [`ReturnHandler`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::output::{AsAny, Output};
use crate::registry::Registry;
use crate::returns::ReturnHandler;

/// Handle to the state of one run.
///
/// Handlers receive it by declaring a `Context` parameter. Clones refer to the
/// same run.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,
    handlers: Vec<BoxedHandler>,
    action: BoxedHandler,
    state: Mutex<State>,
    out: Mutex<Option<Box<dyn Output>>>,
}

#[derive(Default)]
struct State {
    cursor: usize,
    aborted: bool,
    failure: Option<Error>,
}

impl Context {
    pub(crate) fn new(registry: Registry, handlers: Vec<BoxedHandler>, action: BoxedHandler) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                handlers,
                action,
                state: Mutex::default(),
                out: Mutex::new(None),
            }),
        }
    }

    // ── Execution ───────────────────────────────────────────────────────────

    /// Runs the chain from the current cursor until it completes, an output
    /// reports written, or a handler fails.
    pub fn run(&self) -> Result<(), Error> {
        debug!(cursor = self.cursor(), len = self.len(), "run started");
        match self.drive() {
            Ok(()) => {
                debug!(cursor = self.cursor(), "run finished");
                Ok(())
            }
            Err(err) => {
                let err = self.inner.state.lock().failure.take().unwrap_or(err);
                error!(error = %err, "run aborted");
                Err(err)
            }
        }
    }

    /// Yields to the rest of the chain and returns once it is done.
    ///
    /// Once the run has aborted this returns [`Error::Aborted`] without
    /// running anything.
    pub fn next(&self) -> Result<(), Error> {
        {
            let mut state = self.inner.state.lock();
            if state.aborted {
                return Err(Error::Aborted);
            }
            state.cursor += 1;
        }
        self.drive()
    }

    /// Resolves the parameters of `handler`, calls it and hands any returned
    /// value to the bound [`ReturnHandler`]. Values returned after the run
    /// aborted are dropped.
    pub fn invoke(&self, handler: &BoxedHandler) -> Result<(), Error> {
        if let Some(value) = handler.call(self)? {
            if self.aborted() {
                return Err(Error::Aborted);
            }
            if let Some(returns) = self.get::<Arc<dyn ReturnHandler>>() {
                returns.handle(self, value)?;
            }
        }
        Ok(())
    }

    fn drive(&self) -> Result<(), Error> {
        let len = self.len();
        while self.cursor() <= len {
            if self.aborted() {
                return Err(Error::Aborted);
            }
            let cursor = self.cursor();
            let handler = match self.handler_at(cursor) {
                Ok(handler) => handler,
                Err(err) => return Err(self.abort(err)),
            };

            trace!(cursor, len, "invoking handler");
            if let Err(err) = self.invoke(&handler) {
                return Err(self.abort(err));
            }
            if self.aborted() {
                return Err(Error::Aborted);
            }

            self.inner.state.lock().cursor += 1;

            if self.written() {
                debug!(cursor, "output written, skipping rest of chain");
                return Ok(());
            }
        }
        Ok(())
    }

    fn handler_at(&self, cursor: usize) -> Result<BoxedHandler, Error> {
        let len = self.len();
        match cursor {
            c if c < len => Ok(Arc::clone(&self.inner.handlers[c])),
            c if c == len => Ok(Arc::clone(&self.inner.action)),
            _ => Err(Error::CursorOutOfRange { cursor, len }),
        }
    }

    /// Records the first failure of the run; every frame reports `Aborted`.
    fn abort(&self, err: Error) -> Error {
        let mut state = self.inner.state.lock();
        state.aborted = true;
        if state.failure.is_none() && !matches!(err, Error::Aborted) {
            state.failure = Some(err);
        }
        Error::Aborted
    }

    fn aborted(&self) -> bool {
        self.inner.state.lock().aborted
    }

    /// Position of the handler being run. `len` is the action.
    pub fn cursor(&self) -> usize {
        self.inner.state.lock().cursor
    }

    /// Number of middleware handlers in this run's snapshot.
    pub fn len(&self) -> usize {
        self.inner.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.handlers.is_empty()
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// Sets the output slot, replacing any previous output.
    pub fn out<O: Output>(&self, value: O) {
        *self.inner.out.lock() = Some(Box::new(value));
    }

    /// Whether the output has been written. `false` without an output.
    pub fn written(&self) -> bool {
        self.inner.out.lock().as_ref().is_some_and(|out| out.written())
    }

    /// Borrows the output as a `T`. `None` if there is no output or it is
    /// another type.
    ///
    /// The output stays locked while `f` runs; `f` must not call `out`,
    /// `with_out`, `take_out` or `written` on this context.
    pub fn with_out<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: Output,
    {
        let mut out = self.inner.out.lock();
        let out = out.as_deref_mut()?;
        <dyn Output as AsAny>::as_any_mut(out).downcast_mut::<T>().map(f)
    }

    /// Removes the output if it is a `T`.
    pub fn take_out<T: Output>(&self) -> Option<T> {
        let mut slot = self.inner.out.lock();
        if !slot.as_deref_mut().is_some_and(|out| <dyn Output as AsAny>::as_any_mut(out).is::<T>()) {
            return None;
        }
        let out = slot.take()?;
        <dyn Output as AsAny>::into_any(out).downcast::<T>().ok().map(|out| *out)
    }

    // ── Registry ────────────────────────────────────────────────────────────

    /// Binds `value` for this run only.
    pub fn bind<T>(&self, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.inner.registry.bind(value);
    }

    /// Binds `value` under `Arc<I>` for this run only.
    pub fn bind_as<I>(&self, value: Arc<I>)
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.inner.registry.bind_as(value);
    }

    pub fn resolve<T: Clone + 'static>(&self) -> Result<T, Error> {
        self.inner.registry.resolve()
    }

    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.inner.registry.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Context")
            .field("cursor", &state.cursor)
            .field("len", &self.inner.handlers.len())
            .field("aborted", &state.aborted)
            .finish_non_exhaustive()
    }
}
