//! The chain engine.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, noop};
use crate::logger::Logger;
use crate::registry::Registry;
use crate::returns::{DiscardReturns, ReturnHandler};

/// An ordered middleware chain plus one terminal action.
///
/// Configure it once, then run it as often as needed. Every run gets its own
/// [`Context`]: a cursor, an output slot and a registry whose parent is the
/// engine's global registry. Each configuration method returns `&mut Self`
/// so calls chain naturally.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use ware::{Context, Ware};
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let mut w = Ware::new();
///
/// let l = Arc::clone(&log);
/// w.use_handler(move |c: Context| -> Result<(), ware::Error> {
///     l.lock().unwrap().push("before");
///     c.next()?;
///     l.lock().unwrap().push("after");
///     Ok(())
/// });
/// let l = Arc::clone(&log);
/// w.action(move || l.lock().unwrap().push("action"));
///
/// w.run().unwrap();
/// assert_eq!(*log.lock().unwrap(), ["before", "action", "after"]);
/// ```
pub struct Ware {
    registry: Arc<Registry>,
    handlers: Vec<BoxedHandler>,
    action: BoxedHandler,
}

impl Ware {
    /// An engine with no middleware, a no-op action and two global bindings:
    /// a [`Logger`] and the [`DiscardReturns`] return handler.
    pub fn new() -> Self {
        let registry = Registry::new();
        registry.bind(Logger::default());
        registry.bind_as::<dyn ReturnHandler>(Arc::new(DiscardReturns));
        Self { registry: Arc::new(registry), handlers: Vec::new(), action: noop() }
    }

    /// Appends a middleware handler. Handlers run in the order they are added.
    pub fn use_handler<H, Args>(&mut self, handler: H) -> &mut Self
    where
        H: Handler<Args>,
    {
        self.handlers.push(handler.into_boxed_handler());
        self
    }

    /// Replaces the whole middleware stack.
    ///
    /// ```rust
    /// use ware::{Ware, handler};
    ///
    /// let mut w = Ware::new();
    /// w.use_handler(|| println!("replaced before the run"));
    /// w.handlers([handler(|| {}), handler(|| "second")]);
    /// w.run().unwrap();
    /// ```
    pub fn handlers<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = BoxedHandler>,
    {
        self.handlers = handlers.into_iter().collect();
        self
    }

    /// Sets the handler that runs after all middleware.
    pub fn action<H, Args>(&mut self, handler: H) -> &mut Self
    where
        H: Handler<Args>,
    {
        self.action = handler.into_boxed_handler();
        self
    }

    /// Binds `value` for every run.
    pub fn bind<T>(&mut self, value: T) -> &mut Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.registry.bind(value);
        self
    }

    /// Binds `value` under `Arc<I>` for every run.
    pub fn bind_as<I>(&mut self, value: Arc<I>) -> &mut Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.registry.bind_as(value);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Number of middleware handlers, not counting the action.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Snapshots the chain into a fresh context. Later configuration changes
    /// do not affect it.
    pub fn create_context(&self) -> Context {
        Context::new(
            Registry::with_parent(Arc::clone(&self.registry)),
            self.handlers.clone(),
            Arc::clone(&self.action),
        )
    }

    /// Runs the chain once in a fresh context.
    pub fn run(&self) -> Result<(), Error> {
        self.create_context().run()
    }

    /// Turns the engine into a handler, so a whole chain can be the action or
    /// a middleware of another engine. Each call runs the inner chain in its
    /// own context.
    ///
    /// ```rust
    /// use ware::Ware;
    ///
    /// let mut inner = Ware::new();
    /// inner.action(|| println!("inner action"));
    ///
    /// let mut outer = Ware::new();
    /// outer.action(inner.into_handler());
    /// outer.run().unwrap();
    /// ```
    pub fn into_handler(self) -> impl Fn() -> Result<(), Error> + Send + Sync + 'static {
        move || self.run()
    }
}

impl Default for Ware {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Ware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ware")
            .field("handlers", &self.handlers.len())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
