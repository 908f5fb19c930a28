//! # ware
//!
//! A minimal middleware-chaining runtime. Register an ordered list of
//! handlers and one terminal action, then run the chain.
//!
//! ## The contract
//!
//! - Handlers run in registration order, the action last.
//! - A handler may call [`Context::next`] to run the rest of the chain and
//!   resume afterwards (onion ordering), or simply return to let the chain
//!   continue with the following handler.
//! - After every handler the output slot is asked whether it has been
//!   written; once it has, the rest of the chain is skipped.
//! - Handler parameters are resolved by type from a registry: per-run
//!   bindings first, then the engine's global bindings. A parameter that
//!   cannot be resolved aborts the run.
//!
//! What ware intentionally leaves to the host: HTTP, routing, I/O, threads,
//! timeouts. It is the in-process engine a server would use to run its
//! middleware, nothing more.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use ware::{Context, Dep, Error, Logger, Ware};
//!
//! let result = Arc::new(Mutex::new(String::new()));
//! let mut w = Ware::new();
//!
//! let r = Arc::clone(&result);
//! w.use_handler(move |c: Context, Dep(log): Dep<Logger>| -> Result<(), Error> {
//!     log.info("before");
//!     r.lock().unwrap().push_str("foo");
//!     c.next()?;
//!     r.lock().unwrap().push_str("ban");
//!     Ok(())
//! });
//!
//! let r = Arc::clone(&result);
//! w.use_handler(move |c: Context| -> Result<(), Error> {
//!     r.lock().unwrap().push_str("bar");
//!     c.next()?;
//!     r.lock().unwrap().push_str("baz");
//!     Ok(())
//! });
//!
//! let r = Arc::clone(&result);
//! w.action(move || r.lock().unwrap().push_str("bat"));
//!
//! w.run()?;
//! assert_eq!(*result.lock().unwrap(), "foobarbatbazban");
//! # Ok::<(), Error>(())
//! ```

mod context;
mod engine;
mod error;
mod handler;
mod logger;
mod output;
mod registry;
mod returns;

pub use context::Context;
pub use engine::Ware;
pub use error::{BoxError, Error};
pub use handler::{BoxedHandler, Dep, FromContext, Handler, handler};
pub use logger::Logger;
pub use output::{AsAny, Buffer, Output};
pub use registry::Registry;
pub use returns::{DiscardReturns, IntoReturn, ReturnHandler, Returned, Value};
