//! Handler return values and the return-value handler.
//!
//! A handler may return anything implementing [`IntoReturn`]. `()` means
//! "nothing to report"; an `Err` aborts the run; any other value is handed to
//! the [`ReturnHandler`] bound in the registry, which decides how (or whether)
//! to materialize it into the output slot.
//!
//! ```text
//! handler(..) -> R
//!        ↓ R::into_return()
//! Ok(None)            → nothing else happens
//! Ok(Some(returned))  → Arc<dyn ReturnHandler>::handle(ctx, returned)
//! Err(e)              → run aborts with e
//! ```

use std::any::Any;
use std::fmt;

use crate::context::Context;
use crate::error::{BoxError, Error};

// ── Returned ────────────────────────────────────────────────────────────────

/// A type-erased value returned by a handler.
pub struct Returned(Box<dyn Any + Send>);

impl Returned {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Takes the value out, or gives `self` back if it is not a `T`.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|v| *v).map_err(Self)
    }
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Returned").finish_non_exhaustive()
    }
}

// ── IntoReturn ──────────────────────────────────────────────────────────────

/// Converts a handler's return value into what the run loop acts on.
pub trait IntoReturn {
    fn into_return(self) -> Result<Option<Returned>, Error>;
}

impl IntoReturn for () {
    fn into_return(self) -> Result<Option<Returned>, Error> {
        Ok(None)
    }
}

impl IntoReturn for String {
    fn into_return(self) -> Result<Option<Returned>, Error> {
        Ok(Some(Returned::new(self)))
    }
}

impl IntoReturn for &'static str {
    fn into_return(self) -> Result<Option<Returned>, Error> {
        Ok(Some(Returned::new(self)))
    }
}

impl IntoReturn for Returned {
    fn into_return(self) -> Result<Option<Returned>, Error> {
        Ok(Some(self))
    }
}

impl<T: IntoReturn> IntoReturn for Option<T> {
    fn into_return(self) -> Result<Option<Returned>, Error> {
        match self {
            Some(v) => v.into_return(),
            None => Ok(None),
        }
    }
}

impl<T, E> IntoReturn for Result<T, E>
where
    T: IntoReturn,
    E: Into<BoxError>,
{
    fn into_return(self) -> Result<Option<Returned>, Error> {
        match self {
            Ok(v) => v.into_return(),
            Err(e) => Err(Error::from_handler(e.into())),
        }
    }
}

/// Returns an arbitrary value from a handler.
///
/// ```rust
/// use ware::{Value, Ware};
///
/// #[derive(Debug, PartialEq)]
/// struct Score(u32);
///
/// let mut w = Ware::new();
/// w.action(|| Value(Score(10)));
/// w.run().unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Value<T>(pub T);

impl<T: Any + Send> IntoReturn for Value<T> {
    fn into_return(self) -> Result<Option<Returned>, Error> {
        Ok(Some(Returned::new(self.0)))
    }
}

// ── ReturnHandler ───────────────────────────────────────────────────────────

/// Called after every handler that returned a value.
///
/// Bound in the registry as `Arc<dyn ReturnHandler>`; [`Ware::new`] binds
/// [`DiscardReturns`]. Rebind it on the engine to change the behaviour for
/// every run, or on a context to change it for one run.
///
/// [`Ware::new`]: crate::Ware::new
pub trait ReturnHandler: Send + Sync {
    fn handle(&self, ctx: &Context, value: Returned) -> Result<(), Error>;
}

/// The default return handler. Drops every value.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardReturns;

impl ReturnHandler for DiscardReturns {
    fn handle(&self, _ctx: &Context, _value: Returned) -> Result<(), Error> {
        Ok(())
    }
}

impl<F> ReturnHandler for F
where
    F: Fn(&Context, Returned) -> Result<(), Error> + Send + Sync,
{
    fn handle(&self, ctx: &Context, value: Returned) -> Result<(), Error> {
        self(ctx, value)
    }
}
