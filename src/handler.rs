//! Handler trait, argument extraction and type erasure.
//!
//! # How handlers with arbitrary parameters are stored
//!
//! A chain holds handlers of *different* types in one `Vec`, so every handler
//! is hidden behind the same trait object. What differs between handlers is
//! their parameter list: each parameter type implements [`FromContext`] and is
//! produced from the running [`Context`] right before the call.
//!
//! ```text
//! |c: Context, Dep(log): Dep<Logger>| { … }         ← user writes this
//!        ↓ ware.use_handler(f)
//! f.into_boxed_handler()                            ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler { f, _args })                  ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(&ctx)  at run time                   ← one vtable dispatch
//!        ↓
//! f(Context::from_context(ctx)?, Dep::from_context(ctx)?).into_return()
//! ```
//!
//! A parameter that cannot be produced fails the call before `f` runs.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::returns::{IntoReturn, Returned};

// ── Extraction ───────────────────────────────────────────────────────────────

/// Produces a handler argument from the running context.
///
/// Implement it for your own types to give handlers richer parameters:
///
/// ```rust
/// use ware::{Context, Error, FromContext, Ware};
///
/// #[derive(Clone)]
/// struct Config { retries: u32 }
///
/// struct Retries(u32);
///
/// impl FromContext for Retries {
///     fn from_context(ctx: &Context) -> Result<Self, Error> {
///         Ok(Retries(ctx.resolve::<Config>()?.retries))
///     }
/// }
///
/// let mut w = Ware::new();
/// w.bind(Config { retries: 3 });
/// w.action(|Retries(n): Retries| assert_eq!(n, 3));
/// w.run().unwrap();
/// ```
pub trait FromContext: Sized {
    fn from_context(ctx: &Context) -> Result<Self, Error>;
}

impl FromContext for Context {
    fn from_context(ctx: &Context) -> Result<Self, Error> {
        Ok(ctx.clone())
    }
}

/// An optional dependency: `None` when the inner parameter has no binding.
/// Any other failure still aborts the run.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Context) -> Result<Self, Error> {
        match T::from_context(ctx) {
            Ok(v) => Ok(Some(v)),
            Err(Error::MissingBinding { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// A value resolved from the registry by its type.
///
/// Bind with [`Ware::bind`](crate::Ware::bind) (for every run) or
/// [`Context::bind`] (for the current run only), then ask for it:
///
/// ```rust
/// use ware::{Dep, Ware};
///
/// let mut w = Ware::new();
/// w.bind(String::from("db://local"));
/// w.action(|Dep(url): Dep<String>| assert_eq!(url, "db://local"));
/// w.run().unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dep<T>(pub T);

impl<T> FromContext for Dep<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_context(ctx: &Context) -> Result<Self, Error> {
        ctx.resolve::<T>().map(Dep)
    }
}

// ── Internal types ──────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the return type of the public
/// `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: &Context) -> Result<Option<Returned>, Error>;
}

/// A heap-allocated, type-erased handler shared by the engine and every
/// context created from it.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ────────────────────────────────────────────────────

/// Implemented for every function usable as a chain handler.
///
/// You never implement this yourself. It is satisfied by any `Fn` taking up to
/// eight [`FromContext`] parameters and returning an [`IntoReturn`] value.
/// `Args` is the tuple of parameter types; it only exists to keep the blanket
/// impls apart and is always inferred.
///
/// Anything that is not callable is rejected when the chain is configured:
///
/// ```rust,compile_fail
/// let mut w = ware::Ware::new();
/// w.use_handler(42);
/// ```
///
/// ```rust,compile_fail
/// let mut w = ware::Ware::new();
/// w.action("not a function");
/// ```
pub trait Handler<Args>: private::Sealed<Args> + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed<Args> {}
}

/// Erases a handler so handlers of different types can be passed together to
/// [`Ware::handlers`](crate::Ware::handlers).
pub fn handler<H, Args>(h: H) -> BoxedHandler
where
    H: Handler<Args>,
{
    h.into_boxed_handler()
}

// ── Concrete wrapper ────────────────────────────────────────────────────────

/// Holds a concrete function `F` and implements [`ErasedHandler`] for it.
struct FnHandler<F, Args> {
    f: F,
    _args: PhantomData<fn() -> Args>,
}

// ── Blanket implementations ─────────────────────────────────────────────────

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        impl<F, R, $($ty,)*> private::Sealed<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoReturn,
            $($ty: FromContext + 'static,)*
        {
        }

        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoReturn + 'static,
            $($ty: FromContext + 'static,)*
        {
            fn into_boxed_handler(self) -> BoxedHandler {
                Arc::new(FnHandler { f: self, _args: PhantomData::<fn() -> ($($ty,)*)> })
            }
        }

        impl<F, R, $($ty,)*> ErasedHandler for FnHandler<F, ($($ty,)*)>
        where
            F: Fn($($ty),*) -> R,
            R: IntoReturn,
            $($ty: FromContext,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn call(&self, ctx: &Context) -> Result<Option<Returned>, Error> {
                // Every argument is resolved before the function runs.
                $(let $ty = $ty::from_context(ctx)?;)*
                (self.f)($($ty),*).into_return()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

/// The default action.
pub(crate) fn noop() -> BoxedHandler {
    handler(|| {})
}
