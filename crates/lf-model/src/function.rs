//! Opaque rate/derived function handles.

use core::fmt;
use std::sync::Arc;

/// Signature shared by every rate law and derived quantity.
pub type RateFn = dyn Fn(&[f64]) -> f64 + Send + Sync;

/// A named, cloneable, thread-safe pure function of positional arguments.
///
/// The argument *names* live on the entity that uses the function; the
/// handle only sees their values, in the declared order.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    arity: Option<usize>,
    f: Arc<RateFn>,
}

impl Function {
    /// Wrap a closure accepting any number of arguments.
    pub fn new(name: &str, f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            name: Arc::from(name),
            arity: None,
            f: Arc::new(f),
        }
    }

    /// Wrap a closure that expects exactly `arity` arguments.
    ///
    /// The arity is checked when the function is attached to a model entity.
    pub fn with_arity(
        name: &str,
        arity: usize,
        f: impl Fn(&[f64]) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: Arc::from(name),
            arity: Some(arity),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    #[inline]
    pub fn call(&self, args: &[f64]) -> f64 {
        (self.f)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}
