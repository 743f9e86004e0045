//! Recursion guard.
//!
//! A converter never wraps one of its own wrappers. Handle types mark the
//! wrapper variants they can hold by implementing [`Unwrap`]; the converter
//! asks [`short_circuit`] before consulting its table and returns the wrapped
//! counterpart directly.

use std::any::type_name;
use tracing::trace;

/// Capability of a handle that may be a wrapper around its counterpart.
///
/// A native handle that the bridge manufactured for an abstract object is a
/// *forward* wrapper; an abstract handle built around a pre-existing native
/// object is a *backward* wrapper.
pub trait Unwrap<T> {
    /// The counterpart this value wraps, or `None` for a plain handle.
    fn unwrap_counterpart(&self) -> Option<T>;
}

/// Returns the wrapped counterpart of `value` if it is a wrapper.
pub fn short_circuit<S, T>(value: &S) -> Option<T>
where
    S: Unwrap<T>,
{
    let counterpart = value.unwrap_counterpart()?;
    trace!(
        from = type_name::<S>(),
        to = type_name::<T>(),
        "recursion guard short-circuited conversion"
    );
    Some(counterpart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Native {
        Host(u32),
        Wrapper(&'static str),
    }

    impl Unwrap<&'static str> for Native {
        fn unwrap_counterpart(&self) -> Option<&'static str> {
            match self {
                Native::Wrapper(id) => Some(*id),
                Native::Host(_) => None,
            }
        }
    }

    #[test]
    fn wrapper_yields_counterpart() {
        assert_eq!(short_circuit(&Native::Wrapper("furnace")), Some("furnace"));
    }

    #[test]
    fn plain_handle_proceeds() {
        assert_eq!(short_circuit::<_, &'static str>(&Native::Host(3)), None);
    }
}
