//! Logging support, compiling down to nothing unless the `tracing`
//! feature is enabled.

#[cfg(feature = "tracing")]
pub(crate) use tracing::debug;
#[cfg(feature = "tracing")]
pub(crate) use tracing::warn;

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($args:tt)*) => {{
        // Make sure to silence complaints about arguments being unused
        // while still type checking them.
        if false {
            let _unused = format_args!($($args)*);
        }
    }};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug;

#[cfg(not(feature = "tracing"))]
macro_rules! warn_impl {
    ($($args:tt)*) => {{
        if false {
            let _unused = format_args!($($args)*);
        }
    }};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use warn_impl as warn;
