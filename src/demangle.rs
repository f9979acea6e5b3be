//! Best-effort demangling of symbol names.

use std::borrow::Cow;


/// Demangle `name`, if it is mangled in a scheme we recognize, handing
/// back the input unchanged otherwise.
#[cfg(feature = "demangle")]
pub(crate) fn maybe_demangle(name: &str) -> Cow<'_, str> {
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        // Use the alternate form to strip the trailing hash.
        return Cow::Owned(format!("{demangled:#}"))
    }

    if name.starts_with("_Z") || name.starts_with("__Z") {
        if let Ok(sym) = cpp_demangle::Symbol::new(name) {
            if let Ok(demangled) = sym.demangle(&cpp_demangle::DemangleOptions::default()) {
                return Cow::Owned(demangled)
            }
        }
    }

    Cow::Borrowed(name)
}

#[cfg(not(feature = "demangle"))]
pub(crate) fn maybe_demangle(name: &str) -> Cow<'_, str> {
    Cow::Borrowed(name)
}
