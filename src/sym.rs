use std::borrow::Cow;
use std::rc::Rc;
use std::rc::Weak;

use crate::demangle;
use crate::module;
use crate::module::ModuleData;
use crate::Addr;
use crate::AddrRange;


/// The type of a symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SymType {
    /// The symbol type is unknown.
    #[default]
    Unknown,
    /// The symbol is a function.
    Function,
    /// The symbol is a variable.
    Variable,
}


#[derive(Debug)]
pub(crate) struct SymbolData {
    pub(crate) name: String,
    pub(crate) addr: Addr,
    pub(crate) size: usize,
    pub(crate) sym_type: SymType,
}


/// A handle on a symbol table entry.
///
/// Symbols are present independently of debug information; a stripped
/// binary still carries them. A default constructed handle is empty and
/// invalid, as is any handle whose module has been unloaded.
#[derive(Clone, Debug, Default)]
pub struct Symbol {
    data: Option<Rc<SymbolData>>,
    module: Weak<ModuleData>,
}

impl Symbol {
    /// Check whether the handle references a live symbol.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Retrieve the symbol's name, as present in the symbol table.
    pub fn name(&self) -> Option<&str> {
        self.live().map(|data| data.name.as_str())
    }

    /// Retrieve the symbol's name in demangled form.
    ///
    /// Without the `demangle` feature (or if the name does not use a
    /// recognized mangling scheme) the raw name is handed back.
    pub fn demangled_name(&self) -> Option<Cow<'_, str>> {
        self.live().map(|data| demangle::maybe_demangle(&data.name))
    }

    /// Retrieve the symbol's start address.
    pub fn addr(&self) -> Option<Addr> {
        self.live().map(|data| data.addr)
    }

    /// Retrieve the symbol's size, with zero meaning unknown.
    pub fn size(&self) -> Option<usize> {
        self.live().map(|data| data.size)
    }

    /// Retrieve the type of the symbol.
    pub fn sym_type(&self) -> Option<SymType> {
        self.live().map(|data| data.sym_type)
    }

    /// Retrieve the address range covered by the symbol, for symbols of
    /// known size.
    pub fn range(&self) -> Option<AddrRange> {
        let data = self.live()?;
        if data.size == 0 {
            None
        } else {
            Some(AddrRange::new(data.addr, data.addr + data.size))
        }
    }

    fn live(&self) -> Option<&Rc<SymbolData>> {
        let data = self.data.as_ref()?;
        module::is_live(&self.module).then_some(data)
    }

    pub(crate) fn from_data(data: &Rc<SymbolData>, module: Weak<ModuleData>) -> Self {
        Self {
            data: Some(Rc::clone(data)),
            module,
        }
    }
}
