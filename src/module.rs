use std::cell::Cell;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;
use std::rc::Weak;

use crate::sym::SymType;
use crate::sym::SymbolData;
use crate::unit::UnitBuilder;
use crate::unit::UnitData;
use crate::Addr;
use crate::AddrRange;


/// Check whether the module behind `module` is still present and has
/// not been unloaded.
pub(crate) fn is_live(module: &Weak<ModuleData>) -> bool {
    module
        .upgrade()
        .map(|data| !data.unloaded.get())
        .unwrap_or(false)
}


pub(crate) struct ModuleData {
    pub(crate) path: PathBuf,
    pub(crate) load_address: Addr,
    pub(crate) size: usize,
    pub(crate) build_id: Option<Box<[u8]>>,
    pub(crate) units: Box<[Rc<UnitData>]>,
    /// The module's symbol table, sorted by start address.
    pub(crate) symbols: Box<[Rc<SymbolData>]>,
    /// Set once the module has been unloaded. Handles re-check this
    /// flag on every access.
    pub(crate) unloaded: Cell<bool>,
}

impl ModuleData {
    /// The first address past the module's mapped range.
    ///
    /// A module of unknown (zero) size is treated as extending
    /// indefinitely, the way debug-info-only images without loadable
    /// segments are.
    pub(crate) fn range_end(&self) -> Addr {
        if self.size == 0 {
            Addr::MAX
        } else {
            self.load_address + self.size
        }
    }
}

impl Debug for ModuleData {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let Self {
            path,
            load_address,
            size,
            build_id: _,
            units,
            symbols,
            unloaded,
        } = self;

        f.debug_struct(stringify!(ModuleData))
            .field("path", path)
            .field("load_address", &format_args!("{load_address:#x}"))
            .field("size", &format_args!("{size:#x}"))
            .field("units", &units.len())
            .field("symbols", &symbols.len())
            .field("unloaded", &unloaded.get())
            .finish()
    }
}


/// A handle on a loaded binary image (an executable or a shared
/// object) in the debuggee's address space.
///
/// Handles are cheap to clone and share the underlying data. A
/// default constructed handle is empty and reports `false` from
/// [`is_valid`][Self::is_valid], as does any handle whose module has
/// been unloaded since.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub(crate) data: Option<Rc<ModuleData>>,
}

impl Module {
    /// Create a builder for a module backed by the file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> ModuleBuilder {
        ModuleBuilder::new(path.into())
    }

    /// Check whether the handle references a module that is still
    /// loaded.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Retrieve the path of the file backing the module.
    pub fn path(&self) -> Option<&Path> {
        self.live().map(|data| data.path.as_path())
    }

    /// Retrieve the address at which the module is loaded.
    pub fn load_address(&self) -> Option<Addr> {
        self.live().map(|data| data.load_address)
    }

    /// Retrieve the address range at which the module is mapped.
    pub fn range(&self) -> Option<AddrRange> {
        self.live().map(|data| AddrRange {
            start: data.load_address,
            end: data.range_end(),
        })
    }

    /// Retrieve the module's build ID, if one was recorded.
    pub fn build_id(&self) -> Option<&[u8]> {
        self.live().and_then(|data| data.build_id.as_deref())
    }

    /// Check whether `addr` falls into the module's mapped range.
    pub fn contains(&self, addr: Addr) -> bool {
        self.range().map(|range| range.contains(addr)).unwrap_or(false)
    }

    /// The underlying data, unless the handle is empty or the module
    /// has been unloaded.
    pub(crate) fn live(&self) -> Option<&Rc<ModuleData>> {
        let data = self.data.as_ref()?;
        if data.unloaded.get() {
            None
        } else {
            Some(data)
        }
    }

    pub(crate) fn from_data(data: &Rc<ModuleData>) -> Self {
        Self {
            data: Some(Rc::clone(data)),
        }
    }
}


/// A builder for [`Module`] objects.
///
/// All addresses handed to the builder are file relative (virtual
/// offsets, as found in the image's debug data); [`build`][Self::build]
/// rebases them by the module's load address once. A module mapped at a
/// different address is a different `Module`.
#[derive(Debug)]
pub struct ModuleBuilder {
    path: PathBuf,
    load_address: Addr,
    size: usize,
    build_id: Option<Box<[u8]>>,
    units: Vec<UnitBuilder>,
    symbols: Vec<SymbolData>,
}

impl ModuleBuilder {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            load_address: 0,
            size: 0,
            build_id: None,
            units: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// Set the address at which the module is loaded.
    pub fn load_address(mut self, addr: Addr) -> Self {
        self.load_address = addr;
        self
    }

    /// Set the size of the module's mapped range.
    ///
    /// A size of zero is interpreted as unknown and makes the module
    /// cover all addresses above its load address.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Record the module's build ID.
    pub fn build_id(mut self, id: impl Into<Vec<u8>>) -> Self {
        self.build_id = Some(id.into().into_boxed_slice());
        self
    }

    /// Add a compile unit to the module.
    pub fn unit(mut self, unit: UnitBuilder) -> Self {
        self.units.push(unit);
        self
    }

    /// Add an entry to the module's symbol table.
    pub fn symbol(
        mut self,
        name: impl Into<String>,
        addr: Addr,
        size: usize,
        sym_type: SymType,
    ) -> Self {
        self.symbols.push(SymbolData {
            name: name.into(),
            addr,
            size,
            sym_type,
        });
        self
    }

    /// Build the module.
    pub fn build(self) -> Module {
        let Self {
            path,
            load_address,
            size,
            build_id,
            units,
            symbols,
        } = self;

        let bias = load_address;
        let units = units
            .into_iter()
            .map(|unit| Rc::new(unit.build(bias)))
            .collect::<Box<[_]>>();
        let mut symbols = symbols
            .into_iter()
            .map(|mut sym| {
                sym.addr += bias;
                Rc::new(sym)
            })
            .collect::<Vec<_>>();
        symbols.sort_by_key(|sym| sym.addr);

        let data = ModuleData {
            path,
            load_address,
            size,
            build_id,
            units,
            symbols: symbols.into_boxed_slice(),
            unloaded: Cell::new(false),
        };
        Module {
            data: Some(Rc::new(data)),
        }
    }
}
