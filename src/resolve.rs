use std::rc::Rc;
use std::rc::Weak;

use crate::block::Block;
use crate::block::BlockData;
use crate::ctx::SymbolContext;
use crate::func::Function;
use crate::line::LineEntry;
use crate::log;
use crate::module::Module;
use crate::module::ModuleData;
use crate::sym::Symbol;
use crate::sym::SymbolData;
use crate::unit::CompileUnit;
use crate::util::find_match_or_lower_bound_by;
use crate::Addr;


/// An address-ordered collection of loaded modules, against which
/// addresses are resolved into [`SymbolContext`] objects.
#[derive(Debug, Default)]
pub struct ModuleList {
    /// The loaded modules, sorted by load address.
    modules: Vec<Rc<ModuleData>>,
}

impl ModuleList {
    /// Create an empty module list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the number of loaded modules.
    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check whether the list contains no modules.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Insert a module, keeping the list sorted by load address.
    ///
    /// An empty handle, an already unloaded module, or a module whose
    /// mapped range overlaps that of an already loaded one is rejected.
    pub fn insert(&mut self, module: Module) -> bool {
        let data = if let Some(data) = module.live() {
            Rc::clone(data)
        } else {
            return false
        };

        let idx = self
            .modules
            .partition_point(|m| m.load_address < data.load_address);

        // Overlap can only be judged for modules of known size.
        if let Some(prev) = idx.checked_sub(1).and_then(|i| self.modules.get(i)) {
            if prev.size != 0 && prev.load_address + prev.size > data.load_address {
                log::warn!(
                    "not loading module {}: overlaps {}",
                    data.path.display(),
                    prev.path.display()
                );
                return false
            }
        }
        if let Some(next) = self.modules.get(idx) {
            if data.size != 0 && data.load_address + data.size > next.load_address {
                log::warn!(
                    "not loading module {}: overlaps {}",
                    data.path.display(),
                    next.path.display()
                );
                return false
            }
        }

        let () = self.modules.insert(idx, data);
        true
    }

    /// Remove `module` from the list, marking it unloaded.
    ///
    /// Handles referencing the module keep its memory alive, but
    /// degrade to invalid on their next access.
    pub fn unload(&mut self, module: &Module) -> bool {
        let data = if let Some(data) = module.data.as_ref() {
            data
        } else {
            return false
        };

        if let Some(idx) = self.modules.iter().position(|m| Rc::ptr_eq(m, data)) {
            let removed = self.modules.remove(idx);
            let () = removed.unloaded.set(true);
            true
        } else {
            false
        }
    }

    /// Find the module covering `addr`.
    ///
    /// An empty handle is returned if no module covers the address.
    pub fn find_module(&self, addr: Addr) -> Module {
        self.find_module_data(addr)
            .map(Module::from_data)
            .unwrap_or_default()
    }

    /// Resolve `addr` into a symbol context.
    ///
    /// Whichever of the six context fields the covering module's data
    /// supports at `addr` are populated; an address outside every
    /// module yields an entirely empty context. Resolution never
    /// fails.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self)))]
    pub fn resolve_context(&self, addr: Addr) -> SymbolContext {
        let data = if let Some(data) = self.find_module_data(addr) {
            data
        } else {
            log::debug!("no module covers {addr:#x}");
            return SymbolContext::new()
        };
        resolve_in_module(data, addr)
    }

    fn find_module_data(&self, addr: Addr) -> Option<&Rc<ModuleData>> {
        let idx = find_match_or_lower_bound_by(&self.modules, addr, |m| m.load_address)?;
        let module = self.modules.get(idx)?;
        // A module of unknown size has its range end at the end of the
        // address space, so this only rejects addresses past a sized
        // module.
        if addr >= module.range_end() {
            None
        } else {
            Some(module)
        }
    }
}


fn resolve_in_module(data: &Rc<ModuleData>, addr: Addr) -> SymbolContext {
    let weak = Rc::downgrade(data);
    let module = Module::from_data(data);

    let mut compile_unit = CompileUnit::default();
    let mut function = Function::default();
    let mut block = Block::default();
    let mut line_entry = LineEntry::default();
    let mut symbol = Symbol::default();

    for unit in data.units.iter() {
        if let Some(idx) = unit.find_function(addr) {
            let func_data = &unit.functions[unit.addresses[idx].function];
            compile_unit = CompileUnit::from_data(unit, Weak::clone(&weak));
            function = Function::from_data(func_data, Weak::clone(&weak));

            let innermost = BlockData::find_innermost(&func_data.body, addr);
            block = Block::from_data(&innermost, Weak::clone(&weak));

            if let Some(entry) = unit.lines.find_entry(addr) {
                line_entry = entry;
            }
            break
        }
    }

    if !compile_unit.is_valid() {
        // No function covers the address, but line table data still
        // may; it then also decides the compile unit.
        for unit in data.units.iter() {
            if let Some(entry) = unit.lines.find_entry(addr) {
                compile_unit = CompileUnit::from_data(unit, Weak::clone(&weak));
                line_entry = entry;
                break
            }
        }
    }

    if let Some(sym_data) = find_symbol(data, addr) {
        symbol = Symbol::from_data(&sym_data, weak);
    }

    log::debug!("resolved {addr:#x} in {}", data.path.display());
    SymbolContext::from_parts(module, compile_unit, function, block, line_entry, symbol)
}


/// Find the symbol table entry covering `addr`.
///
/// A symbol of known size covers `[addr, addr + size)`; one of unknown
/// (zero) size extends to the next symbol or the module end.
fn find_symbol(data: &ModuleData, addr: Addr) -> Option<Rc<SymbolData>> {
    let symbols = &data.symbols;
    let idx = find_match_or_lower_bound_by(symbols, addr, |sym| sym.addr)?;

    let mut found = None;
    for (i, sym) in symbols.iter().enumerate().skip(idx) {
        if sym.addr > addr {
            break
        }
        let end = if sym.size > 0 {
            sym.addr + sym.size
        } else {
            symbols
                .get(i + 1)
                .map(|next| next.addr)
                .unwrap_or_else(|| data.range_end())
        };
        if addr < end {
            found = Some(Rc::clone(sym));
        }
    }
    found
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;

    use crate::FunctionBuilder;
    use crate::SymType;
    use crate::UnitBuilder;

    use test_log::test;


    fn test_module(path: &str, load_address: Addr, size: usize) -> Module {
        Module::builder(path)
            .load_address(load_address)
            .size(size)
            .symbol("anchor", 0x0, 0x10, SymType::Function)
            .build()
    }

    /// Check that modules are found by address, irrespective of
    /// insertion order.
    #[test]
    fn module_finding() {
        let mut modules = ModuleList::new();
        assert!(modules.is_empty());
        assert!(modules.insert(test_module("/lib/high.so", 0x7000_0000, 0x4000)));
        assert!(modules.insert(test_module("/lib/low.so", 0x1000, 0x2000)));
        assert_eq!(modules.len(), 2);

        let module = modules.find_module(0x1800);
        assert_eq!(module.path(), Some(Path::new("/lib/low.so")));
        let module = modules.find_module(0x7000_3fff);
        assert_eq!(module.path(), Some(Path::new("/lib/high.so")));

        // Addresses outside both modules yield empty handles.
        assert!(!modules.find_module(0xfff).is_valid());
        assert!(!modules.find_module(0x3000).is_valid());
        assert!(!modules.find_module(0x7000_4000).is_valid());
    }

    /// Check that a module of unknown size covers all addresses above
    /// its load address.
    #[test]
    fn unknown_size_module_finding() {
        let mut modules = ModuleList::new();
        assert!(modules.insert(test_module("/lib/debug-only.so", 0x1000, 0)));
        assert!(modules.find_module(0x1000).is_valid());
        assert!(modules.find_module(0xdead_beef).is_valid());
        assert!(!modules.find_module(0xfff).is_valid());
    }

    /// Check that overlapping and empty modules are rejected.
    #[test]
    fn insert_rejection() {
        let mut modules = ModuleList::new();
        assert!(!modules.insert(Module::default()));

        assert!(modules.insert(test_module("/lib/base.so", 0x1000, 0x1000)));
        // Overlap from above.
        assert!(!modules.insert(test_module("/lib/overlap.so", 0x1800, 0x1000)));
        // Overlap from below.
        assert!(!modules.insert(test_module("/lib/under.so", 0x800, 0x1000)));
        // Adjacency is fine.
        assert!(modules.insert(test_module("/lib/next.so", 0x2000, 0x1000)));
        assert_eq!(modules.len(), 2);
    }

    /// Check that unloading removes the module and invalidates
    /// outstanding handles.
    #[test]
    fn module_unloading() {
        let mut modules = ModuleList::new();
        let module = test_module("/lib/gone.so", 0x1000, 0x1000);
        assert!(modules.insert(module.clone()));

        let found = modules.find_module(0x1234);
        assert!(found.is_valid());

        assert!(modules.unload(&module));
        assert!(modules.is_empty());
        assert!(!module.is_valid());
        assert!(!found.is_valid());

        // A second unload of the same module has nothing to do, nor
        // has unloading an empty handle.
        assert!(!modules.unload(&module));
        assert!(!modules.unload(&Module::default()));

        // A once unloaded module cannot be loaded again.
        assert!(!modules.insert(module));
    }

    /// Check that an address covered only by line table data resolves
    /// to a compile unit and line entry, but no function.
    #[test]
    fn line_only_resolution() {
        let module = Module::builder("/bin/lineonly")
            .load_address(0x1000)
            .size(0x1000)
            .unit(
                UnitBuilder::new("src/gen.c")
                    .function(FunctionBuilder::new("f", 0x100, 0x140))
                    .line_row(0x200, "src/gen.c", 99, 0)
                    .end_sequence(0x240),
            )
            .build();
        let mut modules = ModuleList::new();
        assert!(modules.insert(module));

        let ctx = modules.resolve_context(0x1220);
        assert!(ctx.is_valid());
        assert!(ctx.module().is_valid());
        assert_eq!(ctx.compile_unit().path(), Some(Path::new("src/gen.c")));
        assert!(!ctx.function().is_valid());
        assert!(!ctx.block().is_valid());
        assert_eq!(ctx.line_entry().line, Some(99));
        assert!(!ctx.symbol().is_valid());
    }

    /// Check that an address outside every module resolves to an
    /// entirely empty context.
    #[test]
    fn unresolvable_address() {
        let mut modules = ModuleList::new();
        assert!(modules.insert(test_module("/lib/low.so", 0x1000, 0x1000)));

        let ctx = modules.resolve_context(0x4000);
        assert!(!ctx.is_valid());
        assert!(!ctx.module().is_valid());
        assert!(!ctx.symbol().is_valid());
    }

    /// Check the symbol coverage rules, including zero sized symbols
    /// extending to the next entry.
    #[test]
    fn symbol_coverage() {
        let module = Module::builder("/bin/syms")
            .load_address(0x1000)
            .size(0x1000)
            .symbol("first", 0x100, 0x20, SymType::Function)
            .symbol("marker", 0x200, 0, SymType::Unknown)
            .symbol("data", 0x300, 0x10, SymType::Variable)
            .build();
        let mut modules = ModuleList::new();
        assert!(modules.insert(module));

        let symbol = modules.resolve_context(0x1110).symbol();
        assert_eq!(symbol.name(), Some("first"));
        assert_eq!(symbol.sym_type(), Some(SymType::Function));
        assert_eq!(symbol.range(), Some(crate::AddrRange::new(0x1100, 0x1120)));

        // Past the end of a sized symbol there is nothing.
        assert!(!modules.resolve_context(0x1120).symbol().is_valid());

        // The zero sized marker extends up to the next symbol.
        let symbol = modules.resolve_context(0x12ff).symbol();
        assert_eq!(symbol.name(), Some("marker"));
        assert_eq!(symbol.size(), Some(0));
        assert_eq!(symbol.range(), None);

        let symbol = modules.resolve_context(0x1300).symbol();
        assert_eq!(symbol.name(), Some("data"));

        // A trailing zero sized symbol would extend to the module end;
        // `data` is sized, however, so past it there is nothing again.
        assert!(!modules.resolve_context(0x1310).symbol().is_valid());
    }
}
