use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

use crate::block::Block;
use crate::block::InlinedFn;
use crate::func::Function;
use crate::line::LineEntry;
use crate::module::Module;
use crate::sym::Symbol;
use crate::unit::CompileUnit;
use crate::Addr;
use crate::AddrRange;


/// Synthesize the line entry describing the call site recorded in
/// `inlined`, covering `range`.
fn call_site_entry(inlined: &InlinedFn, range: AddrRange) -> LineEntry {
    let dir = inlined
        .call_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf);
    let file = inlined
        .call_file
        .file_name()
        .unwrap_or(OsStr::new(""))
        .to_os_string();

    LineEntry {
        dir,
        file,
        line: (inlined.call_line != 0).then_some(inlined.call_line),
        column: if inlined.call_line != 0 {
            Some(inlined.call_column)
        } else {
            None
        },
        range,
        _non_exhaustive: (),
    }
}


/// The result of resolving an address against a set of loaded modules:
/// the module, compile unit, function, lexical block, line entry, and
/// symbol that the address falls into.
///
/// Every field is independently optional and absence is an expected,
/// non-exceptional outcome of incomplete debug information: a stripped
/// binary may yield only a symbol, a binary with full debug data all
/// six fields. Accessors hand out empty sentinel values for absent
/// fields; callers distinguish presence through each value's own
/// validity check rather than through errors.
///
/// A context is a snapshot tied to one query. Copies are independent at
/// the field level while sharing the referenced module data, and
/// setters replace fields wholesale without any cross-field
/// recomputation.
#[derive(Clone, Debug, Default)]
pub struct SymbolContext {
    module: Module,
    compile_unit: CompileUnit,
    function: Function,
    block: Block,
    line_entry: LineEntry,
    symbol: Symbol,
}

impl SymbolContext {
    /// Create a context with all fields absent.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        module: Module,
        compile_unit: CompileUnit,
        function: Function,
        block: Block,
        line_entry: LineEntry,
        symbol: Symbol,
    ) -> Self {
        Self {
            module,
            compile_unit,
            function,
            block,
            line_entry,
            symbol,
        }
    }

    /// Check whether at least one field of the context is populated.
    pub fn is_valid(&self) -> bool {
        self.module.is_valid()
            || self.compile_unit.is_valid()
            || self.function.is_valid()
            || self.block.is_valid()
            || self.line_entry.is_valid()
            || self.symbol.is_valid()
    }

    /// Retrieve the module containing the resolved address.
    pub fn module(&self) -> Module {
        self.module.clone()
    }

    /// Retrieve the compile unit covering the resolved address.
    pub fn compile_unit(&self) -> CompileUnit {
        self.compile_unit.clone()
    }

    /// Retrieve the function enclosing the resolved address.
    pub fn function(&self) -> Function {
        self.function.clone()
    }

    /// Retrieve the innermost lexical block containing the resolved
    /// address.
    pub fn block(&self) -> Block {
        self.block.clone()
    }

    /// Retrieve the line entry covering the resolved address.
    pub fn line_entry(&self) -> LineEntry {
        self.line_entry.clone()
    }

    /// Retrieve the symbol table entry nearest to the resolved
    /// address.
    pub fn symbol(&self) -> Symbol {
        self.symbol.clone()
    }

    /// Replace the context's module.
    pub fn set_module(&mut self, module: Module) {
        self.module = module;
    }

    /// Replace the context's compile unit.
    pub fn set_compile_unit(&mut self, compile_unit: CompileUnit) {
        self.compile_unit = compile_unit;
    }

    /// Replace the context's function.
    pub fn set_function(&mut self, function: Function) {
        self.function = function;
    }

    /// Replace the context's block.
    pub fn set_block(&mut self, block: Block) {
        self.block = block;
    }

    /// Replace the context's line entry.
    pub fn set_line_entry(&mut self, line_entry: LineEntry) {
        self.line_entry = line_entry;
    }

    /// Replace the context's symbol.
    pub fn set_symbol(&mut self, symbol: Symbol) {
        self.symbol = symbol;
    }

    /// Resolve the parent frame of an inlined scope.
    ///
    /// `curr_frame_pc` is the program counter of the (possibly
    /// virtual) frame this context describes. If the context's block
    /// at that address is part of an inlined function body, the
    /// returned context describes the scope the call was inlined into:
    /// the same module, compile unit, function, and symbol, with the
    /// block replaced by the next enclosing inlined block (or the
    /// function's body for the last virtual frame) and the line entry
    /// replaced by the call site of the inlined function. The returned
    /// address is where logical execution resumes in that parent
    /// scope; feeding it into another call walks the whole chain of
    /// inlined calls outward, one virtual frame at a time, until
    /// `None` marks the first frame that is not inlined.
    ///
    /// `None` is also returned if the context has no function or no
    /// block covering `curr_frame_pc`.
    ///
    /// When several nested inlined blocks share a range base the
    /// innermost one (relative to the context's block) is consumed
    /// first, so the walk is deterministic.
    pub fn parent_of_inlined_scope(&self, curr_frame_pc: Addr) -> Option<(SymbolContext, Addr)> {
        if !self.function.is_valid() {
            return None
        }

        let curr_inlined_block = self.block.containing_inlined_block()?;
        let range = curr_inlined_block.range_containing(curr_frame_pc)?;
        let call_site = curr_inlined_block.inlined_fn()?.clone();

        // The parent scope is the next inlined block up the tree, or
        // the function's own body for the last virtual frame.
        let parent_block = curr_inlined_block
            .inlined_parent()
            .unwrap_or_else(|| self.function.block());

        let parent_pc = range.start;
        let mut parent = self.clone();
        parent.block = parent_block;
        parent.line_entry = call_site_entry(&call_site, AddrRange::new(parent_pc, range.end));
        Some((parent, parent_pc))
    }

    /// Append a human readable rendering of the populated fields to
    /// `dst`, one labeled line per field in a fixed order.
    ///
    /// Returns `Ok(false)` without producing output if the context is
    /// entirely empty. The text is meant for diagnostics; its exact
    /// shape is not a stable interface.
    pub fn write_description<W>(&self, dst: &mut W) -> Result<bool, fmt::Error>
    where
        W: fmt::Write,
    {
        let mut written = false;

        if let Some(path) = self.module.path() {
            let load = self.module.load_address().unwrap_or_default();
            let () = writeln!(dst, "module: {} @ {load:#x}", path.display())?;
            written = true;
        }

        if let Some(path) = self.compile_unit.path() {
            let () = writeln!(dst, "compile unit: {}", path.display())?;
            written = true;
        }

        if let Some(name) = self.function.name() {
            let () = write!(dst, "function: {name}")?;
            if let Some(range) = self.function.range() {
                let () = write!(dst, " [{:#x}, {:#x})", range.start, range.end)?;
            }
            let () = writeln!(dst)?;
            written = true;
        }

        if self.block.is_valid() {
            let () = write!(dst, "block:")?;
            for range in self.block.ranges() {
                let () = write!(dst, " [{:#x}, {:#x})", range.start, range.end)?;
            }
            if let Some(inlined) = self.block.inlined_fn() {
                let () = write!(dst, " inlined {}", inlined.name)?;
            }
            let () = writeln!(dst)?;
            written = true;
        }

        if self.line_entry.is_valid() {
            let path = self.line_entry.to_path();
            let path = path.display();
            let () = match (self.line_entry.line, self.line_entry.column) {
                (Some(line), Some(column)) => {
                    writeln!(dst, "line entry: {path}:{line}:{column}")?
                }
                (Some(line), None) => writeln!(dst, "line entry: {path}:{line}")?,
                (None, _) => writeln!(dst, "line entry: {path}")?,
            };
            written = true;
        }

        if let Some(name) = self.symbol.name() {
            let () = write!(dst, "symbol: {name}")?;
            if let Some(addr) = self.symbol.addr() {
                let () = write!(dst, " @ {addr:#x}")?;
            }
            if let Some(size) = self.symbol.size() {
                if size > 0 {
                    let () = write!(dst, " size {size}")?;
                }
            }
            let () = writeln!(dst)?;
            written = true;
        }

        Ok(written)
    }
}

impl fmt::Display for SymbolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_description(f).map(|_written| ())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_helper::inline_chain_list;
    use crate::test_helper::LOAD_ADDRESS;
    use crate::ModuleList;

    use test_log::test;


    /// Resolve a fully populated context from the fixture.
    fn full_context() -> (ModuleList, Module, SymbolContext) {
        let (modules, module) = inline_chain_list();
        let ctx = modules.resolve_context(LOAD_ADDRESS + 0x140);
        (modules, module, ctx)
    }

    /// Check that a context is valid iff at least one of its six
    /// fields is populated, for every combination of populated fields.
    #[test]
    fn validity_of_all_subsets() {
        let (_modules, _module, full) = full_context();
        assert!(full.module().is_valid());
        assert!(full.compile_unit().is_valid());
        assert!(full.function().is_valid());
        assert!(full.block().is_valid());
        assert!(full.line_entry().is_valid());
        assert!(full.symbol().is_valid());

        for mask in 0..64u32 {
            let mut ctx = SymbolContext::new();
            if mask & 0b000001 != 0 {
                ctx.set_module(full.module());
            }
            if mask & 0b000010 != 0 {
                ctx.set_compile_unit(full.compile_unit());
            }
            if mask & 0b000100 != 0 {
                ctx.set_function(full.function());
            }
            if mask & 0b001000 != 0 {
                ctx.set_block(full.block());
            }
            if mask & 0b010000 != 0 {
                ctx.set_line_entry(full.line_entry());
            }
            if mask & 0b100000 != 0 {
                ctx.set_symbol(full.symbol());
            }
            assert_eq!(ctx.is_valid(), mask != 0, "mask {mask:#08b}");
        }
    }

    /// Check that setting a field a second time fully overwrites the
    /// first value.
    #[test]
    fn wholesale_field_replacement() {
        let (modules, _module, full) = full_context();

        let mut ctx = SymbolContext::new();
        ctx.set_function(full.function());
        assert_eq!(ctx.function().name(), Some("ccc"));

        // Overwrite with the plain function; nothing of `ccc` remains
        // observable.
        let other = modules.resolve_context(LOAD_ADDRESS + 0x80);
        ctx.set_function(other.function());
        assert_eq!(ctx.function().name(), Some("main"));

        // Overwriting with an empty handle clears the field.
        ctx.set_function(Function::default());
        assert!(!ctx.function().is_valid());
        assert_eq!(ctx.function().name(), None);
    }

    /// Check that copies are independent at the field level but share
    /// the referenced module data.
    #[test]
    fn copy_independence() {
        let (mut modules, module, ctx) = full_context();

        let mut copy = ctx.clone();
        copy.set_function(Function::default());
        copy.set_line_entry(LineEntry::default());
        assert!(ctx.function().is_valid());
        assert!(ctx.line_entry().is_valid());
        assert!(!copy.function().is_valid());

        // Unloading the module is observed through both contexts, as
        // they share the referenced module.
        assert!(modules.unload(&module));
        assert!(!ctx.module().is_valid());
        assert!(!copy.module().is_valid());
        assert!(!ctx.function().is_valid());
        // The line entry is a plain value snapshot and survives the
        // unload.
        assert!(ctx.line_entry().is_valid());
    }

    /// Check that resolving the parent of an inlined scope fails on a
    /// context without a function.
    #[test]
    fn inlined_parent_without_function() {
        let (_modules, _module, full) = full_context();

        let ctx = SymbolContext::new();
        assert!(ctx.parent_of_inlined_scope(LOAD_ADDRESS + 0x140).is_none());

        // A symbol alone does not enable the walk either.
        let mut ctx = SymbolContext::new();
        ctx.set_symbol(full.symbol());
        assert!(ctx.parent_of_inlined_scope(LOAD_ADDRESS + 0x140).is_none());
    }

    /// Check that a context in a non-inlined frame terminates the
    /// walk.
    #[test]
    fn inlined_parent_of_concrete_frame() {
        let (modules, _module, _full) = full_context();
        let ctx = modules.resolve_context(LOAD_ADDRESS + 0x80);
        assert_eq!(ctx.function().name(), Some("main"));
        assert!(ctx.parent_of_inlined_scope(LOAD_ADDRESS + 0x80).is_none());
    }

    /// Check that describing an empty context writes nothing.
    #[test]
    fn describe_empty() {
        let ctx = SymbolContext::new();
        let mut text = String::new();
        let written = ctx.write_description(&mut text).unwrap();
        assert!(!written);
        assert_eq!(text, "");
        assert_eq!(ctx.to_string(), "");
    }

    /// Check that describing a context with only a symbol mentions the
    /// symbol's name.
    #[test]
    fn describe_symbol_only() {
        let (modules, _module, _full) = full_context();
        // The fixture has a symbol-only region without debug
        // information.
        let ctx = modules.resolve_context(LOAD_ADDRESS + 0x310);
        assert!(!ctx.function().is_valid());
        assert!(ctx.symbol().is_valid());

        let mut text = String::new();
        let written = ctx.write_description(&mut text).unwrap();
        assert!(written);
        assert!(text.contains("symbol: build_tag"), "{text}");
        assert!(!text.contains("function:"), "{text}");
    }

    /// Check the description of a fully populated context.
    #[test]
    fn describe_full() {
        let (_modules, _module, full) = full_context();
        let text = full.to_string();
        assert!(text.contains("module: /opt/fixture/test-chain @ 0x40000000"), "{text}");
        assert!(text.contains("compile unit: src/chain.c"), "{text}");
        assert!(text.contains("function: ccc [0x40000100, 0x40000200)"), "{text}");
        assert!(text.contains("inlined aaa"), "{text}");
        assert!(text.contains("line entry: src/aaa.h:10:3"), "{text}");
        assert!(text.contains("symbol: ccc @ 0x40000100 size 256"), "{text}");
    }
}
