use std::borrow::Cow;
use std::rc::Rc;
use std::rc::Weak;

use crate::block::Block;
use crate::block::BlockBuilder;
use crate::block::BlockData;
use crate::demangle;
use crate::module;
use crate::module::ModuleData;
use crate::Addr;
use crate::AddrRange;


#[derive(Debug)]
pub(crate) struct FunctionData {
    pub(crate) name: String,
    pub(crate) range: AddrRange,
    /// The root block of the function's lexical scope tree, covering
    /// the whole function range.
    pub(crate) body: Rc<BlockData>,
}


/// A handle on a function (subprogram) as described by debug
/// information, including its lexical scope tree.
///
/// A default constructed handle is empty and invalid, as is any handle
/// whose module has been unloaded.
#[derive(Clone, Debug, Default)]
pub struct Function {
    data: Option<Rc<FunctionData>>,
    module: Weak<ModuleData>,
}

impl Function {
    /// Check whether the handle references a live function.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Retrieve the function's linkage name.
    pub fn name(&self) -> Option<&str> {
        self.live().map(|data| data.name.as_str())
    }

    /// Retrieve the function's name in demangled form.
    ///
    /// Without the `demangle` feature (or if the name does not use a
    /// recognized mangling scheme) the raw name is handed back.
    pub fn demangled_name(&self) -> Option<Cow<'_, str>> {
        self.live().map(|data| demangle::maybe_demangle(&data.name))
    }

    /// Retrieve the function's address range.
    pub fn range(&self) -> Option<AddrRange> {
        self.live().map(|data| data.range)
    }

    /// Check whether `addr` falls into the function's range.
    pub fn contains(&self, addr: Addr) -> bool {
        self.range().map(|range| range.contains(addr)).unwrap_or(false)
    }

    /// Retrieve the function's outermost body block.
    ///
    /// For an invalid handle an empty block is returned.
    pub fn block(&self) -> Block {
        self.live()
            .map(|data| Block::from_data(&data.body, Weak::clone(&self.module)))
            .unwrap_or_default()
    }

    fn live(&self) -> Option<&Rc<FunctionData>> {
        let data = self.data.as_ref()?;
        module::is_live(&self.module).then_some(data)
    }

    pub(crate) fn from_data(data: &Rc<FunctionData>, module: Weak<ModuleData>) -> Self {
        Self {
            data: Some(Rc::clone(data)),
            module,
        }
    }
}


/// A builder for one function of a compile unit.
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    range: AddrRange,
    body: BlockBuilder,
}

impl FunctionBuilder {
    /// Create a builder for a function named `name` covering
    /// `[start, end)`. The function's outermost body block covers the
    /// same range.
    pub fn new(name: impl Into<String>, start: Addr, end: Addr) -> Self {
        Self {
            name: name.into(),
            range: AddrRange::new(start, end),
            body: BlockBuilder::new().range(start, end),
        }
    }

    /// Add a child scope to the function's body block.
    pub fn block(mut self, block: BlockBuilder) -> Self {
        self.body = self.body.block(block);
        self
    }

    pub(crate) fn build(self, bias: Addr) -> Rc<FunctionData> {
        let Self { name, range, body } = self;
        Rc::new(FunctionData {
            name,
            range: range.rebase(bias),
            body: body.build(bias, None),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;
    use std::path::PathBuf;


    fn test_module_data() -> Rc<ModuleData> {
        Rc::new(ModuleData {
            path: PathBuf::from("/bin/test"),
            load_address: 0x1000,
            size: 0x1000,
            build_id: None,
            units: Box::default(),
            symbols: Box::default(),
            unloaded: Cell::new(false),
        })
    }

    /// Check that an empty handle is invalid and yields no data.
    #[test]
    fn empty_handle() {
        let function = Function::default();
        assert!(!function.is_valid());
        assert_eq!(function.name(), None);
        assert_eq!(function.range(), None);
        assert!(!function.contains(0x1100));
        assert!(!function.block().is_valid());
    }

    /// Check that a built function reports its attributes, rebased by
    /// the module's load address.
    #[test]
    fn built_function_attributes() {
        let module = test_module_data();
        let data = FunctionBuilder::new("factorial", 0x100, 0x180).build(module.load_address);
        let function = Function::from_data(&data, Rc::downgrade(&module));

        assert!(function.is_valid());
        assert_eq!(function.name(), Some("factorial"));
        assert_eq!(function.range(), Some(AddrRange::new(0x1100, 0x1180)));
        assert!(function.contains(0x1100));
        assert!(!function.contains(0x1180));

        let body = function.block();
        assert!(body.is_valid());
        assert_eq!(body.range_containing(0x1150), Some(AddrRange::new(0x1100, 0x1180)));
        assert!(!body.is_inlined());
    }
}
