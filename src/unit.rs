use std::cmp::Ordering;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;
use std::rc::Weak;

use crate::func::FunctionBuilder;
use crate::func::FunctionData;
use crate::line::LineTable;
use crate::line::LineTableBuilder;
use crate::module;
use crate::module::ModuleData;
use crate::Addr;
use crate::AddrRange;


/// A single address range of a function within a unit's index.
#[derive(Debug)]
pub(crate) struct FunctionAddress {
    pub(crate) range: AddrRange,
    /// An index into `UnitData::functions`.
    pub(crate) function: usize,
}


#[derive(Debug)]
pub(crate) struct UnitData {
    /// Path of the unit's primary source file.
    pub(crate) path: PathBuf,
    pub(crate) functions: Box<[Rc<FunctionData>]>,
    /// Function address index, sorted by range start.
    pub(crate) addresses: Box<[FunctionAddress]>,
    pub(crate) lines: LineTable,
}

impl UnitData {
    /// Find the index into `addresses` of the function covering
    /// `probe`.
    pub(crate) fn find_function(&self, probe: Addr) -> Option<usize> {
        self.addresses
            .binary_search_by(|address| {
                if probe < address.range.start {
                    Ordering::Greater
                } else if probe >= address.range.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .ok()
    }
}


/// A handle on a compile unit: the debug information of one translation
/// unit of the module's source code.
///
/// A default constructed handle is empty and invalid, as is any handle
/// whose module has been unloaded.
#[derive(Clone, Debug, Default)]
pub struct CompileUnit {
    data: Option<Rc<UnitData>>,
    module: Weak<ModuleData>,
}

impl CompileUnit {
    /// Check whether the handle references a live compile unit.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Retrieve the path of the unit's primary source file.
    pub fn path(&self) -> Option<&Path> {
        self.live().map(|data| data.path.as_path())
    }

    fn live(&self) -> Option<&Rc<UnitData>> {
        let data = self.data.as_ref()?;
        module::is_live(&self.module).then_some(data)
    }

    pub(crate) fn from_data(data: &Rc<UnitData>, module: Weak<ModuleData>) -> Self {
        Self {
            data: Some(Rc::clone(data)),
            module,
        }
    }
}


/// A builder for one compile unit of a module.
#[derive(Debug)]
pub struct UnitBuilder {
    path: PathBuf,
    functions: Vec<FunctionBuilder>,
    lines: LineTableBuilder,
}

impl UnitBuilder {
    /// Create a builder for a unit whose primary source file is
    /// `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            functions: Vec::new(),
            lines: LineTableBuilder::default(),
        }
    }

    /// Add a function to the unit.
    pub fn function(mut self, function: FunctionBuilder) -> Self {
        self.functions.push(function);
        self
    }

    /// Append a row to the unit's line table, the way a line program
    /// emits them: ascending addresses, terminated by
    /// [`end_sequence`][Self::end_sequence].
    pub fn line_row(mut self, addr: Addr, file: impl AsRef<Path>, line: u32, column: u16) -> Self {
        let () = self.lines.row(addr, file.as_ref(), line, column);
        self
    }

    /// Terminate the current line sequence at `addr` (exclusive).
    pub fn end_sequence(mut self, addr: Addr) -> Self {
        let () = self.lines.end_sequence(addr);
        self
    }

    pub(crate) fn build(self, bias: Addr) -> UnitData {
        let Self {
            path,
            functions,
            lines,
        } = self;

        let functions = functions
            .into_iter()
            .map(|function| function.build(bias))
            .collect::<Box<[_]>>();

        // The binary search requires the address index to be sorted.
        // Overlapping function ranges are not expected; for functions
        // sharing a range (e.g., deduplicated identical code) one of
        // them is found.
        let mut addresses = functions
            .iter()
            .enumerate()
            .map(|(idx, function)| FunctionAddress {
                range: function.range,
                function: idx,
            })
            .collect::<Vec<_>>();
        addresses.sort_by_key(|address| address.range.start);

        UnitData {
            path,
            functions,
            addresses: addresses.into_boxed_slice(),
            lines: lines.build(bias),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;


    /// Check that an empty handle is invalid and yields no data.
    #[test]
    fn empty_handle() {
        let unit = CompileUnit::default();
        assert!(!unit.is_valid());
        assert_eq!(unit.path(), None);
    }

    /// Check function-by-address lookups in a built unit.
    #[test]
    fn function_finding() {
        let unit = UnitBuilder::new("src/two.c")
            .function(FunctionBuilder::new("first", 0x100, 0x140))
            .function(FunctionBuilder::new("second", 0x180, 0x1c0))
            .build(0x1000);

        let idx = unit.find_function(0x1100).unwrap();
        let address = &unit.addresses[idx];
        assert_eq!(unit.functions[address.function].name, "first");

        let idx = unit.find_function(0x11bf).unwrap();
        let address = &unit.addresses[idx];
        assert_eq!(unit.functions[address.function].name, "second");

        // The gap between the two functions is not covered, nor is
        // anything before or after them.
        assert_eq!(unit.find_function(0x1150), None);
        assert_eq!(unit.find_function(0xfff), None);
        assert_eq!(unit.find_function(0x11c0), None);
    }
}
