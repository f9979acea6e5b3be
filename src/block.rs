use std::path::PathBuf;
use std::rc::Rc;
use std::rc::Weak;

use crate::module;
use crate::module::ModuleData;
use crate::Addr;
use crate::AddrRange;


/// Information about a function call that the compiler inlined into
/// the enclosing scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlinedFn {
    /// The name of the inlined function.
    pub name: String,
    /// The source file containing the call to the inlined function.
    pub call_file: PathBuf,
    /// The line of the call, with zero meaning unknown.
    pub call_line: u32,
    /// The column of the call, with zero meaning unknown.
    pub call_column: u16,
    /// The struct is non-exhaustive and open to extension.
    #[doc(hidden)]
    pub(crate) _non_exhaustive: (),
}


#[derive(Debug)]
pub(crate) struct BlockData {
    /// The address ranges covered by the block, ascending.
    pub(crate) ranges: Box<[AddrRange]>,
    /// Set if the block is the body of an inlined function call.
    pub(crate) inlined: Option<InlinedFn>,
    pub(crate) parent: Option<Weak<BlockData>>,
    pub(crate) children: Box<[Rc<BlockData>]>,
}

impl BlockData {
    pub(crate) fn contains(&self, addr: Addr) -> bool {
        self.ranges.iter().any(|range| range.contains(addr))
    }

    /// Find the innermost block containing `addr`, starting the
    /// descent at `block`.
    pub(crate) fn find_innermost(block: &Rc<BlockData>, addr: Addr) -> Rc<BlockData> {
        let mut current = Rc::clone(block);
        loop {
            let next = current
                .children
                .iter()
                .find(|child| child.contains(addr))
                .map(Rc::clone);
            match next {
                Some(child) => current = child,
                None => break,
            }
        }
        current
    }
}


/// A handle on a lexical block: a scope nested within a function, or
/// the body of a function call that the compiler inlined.
///
/// A default constructed handle is empty and invalid, as is any handle
/// whose module has been unloaded.
#[derive(Clone, Debug, Default)]
pub struct Block {
    data: Option<Rc<BlockData>>,
    module: Weak<ModuleData>,
}

impl Block {
    /// Check whether the handle references a live block.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.live().is_some()
    }

    /// Retrieve the address ranges covered by the block.
    pub fn ranges(&self) -> &[AddrRange] {
        self.live().map(|data| &data.ranges[..]).unwrap_or(&[])
    }

    /// Check whether `addr` falls into one of the block's ranges.
    pub fn contains(&self, addr: Addr) -> bool {
        self.live().map(|data| data.contains(addr)).unwrap_or(false)
    }

    /// Retrieve the block range covering `addr`, if any.
    pub fn range_containing(&self, addr: Addr) -> Option<AddrRange> {
        self.live()?
            .ranges
            .iter()
            .find(|range| range.contains(addr))
            .copied()
    }

    /// Check whether the block is the body of an inlined call.
    #[inline]
    pub fn is_inlined(&self) -> bool {
        self.inlined_fn().is_some()
    }

    /// Retrieve the inlined-call record of the block, if it represents
    /// one.
    pub fn inlined_fn(&self) -> Option<&InlinedFn> {
        self.live()?.inlined.as_ref()
    }

    /// Retrieve the block's parent scope, if any.
    pub fn parent(&self) -> Option<Block> {
        let data = self.live()?;
        let parent = data.parent.as_ref()?.upgrade()?;
        Some(Block::from_data(&parent, Weak::clone(&self.module)))
    }

    /// Find the closest block at or above this one that represents an
    /// inlined call, starting with the block itself.
    pub fn containing_inlined_block(&self) -> Option<Block> {
        let mut current = self.is_valid().then(|| self.clone())?;
        loop {
            if current.is_inlined() {
                break Some(current)
            }
            current = current.parent()?;
        }
    }

    /// Find the closest proper ancestor of this block that represents
    /// an inlined call.
    pub fn inlined_parent(&self) -> Option<Block> {
        self.parent()?.containing_inlined_block()
    }

    fn live(&self) -> Option<&Rc<BlockData>> {
        let data = self.data.as_ref()?;
        module::is_live(&self.module).then_some(data)
    }

    pub(crate) fn from_data(data: &Rc<BlockData>, module: Weak<ModuleData>) -> Self {
        Self {
            data: Some(Rc::clone(data)),
            module,
        }
    }
}


/// A builder for one node of a function's lexical scope tree.
#[derive(Debug, Default)]
pub struct BlockBuilder {
    ranges: Vec<AddrRange>,
    inlined: Option<InlinedFn>,
    children: Vec<BlockBuilder>,
}

impl BlockBuilder {
    /// Create a builder for a block without any ranges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the address range `[start, end)` to the block.
    pub fn range(mut self, start: Addr, end: Addr) -> Self {
        self.ranges.push(AddrRange::new(start, end));
        self
    }

    /// Mark the block as the body of an inlined call to `name`, called
    /// from the given source location.
    pub fn inlined(
        mut self,
        name: impl Into<String>,
        call_file: impl Into<PathBuf>,
        call_line: u32,
        call_column: u16,
    ) -> Self {
        self.inlined = Some(InlinedFn {
            name: name.into(),
            call_file: call_file.into(),
            call_line,
            call_column,
            _non_exhaustive: (),
        });
        self
    }

    /// Add a child scope to the block.
    pub fn block(mut self, child: BlockBuilder) -> Self {
        self.children.push(child);
        self
    }

    pub(crate) fn build(self, bias: Addr, parent: Option<Weak<BlockData>>) -> Rc<BlockData> {
        let Self {
            mut ranges,
            inlined,
            children,
        } = self;
        ranges.sort_by_key(|range| range.start);

        Rc::new_cyclic(|me| BlockData {
            ranges: ranges.iter().map(|range| range.rebase(bias)).collect(),
            inlined,
            parent,
            children: children
                .into_iter()
                .map(|child| child.build(bias, Some(Weak::clone(me))))
                .collect(),
        })
    }
}
