//! Helpers for setting up fixtures in tests.

use crate::Addr;
use crate::BlockBuilder;
use crate::FunctionBuilder;
use crate::Module;
use crate::ModuleList;
use crate::SymType;
use crate::UnitBuilder;


/// The load address of the fixture module.
pub const LOAD_ADDRESS: Addr = 0x4000_0000;

/// Build a module mimicking a small program with a three level inline
/// chain: `aaa` inlined into `bbb` inlined into the concrete function
/// `ccc`, plus a plain function and a symbol-only data region.
///
/// File-relative layout:
/// - `main` at `[0x40, 0x100)`
/// - `ccc` at `[0x100, 0x200)`, containing the inlined body of `bbb`
///   at `[0x120, 0x180)` (called from `chain.c:40:5`), which in turn
///   contains the inlined body of `aaa` at `[0x130, 0x150)` (called
///   from `bbb.h:21:9`)
/// - symbols `main`, `ccc`, the zero sized `build_tag` at `0x300`, and
///   `blob` at `[0x400, 0x410)`
pub fn inline_chain_module() -> Module {
    Module::builder("/opt/fixture/test-chain")
        .load_address(LOAD_ADDRESS)
        .size(0x2000)
        .build_id([0x12, 0x34, 0x56, 0x78])
        .unit(
            UnitBuilder::new("src/chain.c")
                .function(FunctionBuilder::new("main", 0x40, 0x100))
                .function(
                    FunctionBuilder::new("ccc", 0x100, 0x200).block(
                        BlockBuilder::new()
                            .range(0x120, 0x180)
                            .inlined("bbb", "src/chain.c", 40, 5)
                            .block(
                                BlockBuilder::new()
                                    .range(0x130, 0x150)
                                    .inlined("aaa", "src/bbb.h", 21, 9),
                            ),
                    ),
                )
                .line_row(0x40, "src/chain.c", 50, 0)
                .line_row(0x80, "src/chain.c", 52, 0)
                .end_sequence(0x100)
                .line_row(0x100, "src/chain.c", 38, 0)
                .line_row(0x120, "src/bbb.h", 20, 0)
                .line_row(0x130, "src/aaa.h", 10, 3)
                .line_row(0x150, "src/bbb.h", 22, 0)
                .line_row(0x180, "src/chain.c", 42, 0)
                .end_sequence(0x200),
        )
        .symbol("main", 0x40, 0xc0, SymType::Function)
        .symbol("ccc", 0x100, 0x100, SymType::Function)
        .symbol("build_tag", 0x300, 0, SymType::Unknown)
        .symbol("blob", 0x400, 0x10, SymType::Variable)
        .build()
}

/// Build a [`ModuleList`] containing just the fixture module, handing
/// back the module alongside.
pub fn inline_chain_list() -> (ModuleList, Module) {
    let module = inline_chain_module();
    let mut modules = ModuleList::new();
    let inserted = modules.insert(module.clone());
    assert!(inserted);
    (modules, module)
}
