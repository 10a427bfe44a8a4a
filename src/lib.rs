//! Lowers a structured, hierarchical description of an imperative program —
//! sequences of opaque mutations, `if`/`if-else` conditionals, `while`/
//! `do-while` loops, and `break`/`continue`/`return` jumps — into a flat
//! control-flow graph of basic blocks connected by unconditional successors
//! and two-way conditional branches.
//!
//! The crate is parameterised by two opaque, caller-supplied types: a
//! mutation (an atomic state-change expression) and a condition (a
//! boolean-valued expression). Neither is interpreted; both are only routed
//! through the graph.
//!
//! Three modules mirror the three layers of the design:
//!
//! - [`structured`] — the builder API and the tree it assembles.
//! - [`cfg`] — the `Program`/`BasicBlock`/`BranchBlock` output types and the
//!   [`structured::CodeBlock::to_program`] lowering entry point.
//! - [`pretty`] — the document algebra shared by both printers
//!   (`CodeBlock::to_source` and `Program::to_text`).
//!
//! ```
//! use ctrlflow::structured::CodeBlock;
//!
//! let root: CodeBlock<&str, &str> = CodeBlock::new();
//! let (body, loop_handle) = root.add_while("i < n");
//! let then_block = body.add_if("done");
//! then_block.add_break_to(loop_handle).unwrap();
//! body.add_mutation("i += 1");
//!
//! let program = root.to_program().unwrap();
//! println!("{}", program.to_text());
//! ```

pub mod cfg;
pub mod pretty;
pub mod structured;
