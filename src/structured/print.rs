//! Reprints a structured program as indented, C-like pseudo-source (§6).

use std::fmt::Display;

use crate::pretty::{concat, doc, empty, newline, nest, Doc};

use super::{Arena, CodeBlock, Item};

impl<M: Display, C: Display> CodeBlock<M, C> {
    /// Renders this block (and everything nested inside it) as source-like text.
    pub fn to_source(&self) -> String {
        let arena = self.arena.borrow();
        block_doc(&arena, self.id).render_string(None)
    }
}

fn block_doc<M: Display, C: Display>(arena: &Arena<M, C>, id: usize) -> Doc {
    let items = concat(arena.blocks[id].items.iter().map(|item| item_doc(arena, item)));
    doc("{") + newline() + nest(2, items) + doc("}") + newline()
}

fn loop_label<M, C>(arena: &Arena<M, C>, target: super::Loop) -> Doc {
    match &arena.loops[target.0].label {
        Some(label) => doc(format!("{label}:")) + newline(),
        None => empty(),
    }
}

fn item_doc<M: Display, C: Display>(arena: &Arena<M, C>, item: &Item<M, C>) -> Doc {
    match item {
        Item::Mutation(m) => doc(format!("{m};")) + newline(),
        Item::Return => doc("return;") + newline(),
        Item::Continue(target) => jump_doc(arena, *target, "continue"),
        Item::Break(target) => jump_doc(arena, *target, "break"),
        Item::If(cond, then_id) => {
            doc(format!("if ({cond}) ")) + block_doc(arena, *then_id)
        }
        Item::IfElse(cond, then_id, else_id) => {
            doc(format!("if ({cond}) "))
                + block_doc(arena, *then_id)
                + doc("else ")
                + block_doc(arena, *else_id)
        }
        Item::While(cond, loop_id, body_id) => {
            loop_label(arena, *loop_id) + doc(format!("while ({cond}) ")) + block_doc(arena, *body_id)
        }
        Item::DoWhile(cond, loop_id, body_id) => {
            loop_label(arena, *loop_id)
                + doc("do ")
                + block_doc(arena, *body_id)
                + doc(format!("while ({cond});"))
                + newline()
        }
    }
}

fn jump_doc<M, C>(arena: &Arena<M, C>, target: super::Loop, keyword: &'static str) -> Doc {
    match &arena.loops[target.0].label {
        Some(label) => doc(format!("{keyword} {label};")) + newline(),
        None => doc(format!("{keyword};")) + newline(),
    }
}
