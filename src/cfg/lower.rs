//! The CFG lowering engine (§4.2): a recursive descent over a structured
//! [`CodeBlock`] that emits [`NodeKind`] nodes and wires their successors.
//!
//! Each block lowers to a *subgraph*: an [`Entry`] (the block's entry node)
//! paired with a [`PendingWire`] (a deferred action that, given the node
//! following this block, wires it in as the block's successor). Composing
//! adjacent items is "fire the current pending wire at the next item's
//! entry, then adopt the next item's wire" — see `advance`.
//!
//! A block's entry is not always known as a concrete node the moment the
//! block finishes lowering: if the block's first item is a `break`, the
//! block's entry *is* wherever that break eventually lands, which is only
//! decided once the enclosing loop's post-loop join node is known. `Entry`
//! represents that either as a resolved node, or as a numbered placeholder
//! ("pending break cell") registered with the target loop, filled in later
//! by `PendingWire::ResolveBreak`.

use std::collections::HashMap;

use log::{debug, trace};
use petgraph::graph::NodeIndex;

use crate::structured::{CodeBlock, Item, Loop};

use super::error::LowerError;
use super::{BasicBlock, BranchBlock, Edge, Graph, NodeKind, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Resolved(NodeIndex),
    /// The value a break registered as cell `1` of loop `0` will resolve to.
    Pending(Loop, usize),
}

/// A deferred wiring action, fired once the node it targets becomes known.
///
/// Generalises the `PendingWire` sketch of the design notes with
/// `SetTrueDest` (needed by the inverted-`if` case) and `ResolveBreak`
/// (needed to let a break's eventual destination be claimed by more than
/// one consumer — see `claim`).
#[derive(Debug, Clone)]
enum PendingWire {
    NoOp,
    SetCoda(NodeIndex),
    SetTrueDest(NodeIndex),
    SetFalseDest(NodeIndex),
    Fanout(Vec<PendingWire>),
    ResolveBreak(Loop, usize),
}

impl PendingWire {
    fn fire<M, C>(self, ctx: &mut LoweringCtx<'_, M, C>, dest: NodeIndex) -> Result<(), LowerError> {
        match self {
            PendingWire::NoOp => {}
            PendingWire::SetCoda(bb) => {
                ctx.graph.add_edge(bb, dest, Edge::Coda);
            }
            PendingWire::SetTrueDest(br) => {
                ctx.graph.add_edge(br, dest, Edge::True);
            }
            PendingWire::SetFalseDest(br) => {
                ctx.graph.add_edge(br, dest, Edge::False);
            }
            PendingWire::Fanout(wires) => {
                for w in wires {
                    w.fire(ctx, dest)?;
                }
            }
            PendingWire::ResolveBreak(loop_id, idx) => {
                let cell = ctx
                    .break_cells
                    .get_mut(&loop_id)
                    .and_then(|cells| cells.get_mut(idx))
                    .ok_or(LowerError::InvalidLoopTarget(loop_id))?;
                let wire = std::mem::replace(cell, PendingWire::NoOp);
                ctx.resolved.insert((loop_id, idx), dest);
                wire.fire(ctx, dest)?;
            }
        }
        Ok(())
    }
}

struct LoweringCtx<'a, M, C> {
    arena: &'a crate::structured::Arena<M, C>,
    graph: Graph<M, C>,
    return_node: NodeIndex,
    /// Loops currently lexically active, keyed by identity; maps to the
    /// loop's `BranchBlock` (the `continue` target).
    loop_branches: HashMap<Loop, NodeIndex>,
    /// Every break-destination setter ever registered for a loop, persisted
    /// across the whole lowering pass (unlike `loop_branches`, never removed
    /// when the loop's body finishes lowering, since a setter fired later by
    /// `ResolveBreak` still needs to find its cell).
    break_cells: HashMap<Loop, Vec<PendingWire>>,
    /// Fills in once a pending break cell's destination becomes known, so a
    /// block whose own exposed entry was itself a break placeholder can be
    /// resolved to a concrete node at the very end.
    resolved: HashMap<(Loop, usize), NodeIndex>,
}

fn resolve_into<M, C>(ctx: &mut LoweringCtx<'_, M, C>, dest: Entry, wire: PendingWire) -> Result<(), LowerError> {
    match dest {
        Entry::Resolved(n) => wire.fire(ctx, n),
        Entry::Pending(loop_id, idx) => claim(ctx, loop_id, idx, wire),
    }
}

/// Registers `wire` to fire once pending break cell `idx` of `loop_id`
/// resolves. If something already claimed that cell (the do-while case,
/// where the same pending entry is both the loop's own re-entry edge and the
/// value exposed to an enclosing construct), both fire.
fn claim<M, C>(ctx: &mut LoweringCtx<'_, M, C>, loop_id: Loop, idx: usize, wire: PendingWire) -> Result<(), LowerError> {
    let cell = ctx
        .break_cells
        .get_mut(&loop_id)
        .and_then(|cells| cells.get_mut(idx))
        .ok_or(LowerError::InvalidLoopTarget(loop_id))?;
    let existing = std::mem::replace(cell, PendingWire::NoOp);
    *cell = match existing {
        PendingWire::NoOp => wire,
        other => PendingWire::Fanout(vec![other, wire]),
    };
    Ok(())
}

fn resolve_entry<M, C>(ctx: &LoweringCtx<'_, M, C>, entry: Entry) -> Result<NodeIndex, LowerError> {
    match entry {
        Entry::Resolved(n) => Ok(n),
        Entry::Pending(loop_id, idx) => ctx
            .resolved
            .get(&(loop_id, idx))
            .copied()
            .ok_or(LowerError::InvalidLoopTarget(loop_id)),
    }
}

/// "Advance to next node `N` with continuation `S`" (§4.2.2).
fn advance<M, C>(
    ctx: &mut LoweringCtx<'_, M, C>,
    initial: &mut Option<Entry>,
    open_bb: &mut Option<NodeIndex>,
    pending_setter: &mut Option<PendingWire>,
    entry: Entry,
    cont: PendingWire,
) -> Result<(), LowerError> {
    if initial.is_none() {
        *initial = Some(entry);
    } else if let Some(setter) = pending_setter.take() {
        resolve_into(ctx, entry, setter)?;
    } else if let Some(bb) = open_bb.take() {
        resolve_into(ctx, entry, PendingWire::SetCoda(bb))?;
    }
    *open_bb = None;
    *pending_setter = Some(cont);
    Ok(())
}

/// Materialises the subgraph built so far (§4.2.5).
fn finish(
    initial: Option<Entry>,
    open_bb: Option<NodeIndex>,
    pending_setter: Option<PendingWire>,
) -> Option<(Entry, PendingWire)> {
    let entry = initial?;
    let exit = match open_bb {
        Some(bb) => PendingWire::SetCoda(bb),
        None => pending_setter.unwrap_or(PendingWire::NoOp),
    };
    Some((entry, exit))
}

fn loop_exit_continuation<M, C>(ctx: &LoweringCtx<'_, M, C>, loop_id: Loop, branch: NodeIndex) -> PendingWire {
    let cell_count = ctx.break_cells.get(&loop_id).map_or(0, |cells| cells.len());
    let mut fanout = Vec::with_capacity(cell_count + 1);
    fanout.push(PendingWire::SetFalseDest(branch));
    for idx in 0..cell_count {
        fanout.push(PendingWire::ResolveBreak(loop_id, idx));
    }
    PendingWire::Fanout(fanout)
}

fn lower_block<M: Clone, C: Clone>(
    ctx: &mut LoweringCtx<'_, M, C>,
    block_id: usize,
) -> Result<Option<(Entry, PendingWire)>, LowerError> {
    let arena = ctx.arena;
    let mut initial: Option<Entry> = None;
    let mut open_bb: Option<NodeIndex> = None;
    let mut pending_setter: Option<PendingWire> = None;

    for item in &arena.blocks[block_id].items {
        match item {
            Item::Mutation(m) => {
                if open_bb.is_none() {
                    let bb = ctx.graph.add_node(NodeKind::Basic(BasicBlock { mutations: Vec::new() }));
                    advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(bb), PendingWire::NoOp)?;
                    open_bb = Some(bb);
                    pending_setter = None;
                }
                if let NodeKind::Basic(data) = &mut ctx.graph[open_bb.unwrap()] {
                    data.mutations.push(m.clone());
                }
            }
            Item::Return => {
                debug!("lowering return");
                advance(
                    ctx,
                    &mut initial,
                    &mut open_bb,
                    &mut pending_setter,
                    Entry::Resolved(ctx.return_node),
                    PendingWire::NoOp,
                )?;
                return Ok(finish(initial, open_bb, pending_setter));
            }
            Item::Continue(loop_id) => {
                let branch = *ctx
                    .loop_branches
                    .get(loop_id)
                    .ok_or(LowerError::InvalidLoopTarget(*loop_id))?;
                debug!("lowering continue to loop branch {branch:?}");
                advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(branch), PendingWire::NoOp)?;
                return Ok(finish(initial, open_bb, pending_setter));
            }
            Item::Break(loop_id) => {
                if !ctx.loop_branches.contains_key(loop_id) {
                    return Err(LowerError::InvalidLoopTarget(*loop_id));
                }
                debug!("registering break-destination setter for loop {loop_id:?}");
                if initial.is_none() {
                    let cells = ctx.break_cells.entry(*loop_id).or_default();
                    cells.push(PendingWire::NoOp);
                    initial = Some(Entry::Pending(*loop_id, cells.len() - 1));
                } else if let Some(setter) = pending_setter.take() {
                    ctx.break_cells.entry(*loop_id).or_default().push(setter);
                } else if let Some(bb) = open_bb.take() {
                    ctx.break_cells.entry(*loop_id).or_default().push(PendingWire::SetCoda(bb));
                }
                open_bb = None;
                pending_setter = Some(PendingWire::NoOp);
                return Ok(finish(initial, open_bb, pending_setter));
            }
            Item::If(cond, then_id) => {
                if let Some((then_entry, then_exit)) = lower_block(ctx, *then_id)? {
                    let branch = ctx.graph.add_node(NodeKind::Branch(BranchBlock { condition: cond.clone() }));
                    trace!("allocated branch {branch:?} for if");
                    resolve_into(ctx, then_entry, PendingWire::SetTrueDest(branch))?;
                    let cont = PendingWire::Fanout(vec![PendingWire::SetFalseDest(branch), then_exit]);
                    advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(branch), cont)?;
                }
            }
            Item::IfElse(cond, then_id, else_id) => {
                let then_sub = lower_block(ctx, *then_id)?;
                let else_sub = lower_block(ctx, *else_id)?;
                match (then_sub, else_sub) {
                    (None, None) => {}
                    (Some((then_entry, then_exit)), None) => {
                        let branch = ctx.graph.add_node(NodeKind::Branch(BranchBlock { condition: cond.clone() }));
                        resolve_into(ctx, then_entry, PendingWire::SetTrueDest(branch))?;
                        let cont = PendingWire::Fanout(vec![PendingWire::SetFalseDest(branch), then_exit]);
                        advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(branch), cont)?;
                    }
                    (None, Some((else_entry, else_exit))) => {
                        let branch = ctx.graph.add_node(NodeKind::Branch(BranchBlock { condition: cond.clone() }));
                        resolve_into(ctx, else_entry, PendingWire::SetFalseDest(branch))?;
                        let cont = PendingWire::Fanout(vec![PendingWire::SetTrueDest(branch), else_exit]);
                        advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(branch), cont)?;
                    }
                    (Some((then_entry, then_exit)), Some((else_entry, else_exit))) => {
                        let branch = ctx.graph.add_node(NodeKind::Branch(BranchBlock { condition: cond.clone() }));
                        resolve_into(ctx, then_entry, PendingWire::SetTrueDest(branch))?;
                        resolve_into(ctx, else_entry, PendingWire::SetFalseDest(branch))?;
                        let cont = PendingWire::Fanout(vec![then_exit, else_exit]);
                        advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(branch), cont)?;
                    }
                }
            }
            Item::While(cond, loop_id, body_id) => {
                let branch = ctx.graph.add_node(NodeKind::Branch(BranchBlock { condition: cond.clone() }));
                debug!("entering loop {loop_id:?}, branch {branch:?}");
                ctx.loop_branches.insert(*loop_id, branch);
                let body = lower_block(ctx, *body_id)?;
                ctx.loop_branches.remove(loop_id);
                match body {
                    None => {
                        ctx.graph.add_edge(branch, branch, Edge::True);
                    }
                    Some((entry, exit)) => {
                        resolve_into(ctx, entry, PendingWire::SetTrueDest(branch))?;
                        exit.fire(ctx, branch)?;
                    }
                }
                let cont = loop_exit_continuation(ctx, *loop_id, branch);
                advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, Entry::Resolved(branch), cont)?;
            }
            Item::DoWhile(cond, loop_id, body_id) => {
                let branch = ctx.graph.add_node(NodeKind::Branch(BranchBlock { condition: cond.clone() }));
                debug!("entering do-while loop {loop_id:?}, branch {branch:?}");
                ctx.loop_branches.insert(*loop_id, branch);
                let body = lower_block(ctx, *body_id)?;
                ctx.loop_branches.remove(loop_id);
                let construct_entry = match body {
                    None => {
                        ctx.graph.add_edge(branch, branch, Edge::True);
                        Entry::Resolved(branch)
                    }
                    Some((entry, exit)) => {
                        resolve_into(ctx, entry, PendingWire::SetTrueDest(branch))?;
                        exit.fire(ctx, branch)?;
                        entry
                    }
                };
                let cont = loop_exit_continuation(ctx, *loop_id, branch);
                advance(ctx, &mut initial, &mut open_bb, &mut pending_setter, construct_entry, cont)?;
            }
        }
    }
    Ok(finish(initial, open_bb, pending_setter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::{Arena, BlockData, LoopMeta};

    fn single_item_arena(item: Item<&'static str, &'static str>) -> Arena<&'static str, &'static str> {
        Arena {
            blocks: vec![BlockData {
                items: vec![item],
                parent: None,
                enclosing_loop: None,
            }],
            loops: vec![LoopMeta { label: None }],
        }
    }

    fn lower_root(arena: &Arena<&'static str, &'static str>) -> Result<Option<(Entry, PendingWire)>, LowerError> {
        let mut ctx = LoweringCtx {
            arena,
            graph: Graph::new(),
            return_node: NodeIndex::end(),
            loop_branches: HashMap::new(),
            break_cells: HashMap::new(),
            resolved: HashMap::new(),
        };
        ctx.return_node = ctx.graph.add_node(NodeKind::Return);
        lower_block(&mut ctx, 0)
    }

    #[test]
    fn continue_to_unregistered_loop_is_invalid_target() {
        let bogus_loop = Loop(42);
        let arena = single_item_arena(Item::Continue(bogus_loop));
        let err = lower_root(&arena).unwrap_err();
        assert_eq!(err, LowerError::InvalidLoopTarget(bogus_loop));
    }

    #[test]
    fn break_to_unregistered_loop_is_invalid_target() {
        let bogus_loop = Loop(7);
        let arena = single_item_arena(Item::Break(bogus_loop));
        let err = lower_root(&arena).unwrap_err();
        assert_eq!(err, LowerError::InvalidLoopTarget(bogus_loop));
    }
}

impl<M: Clone, C: Clone> CodeBlock<M, C> {
    /// Lowers this block to a [`Program`] (§4.2.6). Typically called on the
    /// root `CodeBlock` returned by [`CodeBlock::new`].
    pub fn to_program(&self) -> Result<Program<M, C>, LowerError> {
        let arena_guard = self.arena.borrow();
        let mut ctx = LoweringCtx {
            arena: &arena_guard,
            graph: Graph::new(),
            return_node: NodeIndex::end(),
            loop_branches: HashMap::new(),
            break_cells: HashMap::new(),
            resolved: HashMap::new(),
        };
        ctx.return_node = ctx.graph.add_node(NodeKind::Return);

        let subgraph = lower_block(&mut ctx, self.id)?;
        let entry = match subgraph {
            None => ctx.return_node,
            Some((entry, exit)) => {
                let return_node = ctx.return_node;
                resolve_into(&mut ctx, Entry::Resolved(return_node), exit)?;
                resolve_entry(&ctx, entry)?
            }
        };

        let reachable = Program::compute_reachable(&ctx.graph, entry);
        trace!("lowered program with entry {entry:?}, {} reachable node(s)", reachable.len());
        Ok(Program {
            graph: ctx.graph,
            entry,
            return_node: ctx.return_node,
            reachable,
        })
    }
}
