//! Integration tests for the CFG lowering engine against the worked
//! scenarios and universal invariants.

use ctrlflow::cfg::{NodeKind, Program};
use ctrlflow::structured::CodeBlock;
use petgraph::graph::NodeIndex;

type Mutation = &'static str;
type Condition = &'static str;

fn mutations_of(program: &Program<Mutation, Condition>, node: NodeIndex) -> Vec<Mutation> {
    match program.node(node) {
        NodeKind::Basic(bb) => bb.mutations.clone(),
        NodeKind::Branch(_) => panic!("expected a basic block at {node:?}, found a branch"),
        NodeKind::Return => panic!("expected a basic block at {node:?}, found RETURN"),
    }
}

fn condition_of(program: &Program<Mutation, Condition>, node: NodeIndex) -> Condition {
    match program.node(node) {
        NodeKind::Branch(br) => br.condition,
        _ => panic!("expected a branch block at {node:?}"),
    }
}

/// Every invariant of §8.1: every reachable non-RETURN node has all its
/// outgoing edges set.
fn assert_fully_wired(program: &Program<Mutation, Condition>) {
    for &node in program.reachable() {
        if program.is_return(node) {
            continue;
        }
        match program.node(node) {
            NodeKind::Basic(_) => {
                assert!(program.coda(node).is_some(), "basic block {node:?} has no coda");
            }
            NodeKind::Branch(_) => {
                assert!(program.true_dest(node).is_some(), "branch {node:?} has no true_dest");
                assert!(program.false_dest(node).is_some(), "branch {node:?} has no false_dest");
            }
            NodeKind::Return => unreachable!(),
        }
    }
}

#[test]
fn s1_return_makes_following_mutations_unreachable() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    root.add_mutation("m1");
    root.add_mutation("m2");
    root.add_return();
    root.add_mutation("m3");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let entry = program.entry();
    assert_eq!(mutations_of(&program, entry), vec!["m1", "m2"]);
    assert!(program.is_return(program.coda(entry).unwrap()));
    assert_eq!(program.reachable().len(), 2);
}

#[test]
fn s2_if_without_else_rejoins_after() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    root.add_mutation("m1");
    let then_block = root.add_if("c");
    then_block.add_mutation("m2");
    root.add_mutation("m3");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let bb0 = program.entry();
    assert_eq!(mutations_of(&program, bb0), vec!["m1"]);
    let branch = program.coda(bb0).unwrap();
    assert_eq!(condition_of(&program, branch), "c");

    let bb1 = program.true_dest(branch).unwrap();
    assert_eq!(mutations_of(&program, bb1), vec!["m2"]);
    let bb2 = program.false_dest(branch).unwrap();
    assert_eq!(mutations_of(&program, bb2), vec!["m3"]);
    assert_eq!(program.coda(bb1).unwrap(), bb2);
    assert!(program.is_return(program.coda(bb2).unwrap()));
}

#[test]
fn s3_while_entry_is_the_branch() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let (body, _loop_handle) = root.add_while("c");
    body.add_mutation("m1");
    root.add_mutation("m2");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let branch = program.entry();
    assert_eq!(condition_of(&program, branch), "c");
    let bb0 = program.true_dest(branch).unwrap();
    assert_eq!(mutations_of(&program, bb0), vec!["m1"]);
    assert_eq!(program.coda(bb0).unwrap(), branch);

    let bb1 = program.false_dest(branch).unwrap();
    assert_eq!(mutations_of(&program, bb1), vec!["m2"]);
    assert!(program.is_return(program.coda(bb1).unwrap()));
}

#[test]
fn s4_do_while_entry_is_the_body() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let (body, _loop_handle) = root.add_do_while("c");
    body.add_mutation("m1");
    root.add_mutation("m2");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let bb0 = program.entry();
    assert_eq!(mutations_of(&program, bb0), vec!["m1"]);
    let branch = program.coda(bb0).unwrap();
    assert_eq!(condition_of(&program, branch), "c");
    assert_eq!(program.true_dest(branch).unwrap(), bb0);

    let bb1 = program.false_dest(branch).unwrap();
    assert_eq!(mutations_of(&program, bb1), vec!["m2"]);
    assert!(program.is_return(program.coda(bb1).unwrap()));
}

#[test]
fn s5_break_out_of_nested_if_inside_while() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let (body1, _loop1) = root.add_while("c1");
    let then_block = body1.add_if("c2");
    then_block.add_break().unwrap();
    body1.add_mutation("m1");
    root.add_mutation("m2");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let br_c1 = program.entry();
    assert_eq!(condition_of(&program, br_c1), "c1");
    let br_c2 = program.true_dest(br_c1).unwrap();
    assert_eq!(condition_of(&program, br_c2), "c2");

    let bb_exit = program.true_dest(br_c2).unwrap();
    assert_eq!(mutations_of(&program, bb_exit), vec!["m2"]);

    let bb_m1 = program.false_dest(br_c2).unwrap();
    assert_eq!(mutations_of(&program, bb_m1), vec!["m1"]);
    assert_eq!(program.coda(bb_m1).unwrap(), br_c1);

    assert_eq!(program.false_dest(br_c1).unwrap(), bb_exit);
    assert!(program.is_return(program.coda(bb_exit).unwrap()));
}

#[test]
fn s6_continue_to_outer_loop_skips_inner_branch() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let (body1, loop1) = root.add_while("c1");
    let (body2, _loop2) = body1.add_while("c2");
    body2.add_continue_to(loop1).unwrap();

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let br_c1 = program.entry();
    assert_eq!(condition_of(&program, br_c1), "c1");
    let br_c2 = program.true_dest(br_c1).unwrap();
    assert_eq!(condition_of(&program, br_c2), "c2");

    assert_eq!(program.true_dest(br_c2).unwrap(), br_c1);
    assert_eq!(program.false_dest(br_c2).unwrap(), br_c1);
    assert!(program.is_return(program.false_dest(br_c1).unwrap()));
}

#[test]
fn s7_if_else_with_empty_then_degenerates_to_inverted_if() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let (_then_block, else_block) = root.add_if_else("c");
    else_block.add_mutation("m1");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let branch = program.entry();
    assert_eq!(condition_of(&program, branch), "c");
    assert!(program.is_return(program.true_dest(branch).unwrap()));

    let bb0 = program.false_dest(branch).unwrap();
    assert_eq!(mutations_of(&program, bb0), vec!["m1"]);
    assert!(program.is_return(program.coda(bb0).unwrap()));
}

#[test]
fn s8_do_while_with_bare_break_body_never_tests_condition() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let (body, loop_handle) = root.add_do_while("c");
    body.add_break_to(loop_handle).unwrap();
    root.add_mutation("m1");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let bb0 = program.entry();
    assert_eq!(mutations_of(&program, bb0), vec!["m1"]);
    assert!(program.is_return(program.coda(bb0).unwrap()));

    // Br(c) was allocated (the loop map needs it before lowering the body)
    // but nothing transfers control into it, so it is excluded from the
    // reachable node set (§3's node-set invariant, §8 S8).
    assert_eq!(program.reachable().len(), 2);
    for &node in program.reachable() {
        assert!(!matches!(program.node(node), NodeKind::Branch(_)));
    }
}

#[test]
fn while_with_empty_body_self_loops() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    root.add_while("c");

    let program = root.to_program().unwrap();
    assert_fully_wired(&program);

    let branch = program.entry();
    assert_eq!(program.true_dest(branch).unwrap(), branch);
    assert!(program.is_return(program.false_dest(branch).unwrap()));
}

#[test]
fn empty_program_entry_is_return() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    let program = root.to_program().unwrap();
    assert!(program.is_return(program.entry()));
    assert_eq!(program.to_text(), "(EMPTY PROGRAM GRAPH)\n");
}

#[test]
fn consecutive_mutations_coalesce_into_one_basic_block() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    root.add_mutation("m1");
    root.add_mutation("m2");
    root.add_mutation("m3");

    let program = root.to_program().unwrap();
    let entry = program.entry();
    assert_eq!(mutations_of(&program, entry), vec!["m1", "m2", "m3"]);
    assert_eq!(program.reachable().len(), 2);
}

#[test]
fn if_with_empty_body_is_dropped_entirely() {
    let root: CodeBlock<Mutation, Condition> = CodeBlock::new();
    root.add_mutation("m1");
    root.add_if("c"); // never populated
    root.add_mutation("m2");

    let program = root.to_program().unwrap();
    let entry = program.entry();
    // No branch was ever allocated: both mutations coalesce into one block.
    assert_eq!(mutations_of(&program, entry), vec!["m1", "m2"]);
    assert_eq!(program.reachable().len(), 2);
}
