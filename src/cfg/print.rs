//! Walks the lowered CFG and emits each reachable node with a symbolic node
//! name (§4.4): decimal names assigned in first-encounter order starting at
//! 0, with `RETURN` reserved for the singleton terminal.

use std::collections::HashMap;
use std::fmt::Display;

use petgraph::graph::NodeIndex;

use crate::pretty::{concat, doc, empty, newline, nest, Doc};

use super::{NodeKind, Program};

impl<M: Display, C: Display> Program<M, C> {
    /// Renders this program's CFG as the textual dump format of §4.4/§6.
    pub fn to_text(&self) -> String {
        if self.is_return(self.entry) {
            return "(EMPTY PROGRAM GRAPH)\n".to_string();
        }
        let names = self.assign_names();
        let blocks = self
            .reachable
            .iter()
            .filter(|&&n| !self.is_return(n))
            .map(|&n| self.node_doc(n, &names));
        concat(blocks).render_string(None)
    }

    fn assign_names(&self) -> HashMap<NodeIndex, usize> {
        let mut names = HashMap::new();
        for &n in &self.reachable {
            if self.is_return(n) {
                continue;
            }
            let next = names.len();
            names.entry(n).or_insert(next);
        }
        names
    }

    fn name_of(&self, node: NodeIndex, names: &HashMap<NodeIndex, usize>) -> String {
        if self.is_return(node) {
            "RETURN".to_string()
        } else {
            names[&node].to_string()
        }
    }

    fn node_doc(&self, node: NodeIndex, names: &HashMap<NodeIndex, usize>) -> Doc {
        let header = doc(format!("{}:", names[&node])) + newline();
        let body = match self.node(node) {
            NodeKind::Basic(bb) => {
                let mutations = concat(bb.mutations.iter().map(|m| doc(format!("{m};")) + newline()));
                let goto = match self.coda(node) {
                    Some(dest) => doc(format!("GOTO: {}", self.name_of(dest, names))) + newline(),
                    None => empty(),
                };
                mutations + goto
            }
            NodeKind::Branch(br) => {
                let cond = doc(format!("{}", br.condition)) + newline();
                let true_dest = match self.true_dest(node) {
                    Some(dest) => doc(format!("TRUE DEST: {}", self.name_of(dest, names))) + newline(),
                    None => empty(),
                };
                let false_dest = match self.false_dest(node) {
                    Some(dest) => doc(format!("FALSE DEST: {}", self.name_of(dest, names))) + newline(),
                    None => empty(),
                };
                cond + true_dest + false_dest
            }
            NodeKind::Return => empty(),
        };
        header + nest(2, body) + newline()
    }
}

#[cfg(test)]
mod tests {
    use crate::structured::CodeBlock;

    #[test]
    fn empty_program_prints_placeholder() {
        let root: CodeBlock<&str, &str> = CodeBlock::new();
        let program = root.to_program().unwrap();
        assert_eq!(program.to_text(), "(EMPTY PROGRAM GRAPH)\n");
    }

    #[test]
    fn straight_line_block_names_nodes_in_order() {
        let root: CodeBlock<&str, &str> = CodeBlock::new();
        root.add_mutation("m1");
        let then_block = root.add_if("c");
        then_block.add_mutation("m2");
        root.add_mutation("m3");
        let program = root.to_program().unwrap();
        let text = program.to_text();
        assert!(text.contains("GOTO: RETURN"));
        assert!(text.contains("TRUE DEST:"));
        assert!(text.contains("FALSE DEST:"));
    }
}
