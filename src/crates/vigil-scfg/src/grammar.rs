//! Context-free grammar derivation from an SCFG.
//!
//! Each vertex maps to a list of symbol sequences describing every legal
//! continuation of execution from that vertex. Edges are terminal symbols,
//! vertices non-terminal; expanding non-terminals recursively enumerates
//! the legal execution paths. The grammar is intentionally non-minimal: it
//! keeps the branch/merge structure visible for path indexing and test
//! generation.

use crate::graph::{EdgeId, Scfg, VertexId, VertexKind};
use std::collections::HashMap;

/// A grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// An edge: a terminal symbol.
    Terminal(EdgeId),
    /// A vertex: a non-terminal, expandable via its own rules.
    NonTerminal(VertexId),
    /// The empty string, produced by sink vertices.
    Epsilon,
}

/// One production rule: a sequence of symbols.
pub type Rule = Vec<Symbol>;

/// The derived grammar: every vertex of the graph is a key.
pub type Grammar = HashMap<VertexId, Vec<Rule>>;

impl Scfg {
    /// Derive the path grammar of this graph.
    pub fn derive_grammar(&self) -> Grammar {
        let mut grammar = Grammar::new();

        for (index, vertex) in self.vertices.iter().enumerate() {
            let id = VertexId(index);

            if vertex.outgoing.is_empty() {
                // control flow can end here
                grammar.insert(id, vec![vec![Symbol::Epsilon]]);
                continue;
            }

            let first = vertex.outgoing[0];
            let first_target = self.edge(first).target;
            let first_kind = self.target_kind(first);

            let rules = match vertex.kind {
                VertexKind::State => match first_kind {
                    VertexKind::Conditional | VertexKind::TryCatch => {
                        // continuation runs through the branch head and, when
                        // one exists, its merge vertex
                        match self.vertex(first_target).post_merge {
                            Some(merge) => vec![vec![
                                Symbol::Terminal(first),
                                Symbol::NonTerminal(first_target),
                                Symbol::NonTerminal(merge),
                            ]],
                            None => vec![vec![
                                Symbol::Terminal(first),
                                Symbol::NonTerminal(first_target),
                            ]],
                        }
                    }
                    VertexKind::PostConditional | VertexKind::PostTryCatch => {
                        // end of the enclosing subgraph
                        vec![vec![Symbol::Terminal(first)]]
                    }
                    _ if self.forks_to_post_loop(vertex) => {
                        self.loop_fork_rules(vertex)
                    }
                    VertexKind::Loop => {
                        let post_loop = self.post_loop_of(first_target);
                        vec![vec![
                            Symbol::Terminal(first),
                            Symbol::NonTerminal(first_target),
                            Symbol::NonTerminal(post_loop),
                        ]]
                    }
                    _ => self.plain_continuation(first, first_kind),
                },

                VertexKind::Loop => {
                    let skip = self.outgoing_with_target_kind(vertex, VertexKind::PostLoop);
                    let entry = self.outgoing_without_target_kind(vertex, VertexKind::PostLoop);
                    vec![
                        vec![Symbol::Terminal(skip)],
                        vec![Symbol::Terminal(entry), Symbol::NonTerminal(self.edge(entry).target)],
                    ]
                }

                VertexKind::Conditional | VertexKind::TryCatch => vertex
                    .outgoing
                    .iter()
                    .map(|&edge| {
                        if self.target_kind(edge).is_post() {
                            // branch jumps straight past the structure
                            vec![Symbol::Terminal(edge)]
                        } else {
                            vec![Symbol::Terminal(edge), Symbol::NonTerminal(self.edge(edge).target)]
                        }
                    })
                    .collect(),

                VertexKind::PostConditional => {
                    if first_kind == VertexKind::Loop {
                        // inside a loop body: one rule iterates, one exits
                        vec![
                            vec![Symbol::Terminal(first), Symbol::NonTerminal(first_target)],
                            vec![Symbol::Terminal(vertex.outgoing[1])],
                        ]
                    } else {
                        self.plain_continuation(first, first_kind)
                    }
                }

                VertexKind::PostTryCatch | VertexKind::PostLoop => {
                    self.plain_continuation(first, first_kind)
                }
            };

            grammar.insert(id, rules);
        }

        grammar
    }

    fn plain_continuation(&self, edge: EdgeId, target_kind: VertexKind) -> Vec<Rule> {
        if target_kind.is_post() {
            vec![vec![Symbol::Terminal(edge)]]
        } else {
            vec![vec![Symbol::Terminal(edge), Symbol::NonTerminal(self.edge(edge).target)]]
        }
    }

    fn forks_to_post_loop(&self, vertex: &crate::graph::Vertex) -> bool {
        vertex
            .outgoing
            .iter()
            .any(|&edge| self.target_kind(edge) == VertexKind::PostLoop)
    }

    /// Rules for a body-final vertex: one rule loops back through the head,
    /// one takes the exit edge.
    fn loop_fork_rules(&self, vertex: &crate::graph::Vertex) -> Vec<Rule> {
        let reloop = self.outgoing_with_target_kind(vertex, VertexKind::Loop);
        let exit = self.outgoing_without_target_kind(vertex, VertexKind::Loop);
        vec![
            vec![Symbol::Terminal(reloop), Symbol::NonTerminal(self.edge(reloop).target)],
            vec![Symbol::Terminal(exit)],
        ]
    }

    fn outgoing_with_target_kind(
        &self,
        vertex: &crate::graph::Vertex,
        kind: VertexKind,
    ) -> EdgeId {
        *vertex
            .outgoing
            .iter()
            .find(|&&edge| self.target_kind(edge) == kind)
            .expect("loop vertex wiring guarantees both branch edges")
    }

    fn outgoing_without_target_kind(
        &self,
        vertex: &crate::graph::Vertex,
        kind: VertexKind,
    ) -> EdgeId {
        *vertex
            .outgoing
            .iter()
            .find(|&&edge| self.target_kind(edge) != kind)
            .expect("loop vertex wiring guarantees both branch edges")
    }

    /// The post-loop vertex paired with a loop head.
    fn post_loop_of(&self, loop_vertex: VertexId) -> VertexId {
        let edge = self
            .vertex(loop_vertex)
            .outgoing
            .iter()
            .find(|&&edge| self.target_kind(edge) == VertexKind::PostLoop)
            .expect("every loop head has a loop-skip edge");
        self.edge(*edge).target
    }
}
