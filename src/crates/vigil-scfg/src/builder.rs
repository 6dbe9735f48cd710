//! Recursive SCFG construction over a function body.
//!
//! [`Scfg::process_block`] walks a statement block and emits vertices and
//! edges, inserting synthetic vertices at branch and loop boundaries. The
//! return value is the continuation frontier: the set of vertices control
//! can be at after the block, which the caller uses to wire whatever comes
//! next.

use crate::ast::{Expr, Stmt};
use crate::error::{Result, ScfgError};
use crate::graph::{
    BranchEntry, EdgeInstruction, Guard, Scfg, Vertex, VertexId, VertexKind,
};

impl Scfg {
    /// Construct the section of the graph corresponding to `block`.
    ///
    /// `condition` is the guard sequence accumulated on the current branch;
    /// it is copied here so that additions for this block never leak into
    /// the caller's sequence. `input_variables` are the variables that reach
    /// this block by non-assignment means (function parameters and loop
    /// variables).
    #[allow(unused_assignments)]
    pub fn process_block(
        &mut self,
        block: &[Stmt],
        starting_vertices: &[VertexId],
        condition: &[Guard],
        input_variables: &[String],
    ) -> Result<Vec<VertexId>> {
        let mut condition = condition.to_vec();
        let input_variables = input_variables.to_vec();
        let mut current: Vec<VertexId> = starting_vertices.to_vec();
        let mut path_length = 0usize;

        for (n, stmt) in block.iter().enumerate() {
            let is_last = n == block.len() - 1;
            match stmt {
                Stmt::Assign { .. } | Stmt::Pass | Stmt::Return { .. } | Stmt::Raise { .. } => {
                    path_length += 1;
                    let new_vertex =
                        self.append_statement(stmt, &current, &condition, &input_variables, path_length)?;
                    if matches!(stmt, Stmt::Return { .. }) {
                        self.return_statements.push(new_vertex);
                    }
                    current = vec![new_vertex];
                }

                Stmt::Expr { value } if matches!(value, Expr::Call { .. }) => {
                    path_length += 1;
                    let new_vertex =
                        self.append_statement(stmt, &current, &condition, &input_variables, path_length)?;
                    current = vec![new_vertex];
                }

                // a non-call expression statement changes no bindings
                Stmt::Expr { .. } => {}

                Stmt::If { test, body, orelse } => {
                    path_length += 1;
                    if !is_last {
                        self.branch_initial_statements
                            .push(BranchEntry::PostConditional { stmt: stmt.clone() });
                    }

                    // Flatten the elif chain into (guards, body) pairs. Each
                    // elif carries the negations of every earlier test plus
                    // its own; the else (if present) carries the negations
                    // alone.
                    let mut pairs: Vec<(Vec<Guard>, &[Stmt])> =
                        vec![(vec![Guard::Test(test.clone())], body.as_slice())];
                    let mut negations = vec![Guard::Negated(test.clone())];
                    let mut final_else_present = false;
                    let mut chain: &[Stmt] = orelse;
                    loop {
                        if chain.is_empty() {
                            break;
                        }
                        match &chain[0] {
                            Stmt::If {
                                test: elif_test,
                                body: elif_body,
                                orelse: elif_orelse,
                            } => {
                                let mut guards = negations.clone();
                                guards.push(Guard::Test(elif_test.clone()));
                                pairs.push((guards, elif_body.as_slice()));
                                negations.push(Guard::Negated(elif_test.clone()));
                                chain = elif_orelse;
                            }
                            _ => {
                                pairs.push((negations.clone(), chain));
                                final_else_present = true;
                                break;
                            }
                        }
                    }

                    // Redirect the frontier through a synthetic conditional
                    // head so branch edges all leave a single vertex.
                    let cond_vertex = self
                        .add_vertex(Vertex::synthetic(VertexKind::Conditional, Some(stmt.clone())));
                    for &vertex in &current {
                        self.connect(
                            vertex,
                            cond_vertex,
                            vec![Guard::Label("conditional")],
                            EdgeInstruction::ControlFlow("control-flow"),
                            Vec::new(),
                        )?;
                    }
                    current = vec![cond_vertex];

                    let mut branch_finals: Vec<VertexId> = Vec::new();
                    for (branch_index, (branch_guards, branch_body)) in pairs.iter().enumerate() {
                        let finals = self.process_block(
                            branch_body,
                            &[cond_vertex],
                            branch_guards,
                            &input_variables,
                        )?;
                        branch_finals.extend(finals);
                        let entry_stmt = branch_body
                            .first()
                            .ok_or(ScfgError::UnsupportedNode("empty branch body"))?;
                        self.branch_initial_statements.push(BranchEntry::Conditional {
                            stmt: entry_stmt.clone(),
                            branch_index,
                        });
                    }

                    // Without an else the conditional vertex itself stays in
                    // the frontier: the fall-through case where every test
                    // failed.
                    if !final_else_present {
                        self.branch_initial_statements
                            .push(BranchEntry::ConditionalNoElse {
                                stmt: stmt.clone(),
                                branch_count: pairs.len(),
                            });
                        branch_finals.extend(current.iter().copied());
                    }
                    current = branch_finals;

                    // Branches that ended in return/raise never reach a merge.
                    current.retain(|&vertex| !self.ends_in_terminator(vertex));

                    if !current.is_empty() {
                        let merge =
                            self.add_vertex(Vertex::synthetic(VertexKind::PostConditional, None));
                        self.vertices[cond_vertex.0].post_merge = Some(merge);
                        for &vertex in &current {
                            self.connect(
                                vertex,
                                merge,
                                vec![Guard::Label("post-condition")],
                                EdgeInstruction::ControlFlow("control-flow"),
                                Vec::new(),
                            )?;
                        }
                        current = vec![merge];
                    }

                    condition.push(Guard::Label("skip-conditional"));
                    path_length = 0;
                }

                Stmt::Try { body, handlers } => {
                    path_length += 1;
                    if !is_last {
                        self.branch_initial_statements
                            .push(BranchEntry::PostTryCatch { stmt: stmt.clone() });
                    }

                    let try_vertex =
                        self.add_vertex(Vertex::synthetic(VertexKind::TryCatch, None));
                    for &vertex in &current {
                        self.connect(
                            vertex,
                            try_vertex,
                            vec![Guard::Label("try-catch")],
                            EdgeInstruction::ControlFlow("control-flow"),
                            Vec::new(),
                        )?;
                    }
                    current = vec![try_vertex];

                    let main_entry = body
                        .first()
                        .ok_or(ScfgError::UnsupportedNode("empty try body"))?;
                    self.branch_initial_statements.push(BranchEntry::TryCatch {
                        stmt: main_entry.clone(),
                        role: "try-catch-main",
                    });
                    for handler in handlers {
                        let handler_entry = handler
                            .body
                            .first()
                            .ok_or(ScfgError::UnsupportedNode("empty handler body"))?;
                        self.branch_initial_statements.push(BranchEntry::TryCatch {
                            stmt: handler_entry.clone(),
                            role: "try-catch-handler",
                        });
                    }

                    let mut branch_finals = self.process_block(
                        body,
                        &[try_vertex],
                        &[Guard::Label("try-catch-main")],
                        &input_variables,
                    )?;
                    for handler in handlers {
                        branch_finals.extend(self.process_block(
                            &handler.body,
                            &[try_vertex],
                            &[Guard::Label("try-catch-handler")],
                            &input_variables,
                        )?);
                    }
                    current = branch_finals;
                    current.retain(|&vertex| !self.ends_in_terminator(vertex));

                    if !current.is_empty() {
                        let merge =
                            self.add_vertex(Vertex::synthetic(VertexKind::PostTryCatch, None));
                        self.vertices[try_vertex.0].post_merge = Some(merge);
                        for &vertex in &current {
                            self.connect(
                                vertex,
                                merge,
                                vec![Guard::Label("post-try-catch")],
                                EdgeInstruction::ControlFlow("control-flow"),
                                Vec::new(),
                            )?;
                        }
                        current = vec![merge];
                    }

                    condition.push(Guard::Label("skip-try-catch"));
                    path_length = 0;
                }

                Stmt::For { target, iter, body } => {
                    path_length += 1;
                    let loop_variables = loop_target_names(target)?;
                    let mut body_inputs = input_variables.clone();
                    body_inputs.extend(loop_variables);
                    current = self.append_loop(
                        stmt,
                        body,
                        &current,
                        iter,
                        &body_inputs,
                    )?;
                    condition.push(Guard::Label("skip-loop"));
                    path_length = 0;
                }

                Stmt::While { test, body } => {
                    // Structurally identical to a for loop: a while guards
                    // entry with its test and binds no loop variable.
                    path_length += 1;
                    current = self.append_loop(stmt, body, &current, test, &input_variables)?;
                    condition.push(Guard::Label("skip-loop"));
                    path_length = 0;
                }
            }
        }

        Ok(current)
    }

    /// Append one straight-line statement to every vertex in the frontier,
    /// producing a single new state vertex.
    fn append_statement(
        &mut self,
        stmt: &Stmt,
        current: &[VertexId],
        condition: &[Guard],
        input_variables: &[String],
        path_length: usize,
    ) -> Result<VertexId> {
        let reference_variables = self.reference_variables.clone();
        let new_vertex = self.add_vertex(Vertex::from_statement(
            stmt,
            path_length,
            &reference_variables,
        )?);
        for &vertex in current {
            self.connect(
                vertex,
                new_vertex,
                condition.to_vec(),
                EdgeInstruction::Statement(stmt.clone()),
                input_variables.to_vec(),
            )?;
        }
        Ok(new_vertex)
    }

    /// Build the loop head, body, back-edges and skip edge shared by for
    /// and while loops. `guard` is the iterable (for) or the test (while);
    /// its negation guards the skip edge for the empty/false case.
    fn append_loop(
        &mut self,
        stmt: &Stmt,
        body: &[Stmt],
        current: &[VertexId],
        guard: &Expr,
        body_inputs: &[String],
    ) -> Result<Vec<VertexId>> {
        let loop_vertex = self.add_vertex(Vertex::synthetic(VertexKind::Loop, None));
        let post_loop = self.add_vertex(Vertex::synthetic(VertexKind::PostLoop, None));

        for &vertex in current {
            self.connect(
                vertex,
                loop_vertex,
                vec![Guard::Test(guard.clone())],
                EdgeInstruction::ControlFlow("loop"),
                Vec::new(),
            )?;
        }

        let body_finals = self.process_block(
            body,
            &[loop_vertex],
            &[Guard::Label("enter-loop")],
            body_inputs,
        )?;

        let body_entry = body
            .first()
            .ok_or(ScfgError::UnsupportedNode("empty loop body"))?;
        self.branch_initial_statements.push(BranchEntry::Loop {
            body_entry: body_entry.clone(),
            loop_stmt: stmt.clone(),
        });

        // Every body-final vertex can either iterate again or leave.
        for &final_vertex in &body_finals {
            self.connect(
                final_vertex,
                loop_vertex,
                vec![Guard::Label("loop-jump")],
                EdgeInstruction::ControlFlow("loop-jump"),
                Vec::new(),
            )?;
            self.connect(
                final_vertex,
                post_loop,
                vec![Guard::Label("post-loop")],
                EdgeInstruction::ControlFlow("post-loop"),
                Vec::new(),
            )?;
        }

        // The empty-sequence (or initially-false) case bypasses the body.
        self.connect(
            loop_vertex,
            post_loop,
            vec![Guard::Negated(guard.clone())],
            EdgeInstruction::ControlFlow("loop-skip"),
            Vec::new(),
        )?;

        Ok(vec![post_loop])
    }
}

fn loop_target_names(target: &Expr) -> Result<Vec<String>> {
    match target {
        Expr::Name { id } => Ok(vec![id.clone()]),
        Expr::Tuple { elts } => elts
            .iter()
            .map(|elt| match elt {
                Expr::Name { id } => Ok(id.clone()),
                _ => Err(ScfgError::UnsupportedNode("loop target element")),
            })
            .collect(),
        _ => Err(ScfgError::UnsupportedNode("loop target")),
    }
}
