//! SCFG construction tests covering straight-line code, conditionals,
//! loops, try/except and the structural invariants the monitor relies on.

use vigil_scfg::ast::{ExceptHandler, Expr, Stmt};
use vigil_scfg::{BranchEntry, EdgeInstruction, Guard, Scfg, VertexId, VertexKind};

fn assign(target: &str, value: Expr) -> Stmt {
    Stmt::assign(Expr::name(target), value)
}

fn call_stmt(func: &str, args: Vec<Expr>) -> Stmt {
    Stmt::call(Expr::name(func), args)
}

/// Every edge endpoint is a member of the vertex arena, and every
/// `previous_edge` back-reference points at an edge targeting that vertex.
fn check_wiring(scfg: &Scfg) {
    for edge in &scfg.edges {
        assert!(edge.source.0 < scfg.vertices.len());
        assert!(edge.target.0 < scfg.vertices.len());
    }
    for (index, vertex) in scfg.vertices.iter().enumerate() {
        if let Some(edge_id) = vertex.previous_edge {
            assert_eq!(scfg.edge(edge_id).target, VertexId(index));
        }
    }
}

fn vertices_of_kind(scfg: &Scfg, kind: VertexKind) -> Vec<VertexId> {
    scfg.vertices
        .iter()
        .enumerate()
        .filter(|(_, v)| v.kind == kind)
        .map(|(i, _)| VertexId(i))
        .collect()
}

#[test]
fn test_straight_line_body() {
    // x = 1; y = f(x); return y
    let body = vec![
        assign("x", Expr::Num { n: 1 }),
        assign("y", Expr::call(Expr::name("f"), vec![Expr::name("x")])),
        Stmt::Return {
            value: Some(Expr::name("y")),
        },
    ];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    // start plus one state per statement, three statement edges, no merges
    assert_eq!(scfg.vertices.len(), 4);
    assert_eq!(scfg.edges.len(), 3);
    assert!(vertices_of_kind(&scfg, VertexKind::PostConditional).is_empty());

    assert!(scfg.vertex(VertexId(1)).names_changed == vec!["x"]);
    assert_eq!(scfg.vertex(VertexId(2)).names_changed, vec!["y", "f"]);
    assert!(scfg.vertex(VertexId(3)).names_changed.is_empty());
    assert_eq!(scfg.return_statements, vec![VertexId(3)]);

    // path lengths count statements from the block start
    assert_eq!(scfg.vertex(VertexId(1)).path_length, Some(1));
    assert_eq!(scfg.vertex(VertexId(3)).path_length, Some(3));
}

#[test]
fn test_conditional_with_else_merges() {
    // if a: x = 1 else: x = 2; y = x
    let body = vec![
        Stmt::If {
            test: Expr::name("a"),
            body: vec![assign("x", Expr::Num { n: 1 })],
            orelse: vec![assign("x", Expr::Num { n: 2 })],
        },
        assign("y", Expr::name("x")),
    ];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    let conditionals = vertices_of_kind(&scfg, VertexKind::Conditional);
    let merges = vertices_of_kind(&scfg, VertexKind::PostConditional);
    assert_eq!(conditionals.len(), 1);
    assert_eq!(merges.len(), 1);

    // two branch edges leave the conditional head
    let head = scfg.vertex(conditionals[0]);
    assert_eq!(head.outgoing.len(), 2);
    assert_eq!(head.post_merge, Some(merges[0]));

    // both branch tails converge on the merge vertex
    let merge = scfg.vertex(merges[0]);
    assert_eq!(merge.outgoing.len(), 1);

    // the trailing assignment hangs off the merge
    let tail_edge = scfg.edge(merge.outgoing[0]);
    let tail = scfg.vertex(tail_edge.target);
    assert_eq!(tail.names_changed, vec!["y"]);
    assert_eq!(tail_edge.condition, vec![Guard::Label("skip-conditional")]);

    // a full if/else records no fall-through entry
    assert!(!scfg
        .branch_initial_statements
        .iter()
        .any(|e| matches!(e, BranchEntry::ConditionalNoElse { .. })));
}

#[test]
fn test_conditional_without_else_falls_through() {
    // if a: return 1; y = 0
    let body = vec![
        Stmt::If {
            test: Expr::name("a"),
            body: vec![Stmt::Return {
                value: Some(Expr::Num { n: 1 }),
            }],
            orelse: vec![],
        },
        assign("y", Expr::Num { n: 0 }),
    ];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    // the return branch never reaches the merge
    let return_vertex = scfg.vertex(scfg.return_statements[0]);
    assert!(return_vertex.outgoing.is_empty());

    // the fall-through branch still produces a merge, fed directly from the
    // conditional head
    let conditionals = vertices_of_kind(&scfg, VertexKind::Conditional);
    let merges = vertices_of_kind(&scfg, VertexKind::PostConditional);
    assert_eq!(merges.len(), 1);
    let head = scfg.vertex(conditionals[0]);
    assert!(head
        .outgoing
        .iter()
        .any(|&e| scfg.edge(e).target == merges[0]));

    let no_else: Vec<_> = scfg
        .branch_initial_statements
        .iter()
        .filter_map(|e| match e {
            BranchEntry::ConditionalNoElse { branch_count, .. } => Some(*branch_count),
            _ => None,
        })
        .collect();
    assert_eq!(no_else, vec![1]);
}

#[test]
fn test_elif_chain_flattens_into_branches() {
    // if a: x=1 elif b: x=2 else: x=3
    let body = vec![Stmt::If {
        test: Expr::name("a"),
        body: vec![assign("x", Expr::Num { n: 1 })],
        orelse: vec![Stmt::If {
            test: Expr::name("b"),
            body: vec![assign("x", Expr::Num { n: 2 })],
            orelse: vec![assign("x", Expr::Num { n: 3 })],
        }],
    }];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    let conditionals = vertices_of_kind(&scfg, VertexKind::Conditional);
    assert_eq!(conditionals.len(), 1);
    let head = scfg.vertex(conditionals[0]);
    assert_eq!(head.outgoing.len(), 3);

    // the elif branch is guarded by the negated first test plus its own,
    // the else branch by both negations
    let elif_edge = scfg.edge(head.outgoing[1]);
    assert_eq!(
        elif_edge.condition,
        vec![
            Guard::Negated(Expr::name("a")),
            Guard::Test(Expr::name("b")),
        ]
    );
    let else_edge = scfg.edge(head.outgoing[2]);
    assert_eq!(
        else_edge.condition,
        vec![
            Guard::Negated(Expr::name("a")),
            Guard::Negated(Expr::name("b")),
        ]
    );

    let branch_indices: Vec<_> = scfg
        .branch_initial_statements
        .iter()
        .filter_map(|e| match e {
            BranchEntry::Conditional { branch_index, .. } => Some(*branch_index),
            _ => None,
        })
        .collect();
    assert_eq!(branch_indices, vec![0, 1, 2]);
}

#[test]
fn test_for_loop_shape() {
    // for i in xs: f(i)
    let body = vec![Stmt::For {
        target: Expr::name("i"),
        iter: Expr::name("xs"),
        body: vec![call_stmt("f", vec![Expr::name("i")])],
    }];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    let loops = vertices_of_kind(&scfg, VertexKind::Loop);
    let post_loops = vertices_of_kind(&scfg, VertexKind::PostLoop);
    assert_eq!(loops.len(), 1);
    assert_eq!(post_loops.len(), 1);

    // exactly one loop-skip edge, from the head straight to post-loop
    let skip_edges: Vec<_> = scfg
        .edges
        .iter()
        .filter(|e| e.instruction == EdgeInstruction::ControlFlow("loop-skip"))
        .collect();
    assert_eq!(skip_edges.len(), 1);
    assert_eq!(skip_edges[0].source, loops[0]);
    assert_eq!(skip_edges[0].target, post_loops[0]);
    assert_eq!(
        skip_edges[0].condition,
        vec![Guard::Negated(Expr::name("xs"))]
    );

    // the body tail can iterate again or leave
    let body_vertex = scfg
        .vertices
        .iter()
        .enumerate()
        .find(|(_, v)| v.names_changed == vec!["f"])
        .map(|(i, _)| VertexId(i))
        .unwrap();
    let targets: Vec<_> = scfg
        .vertex(body_vertex)
        .outgoing
        .iter()
        .map(|&e| scfg.edge(e).target)
        .collect();
    assert_eq!(targets, vec![loops[0], post_loops[0]]);

    // the loop variable reaches body edges as an input variable
    let body_edge = scfg.edge(scfg.vertex(body_vertex).previous_edge.unwrap());
    assert!(body_edge.input_variables.contains(&"i".to_string()));

    assert!(scfg
        .branch_initial_statements
        .iter()
        .any(|e| matches!(e, BranchEntry::Loop { .. })));
}

#[test]
fn test_while_builds_loop_structure() {
    // while ready: step()
    let body = vec![Stmt::While {
        test: Expr::name("ready"),
        body: vec![call_stmt("step", vec![])],
    }];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    let loops = vertices_of_kind(&scfg, VertexKind::Loop);
    let post_loops = vertices_of_kind(&scfg, VertexKind::PostLoop);
    assert_eq!(loops.len(), 1);
    assert_eq!(post_loops.len(), 1);

    let skip_edges: Vec<_> = scfg
        .edges
        .iter()
        .filter(|e| e.instruction == EdgeInstruction::ControlFlow("loop-skip"))
        .collect();
    assert_eq!(skip_edges.len(), 1);
    assert_eq!(
        skip_edges[0].condition,
        vec![Guard::Negated(Expr::name("ready"))]
    );

    // a while binds no loop variable
    let body_vertex = scfg
        .vertices
        .iter()
        .find(|v| v.names_changed == vec!["step"])
        .unwrap();
    let body_edge = scfg.edge(body_vertex.previous_edge.unwrap());
    assert!(body_edge.input_variables.is_empty());
}

#[test]
fn test_try_except_merges_surviving_branches() {
    // try: risky() except: fallback(); done()
    let body = vec![
        Stmt::Try {
            body: vec![call_stmt("risky", vec![])],
            handlers: vec![ExceptHandler {
                body: vec![call_stmt("fallback", vec![])],
            }],
        },
        call_stmt("done", vec![]),
    ];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    let heads = vertices_of_kind(&scfg, VertexKind::TryCatch);
    let merges = vertices_of_kind(&scfg, VertexKind::PostTryCatch);
    assert_eq!(heads.len(), 1);
    assert_eq!(merges.len(), 1);
    assert_eq!(scfg.vertex(heads[0]).post_merge, Some(merges[0]));

    // one edge per branch leaves the head
    assert_eq!(scfg.vertex(heads[0]).outgoing.len(), 2);

    let roles: Vec<_> = scfg
        .branch_initial_statements
        .iter()
        .filter_map(|e| match e {
            BranchEntry::TryCatch { role, .. } => Some(*role),
            _ => None,
        })
        .collect();
    assert_eq!(roles, vec!["try-catch-main", "try-catch-handler"]);
}

#[test]
fn test_raising_handler_is_filtered_from_merge() {
    // try: risky() except: raise Wrapped()
    let body = vec![Stmt::Try {
        body: vec![call_stmt("risky", vec![])],
        handlers: vec![ExceptHandler {
            body: vec![Stmt::Raise {
                exc: Expr::call(Expr::name("Wrapped"), vec![]),
            }],
        }],
    }];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    let merges = vertices_of_kind(&scfg, VertexKind::PostTryCatch);
    assert_eq!(merges.len(), 1);

    // the raise vertex has no path to the merge
    let raise_vertex = scfg
        .vertices
        .iter()
        .find(|v| v.names_changed == vec!["Wrapped"])
        .unwrap();
    assert!(raise_vertex.outgoing.is_empty());
}

#[test]
fn test_all_branches_terminating_produces_no_merge() {
    // if a: return 1 else: return 2
    let body = vec![Stmt::If {
        test: Expr::name("a"),
        body: vec![Stmt::Return {
            value: Some(Expr::Num { n: 1 }),
        }],
        orelse: vec![Stmt::Return {
            value: Some(Expr::Num { n: 2 }),
        }],
    }];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();
    check_wiring(&scfg);

    assert!(vertices_of_kind(&scfg, VertexKind::PostConditional).is_empty());
    let conditionals = vertices_of_kind(&scfg, VertexKind::Conditional);
    assert_eq!(scfg.vertex(conditionals[0]).post_merge, None);
}

#[test]
fn test_condition_copy_is_isolated_per_edge() {
    // statements after a conditional carry skip-conditional, but the edges
    // recorded before it must not be retroactively extended
    let body = vec![
        assign("x", Expr::Num { n: 1 }),
        Stmt::If {
            test: Expr::name("a"),
            body: vec![assign("y", Expr::Num { n: 2 })],
            orelse: vec![assign("y", Expr::Num { n: 3 })],
        },
        assign("z", Expr::Num { n: 4 }),
    ];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();

    let first_edge = &scfg.edges[0];
    assert!(first_edge.condition.is_empty());

    let last_edge = scfg.edges.last().unwrap();
    assert_eq!(last_edge.condition, vec![Guard::Label("skip-conditional")]);
}

#[test]
fn test_next_calls_finds_calls_past_branches() {
    // if a: g() else: pass; f(x); f(y)
    let body = vec![
        Stmt::If {
            test: Expr::name("a"),
            body: vec![call_stmt("g", vec![])],
            orelse: vec![Stmt::Pass],
        },
        call_stmt("f", vec![Expr::name("x")]),
        assign("r", Expr::call(Expr::name("f"), vec![Expr::name("y")])),
    ];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();

    let mut calls = Vec::new();
    let mut visited = std::collections::HashSet::new();
    scfg.next_calls(scfg.start, "f", &mut calls, &mut visited);

    // the bare call is found; the assignment-from-call behind it is not,
    // because the search stops at the first matching edge per branch
    assert_eq!(calls.len(), 1);

    let mut calls = Vec::new();
    let mut visited = std::collections::HashSet::new();
    scfg.next_calls(scfg.start, "g", &mut calls, &mut visited);
    assert_eq!(calls.len(), 1);
}

#[test]
fn test_next_calls_terminates_on_loops() {
    let body = vec![Stmt::For {
        target: Expr::name("i"),
        iter: Expr::name("xs"),
        body: vec![call_stmt("g", vec![])],
    }];
    let scfg = Scfg::from_block(&body, vec![], &[]).unwrap();

    let mut calls = Vec::new();
    let mut visited = std::collections::HashSet::new();
    // searching for a name that never appears must still terminate
    scfg.next_calls(scfg.start, "missing", &mut calls, &mut visited);
    assert!(calls.is_empty());
}
