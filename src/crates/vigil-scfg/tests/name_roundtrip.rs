//! Round-trip property: building an AST from a dotted/bracketed attribute
//! path and extracting the name again yields the original path.

use proptest::prelude::*;
use vigil_scfg::ast::Expr;
use vigil_scfg::names::attr_name_string;

/// One path segment: a plain attribute or a subscript.
#[derive(Debug, Clone)]
enum Segment {
    Attr(String),
    StrIndex(String),
    NumIndex(i64),
    NameIndex(String),
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,8}".prop_map(|s| s)
}

fn segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        ident().prop_map(Segment::Attr),
        ident().prop_map(Segment::StrIndex),
        (0i64..100).prop_map(Segment::NumIndex),
        ident().prop_map(Segment::NameIndex),
    ]
}

/// Assemble the AST for a root name followed by segments, and the canonical
/// string the extraction is expected to produce.
fn build(root: String, segments: Vec<Segment>) -> (Expr, String) {
    let mut expr = Expr::name(root.clone());
    let mut expected = root;
    for segment in segments {
        match segment {
            Segment::Attr(name) => {
                expected.push('.');
                expected.push_str(&name);
                expr = Expr::attribute(expr, name);
            }
            Segment::StrIndex(key) => {
                expected.push_str(&format!("[\"{}\"]", key));
                expr = Expr::subscript(expr, Expr::Str { s: key });
            }
            Segment::NumIndex(n) => {
                expected.push_str(&format!("[{}]", n));
                expr = Expr::subscript(expr, Expr::Num { n });
            }
            Segment::NameIndex(name) => {
                expected.push_str(&format!("[{}]", name));
                expr = Expr::subscript(expr, Expr::name(name));
            }
        }
    }
    (expr, expected)
}

proptest! {
    #[test]
    fn attr_paths_round_trip(root in ident(), segments in prop::collection::vec(segment(), 0..6)) {
        let (expr, expected) = build(root, segments);
        prop_assert_eq!(attr_name_string(&expr, false), Some(expected));
    }

    #[test]
    fn omitting_subscripts_drops_only_brackets(root in ident(), segments in prop::collection::vec(segment(), 0..6)) {
        let (expr, _) = build(root.clone(), segments.clone());
        let elided = attr_name_string(&expr, true).unwrap();

        let mut expected = root;
        for segment in segments {
            if let Segment::Attr(name) = segment {
                expected.push('.');
                expected.push_str(&name);
            }
        }
        prop_assert_eq!(elided, expected);
    }
}
