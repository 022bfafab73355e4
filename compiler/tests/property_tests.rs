// Property-based tests for IR and generator invariants.
//
// Four categories:
// 1. Block location invariant: a block builds iff its contents agree
// 2. Generation determinism: identical trees yield byte-identical text
// 3. Formatter: generated units always format, and formatting is idempotent
// 4. Tag declarations: each field tag is declared exactly once
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;

use usidc::backend::Backend;
use usidc::codegen::generate_raw;
use usidc::common::{self, DataType, LiteralValue, LocationType};
use usidc::format::{BuiltinFormatter, SourceFormatter};
use usidc::nir::{self, BlockStmt, LocalVar};
use usidc::usid::{
    Access, CompositeEntry, Computation, Connectivity, Dimension, Dimensions, Expr, Field,
    FieldAccess, Kernel, KernelCall, Literal, SidComposite, SidCompositeEntry, Stmt, Temporary,
};

// ── Strategies ──────────────────────────────────────────────────────────────

fn arb_location() -> impl Strategy<Value = LocationType> {
    prop_oneof![
        Just(LocationType::Vertex),
        Just(LocationType::Edge),
        Just(LocationType::Cell),
    ]
}

fn arb_vtype() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Boolean),
        Just(DataType::Int32),
        Just(DataType::Uint32),
        Just(DataType::Float32),
        Just(DataType::Float64),
    ]
}

fn nir_assign(loc: LocationType) -> nir::Stmt {
    nir::Stmt::AssignStmt(nir::AssignStmt {
        location_type: loc,
        assign: common::AssignStmt::new(
            nir::Access::VarAccess(nir::VarAccess {
                name: "x".into(),
                location_type: loc,
            }),
            nir::Expr::Literal(nir::Literal {
                value: LiteralValue::Text("1".into()),
                vtype: DataType::Int32,
                location_type: loc,
            }),
        ),
    })
}

fn horizontal(loc: LocationType) -> Dimensions {
    Dimensions::new(vec![
        Dimension::Horizontal(nir::HorizontalDimension { primary: loc }),
        Dimension::Vertical(nir::VerticalDimension {}),
    ])
}

/// A computation with `fields` parameters, `temps` temporaries and one kernel
/// writing a literal into every field through its primary composite.
fn build_computation(
    conns: &[(u32, bool)],
    fields: &[(DataType, u8)],
    temps: &[(DataType, LocationType)],
    kernel_loc: LocationType,
) -> Computation {
    let mut c = Computation::new("prop");
    c.connectivities = conns
        .iter()
        .enumerate()
        .map(|(i, &(max_neighbors, has_skip_values))| Connectivity {
            name: format!("c{i}"),
            tag: format!("c{i}_tag"),
            max_neighbors,
            has_skip_values,
        })
        .collect();
    // tags may repeat across fields
    c.parameters = fields
        .iter()
        .enumerate()
        .map(|(i, &(vtype, tag))| Field {
            name: format!("f{i}"),
            tag: format!("tag{tag}"),
            vtype,
            dimensions: horizontal(kernel_loc),
        })
        .collect();
    c.temporaries = temps
        .iter()
        .enumerate()
        .map(|(i, &(vtype, loc))| Temporary {
            name: format!("t{i}"),
            tag: format!("t{i}_tag"),
            vtype,
            dimensions: horizontal(loc),
        })
        .collect();

    let entries = c
        .parameters
        .iter()
        .enumerate()
        .map(|(i, f)| {
            CompositeEntry::SidCompositeEntry(SidCompositeEntry {
                name: format!("e{i}_tag"),
                reference: f.name.clone(),
            })
        })
        .collect();
    let body = c
        .parameters
        .iter()
        .enumerate()
        .map(|(i, f)| {
            Stmt::AssignStmt(common::AssignStmt::new(
                Access::FieldAccess(FieldAccess {
                    name: format!("e{i}_tag"),
                    sid: "k".into(),
                }),
                Expr::Literal(Literal {
                    value: LiteralValue::Text("0".into()),
                    vtype: f.vtype,
                }),
            ))
        })
        .collect();
    c.kernels = vec![Kernel {
        name: "kern".into(),
        primary_location: kernel_loc,
        primary_composite: SidComposite {
            name: "k".into(),
            entries,
        },
        secondary_composites: vec![],
        body,
    }];
    c.ctrlflow_ast = vec![KernelCall {
        name: "kern".into(),
    }];
    c
}

fn arb_computation() -> impl Strategy<Value = Computation> {
    (
        prop::collection::vec((1u32..=12, prop::bool::ANY), 0..=3),
        prop::collection::vec((arb_vtype(), 0u8..4), 0..=5),
        prop::collection::vec((arb_vtype(), arb_location()), 0..=3),
        arb_location(),
    )
        .prop_map(|(conns, fields, temps, loc)| build_computation(&conns, &fields, &temps, loc))
}

// ── Block location invariant ────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn block_builds_iff_contents_agree(
        stmt_locs in prop::collection::vec(arb_location(), 0..6),
        decl_locs in prop::collection::vec(arb_location(), 0..4),
    ) {
        let stmts: Vec<nir::Stmt> = stmt_locs.iter().map(|&l| nir_assign(l)).collect();
        let decls: Vec<LocalVar> = decl_locs
            .iter()
            .enumerate()
            .map(|(i, &l)| LocalVar { name: format!("v{i}"), vtype: DataType::Float64, location_type: l })
            .collect();

        let all: Vec<LocationType> = stmt_locs.iter().chain(&decl_locs).copied().collect();
        let agree = all.windows(2).all(|w| w[0] == w[1]);

        match BlockStmt::new(decls, stmts, None) {
            Ok(block) => {
                prop_assert!(agree);
                prop_assert_eq!(block.location_type(), all.first().copied());
            }
            Err(e) => {
                prop_assert!(!agree);
                prop_assert!(e.to_string().contains("location type mismatch"));
            }
        }
    }
}

// ── Generation and formatting ───────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn generation_is_deterministic(root in arb_computation(), gpu in prop::bool::ANY) {
        let backend = if gpu { Backend::GPU } else { Backend::NAIVE };
        let first = generate_raw(&root, &backend).unwrap();
        let second = generate_raw(&root.clone(), &backend).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn generated_units_validate_and_format(root in arb_computation()) {
        prop_assert!(root.validate().is_ok());
        let raw = generate_raw(&root, &Backend::NAIVE).unwrap();
        let formatter = BuiltinFormatter::default();
        let once = formatter.format(&raw).unwrap();
        let twice = formatter.format(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn field_tags_declared_once(root in arb_computation()) {
        let raw = generate_raw(&root, &Backend::NAIVE).unwrap();
        for field in &root.parameters {
            let decl = format!("struct {};", field.tag);
            prop_assert_eq!(raw.matches(&decl).count(), 1);
        }
    }
}
