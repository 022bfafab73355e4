// nir.rs — Node model: the high-level, validated stencil IR
//
// Expresses computations over mesh elements as vertical loops of horizontal
// loops, each running a block of statements over one location type, with
// neighbor loops reaching adjacent elements through named connectivities.
//
// Preconditions: none; nodes are assembled bottom-up by the frontend.
// Postconditions: a `BlockStmt`, `HorizontalLoop` or `Computation` value only
//   exists if its invariants hold; a `Computation` additionally guarantees that
//   every symbol reference in its subtree resolves in an enclosing scope.
// Failure modes: `Error::StructuralValidation` naming the node and invariant.
// Side effects: none.
//
// Deserializing a node runs the same builders, so a JSON document is validated
// the moment it is loaded.

use serde::{Deserialize, Serialize};

use crate::common::{self, DataType, LiteralValue, LocationType, LoopOrder};
use crate::error::{Error, Result};
use crate::symtable::{duplicates, SymbolName, SymbolRef, SymbolTable};

// ── Expressions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub vtype: DataType,
    pub location_type: LocationType,
}

/// Read or write of a field at the element bound to `primary`, optionally
/// indexed by a secondary (sparse) location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAccess {
    pub name: String,
    pub location_type: LocationType,
    pub primary: SymbolRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<SymbolRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarAccess {
    pub name: String,
    pub location_type: LocationType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOp {
    pub location_type: LocationType,
    #[serde(flatten)]
    pub binary: common::BinaryOp<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    Literal(Literal),
    FieldAccess(FieldAccess),
    VarAccess(VarAccess),
    BinaryOp(BinaryOp),
}

impl Expr {
    pub fn location_type(&self) -> LocationType {
        match self {
            Expr::Literal(l) => l.location_type,
            Expr::FieldAccess(f) => f.location_type,
            Expr::VarAccess(v) => v.location_type,
            Expr::BinaryOp(b) => b.location_type,
        }
    }
}

/// Assignment targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Access {
    FieldAccess(FieldAccess),
    VarAccess(VarAccess),
}

impl Access {
    pub fn name(&self) -> &str {
        match self {
            Access::FieldAccess(f) => &f.name,
            Access::VarAccess(v) => &v.name,
        }
    }

    pub fn location_type(&self) -> LocationType {
        match self {
            Access::FieldAccess(f) => f.location_type,
            Access::VarAccess(v) => v.location_type,
        }
    }
}

impl From<Access> for Expr {
    fn from(access: Access) -> Self {
        match access {
            Access::FieldAccess(f) => Expr::FieldAccess(f),
            Access::VarAccess(v) => Expr::VarAccess(v),
        }
    }
}

// ── Statements ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVar {
    pub name: String,
    pub vtype: DataType,
    pub location_type: LocationType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub location_type: LocationType,
    #[serde(flatten)]
    pub assign: common::AssignStmt<Access, Expr>,
}

/// Loop over the neighbors of the current element reachable through
/// `connectivity`; `name` is bound to the neighbor inside `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborLoop {
    pub name: SymbolName,
    pub location_type: LocationType,
    pub connectivity: SymbolRef,
    pub body: BlockStmt,
}

/// Declarations and statements sharing one location type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlockStmt")]
pub struct BlockStmt {
    #[serde(skip_serializing_if = "Option::is_none")]
    location_type: Option<LocationType>,
    declarations: Vec<LocalVar>,
    statements: Vec<Stmt>,
}

#[derive(Deserialize)]
struct RawBlockStmt {
    #[serde(default)]
    location_type: Option<LocationType>,
    #[serde(default)]
    declarations: Vec<LocalVar>,
    #[serde(default)]
    statements: Vec<Stmt>,
}

impl TryFrom<RawBlockStmt> for BlockStmt {
    type Error = Error;

    fn try_from(raw: RawBlockStmt) -> Result<Self> {
        BlockStmt::new(raw.declarations, raw.statements, raw.location_type)
    }
}

impl BlockStmt {
    /// Build a block. All contained statements and declarations must share one
    /// location type; `location_type`, if given, must equal it, and is
    /// inferred from the contents otherwise. An empty block stays untyped
    /// unless a location type is given.
    pub fn new(
        declarations: Vec<LocalVar>,
        statements: Vec<Stmt>,
        location_type: Option<LocationType>,
    ) -> Result<Self> {
        let found: Vec<LocationType> = statements
            .iter()
            .filter_map(Stmt::location_type)
            .chain(declarations.iter().map(|d| d.location_type))
            .collect();

        if let Some(&first) = found.first() {
            if let Some(other) = found.iter().find(|&&l| l != first) {
                return Err(Error::structural(
                    "BlockStmt",
                    format!(
                        "location type mismatch: not all statements and declarations \
                         have the same location type ({first} and {other})"
                    ),
                ));
            }
            if let Some(given) = location_type {
                if given != first {
                    return Err(Error::structural(
                        "BlockStmt",
                        format!("location type mismatch: block declared {given}, contents are {first}"),
                    ));
                }
            }
        }

        Ok(BlockStmt {
            location_type: location_type.or_else(|| found.first().copied()),
            declarations,
            statements,
        })
    }

    pub fn location_type(&self) -> Option<LocationType> {
        self.location_type
    }

    pub fn declarations(&self) -> &[LocalVar] {
        &self.declarations
    }

    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    BlockStmt(BlockStmt),
    NeighborLoop(NeighborLoop),
    AssignStmt(AssignStmt),
}

impl Stmt {
    /// `None` only for an empty block built without a location type.
    pub fn location_type(&self) -> Option<LocationType> {
        match self {
            Stmt::BlockStmt(b) => b.location_type(),
            Stmt::NeighborLoop(n) => Some(n.location_type),
            Stmt::AssignStmt(a) => Some(a.location_type),
        }
    }
}

// ── Fields ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizontalDimension {
    pub primary: LocationType,
}

/// Marker: the field has a vertical extent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerticalDimension {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<HorizontalDimension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<VerticalDimension>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UField {
    pub name: SymbolName,
    pub vtype: DataType,
    pub dimensions: Dimensions,
}

/// A field with one value per neighbor reachable through `connectivity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseField {
    pub name: SymbolName,
    pub vtype: DataType,
    pub dimensions: Dimensions,
    pub connectivity: SymbolRef,
}

/// Scratch field with no input binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryField {
    pub name: SymbolName,
    pub vtype: DataType,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Param {
    UField(UField),
    SparseField(SparseField),
}

impl Param {
    pub fn name(&self) -> &str {
        match self {
            Param::UField(f) => &f.name,
            Param::SparseField(f) => &f.name,
        }
    }

    pub fn vtype(&self) -> DataType {
        match self {
            Param::UField(f) => f.vtype,
            Param::SparseField(f) => f.vtype,
        }
    }
}

// ── Loops ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSpace {
    pub name: SymbolName,
    pub location_type: LocationType,
}

/// A block run once per element of the iteration space. Scope boundary: the
/// iteration space and all neighbor-loop variables below are declared here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHorizontalLoop")]
pub struct HorizontalLoop {
    stmt: BlockStmt,
    iteration_space: IterationSpace,
}

#[derive(Deserialize)]
struct RawHorizontalLoop {
    stmt: BlockStmt,
    iteration_space: IterationSpace,
}

impl TryFrom<RawHorizontalLoop> for HorizontalLoop {
    type Error = Error;

    fn try_from(raw: RawHorizontalLoop) -> Result<Self> {
        HorizontalLoop::new(raw.stmt, raw.iteration_space)
    }
}

impl HorizontalLoop {
    /// The block's location type must equal the iteration space's. It is never
    /// inferred: an untyped (empty) block is rejected.
    pub fn new(stmt: BlockStmt, iteration_space: IterationSpace) -> Result<Self> {
        if stmt.location_type() != Some(iteration_space.location_type) {
            let block = stmt
                .location_type()
                .map_or_else(|| "untyped".to_string(), |l| l.to_string());
            return Err(Error::structural(
                format!("HorizontalLoop over '{}'", iteration_space.name),
                format!(
                    "location type mismatch: block is {block}, iteration space is {}",
                    iteration_space.location_type
                ),
            ));
        }
        Ok(HorizontalLoop {
            stmt,
            iteration_space,
        })
    }

    pub fn stmt(&self) -> &BlockStmt {
        &self.stmt
    }

    pub fn iteration_space(&self) -> &IterationSpace {
        &self.iteration_space
    }

    /// Declarations of this scope: the iteration space and every neighbor-loop
    /// variable in the body.
    pub fn symbols(&self) -> Vec<(&str, Symbol<'_>)> {
        let mut out = vec![(
            self.iteration_space.name.as_str(),
            Symbol::IterationSpace(&self.iteration_space),
        )];
        collect_loop_vars(&self.stmt, &mut out);
        out
    }
}

fn collect_loop_vars<'a>(block: &'a BlockStmt, out: &mut Vec<(&'a str, Symbol<'a>)>) {
    for stmt in block.statements() {
        match stmt {
            Stmt::BlockStmt(b) => collect_loop_vars(b, out),
            Stmt::NeighborLoop(n) => {
                out.push((n.name.as_str(), Symbol::LoopVar(n)));
                collect_loop_vars(&n.body, out);
            }
            Stmt::AssignStmt(_) => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalLoop {
    pub horizontal_loops: Vec<HorizontalLoop>,
    pub loop_order: LoopOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stencil {
    pub vertical_loops: Vec<VerticalLoop>,
}

// ── Root ────────────────────────────────────────────────────────────────────

/// Adjacency from `primary` elements to up to `max_neighbors` `secondary`
/// elements; `has_skip_values` marks that some neighbor slots may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    pub name: SymbolName,
    pub primary: LocationType,
    pub secondary: LocationType,
    pub max_neighbors: u32,
    pub has_skip_values: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawComputation")]
pub struct Computation {
    name: String,
    connectivities: Vec<Connectivity>,
    params: Vec<Param>,
    stencils: Vec<Stencil>,
    declarations: Vec<TemporaryField>,
}

#[derive(Deserialize)]
struct RawComputation {
    name: String,
    #[serde(default)]
    connectivities: Vec<Connectivity>,
    #[serde(default)]
    params: Vec<Param>,
    #[serde(default)]
    stencils: Vec<Stencil>,
    #[serde(default)]
    declarations: Vec<TemporaryField>,
}

impl TryFrom<RawComputation> for Computation {
    type Error = Error;

    fn try_from(raw: RawComputation) -> Result<Self> {
        Computation::new(
            raw.name,
            raw.connectivities,
            raw.params,
            raw.stencils,
            raw.declarations,
        )
    }
}

impl Computation {
    /// Build the root and check, once, that every symbol reference in the
    /// tree resolves to a declaration of the expected kind.
    pub fn new(
        name: impl Into<String>,
        connectivities: Vec<Connectivity>,
        params: Vec<Param>,
        stencils: Vec<Stencil>,
        declarations: Vec<TemporaryField>,
    ) -> Result<Self> {
        let computation = Computation {
            name: name.into(),
            connectivities,
            params,
            stencils,
            declarations,
        };
        computation.check_symbol_refs()?;
        Ok(computation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connectivities(&self) -> &[Connectivity] {
        &self.connectivities
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn stencils(&self) -> &[Stencil] {
        &self.stencils
    }

    pub fn declarations(&self) -> &[TemporaryField] {
        &self.declarations
    }

    pub fn horizontal_loops(&self) -> impl Iterator<Item = &HorizontalLoop> {
        self.stencils
            .iter()
            .flat_map(|s| &s.vertical_loops)
            .flat_map(|v| &v.horizontal_loops)
    }

    /// Declarations of the root scope.
    pub fn symbols(&self) -> Vec<(&str, Symbol<'_>)> {
        let connectivities = self
            .connectivities
            .iter()
            .map(|c| (c.name.as_str(), Symbol::Connectivity(c)));
        let params = self.params.iter().map(|p| (p.name(), Symbol::Param(p)));
        let temporaries = self
            .declarations
            .iter()
            .map(|t| (t.name.as_str(), Symbol::Temporary(t)));
        connectivities.chain(params).chain(temporaries).collect()
    }

    fn node_label(&self) -> String {
        format!("Computation '{}'", self.name)
    }

    fn check_symbol_refs(&self) -> Result<()> {
        let symbols = self.symbols();
        let dups = duplicates(symbols.iter().map(|(name, _)| *name));
        if !dups.is_empty() {
            return Err(Error::structural(
                self.node_label(),
                format!("duplicate declarations: {}", dups.join(", ")),
            ));
        }

        let table = SymbolTable::new().extend(symbols);
        let mut checker = RefChecker::default();
        for param in &self.params {
            if let Param::SparseField(f) = param {
                checker.expect(
                    &table,
                    &f.connectivity,
                    Expected::Connectivity,
                    || format!("sparse field '{}'", f.name),
                );
            }
        }
        for hloop in self.horizontal_loops() {
            let symbols = hloop.symbols();
            let dups = duplicates(symbols.iter().map(|(name, _)| *name));
            if !dups.is_empty() {
                return Err(Error::structural(
                    format!("HorizontalLoop over '{}'", hloop.iteration_space.name),
                    format!("duplicate declarations: {}", dups.join(", ")),
                ));
            }
            let scope = table.extend(symbols);
            checker.block(&scope, hloop.stmt());
        }

        if checker.missing.is_empty() {
            Ok(())
        } else {
            Err(Error::structural(
                self.node_label(),
                format!("unresolved symbol references: {}", checker.missing.join("; ")),
            ))
        }
    }
}

// ── Symbol references ───────────────────────────────────────────────────────

/// A declaration visible through a node-model scope.
#[derive(Debug, Clone, Copy)]
pub enum Symbol<'a> {
    Connectivity(&'a Connectivity),
    Param(&'a Param),
    Temporary(&'a TemporaryField),
    IterationSpace(&'a IterationSpace),
    LoopVar(&'a NeighborLoop),
}

impl Symbol<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Connectivity(_) => "connectivity",
            Symbol::Param(_) => "field",
            Symbol::Temporary(_) => "temporary",
            Symbol::IterationSpace(_) => "iteration space",
            Symbol::LoopVar(_) => "neighbor loop variable",
        }
    }
}

#[derive(Clone, Copy)]
enum Expected {
    Connectivity,
    /// An element binding: iteration space or neighbor-loop variable.
    Location,
}

impl Expected {
    fn accepts(self, symbol: &Symbol<'_>) -> bool {
        match self {
            Expected::Connectivity => matches!(symbol, Symbol::Connectivity(_)),
            Expected::Location => matches!(symbol, Symbol::IterationSpace(_) | Symbol::LoopVar(_)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Expected::Connectivity => "a connectivity",
            Expected::Location => "an iteration space or neighbor loop variable",
        }
    }
}

#[derive(Default)]
struct RefChecker {
    missing: Vec<String>,
}

impl RefChecker {
    fn expect<'a>(
        &mut self,
        table: &SymbolTable<'a, Symbol<'a>>,
        name: &str,
        expected: Expected,
        referrer: impl FnOnce() -> String,
    ) {
        match table.get(name) {
            None => self
                .missing
                .push(format!("`{name}` (referenced by {})", referrer())),
            Some(symbol) if !expected.accepts(symbol) => self.missing.push(format!(
                "`{name}` (referenced by {}) is a {}, expected {}",
                referrer(),
                symbol.kind(),
                expected.describe()
            )),
            Some(_) => {}
        }
    }

    fn block<'a>(&mut self, table: &SymbolTable<'a, Symbol<'a>>, block: &BlockStmt) {
        for stmt in block.statements() {
            match stmt {
                Stmt::BlockStmt(b) => self.block(table, b),
                Stmt::NeighborLoop(n) => {
                    self.expect(table, &n.connectivity, Expected::Connectivity, || {
                        format!("neighbor loop '{}'", n.name)
                    });
                    self.block(table, &n.body);
                }
                Stmt::AssignStmt(a) => {
                    if let Access::FieldAccess(f) = &a.assign.left {
                        self.field_access(table, f);
                    }
                    self.expr(table, &a.assign.right);
                }
            }
        }
    }

    fn expr<'a>(&mut self, table: &SymbolTable<'a, Symbol<'a>>, expr: &Expr) {
        match expr {
            Expr::FieldAccess(f) => self.field_access(table, f),
            Expr::BinaryOp(b) => {
                self.expr(table, &b.binary.left);
                self.expr(table, &b.binary.right);
            }
            Expr::Literal(_) | Expr::VarAccess(_) => {}
        }
    }

    fn field_access<'a>(&mut self, table: &SymbolTable<'a, Symbol<'a>>, f: &FieldAccess) {
        self.expect(table, &f.primary, Expected::Location, || {
            format!("access to field '{}'", f.name)
        });
        if let Some(secondary) = &f.secondary {
            self.expect(table, secondary, Expected::Location, || {
                format!("sparse access to field '{}'", f.name)
            });
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
