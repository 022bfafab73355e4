//! USID – the unstructured-SID IR consumed by code generation.
//!
//! A `Computation` is a set of kernels plus the sequence of kernel calls that
//! runs them. Kernels see fields through SID composites: named bundles of
//! strided field pointers. Connectivities and fields carry the tags the
//! lowering pass generated for them, so codegen never invents identifiers
//! beyond the `_ptrs`/`_strides` names derived from a composite's name.
//!
//! Scopes: the computation declares connectivities, fields, temporaries and
//! kernels; a kernel declares its composites; a neighbor loop declares its
//! primary and secondary element pointers.

use serde::{Deserialize, Serialize};

use crate::common::{self, DataType, LiteralValue, LocationType};
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::error::{Error, Result};
use crate::nir::{HorizontalDimension, VerticalDimension};
use crate::symtable::{duplicates, SymbolName, SymbolRef, SymbolTable};

// ── Declarations ───────────────────────────────────────────────────────────

/// Connectivity with the tag type generated for it by lowering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connectivity {
    pub name: SymbolName,
    pub tag: String,
    pub max_neighbors: u32,
    pub has_skip_values: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Dimension {
    Horizontal(HorizontalDimension),
    Vertical(VerticalDimension),
    /// Per-neighbor extent through a connectivity.
    Sparse { connectivity: SymbolRef },
}

/// Ordered list of a field's dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimensions(pub Vec<Dimension>);

impl Dimensions {
    pub fn new(dims: Vec<Dimension>) -> Self {
        Dimensions(dims)
    }

    /// Location types of all horizontal dimensions, in order.
    pub fn location_types(&self) -> Vec<LocationType> {
        self.0
            .iter()
            .filter_map(|d| match d {
                Dimension::Horizontal(h) => Some(h.primary),
                _ => None,
            })
            .collect()
    }
}

/// Runtime field parameter of the generated entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: SymbolName,
    pub tag: String,
    pub vtype: DataType,
    pub dimensions: Dimensions,
}

/// Scratch field allocated by the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Temporary {
    pub name: SymbolName,
    pub tag: String,
    pub vtype: DataType,
    pub dimensions: Dimensions,
}

// ── SID composites ─────────────────────────────────────────────────────────

/// `name` is the entry's tag type, `reference` the field (or connectivity)
/// bound to it at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidCompositeEntry {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: SymbolRef,
}

/// Entry whose generic sparse dimension is renamed to `connectivity`'s tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidCompositeSparseEntry {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: SymbolRef,
    pub connectivity: SymbolRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CompositeEntry {
    SidCompositeEntry(SidCompositeEntry),
    SidCompositeSparseEntry(SidCompositeSparseEntry),
}

impl CompositeEntry {
    pub fn name(&self) -> &str {
        match self {
            CompositeEntry::SidCompositeEntry(e) => &e.name,
            CompositeEntry::SidCompositeSparseEntry(e) => &e.name,
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            CompositeEntry::SidCompositeEntry(e) => &e.reference,
            CompositeEntry::SidCompositeSparseEntry(e) => &e.reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidComposite {
    pub name: SymbolName,
    pub entries: Vec<CompositeEntry>,
}

impl SidComposite {
    pub fn ptr_name(&self) -> String {
        format!("{}_ptrs", self.name)
    }

    pub fn strides_name(&self) -> String {
        format!("{}_strides", self.name)
    }

    pub fn entry(&self, name: &str) -> Option<&CompositeEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }
}

// ── Expressions and statements ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub vtype: DataType,
}

/// Field `name` (an entry tag) read through the pointer bound to `sid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAccess {
    pub name: String,
    pub sid: SymbolRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarAccess {
    pub name: String,
}

/// Bare pointer to a composite or a neighbor-loop element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtrRef {
    pub name: SymbolRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expr {
    Literal(Literal),
    FieldAccess(FieldAccess),
    VarAccess(VarAccess),
    PtrRef(PtrRef),
    BinaryOp(common::BinaryOp<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Access {
    FieldAccess(FieldAccess),
    VarAccess(VarAccess),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    pub vtype: DataType,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborLoop {
    /// Composite of the element being iterated from.
    pub primary_sid: SymbolRef,
    /// Composite of the neighbor elements.
    pub secondary_sid: SymbolRef,
    pub connectivity: SymbolRef,
    /// Pointer to the current primary element inside `body`.
    pub primary: SymbolName,
    /// Pointer to the current neighbor inside `body`.
    pub secondary: SymbolName,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Stmt {
    AssignStmt(common::AssignStmt<Access, Expr>),
    VarDecl(VarDecl),
    NeighborLoop(NeighborLoop),
}

// ── Kernels ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub name: SymbolName,
    pub primary_location: LocationType,
    pub primary_composite: SidComposite,
    #[serde(default)]
    pub secondary_composites: Vec<SidComposite>,
    pub body: Vec<Stmt>,
}

impl Kernel {
    /// Primary composite first, then secondaries in declaration order.
    pub fn composites(&self) -> impl Iterator<Item = &SidComposite> {
        std::iter::once(&self.primary_composite).chain(&self.secondary_composites)
    }

    pub fn symbols(&self) -> Vec<(&str, Symbol<'_>)> {
        self.composites()
            .map(|c| (c.name.as_str(), Symbol::Composite(c)))
            .collect()
    }
}

/// Runs kernel `name` over the domain of its primary location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelCall {
    pub name: SymbolRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    pub name: String,
    #[serde(default)]
    pub connectivities: Vec<Connectivity>,
    #[serde(default)]
    pub parameters: Vec<Field>,
    #[serde(default)]
    pub temporaries: Vec<Temporary>,
    #[serde(default)]
    pub kernels: Vec<Kernel>,
    #[serde(default)]
    pub ctrlflow_ast: Vec<KernelCall>,
}

impl Computation {
    /// Empty computation named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Computation {
            name: name.into(),
            connectivities: Vec::new(),
            parameters: Vec::new(),
            temporaries: Vec::new(),
            kernels: Vec::new(),
            ctrlflow_ast: Vec::new(),
        }
    }

    /// Declarations of the root scope.
    pub fn symbols(&self) -> Vec<(&str, Symbol<'_>)> {
        let mut out = Vec::new();
        out.extend(
            self.connectivities
                .iter()
                .map(|c| (c.name.as_str(), Symbol::Connectivity(c))),
        );
        out.extend(
            self.parameters
                .iter()
                .map(|f| (f.name.as_str(), Symbol::Field(f))),
        );
        out.extend(
            self.temporaries
                .iter()
                .map(|t| (t.name.as_str(), Symbol::Temporary(t))),
        );
        out.extend(
            self.kernels
                .iter()
                .map(|k| (k.name.as_str(), Symbol::Kernel(k))),
        );
        out
    }

    /// Check every symbol reference of the tree. Returns warning diagnostics
    /// for declarations nothing uses.
    pub fn validate(&self) -> Result<Vec<Diagnostic>> {
        let context = format!("computation '{}'", self.name);
        let symbols = self.symbols();
        let dups = duplicates(symbols.iter().map(|(n, _)| *n));
        if !dups.is_empty() {
            return Err(Error::structural(
                context,
                format!("duplicate declarations: {}", dups.join(", ")),
            ));
        }
        for tmp in &self.temporaries {
            let found = tmp.dimensions.location_types().len();
            if found != 1 {
                return Err(Error::MissingLocationDimension {
                    node: format!("temporary '{}'", tmp.name),
                    found,
                });
            }
        }
        let table = SymbolTable::new().extend(symbols);

        let sparse = self
            .parameters
            .iter()
            .map(|f| (format!("field '{}'", f.name), &f.dimensions))
            .chain(
                self.temporaries
                    .iter()
                    .map(|t| (format!("temporary '{}'", t.name), &t.dimensions)),
            );
        for (owner, dims) in sparse {
            for dim in &dims.0 {
                if let Dimension::Sparse { connectivity } = dim {
                    expect_connectivity(&table, connectivity, &format!("{context} > {owner}"))?;
                }
            }
        }

        for call in &self.ctrlflow_ast {
            expect_kernel(&table, &call.name, &context)?;
        }
        for kernel in &self.kernels {
            let kcontext = format!("{context} > kernel '{}'", kernel.name);
            let kernel_symbols = kernel.symbols();
            let dups = duplicates(kernel_symbols.iter().map(|(n, _)| *n));
            if !dups.is_empty() {
                return Err(Error::structural(
                    kcontext,
                    format!("duplicate declarations: {}", dups.join(", ")),
                ));
            }
            let scope = table.extend(kernel_symbols);
            for composite in kernel.composites() {
                for entry in &composite.entries {
                    let econtext = format!("{kcontext} > composite '{}'", composite.name);
                    scope.resolve(entry.reference(), &econtext)?;
                    if let CompositeEntry::SidCompositeSparseEntry(s) = entry {
                        expect_connectivity(&scope, &s.connectivity, &econtext)?;
                    }
                }
            }
            validate_stmts(&scope, &kernel.body, &kcontext)?;
        }

        let mut warnings = Vec::new();
        for kernel in &self.kernels {
            if !self.ctrlflow_ast.iter().any(|c| c.name == kernel.name) {
                warnings.push(
                    Diagnostic::new(
                        DiagLevel::Warning,
                        format!("kernel `{}` is never called", kernel.name),
                    )
                    .with_code(codes::W0100),
                );
            }
        }
        for tmp in &self.temporaries {
            let bound = self
                .kernels
                .iter()
                .flat_map(|k| k.composites())
                .flat_map(|c| &c.entries)
                .any(|e| e.reference() == tmp.name);
            if !bound {
                warnings.push(
                    Diagnostic::new(
                        DiagLevel::Warning,
                        format!("temporary `{}` is not bound by any kernel", tmp.name),
                    )
                    .with_code(codes::W0101),
                );
            }
        }
        Ok(warnings)
    }
}

fn validate_stmts<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    body: &'a [Stmt],
    context: &str,
) -> Result<()> {
    for stmt in body {
        match stmt {
            Stmt::AssignStmt(a) => {
                if let Access::FieldAccess(f) = &a.left {
                    validate_field_access(table, f, context)?;
                }
                validate_expr(table, &a.right, context)?;
            }
            Stmt::VarDecl(v) => validate_expr(table, &v.init, context)?,
            Stmt::NeighborLoop(n) => {
                let lcontext = format!("{context} > neighbor loop over '{}'", n.connectivity);
                expect_connectivity(table, &n.connectivity, &lcontext)?;
                let scope = neighbor_loop_scope(table, n, &lcontext)?;
                validate_stmts(&scope, &n.body, &lcontext)?;
            }
        }
    }
    Ok(())
}

fn validate_expr<'a>(table: &SymbolTable<'a, Symbol<'a>>, expr: &Expr, context: &str) -> Result<()> {
    match expr {
        Expr::FieldAccess(f) => validate_field_access(table, f, context),
        Expr::PtrRef(p) => table.resolve(&p.name, context).map(|_| ()),
        Expr::BinaryOp(b) => {
            validate_expr(table, &b.left, context)?;
            validate_expr(table, &b.right, context)
        }
        Expr::Literal(_) | Expr::VarAccess(_) => Ok(()),
    }
}

fn validate_field_access<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    access: &FieldAccess,
    context: &str,
) -> Result<()> {
    resolve_pointer(table, &access.sid, context)?
        .1
        .entry(&access.name)
        .map(|_| ())
        .ok_or_else(|| {
            Error::unresolved(&access.name, format!("{context} (no such entry in '{}')", access.sid))
        })
}

// ── Symbols ────────────────────────────────────────────────────────────────

/// A declaration visible through a USID scope.
#[derive(Debug, Clone, Copy)]
pub enum Symbol<'a> {
    Connectivity(&'a Connectivity),
    Field(&'a Field),
    Temporary(&'a Temporary),
    Kernel(&'a Kernel),
    Composite(&'a SidComposite),
    /// Element pointer bound by a neighbor loop, addressing `composite`.
    Pointer {
        name: &'a str,
        composite: &'a SidComposite,
    },
}

impl Symbol<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Symbol::Connectivity(_) => "connectivity",
            Symbol::Field(_) => "field",
            Symbol::Temporary(_) => "temporary",
            Symbol::Kernel(_) => "kernel",
            Symbol::Composite(_) => "composite",
            Symbol::Pointer { .. } => "neighbor pointer",
        }
    }
}

fn wrong_kind(name: &str, expected: &str, found: &Symbol<'_>, context: &str) -> Error {
    Error::unresolved(
        name,
        format!("{context} (expected a {expected}, found a {})", found.kind()),
    )
}

pub fn expect_kernel<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    name: &str,
    context: &str,
) -> Result<&'a Kernel> {
    match *table.resolve(name, context)? {
        Symbol::Kernel(k) => Ok(k),
        other => Err(wrong_kind(name, "kernel", &other, context)),
    }
}

pub fn expect_connectivity<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    name: &str,
    context: &str,
) -> Result<&'a Connectivity> {
    match *table.resolve(name, context)? {
        Symbol::Connectivity(c) => Ok(c),
        other => Err(wrong_kind(name, "connectivity", &other, context)),
    }
}

pub fn expect_composite<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    name: &str,
    context: &str,
) -> Result<&'a SidComposite> {
    match *table.resolve(name, context)? {
        Symbol::Composite(c) => Ok(c),
        other => Err(wrong_kind(name, "composite", &other, context)),
    }
}

/// Resolve a pointer-valued reference: a composite yields its `_ptrs` name,
/// a neighbor pointer its bound name. Also returns the addressed composite.
pub fn resolve_pointer<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    name: &str,
    context: &str,
) -> Result<(String, &'a SidComposite)> {
    match *table.resolve(name, context)? {
        Symbol::Composite(c) => Ok((c.ptr_name(), c)),
        Symbol::Pointer { name: bound, composite } => Ok((bound.to_string(), composite)),
        other => Err(wrong_kind(name, "composite or neighbor pointer", &other, context)),
    }
}

/// Scope of a neighbor loop's body: the enclosing table plus the loop's
/// primary and secondary pointers.
pub fn neighbor_loop_scope<'a>(
    table: &SymbolTable<'a, Symbol<'a>>,
    node: &'a NeighborLoop,
    context: &str,
) -> Result<SymbolTable<'a, Symbol<'a>>> {
    if node.primary == node.secondary {
        return Err(Error::structural(
            context,
            format!("duplicate declarations: {}", node.primary),
        ));
    }
    let primary = expect_composite(table, &node.primary_sid, context)?;
    let secondary = expect_composite(table, &node.secondary_sid, context)?;
    Ok(table.extend([
        (
            node.primary.as_str(),
            Symbol::Pointer {
                name: &node.primary,
                composite: primary,
            },
        ),
        (
            node.secondary.as_str(),
            Symbol::Pointer {
                name: &node.secondary,
                composite: secondary,
            },
        ),
    ]))
}

// ── Tests ──────────────────────────────────────────────────────────────────
