// codegen.rs — C++ code generation for USID computations
//
// Walks a USID `Computation` and emits one translation unit targeting the
// gridtools usid runtime. Every node kind has a `visit_*` method that resolves
// whatever it needs through the scope in `Env` and then fills a pure
// `*_template` function. Scopes nest computation > kernel > neighbor loop;
// each level extends a copy of the enclosing table, so outer values stay
// visible unless shadowed.
//
// Preconditions: `root` is a USID tree; `Computation::validate` has ideally
//                run, but every reference is re-resolved here regardless.
// Postconditions: `generate_raw` is deterministic for a given tree and
//                 backend; `generate` additionally runs the formatter.
// Failure modes: unresolved or wrong-kind symbols, temporaries without exactly
//                one location dimension, types or built-ins without a C++
//                spelling, and formatter failures. Any error discards the
//                whole unit.
// Side effects: none (`generate` may spawn a formatter process).

use std::collections::BTreeSet;
use std::fmt::Write as _;

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::common::{BuiltInLiteral, DataType, LiteralValue, LocationType};
use crate::error::{Error, Result};
use crate::format::{FormatterChoice, SourceFormatter};
use crate::symtable::SymbolTable;
use crate::usid::{
    expect_composite, expect_connectivity, expect_kernel, neighbor_loop_scope, resolve_pointer,
    Access, CompositeEntry, Computation, Connectivity, Dimensions, Expr, FieldAccess, Kernel,
    KernelCall, Literal, NeighborLoop, SidComposite, SidCompositeEntry, SidCompositeSparseEntry,
    Stmt, Symbol, Temporary, VarDecl,
};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenOptions {
    pub backend: Backend,
    pub formatter: FormatterChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub cpp_source: String,
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Generate the unformatted translation unit for `root`.
pub fn generate_raw(root: &Computation, backend: &Backend) -> Result<String> {
    debug!(computation = %root.name, backend = backend.name, "generating");
    UsidGenerator { backend }.visit_computation(root)
}

/// Generate and format the translation unit for `root`.
pub fn generate(root: &Computation, options: &CodegenOptions) -> Result<GeneratedCode> {
    let raw = generate_raw(root, &options.backend)?;
    let cpp_source = options.formatter.format(&raw)?;
    Ok(GeneratedCode { cpp_source })
}

// ── Spelling tables ─────────────────────────────────────────────────────────

/// C++ spelling of a data type. `Auto` and `Invalid` have none.
pub fn data_type_to_cpp(ty: DataType) -> Option<&'static str> {
    match ty {
        DataType::Boolean => Some("bool"),
        DataType::Int32 => Some("int"),
        DataType::Uint32 => Some("unsigned int"),
        DataType::Float32 => Some("float"),
        DataType::Float64 => Some("double"),
        DataType::Auto | DataType::Invalid => None,
    }
}

/// C++ spelling of a built-in constant of type `ty`. Boolean constants only
/// exist for `Boolean`.
pub fn builtin_literal_to_cpp(lit: BuiltInLiteral, ty: DataType) -> Option<String> {
    let cpp = data_type_to_cpp(ty)?;
    match (lit, ty) {
        (BuiltInLiteral::MaxValue, _) => Some(format!("std::numeric_limits<{cpp}>::max()")),
        (BuiltInLiteral::MinValue, _) => Some(format!("std::numeric_limits<{cpp}>::lowest()")),
        (BuiltInLiteral::Zero, _) => Some("0".to_string()),
        (BuiltInLiteral::One, _) => Some("1".to_string()),
        (BuiltInLiteral::True, DataType::Boolean) => Some("true".to_string()),
        (BuiltInLiteral::False, DataType::Boolean) => Some("false".to_string()),
        (BuiltInLiteral::True | BuiltInLiteral::False, _) => None,
    }
}

/// Name of the runtime's domain member for a location type.
pub fn location_type_to_cpp(loc: LocationType) -> &'static str {
    match loc {
        LocationType::Vertex => "vertex",
        LocationType::Edge => "edge",
        LocationType::Cell => "cell",
    }
}

fn cpp_type(ty: DataType, context: &str) -> Result<&'static str> {
    data_type_to_cpp(ty).ok_or_else(|| Error::UnsupportedConstant {
        what: "data type",
        value: ty.to_string(),
        context: context.to_string(),
    })
}

/// The single location type among `dims`.
fn location_type_from_dimensions(dims: &Dimensions, node: &str) -> Result<LocationType> {
    match dims.location_types().as_slice() {
        [loc] => Ok(*loc),
        other => Err(Error::MissingLocationDimension {
            node: node.to_string(),
            found: other.len(),
        }),
    }
}

// ── Context ─────────────────────────────────────────────────────────────────

type Scope<'a> = SymbolTable<'a, Symbol<'a>>;

/// Values threaded through every visit: the visible symbols and a
/// human-readable path to the current node for error messages.
struct Env<'a> {
    symtable: Scope<'a>,
    path: String,
}

impl<'a> Env<'a> {
    fn root(node: &'a Computation) -> Self {
        Env {
            symtable: SymbolTable::new().extend(node.symbols()),
            path: format!("computation '{}'", node.name),
        }
    }

    /// Child scope declaring `symbols` on top of everything visible here.
    fn enter<I>(&self, label: &str, symbols: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Symbol<'a>)>,
    {
        self.with_table(label, self.symtable.extend(symbols))
    }

    fn with_table(&self, label: &str, symtable: Scope<'a>) -> Self {
        let path = format!("{} > {}", self.path, label);
        trace!(scope = %path, symbols = symtable.len(), "entering scope");
        Env { symtable, path }
    }
}

// ── Generator ───────────────────────────────────────────────────────────────

struct UsidGenerator<'b> {
    backend: &'b Backend,
}

impl UsidGenerator<'_> {
    fn visit_computation(&self, node: &Computation) -> Result<String> {
        let env = Env::root(node);

        let connectivities = node
            .connectivities
            .iter()
            .map(|c| self.visit_connectivity(c))
            .collect();
        let tags: BTreeSet<&str> = node
            .parameters
            .iter()
            .map(|f| f.tag.as_str())
            .chain(node.temporaries.iter().map(|t| t.tag.as_str()))
            .collect();
        let kernels = node
            .kernels
            .iter()
            .map(|k| self.visit_kernel(k, &env))
            .collect::<Result<Vec<_>>>()?;

        let mut entry_params = vec!["domain d".to_string()];
        entry_params.extend(node.connectivities.iter().map(|c| format!("auto &&{}", c.name)));
        let mut captures = vec!["d = std::move(d)".to_string()];
        captures.extend(
            node.connectivities
                .iter()
                .map(|c| connectivity_capture_template(&c.name, &c.tag)),
        );
        let field_params = node
            .parameters
            .iter()
            .map(|f| format!("auto &&{}", f.name))
            .collect();

        let temporaries = node
            .temporaries
            .iter()
            .map(|t| self.visit_temporary(t))
            .collect::<Result<Vec<_>>>()?;
        let calls = node
            .ctrlflow_ast
            .iter()
            .map(|c| self.visit_kernel_call(c, &env))
            .collect::<Result<Vec<_>>>()?;

        Ok(computation_template(&TranslationUnit {
            name: &node.name,
            backend: self.backend,
            connectivities,
            tags,
            kernels,
            entry_params,
            captures,
            field_params,
            temporaries,
            calls,
        }))
    }

    fn visit_connectivity(&self, node: &Connectivity) -> String {
        connectivity_template(&node.tag, node.max_neighbors, node.has_skip_values)
    }

    fn visit_temporary(&self, node: &Temporary) -> Result<String> {
        let label = format!("temporary '{}'", node.name);
        let ctype = cpp_type(node.vtype, &label)?;
        let loc = location_type_from_dimensions(&node.dimensions, &label)?;
        Ok(temporary_template(&node.name, ctype, location_type_to_cpp(loc)))
    }

    fn visit_kernel<'a>(&self, node: &'a Kernel, env: &Env<'a>) -> Result<String> {
        debug!(kernel = %node.name, "emitting kernel");
        let env = env.enter(&format!("kernel '{}'", node.name), node.symbols());
        let primary = &node.primary_composite;
        let mut signature = format!(
            "auto &&{}, auto &&{}",
            primary.ptr_name(),
            primary.strides_name()
        );
        for secondary in &node.secondary_composites {
            let _ = write!(signature, ", auto &&{}", secondary.name);
        }
        let body = self.visit_stmts(&node.body, &env)?;
        Ok(kernel_template(&node.name, &signature, &body))
    }

    fn visit_kernel_call(&self, node: &KernelCall, env: &Env<'_>) -> Result<String> {
        let kernel = expect_kernel(&env.symtable, &node.name, &env.path)?;
        let domain = format!("d.{}", location_type_to_cpp(kernel.primary_location));
        let sids = kernel
            .composites()
            .map(|c| self.visit_sid_composite(c, env))
            .collect::<Result<Vec<_>>>()?;
        Ok(kernel_call_template(&node.name, &domain, &sids))
    }

    fn visit_sid_composite(&self, node: &SidComposite, env: &Env<'_>) -> Result<String> {
        let context = format!("{} > composite '{}'", env.path, node.name);
        let tags: Vec<&str> = node.entries.iter().map(|e| e.name()).collect();
        let entries = node
            .entries
            .iter()
            .map(|e| match e {
                CompositeEntry::SidCompositeEntry(e) => self.visit_entry(e, env, &context),
                CompositeEntry::SidCompositeSparseEntry(e) => {
                    self.visit_sparse_entry(e, env, &context)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(sid_composite_template(&tags, &entries))
    }

    fn visit_entry(&self, node: &SidCompositeEntry, env: &Env<'_>, context: &str) -> Result<String> {
        env.symtable.resolve(&node.reference, context)?;
        Ok(node.reference.clone())
    }

    fn visit_sparse_entry(
        &self,
        node: &SidCompositeSparseEntry,
        env: &Env<'_>,
        context: &str,
    ) -> Result<String> {
        env.symtable.resolve(&node.reference, context)?;
        let connectivity = expect_connectivity(&env.symtable, &node.connectivity, context)?;
        Ok(sparse_entry_template(&connectivity.tag, &node.reference))
    }

    fn visit_stmts<'a>(&self, body: &'a [Stmt], env: &Env<'a>) -> Result<String> {
        let lines = body
            .iter()
            .map(|s| self.visit_stmt(s, env))
            .collect::<Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }

    fn visit_stmt<'a>(&self, node: &'a Stmt, env: &Env<'a>) -> Result<String> {
        match node {
            Stmt::AssignStmt(a) => {
                let left = match &a.left {
                    Access::FieldAccess(f) => self.visit_field_access(f, env)?,
                    Access::VarAccess(v) => v.name.clone(),
                };
                let right = self.visit_expr(&a.right, env)?;
                Ok(assign_template(&left, &right))
            }
            Stmt::VarDecl(v) => self.visit_var_decl(v, env),
            Stmt::NeighborLoop(n) => self.visit_neighbor_loop(n, env),
        }
    }

    fn visit_var_decl(&self, node: &VarDecl, env: &Env<'_>) -> Result<String> {
        let ctype = cpp_type(node.vtype, &format!("{} > variable '{}'", env.path, node.name))?;
        let init = self.visit_expr(&node.init, env)?;
        Ok(var_decl_template(ctype, &node.name, &init))
    }

    fn visit_neighbor_loop<'a>(&self, node: &'a NeighborLoop, env: &Env<'a>) -> Result<String> {
        let label = format!("neighbor loop over '{}'", node.connectivity);
        let context = format!("{} > {}", env.path, label);
        let connectivity = expect_connectivity(&env.symtable, &node.connectivity, &context)?;
        let primary = expect_composite(&env.symtable, &node.primary_sid, &context)?;
        let inner = env.with_table(&label, neighbor_loop_scope(&env.symtable, node, &context)?);
        let body = self.visit_stmts(&node.body, &inner)?;
        Ok(neighbor_loop_template(&NeighborLoopParts {
            tag: &connectivity.tag,
            primary: &node.primary,
            secondary: &node.secondary,
            body: &body,
            ptrs: &primary.ptr_name(),
            strides: &primary.strides_name(),
            secondary_sid: &node.secondary_sid,
        }))
    }

    fn visit_expr(&self, node: &Expr, env: &Env<'_>) -> Result<String> {
        match node {
            Expr::Literal(l) => self.visit_literal(l, env),
            Expr::FieldAccess(f) => self.visit_field_access(f, env),
            Expr::VarAccess(v) => Ok(v.name.clone()),
            Expr::PtrRef(p) => {
                env.symtable.resolve(&p.name, &env.path)?;
                Ok(p.name.clone())
            }
            Expr::BinaryOp(b) => {
                let left = self.visit_expr(&b.left, env)?;
                let right = self.visit_expr(&b.right, env)?;
                Ok(binary_op_template(&left, b.op.as_str(), &right))
            }
        }
    }

    fn visit_literal(&self, node: &Literal, env: &Env<'_>) -> Result<String> {
        let ctype = cpp_type(node.vtype, &env.path)?;
        let value = match &node.value {
            LiteralValue::Text(text) => text.clone(),
            LiteralValue::BuiltIn(lit) => builtin_literal_to_cpp(*lit, node.vtype).ok_or_else(|| {
                Error::UnsupportedConstant {
                    what: "built-in literal",
                    value: format!("{lit} for {}", node.vtype),
                    context: env.path.clone(),
                }
            })?,
        };
        Ok(literal_template(ctype, &value))
    }

    fn visit_field_access(&self, node: &FieldAccess, env: &Env<'_>) -> Result<String> {
        let (ptr, composite) = resolve_pointer(&env.symtable, &node.sid, &env.path)?;
        let entry = composite.entry(&node.name).ok_or_else(|| {
            Error::unresolved(
                &node.name,
                format!("{} (no such entry in '{}')", env.path, node.sid),
            )
        })?;
        Ok(field_access_template(entry.name(), &ptr))
    }
}

// ── Templates ───────────────────────────────────────────────────────────────

fn literal_template(ctype: &str, value: &str) -> String {
    format!("({ctype}){value}")
}

fn binary_op_template(left: &str, op: &str, right: &str) -> String {
    format!("({left} {op} {right})")
}

fn assign_template(left: &str, right: &str) -> String {
    format!("{left} = {right};")
}

fn var_decl_template(ctype: &str, name: &str, init: &str) -> String {
    format!("{ctype} {name} = {init};")
}

fn field_access_template(entry: &str, ptr: &str) -> String {
    format!("field<{entry}>({ptr})")
}

fn sparse_entry_template(connectivity_tag: &str, reference: &str) -> String {
    format!("sid::rename_dimensions<dim::s, {connectivity_tag}>({reference})")
}

fn sid_composite_template(tags: &[&str], entries: &[String]) -> String {
    format!(
        "sid::composite::make<{}>({})",
        tags.join(", "),
        entries.join(", ")
    )
}

fn kernel_call_template(name: &str, domain: &str, sids: &[String]) -> String {
    let mut args = vec![domain.to_string()];
    args.extend(sids.iter().cloned());
    format!("call_kernel<{name}>({});", args.join(", "))
}

fn connectivity_template(tag: &str, max_neighbors: u32, has_skip_values: bool) -> String {
    format!("struct {tag} : connectivity<{max_neighbors}, {has_skip_values}> {{}};")
}

fn connectivity_capture_template(name: &str, tag: &str) -> String {
    format!(
        "{name} = sid::rename_dimensions<dim::n, {tag}>(std::forward<decltype({name})>({name})(traits_t()))"
    )
}

fn temporary_template(name: &str, ctype: &str, loc: &str) -> String {
    format!("auto {name} = make_simple_tmp_storage<{ctype}>(d.{loc}, d.k, alloc);")
}

/// Append `block` and a newline unless it is empty.
fn push_block(out: &mut String, block: &str) {
    if !block.is_empty() {
        out.push_str(block);
        out.push('\n');
    }
}

struct NeighborLoopParts<'p> {
    tag: &'p str,
    primary: &'p str,
    secondary: &'p str,
    body: &'p str,
    ptrs: &'p str,
    strides: &'p str,
    secondary_sid: &'p str,
}

fn neighbor_loop_template(p: &NeighborLoopParts<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "foreach_neighbor<{}>([&](auto &&{}, auto &&{}) {{",
        p.tag, p.primary, p.secondary
    );
    push_block(&mut out, p.body);
    let _ = write!(out, "}}, {}, {}, {});", p.ptrs, p.strides, p.secondary_sid);
    out
}

fn kernel_template(name: &str, signature: &str, body: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "struct {name} {{");
    out.push_str("GT_FUNCTION auto operator()() const {\n");
    let _ = writeln!(out, "return []({signature}) {{");
    push_block(&mut out, body);
    out.push_str("};\n");
    out.push_str("}\n");
    out.push_str("};");
    out
}

struct TranslationUnit<'p> {
    name: &'p str,
    backend: &'p Backend,
    connectivities: Vec<String>,
    tags: BTreeSet<&'p str>,
    kernels: Vec<String>,
    entry_params: Vec<String>,
    captures: Vec<String>,
    field_params: Vec<String>,
    temporaries: Vec<String>,
    calls: Vec<String>,
}

fn computation_template(u: &TranslationUnit<'_>) -> String {
    let mut out = String::with_capacity(4096);
    for header in u.backend.headers() {
        let _ = writeln!(out, "#include {header}");
    }
    push_block(&mut out, u.backend.preface);
    out.push('\n');

    let _ = writeln!(out, "namespace {}_impl_ {{", u.name);
    out.push_str("using namespace gridtools;\n");
    out.push_str("using namespace gridtools::usid;\n");
    let _ = writeln!(out, "using namespace gridtools::usid::{};", u.backend.namespace);
    out.push('\n');

    for c in &u.connectivities {
        let _ = writeln!(out, "{c}");
    }
    for tag in &u.tags {
        let _ = writeln!(out, "struct {tag};");
    }
    out.push('\n');

    for kernel in &u.kernels {
        let _ = writeln!(out, "{kernel}");
        out.push('\n');
    }

    let _ = writeln!(
        out,
        "inline constexpr auto {} = []({}) {{",
        u.name,
        u.entry_params.join(", ")
    );
    let _ = writeln!(
        out,
        "return [{}]({}) {{",
        u.captures.join(", "),
        u.field_params.join(", ")
    );
    if !u.temporaries.is_empty() {
        out.push_str("auto alloc = make_allocator();\n");
    }
    for tmp in &u.temporaries {
        let _ = writeln!(out, "{tmp}");
    }
    for call in &u.calls {
        let _ = writeln!(out, "{call}");
    }
    out.push_str("};\n");
    out.push_str("};\n");
    let _ = writeln!(out, "}} // namespace {}_impl_", u.name);
    out.push('\n');
    let _ = writeln!(out, "using {0}_impl_::{0};", u.name);
    out
}

// ── Tests ───────────────────────────────────────────────────────────────────
