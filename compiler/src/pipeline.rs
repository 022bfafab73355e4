// pipeline.rs — Stage orchestration from IR document to formatted C++
//
// Runs load → validate → generate → format over a USID JSON document and
// reports each stage's duration through a callback, so the CLI can print
// progress as it happens. `generate_usid` stops before the format stage.
// Node-model documents can be loaded and validated; they are not lowered.
//
// Preconditions: `source` is the text of a JSON IR document.
// Postconditions: `Compiled` holds the formatted unit, the raw unit, any
//   validation warnings and the build provenance.
// Failure modes: the first failing stage aborts with its `Error`.
// Side effects: the clang-format formatter spawns a process.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::info;

use crate::backend::Backend;
use crate::codegen::{self, CodegenOptions, GeneratedCode};
use crate::diag::Diagnostic;
use crate::error::{Error, Result};
use crate::format::SourceFormatter;
use crate::{nir, usid};

// ── Stages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Validate,
    Generate,
    Format,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Validate => "validate",
            Stage::Generate => "generate",
            Stage::Format => "format",
        }
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Build metadata for `--emit build-info`.
///
/// `input_hash`: SHA-256 of the IR document text.
/// `output_hash`: SHA-256 of the formatted translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub input_hash: [u8; 32],
    pub output_hash: [u8; 32],
    pub compiler_version: &'static str,
    pub backend: &'static str,
}

impl Provenance {
    pub fn input_hash_hex(&self) -> String {
        bytes_to_hex(&self.input_hash)
    }

    pub fn output_hash_hex(&self) -> String {
        bytes_to_hex(&self.output_hash)
    }

    pub fn to_json(&self) -> String {
        let value = json!({
            "input_hash": self.input_hash_hex(),
            "output_hash": self.output_hash_hex(),
            "backend": self.backend,
            "compiler_version": self.compiler_version,
        });
        format!("{value:#}\n")
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

pub fn compute_provenance(input: &str, output: &str, backend: &'static str) -> Provenance {
    Provenance {
        input_hash: sha256(input),
        output_hash: sha256(output),
        compiler_version: env!("CARGO_PKG_VERSION"),
        backend,
    }
}

// ── Loading ────────────────────────────────────────────────────────────────

pub fn load_usid(source: &str) -> Result<usid::Computation> {
    serde_json::from_str(source).map_err(|e| Error::Load {
        what: "USID document".to_string(),
        message: e.to_string(),
    })
}

/// Load a node-model document. Structural and symbol-reference checks run
/// during decoding, so their messages surface here.
pub fn load_nir(source: &str) -> Result<nir::Computation> {
    serde_json::from_str(source).map_err(|e| Error::Load {
        what: "node-model document".to_string(),
        message: e.to_string(),
    })
}

// ── Runner ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Compiled {
    pub generated: GeneratedCode,
    /// Unformatted unit, as produced by codegen.
    pub raw: String,
    pub warnings: Vec<Diagnostic>,
    pub provenance: Provenance,
}

fn timed<T>(
    stage: Stage,
    on_stage: &mut impl FnMut(Stage, Duration),
    run: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let t = Instant::now();
    let out = run()?;
    let elapsed = t.elapsed();
    info!(
        stage = stage.name(),
        ms = elapsed.as_secs_f64() * 1000.0,
        "stage complete"
    );
    on_stage(stage, elapsed);
    Ok(out)
}

/// Unformatted output of a USID document, before the format stage.
#[derive(Debug, Clone)]
pub struct Generated {
    pub raw: String,
    pub warnings: Vec<Diagnostic>,
}

/// Load, validate and generate a USID document without formatting it.
pub fn generate_usid(
    source: &str,
    backend: &Backend,
    mut on_stage: impl FnMut(Stage, Duration),
) -> Result<Generated> {
    let root = timed(Stage::Load, &mut on_stage, || load_usid(source))?;
    let warnings = timed(Stage::Validate, &mut on_stage, || root.validate())?;
    let raw = timed(Stage::Generate, &mut on_stage, || {
        codegen::generate_raw(&root, backend)
    })?;
    Ok(Generated { raw, warnings })
}

/// Compile a USID document to a formatted translation unit.
pub fn compile_usid(
    source: &str,
    options: &CodegenOptions,
    mut on_stage: impl FnMut(Stage, Duration),
) -> Result<Compiled> {
    let Generated { raw, warnings } = generate_usid(source, &options.backend, &mut on_stage)?;
    let cpp_source = timed(Stage::Format, &mut on_stage, || options.formatter.format(&raw))?;
    let provenance = compute_provenance(source, &cpp_source, options.backend.name);
    Ok(Compiled {
        generated: GeneratedCode { cpp_source },
        raw,
        warnings,
        provenance,
    })
}

/// Load and validate a node-model document.
pub fn check_nir(
    source: &str,
    mut on_stage: impl FnMut(Stage, Duration),
) -> Result<nir::Computation> {
    timed(Stage::Load, &mut on_stage, || load_nir(source))
}

// ── Tests ──────────────────────────────────────────────────────────────────
