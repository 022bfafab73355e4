use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use usidc::backend::Backend;
use usidc::codegen::CodegenOptions;
use usidc::diag::Diagnostic;
use usidc::format::{ClangFormat, FormatterChoice};
use usidc::pipeline::{self, Stage};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum IrKind {
    Usid,
    Nir,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    /// Formatted C++
    Cpp,
    /// Unformatted generator output (skips formatting)
    Raw,
    /// Provenance JSON
    BuildInfo,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum BackendKind {
    Naive,
    Gpu,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatterKind {
    Builtin,
    ClangFormat,
}

#[derive(Parser, Debug)]
#[command(
    name = "usidc",
    version,
    about = "USID code generator: compiles unstructured-mesh stencil IR to gridtools C++"
)]
struct Cli {
    /// Input IR document (JSON)
    input: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Kind of IR document
    #[arg(long, value_enum, default_value_t = IrKind::Usid)]
    ir: IrKind,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Cpp)]
    emit: EmitStage,

    /// Target backend
    #[arg(long, value_enum, default_value_t = BackendKind::Naive)]
    backend: BackendKind,

    /// Source formatter
    #[arg(long, value_enum, default_value_t = FormatterKind::Builtin)]
    formatter: FormatterKind,

    /// clang-format command
    #[arg(long = "clang-format", default_value = "clang-format")]
    clang_format: String,

    /// clang-format style
    #[arg(long, default_value = "LLVM")]
    style: String,

    /// Print stages and timing
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "usidc=info" } else { "warn" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn fail(err: &usidc::error::Error) -> ! {
    eprintln!("usidc: {}", Diagnostic::from(err));
    std::process::exit(1);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        eprintln!("usidc: input   = {}", cli.input.display());
        eprintln!("usidc: ir      = {:?}", cli.ir);
        eprintln!("usidc: emit    = {:?}", cli.emit);
        eprintln!("usidc: backend = {:?}", cli.backend);
    }

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("usidc: error: {}: {}", cli.input.display(), e);
            std::process::exit(2);
        }
    };

    let verbose = cli.verbose;
    let report = |stage: Stage, elapsed: Duration| {
        if verbose {
            eprintln!(
                "usidc: {} complete, {:.1}ms",
                stage.name(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
    };

    if let IrKind::Nir = cli.ir {
        match pipeline::check_nir(&source, report) {
            Ok(root) => {
                eprintln!(
                    "usidc: node-model computation '{}' is valid ({} horizontal loops)",
                    root.name(),
                    root.horizontal_loops().count()
                );
                return;
            }
            Err(e) => fail(&e),
        }
    }

    let options = CodegenOptions {
        backend: match cli.backend {
            BackendKind::Naive => Backend::NAIVE,
            BackendKind::Gpu => Backend::GPU,
        },
        formatter: match cli.formatter {
            FormatterKind::Builtin => FormatterChoice::Builtin,
            FormatterKind::ClangFormat => FormatterChoice::ClangFormat(ClangFormat {
                command: cli.clang_format.clone(),
                style: cli.style.clone(),
            }),
        },
    };

    let (text, warnings) = match cli.emit {
        EmitStage::Raw => match pipeline::generate_usid(&source, &options.backend, report) {
            Ok(g) => (g.raw, g.warnings),
            Err(e) => fail(&e),
        },
        EmitStage::Cpp | EmitStage::BuildInfo => {
            let compiled = match pipeline::compile_usid(&source, &options, report) {
                Ok(c) => c,
                Err(e) => fail(&e),
            };
            let text = match cli.emit {
                EmitStage::BuildInfo => compiled.provenance.to_json(),
                _ => compiled.generated.cpp_source,
            };
            (text, compiled.warnings)
        }
    };
    for warning in &warnings {
        eprintln!("usidc: {}", warning);
    }

    match &cli.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &text) {
                eprintln!("usidc: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
            if cli.verbose {
                eprintln!("usidc: wrote {}", path.display());
            }
        }
        None => print!("{}", text),
    }
}
