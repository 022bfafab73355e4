// format.rs — Canonical formatting of generated C++
//
// Generated text is passed through a formatter before it is handed back.
// `BuiltinFormatter` re-indents in process: each line is tokenized with
// `logos` so braces inside string/char literals and comments are ignored,
// then indented by brace depth. Namespace braces do not indent, preprocessor
// lines stay at column 0, and runs of blank lines collapse to one.
// `ClangFormat` pipes the text through an external `clang-format`.
//
// Preconditions: input is the raw output of codegen.
// Postconditions: formatted text ending in a single newline.
// Failure modes: unbalanced braces, unterminated literals, or a failing
//   external tool yield `Error::Formatting`; there is no unformatted fallback.
// Side effects: `ClangFormat` spawns a process.

use std::io::Write as _;
use std::process::{Command, Stdio};

use logos::Logos;

use crate::error::{Error, Result};

pub trait SourceFormatter {
    fn format(&self, source: &str) -> Result<String>;
}

// ── Formatter selection ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormatterChoice {
    #[default]
    Builtin,
    ClangFormat(ClangFormat),
}

impl SourceFormatter for FormatterChoice {
    fn format(&self, source: &str) -> Result<String> {
        match self {
            FormatterChoice::Builtin => BuiltinFormatter::default().format(source),
            FormatterChoice::ClangFormat(c) => c.format(source),
        }
    }
}

// ── Builtin formatter ───────────────────────────────────────────────────────

/// Tokens relevant to indentation. Everything else is `Word` or `Punct`.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r]+")]
enum Token {
    #[token("namespace")]
    Namespace,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLit,
    #[regex(r"'([^'\\]|\\.)*'")]
    CharLit,
    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Word,
    #[regex(r"[0-9][0-9a-zA-Z_.]*")]
    Number,
    #[regex(r#"[^{}"'a-zA-Z0-9_ \t\r\n]"#)]
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Brace {
    Block,
    Namespace,
}

/// Brace structure of one line.
struct LineShape {
    /// `}` tokens before any other token.
    leading_closes: usize,
    /// Remaining brace events in order: `true` opens, `false` closes.
    events: Vec<bool>,
    opens_namespace: bool,
}

fn scan_line(line: &str, lineno: usize) -> Result<LineShape> {
    let mut shape = LineShape {
        leading_closes: 0,
        events: Vec::new(),
        opens_namespace: false,
    };
    let mut at_start = true;
    let mut first = true;
    for (token, span) in Token::lexer(line).spanned() {
        let token = token.map_err(|()| {
            Error::formatting(format!(
                "line {lineno}: cannot tokenize `{}`",
                &line[span.start..]
            ))
        })?;
        if first {
            shape.opens_namespace = token == Token::Namespace;
            first = false;
        }
        match token {
            Token::RBrace if at_start => shape.leading_closes += 1,
            Token::RBrace => shape.events.push(false),
            Token::LBrace => {
                at_start = false;
                shape.events.push(true);
            }
            _ => at_start = false,
        }
    }
    Ok(shape)
}

/// In-process canonical re-indenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinFormatter {
    pub indent_width: usize,
}

impl Default for BuiltinFormatter {
    fn default() -> Self {
        BuiltinFormatter { indent_width: 2 }
    }
}

impl SourceFormatter for BuiltinFormatter {
    fn format(&self, source: &str) -> Result<String> {
        let mut out = String::with_capacity(source.len());
        let mut stack: Vec<Brace> = Vec::new();
        let mut pending_blank = false;
        let mut after_open = false;

        for (i, raw) in source.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();
            if line.is_empty() {
                pending_blank = true;
                continue;
            }

            if line.starts_with('#') {
                if pending_blank && !out.is_empty() && !after_open {
                    out.push('\n');
                }
                pending_blank = false;
                after_open = false;
                out.push_str(line);
                out.push('\n');
                continue;
            }

            let shape = scan_line(line, lineno)?;
            for _ in 0..shape.leading_closes {
                stack.pop().ok_or_else(|| {
                    Error::formatting(format!("line {lineno}: unmatched `}}`"))
                })?;
            }

            if pending_blank && !out.is_empty() && !after_open && shape.leading_closes == 0 {
                out.push('\n');
            }
            pending_blank = false;

            let depth = stack.iter().filter(|b| **b == Brace::Block).count();
            out.push_str(&" ".repeat(depth * self.indent_width));
            out.push_str(line);
            out.push('\n');

            let kind = if shape.opens_namespace {
                Brace::Namespace
            } else {
                Brace::Block
            };
            for &open in &shape.events {
                if open {
                    stack.push(kind);
                } else {
                    stack.pop().ok_or_else(|| {
                        Error::formatting(format!("line {lineno}: unmatched `}}`"))
                    })?;
                }
            }
            after_open = shape.events.last() == Some(&true);
        }

        if !stack.is_empty() {
            return Err(Error::formatting(format!(
                "{} unclosed `{{` at end of input",
                stack.len()
            )));
        }
        Ok(out)
    }
}

// ── clang-format ────────────────────────────────────────────────────────────

/// External `clang-format` run over stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClangFormat {
    pub command: String,
    pub style: String,
}

impl Default for ClangFormat {
    fn default() -> Self {
        ClangFormat {
            command: "clang-format".to_string(),
            style: "LLVM".to_string(),
        }
    }
}

impl SourceFormatter for ClangFormat {
    fn format(&self, source: &str) -> Result<String> {
        tracing::debug!(command = %self.command, style = %self.style, "running external formatter");
        let mut child = Command::new(&self.command)
            .arg(format!("--style={}", self.style))
            .arg("--assume-filename=generated.cpp")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::formatting(format!("cannot run `{}`: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::formatting("formatter stdin unavailable"))?;
        let input = source.to_owned();
        // Feed stdin from a separate thread so a full stdout pipe cannot stall us.
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|e| Error::formatting(format!("`{}` failed: {}", self.command, e)))?;
        writer
            .join()
            .map_err(|_| Error::formatting("formatter input thread panicked"))?
            .map_err(|e| Error::formatting(format!("cannot write to `{}`: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(Error::formatting(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| Error::formatting(format!("`{}` produced invalid UTF-8: {}", self.command, e)))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
