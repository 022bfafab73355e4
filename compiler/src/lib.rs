// usidc — USID code generator
//
// Library root: node-model and USID IRs, scope resolution, C++ code
// generation, formatting and the stage pipeline.

pub mod backend;
pub mod codegen;
pub mod common;
pub mod diag;
pub mod error;
pub mod format;
pub mod nir;
pub mod pipeline;
pub mod symtable;
pub mod usid;
