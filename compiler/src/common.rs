// common.rs — Vocabulary shared by the node model and the USID model
//
// Mesh location kinds, scalar data types, built-in literal constants, loop
// orders and operators, plus the generic assignment and binary-operation
// shapes that each IR layer instantiates with its own expression types.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Enumerations ────────────────────────────────────────────────────────────

/// Kind of mesh element a computation operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationType {
    Vertex,
    Edge,
    Cell,
}

impl LocationType {
    pub const ALL: [LocationType; 3] = [LocationType::Vertex, LocationType::Edge, LocationType::Cell];
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LocationType::Vertex => "Vertex",
            LocationType::Edge => "Edge",
            LocationType::Cell => "Cell",
        };
        f.write_str(s)
    }
}

/// Scalar element type of fields, locals and literals.
///
/// `Auto` and `Invalid` exist so the frontend can express "not yet inferred";
/// neither has a spelling in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Invalid,
    Auto,
    Boolean,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl DataType {
    pub const ALL: [DataType; 7] = [
        DataType::Invalid,
        DataType::Auto,
        DataType::Boolean,
        DataType::Int32,
        DataType::Uint32,
        DataType::Float32,
        DataType::Float64,
    ];
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Invalid => "INVALID",
            DataType::Auto => "AUTO",
            DataType::Boolean => "BOOLEAN",
            DataType::Int32 => "INT32",
            DataType::Uint32 => "UINT32",
            DataType::Float32 => "FLOAT32",
            DataType::Float64 => "FLOAT64",
        };
        f.write_str(s)
    }
}

/// Symbolic constants whose spelling depends on the literal's data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuiltInLiteral {
    MaxValue,
    MinValue,
    Zero,
    One,
    True,
    False,
}

impl BuiltInLiteral {
    pub const ALL: [BuiltInLiteral; 6] = [
        BuiltInLiteral::MaxValue,
        BuiltInLiteral::MinValue,
        BuiltInLiteral::Zero,
        BuiltInLiteral::One,
        BuiltInLiteral::True,
        BuiltInLiteral::False,
    ];
}

impl fmt::Display for BuiltInLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuiltInLiteral::MaxValue => "MAX_VALUE",
            BuiltInLiteral::MinValue => "MIN_VALUE",
            BuiltInLiteral::Zero => "ZERO",
            BuiltInLiteral::One => "ONE",
            BuiltInLiteral::True => "TRUE",
            BuiltInLiteral::False => "FALSE",
        };
        f.write_str(s)
    }
}

/// Value of a literal: verbatim target-language text or a built-in constant.
///
/// Serialized untagged: a JSON string naming a built-in (`"ZERO"`) decodes as
/// the built-in, any other string as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    BuiltIn(BuiltInLiteral),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopOrder {
    Forward,
    Backward,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

// ── Generic shapes ──────────────────────────────────────────────────────────

/// `left = right`, parameterized by the IR layer's access and expression types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt<L, R> {
    pub left: L,
    pub right: R,
}

impl<L, R> AssignStmt<L, R> {
    pub fn new(left: L, right: R) -> Self {
        AssignStmt { left, right }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOp<E> {
    pub op: BinaryOperator,
    pub left: Box<E>,
    pub right: Box<E>,
}

impl<E> BinaryOp<E> {
    pub fn new(op: BinaryOperator, left: E, right: E) -> Self {
        BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
