//! Declaration-level facts: units, function declarations, identities.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Stmt;

/// Source position (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    #[serde(default = "default_col")]
    pub col: u32,
}

fn default_col() -> u32 {
    1
}

impl Span {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Fully-qualified type identity, serialized as `"pkg/path.TypeName"`.
///
/// Identities are compared by exact match only; the engine never pattern-matches
/// on source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeId {
    pub path: String,
    pub name: String,
}

impl TypeId {
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
        }
    }

    /// Short form for messages: last path segment plus type name,
    /// e.g. `"errgroup.Group"` for `golang.org/x/sync/errgroup.Group`.
    pub fn short(&self) -> String {
        match self.path.rsplit('/').next() {
            Some(seg) if !seg.is_empty() => format!("{}.{}", seg, self.name),
            _ => self.name.clone(),
        }
    }
}

impl TryFrom<String> for TypeId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.rfind('.') {
            Some(i) if i > 0 && i + 1 < s.len() => Ok(Self {
                path: s[..i].to_string(),
                name: s[i + 1..].to_string(),
            }),
            _ => Err(format!(
                "invalid type identity {:?}, expected \"pkg/path.TypeName\"",
                s
            )),
        }
    }
}

impl std::str::FromStr for TypeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeId::try_from(s.to_string())
    }
}

impl From<TypeId> for String {
    fn from(t: TypeId) -> String {
        format!("{}.{}", t.path, t.name)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.path, self.name)
    }
}

/// Fully-qualified function identity, serialized as `"pkg/path.FuncName"`.
/// The path is empty for unit-local functions referenced by bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FuncId {
    pub path: String,
    pub name: String,
}

impl FuncId {
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
        }
    }
}

impl From<String> for FuncId {
    fn from(s: String) -> Self {
        match s.rfind('.') {
            Some(i) if i > 0 && i + 1 < s.len() => Self {
                path: s[..i].to_string(),
                name: s[i + 1..].to_string(),
            },
            _ => Self {
                path: String::new(),
                name: s,
            },
        }
    }
}

impl From<FuncId> for String {
    fn from(f: FuncId) -> String {
        if f.path.is_empty() {
            f.name
        } else {
            format!("{}.{}", f.path, f.name)
        }
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.path, self.name)
        }
    }
}

/// Resolved type of a parameter or binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// A named type.
    Named(TypeId),
    /// A pointer to another type. Closures capturing pointer variables can
    /// introduce extra indirection layers, so matching unwraps all of them.
    Pointer(Box<TypeRef>),
    /// A function type.
    Func(FuncSig),
    /// Anything the front-end did not resolve further.
    Other,
}

impl TypeRef {
    /// Unwrap all pointer layers.
    pub fn unwrap_pointer(&self) -> &TypeRef {
        let mut t = self;
        while let TypeRef::Pointer(inner) = t {
            t = &**inner;
        }
        t
    }

    /// The named identity behind any pointer layers, if there is one.
    pub fn as_named(&self) -> Option<&TypeId> {
        match self.unwrap_pointer() {
            TypeRef::Named(id) => Some(id),
            _ => None,
        }
    }

    /// Whether this is a function type (behind any pointer layers).
    pub fn is_func(&self) -> bool {
        matches!(self.unwrap_pointer(), TypeRef::Func(_))
    }
}

/// Signature of a function type. Only parameter types are kept; results are
/// irrelevant to every rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FuncSig {
    #[serde(default)]
    pub params: Vec<TypeRef>,
}

/// A named parameter with its resolved type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    /// For methods: the receiver type name.
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub params: Vec<Param>,
    /// None for declarations without a body (external functions).
    #[serde(default)]
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

impl FunctionDecl {
    /// Get the fully qualified name (receiver.name for methods).
    pub fn qualified_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{}.{}", recv, self.name),
            None => self.name.clone(),
        }
    }
}

/// A raw comment token with its source line, as split out by the front-end's
/// comment scanner. Directive recognition happens in `crate::directive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentToken {
    pub line: u32,
    pub text: String,
}

/// All facts for a single compilation unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitFacts {
    /// Source path, used in diagnostics.
    #[serde(default)]
    pub path: String,
    /// Package path of the unit, used to resolve bare callee names.
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub decls: Vec<FunctionDecl>,
    #[serde(default)]
    pub comments: Vec<CommentToken>,
}

impl UnitFacts {
    /// Find a declaration by name.
    pub fn find_decl(&self, name: &str) -> Option<&FunctionDecl> {
        self.decls.iter().find(|d| d.name == name)
    }
}
