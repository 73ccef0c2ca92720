// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared worker parameter schemas
//!
//! Workers are registered with an explicit signature instead of runtime
//! introspection: an ordered list of parameters, each with a kind (the five
//! classic buckets) and a value source. `From`/`System` descriptors live in
//! the source of the parameter they inject into.

use crate::error::AutomaError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The five parameter buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParamKind {
    /// Whether arguments can bind to this parameter by position.
    pub fn is_positional(self) -> bool {
        matches!(self, Self::PositionalOnly | Self::PositionalOrKeyword)
    }

    /// Whether arguments can bind to this parameter by name.
    pub fn is_keyword(self) -> bool {
        matches!(self, Self::PositionalOrKeyword | Self::KeywordOnly)
    }
}

/// Target of a `System(..)` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemTag {
    /// The automa the worker runs in.
    Automa,
    /// A sub-automa registered under the given worker key.
    SubAutoma(String),
    /// The current invocation's runtime context.
    RuntimeContext,
}

impl SystemTag {
    /// Parse the string form used at registration sites: `"automa"`,
    /// `"automa:<key>"` or `"runtime_context"`.
    pub fn parse(tag: &str) -> Result<Self, AutomaError> {
        if tag == "automa" {
            return Ok(Self::Automa);
        }
        if let Some(key) = tag.strip_prefix("automa:") {
            return Ok(Self::SubAutoma(key.to_string()));
        }
        if tag == "runtime_context" {
            return Ok(Self::RuntimeContext);
        }
        Err(AutomaError::Declaration(format!(
            "system tag '{tag}' is not supported; supported tags: \
             'runtime_context' (per-worker persistence context), \
             'automa:<worker_key>' (a sub-automa of the current automa), \
             'automa' (the current automa)"
        )))
    }
}

impl std::fmt::Display for SystemTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automa => write!(f, "automa"),
            Self::SubAutoma(key) => write!(f, "automa:{key}"),
            Self::RuntimeContext => write!(f, "runtime_context"),
        }
    }
}

/// Where a parameter's value comes from when the call site leaves it unbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamSource {
    /// No default; leaving it unbound is a mapping error.
    Required,
    /// A plain default value.
    Default(Value),
    /// Inject the output buffer of another worker, with an optional
    /// fallback when that worker is gone.
    FromWorker { key: String, default: Option<Value> },
    /// Inject a system resource.
    System(SystemTag),
}

impl ParamSource {
    /// Whether the arg-binding engine resolves this parameter itself.
    pub fn is_injected(&self) -> bool {
        matches!(self, Self::FromWorker { .. } | Self::System(_))
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub source: ParamSource,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            kind,
            source,
        }
    }
}

/// The ordered parameter schema of a worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pass-through schema of a nested automa: accepts any positional
    /// and keyword arguments and forwards them to the sub-run.
    pub fn pass_through() -> Self {
        Self::new().var_positional("args").var_keyword("kwargs")
    }

    /// Add a parameter with explicit kind and source.
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind, source: ParamSource) -> Self {
        self.params.push(Param::new(name, kind, source));
        self
    }

    /// A required positional-or-keyword parameter.
    pub fn required(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::PositionalOrKeyword, ParamSource::Required)
    }

    /// A positional-or-keyword parameter with a plain default.
    pub fn optional(self, name: impl Into<String>, default: Value) -> Self {
        self.param(
            name,
            ParamKind::PositionalOrKeyword,
            ParamSource::Default(default),
        )
    }

    /// A required positional-only parameter.
    pub fn positional_only(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::PositionalOnly, ParamSource::Required)
    }

    /// A parameter injected from another worker's output buffer.
    pub fn from_worker(self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.param(
            name,
            ParamKind::PositionalOrKeyword,
            ParamSource::FromWorker {
                key: key.into(),
                default: None,
            },
        )
    }

    /// Like [`Signature::from_worker`] with a fallback for a missing source.
    pub fn from_worker_or(
        self,
        name: impl Into<String>,
        key: impl Into<String>,
        default: Value,
    ) -> Self {
        self.param(
            name,
            ParamKind::PositionalOrKeyword,
            ParamSource::FromWorker {
                key: key.into(),
                default: Some(default),
            },
        )
    }

    /// A parameter injected from a system resource.
    pub fn system(self, name: impl Into<String>, tag: SystemTag) -> Self {
        self.param(name, ParamKind::PositionalOrKeyword, ParamSource::System(tag))
    }

    /// A required keyword-only parameter.
    pub fn keyword_only(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::KeywordOnly, ParamSource::Required)
    }

    /// The catch-all positional parameter (`*args`).
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::VarPositional, ParamSource::Required)
    }

    /// The catch-all keyword parameter (`**kwargs`).
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::VarKeyword, ParamSource::Required)
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Named parameters fillable by position, in declaration order.
    pub fn positional_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.kind.is_positional())
    }

    /// Named parameters fillable by keyword.
    pub fn keyword_params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.kind.is_keyword())
    }

    pub fn var_positional_param(&self) -> Option<&Param> {
        self.params
            .iter()
            .find(|p| p.kind == ParamKind::VarPositional)
    }

    pub fn var_keyword_param(&self) -> Option<&Param> {
        self.params.iter().find(|p| p.kind == ParamKind::VarKeyword)
    }

    /// Whether the schema is a pure catch-all (no named parameters).
    pub fn is_pass_through(&self) -> bool {
        !self.params.is_empty()
            && self
                .params
                .iter()
                .all(|p| matches!(p.kind, ParamKind::VarPositional | ParamKind::VarKeyword))
    }

    /// Check schema well-formedness: unique names, at most one catch-all of
    /// each kind, and bucket ordering (positional before var-positional
    /// before keyword-only before var-keyword).
    pub fn validate(&self) -> Result<(), AutomaError> {
        let mut seen: Vec<&str> = Vec::new();
        for param in &self.params {
            if seen.contains(&param.name.as_str()) {
                return Err(AutomaError::Declaration(format!(
                    "duplicate parameter name '{}' in signature",
                    param.name
                )));
            }
            seen.push(param.name.as_str());
        }

        let rank = |kind: ParamKind| match kind {
            ParamKind::PositionalOnly => 0,
            ParamKind::PositionalOrKeyword => 1,
            ParamKind::VarPositional => 2,
            ParamKind::KeywordOnly => 3,
            ParamKind::VarKeyword => 4,
        };
        let mut last = 0;
        for param in &self.params {
            let r = rank(param.kind);
            if r < last {
                return Err(AutomaError::Declaration(format!(
                    "parameter '{}' is out of order in signature",
                    param.name
                )));
            }
            last = r;
        }

        for kind in [ParamKind::VarPositional, ParamKind::VarKeyword] {
            if self.params.iter().filter(|p| p.kind == kind).count() > 1 {
                return Err(AutomaError::Declaration(format!(
                    "signature declares more than one {kind:?} parameter"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
