//! Passes, per-node stages and pass outcomes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quill_common::Diagnostic;

/// The four global passes, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    #[serde(alias = "register")]
    RegisterStructures,
    #[serde(alias = "resolve")]
    ResolveNames,
    #[serde(alias = "validate")]
    ValidateContent,
    #[serde(alias = "emit")]
    GenerateCode,
}

impl Pass {
    pub const ALL: [Self; 4] = [
        Self::RegisterStructures,
        Self::ResolveNames,
        Self::ValidateContent,
        Self::GenerateCode,
    ];

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RegisterStructures => "register-structures",
            Self::ResolveNames => "resolve-names",
            Self::ValidateContent => "validate-content",
            Self::GenerateCode => "generate-code",
        }
    }

    /// The stage a node is in while this pass is working on it.
    #[must_use]
    pub const fn transitional(self) -> Stage {
        match self {
            Self::RegisterStructures => Stage::Registering,
            Self::ResolveNames => Stage::Resolving,
            Self::ValidateContent => Stage::Validating,
            Self::GenerateCode => Stage::Emitting,
        }
    }

    /// The stage a node reaches when this pass is done with it.
    #[must_use]
    pub const fn target(self) -> Stage {
        match self {
            Self::RegisterStructures => Stage::Registered,
            Self::ResolveNames => Stage::Resolved,
            Self::ValidateContent => Stage::Validated,
            Self::GenerateCode => Stage::Emitted,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown pass \"{0}\" (expected register, resolve, validate or emit)")]
pub struct UnknownPass(pub String);

impl FromStr for Pass {
    type Err = UnknownPass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register" | "register-structures" => Ok(Self::RegisterStructures),
            "resolve" | "resolve-names" => Ok(Self::ResolveNames),
            "validate" | "validate-content" => Ok(Self::ValidateContent),
            "emit" | "generate-code" => Ok(Self::GenerateCode),
            _ => Err(UnknownPass(s.to_string())),
        }
    }
}

/// How far a node has come. Stages only move forward.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Stage {
    #[default]
    Initial,
    Registering,
    Registered,
    Resolving,
    Resolved,
    Validating,
    Validated,
    Emitting,
    Emitted,
}

impl Stage {
    /// The stage a node must have reached before `pass` may start on it.
    #[must_use]
    pub const fn required(pass: Pass) -> Self {
        match pass {
            Pass::RegisterStructures => Self::Initial,
            Pass::ResolveNames => Self::Registered,
            Pass::ValidateContent => Self::Resolved,
            Pass::GenerateCode => Self::Validated,
        }
    }
}

/// What a pass hook reports for one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The node finished this pass.
    Done,
    /// The node needs another attempt; its children may proceed.
    DeferredSelf,
    /// The node needs another attempt and its children must wait for it.
    DeferredChildren,
    /// The node cannot finish this pass; the diagnostics explain why.
    Failed(Vec<Diagnostic>),
}

impl PassOutcome {
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::DeferredSelf | Self::DeferredChildren)
    }

    pub(crate) const fn kind(&self) -> u8 {
        match self {
            Self::Done => 0,
            Self::DeferredSelf => 1,
            Self::DeferredChildren => 2,
            Self::Failed(_) => 3,
        }
    }
}
