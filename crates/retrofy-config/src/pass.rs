use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A rewriter, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    /// `list[int]` to `typing.List[int]`
    BuiltinGenerics,
    /// `:=` to plain assignments.
    Walrus,
    /// `type X = ...` statements.
    TypeAlias,
    /// `__match_args__` for dataclasses.
    Dataclass,
    /// Version-guarded `typing_extensions` fallbacks.
    TypingExtensions,
    /// A version-guarded `typing.final` with an identity fallback.
    Final,
    /// `match` statements.
    Match,
    /// `A | B` annotations to `typing.Union[A, B]`
    Union,
}

impl Pass {
    /// Every pass, in pipeline order.
    pub const ALL: [Pass; 8] = [
        Pass::BuiltinGenerics,
        Pass::Walrus,
        Pass::TypeAlias,
        Pass::Dataclass,
        Pass::TypingExtensions,
        Pass::Final,
        Pass::Match,
        Pass::Union,
    ];

    /// The passes that run when none are configured.
    ///
    /// [Pass::Final] is left out, `typing-extensions` covers `final` already.
    pub fn defaults() -> Vec<Pass> {
        Self::ALL
            .into_iter()
            .filter(|pass| *pass != Pass::Final)
            .collect()
    }

    /// The name used in config files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::BuiltinGenerics => "builtin-generics",
            Self::Walrus => "walrus",
            Self::TypeAlias => "type-alias",
            Self::Dataclass => "dataclass",
            Self::TypingExtensions => "typing-extensions",
            Self::Final => "final",
            Self::Match => "match",
            Self::Union => "union",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|pass| pass.name() == s)
            .ok_or_else(|| {
                let names = Self::ALL.map(Pass::name).join(", ");
                format!("unknown pass {s:?}, expected one of: {names}")
            })
    }
}
