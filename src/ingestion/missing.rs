//! Missing-value indicator lookup.

use std::collections::BTreeSet;

use crate::types::MvScope;

/// Suffix naming a column that carries indicator codes for the column named by the prefix.
pub const MV_INDICATOR_SUFFIX: &str = "_MVIndicator";

/// Source of valid missing-value indicator tokens, possibly varying by scope.
pub trait MissingValueIndicators: Send + Sync {
    /// Every token valid in `scope`.
    fn indicator_tokens(&self, scope: Option<&MvScope>) -> Vec<String>;

    /// Whether `token` is a valid indicator in `scope`. Comparison is exact.
    fn is_valid_indicator(&self, token: &str, scope: Option<&MvScope>) -> bool {
        self.indicator_tokens(scope).iter().any(|t| t == token)
    }
}

/// A fixed indicator set that ignores scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIndicators {
    tokens: BTreeSet<String>,
}

impl StaticIndicators {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// `Q` (quality-control excluded) and `N` (not entered).
    pub fn standard() -> Self {
        Self::new(["Q", "N"])
    }

    /// No indicators; every token is treated as data.
    pub fn none() -> Self {
        Self::default()
    }
}

impl MissingValueIndicators for StaticIndicators {
    fn indicator_tokens(&self, _scope: Option<&MvScope>) -> Vec<String> {
        self.tokens.iter().cloned().collect()
    }

    fn is_valid_indicator(&self, token: &str, _scope: Option<&MvScope>) -> bool {
        self.tokens.contains(token)
    }
}

/// If `name` is an indicator column name, return the data column name it refers to.
pub(crate) fn indicator_base(name: &str) -> Option<&str> {
    let cut = name.len().checked_sub(MV_INDICATOR_SUFFIX.len())?;
    if cut == 0 || !name.is_char_boundary(cut) {
        return None;
    }
    let (base, suffix) = name.split_at(cut);
    suffix.eq_ignore_ascii_case(MV_INDICATOR_SUFFIX).then_some(base)
}
