//! Late binding of the test plan id against the build context.
//!
//! A configured id may be a literal (`"2190"`) or refer to values only known
//! once the build runs (`"${UPSTREAM_PLAN_ID}"`, `"$PLAN"`). References are
//! substituted from [`BuildContext`]; everything else passes through.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::context::BuildContext;
use crate::error::ResolutionError;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("placeholder pattern is valid")
    })
}

/// Resolve `raw` into a concrete, trimmed test plan id.
pub fn resolve(raw: &str, ctx: &BuildContext) -> Result<String, ResolutionError> {
    let mut unbound = None;
    let substituted = placeholder().replace_all(raw, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match ctx.lookup(name) {
            Some(value) => value,
            None => {
                unbound.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = unbound {
        return Err(ResolutionError::Unbound { name });
    }

    let resolved = substituted.trim();
    if resolved.is_empty() {
        return Err(ResolutionError::Empty);
    }
    Ok(resolved.to_string())
}
