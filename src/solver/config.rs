//! Cache behavior toggles.
//!
//! Library defaults match the production configuration; every toggle can be
//! overridden through a `CEX_*` environment variable for experiments
//! without a rebuild.

/// Parse the usual truthy/falsy spellings; `None` for anything else.
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|raw| parse_bool_flag(&raw))
        .unwrap_or(default)
}

/// Default for range narrowing in the constraint simplifier
/// (`CEX_SIMPLIFY_INEQUALITIES`, default on).
pub fn simplify_inequalities_default() -> bool {
    env_flag("CEX_SIMPLIFY_INEQUALITIES", true)
}

#[derive(Debug, Clone, Copy)]
pub struct CexCacheConfig {
    /// Tier-1 exact hash cache.
    pub quick_cache: bool,
    /// Tier-2 reuse of the previous query's answer.
    pub prev_solution: bool,
    /// When set, the tier-3 superset probe is skipped.
    pub disable_super_set: bool,
    /// On miss, additionally scan every interned assignment.
    pub try_all: bool,
    /// Speculative negated-query probe in `compute_truth`.
    pub experimental: bool,
    /// Optimistic split-and-graft path for one-constraint extensions.
    pub guess_split: bool,
    /// Assert that every fresh binding satisfies its key.
    pub debug_check_binding: bool,
}

impl Default for CexCacheConfig {
    fn default() -> Self {
        CexCacheConfig {
            quick_cache: true,
            prev_solution: true,
            disable_super_set: true,
            try_all: false,
            experimental: false,
            guess_split: false,
            debug_check_binding: false,
        }
    }
}

impl CexCacheConfig {
    /// Defaults with `CEX_*` environment overrides applied.
    pub fn from_env() -> Self {
        let d = Self::default();
        CexCacheConfig {
            quick_cache: env_flag("CEX_QUICK_CACHE", d.quick_cache),
            prev_solution: env_flag("CEX_PREV_SOLUTION", d.prev_solution),
            disable_super_set: env_flag("CEX_DISABLE_SUPER_SET", d.disable_super_set),
            try_all: env_flag("CEX_CACHE_TRY_ALL", d.try_all),
            experimental: env_flag("CEX_CACHE_EXP", d.experimental),
            guess_split: env_flag("CEX_CACHE_GUESS_SPLIT", d.guess_split),
            debug_check_binding: env_flag("CEX_DEBUG_CHECK_BINDING", d.debug_check_binding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_flag_spellings() {
        assert_eq!(parse_bool_flag("on"), Some(true));
        assert_eq!(parse_bool_flag(" TRUE "), Some(true));
        assert_eq!(parse_bool_flag("0"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }

    #[test]
    fn defaults_match_production_configuration() {
        let c = CexCacheConfig::default();
        assert!(c.quick_cache);
        assert!(c.prev_solution);
        assert!(c.disable_super_set);
        assert!(!c.try_all);
        assert!(!c.experimental);
        assert!(!c.guess_split);
        assert!(!c.debug_check_binding);
    }
}
