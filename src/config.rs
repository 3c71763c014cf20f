//! Translator configuration. Grounded on the teacher's builder-style
//! `CompilerConfig`: a plain data struct with sensible `Default`s, built up
//! with `with_*` setters rather than a constructor taking every field.

/// Which C dialect to accept. Only affects which diagnostics are emitted
/// for features the other dialect would reject; the parser otherwise
/// treats both the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    C89,
    #[default]
    C99,
}

/// Translator-wide knobs. One instance is threaded through a single
/// translation unit's parse.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub dialect: Dialect,
    /// Reject non-constant initializers at file scope instead of silently
    /// accepting them (both dialects require this; kept as a knob so a
    /// caller embedding the translator in a more permissive host can relax it).
    pub strict_constant_initializers: bool,
    /// Maximum nested scope depth before giving up with an `Internal`
    /// diagnostic rather than overflowing the host stack on pathological input.
    pub max_scope_depth: u32,
}

impl TranslatorConfig {
    pub fn new(dialect: Dialect) -> Self {
        TranslatorConfig {
            dialect,
            strict_constant_initializers: true,
            max_scope_depth: 256,
        }
    }

    pub fn with_strict_constant_initializers(mut self, strict: bool) -> Self {
        self.strict_constant_initializers = strict;
        self
    }

    pub fn with_max_scope_depth(mut self, depth: u32) -> Self {
        self.max_scope_depth = depth;
        self
    }

    pub fn is_c99(&self) -> bool {
        self.dialect == Dialect::C99
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig::new(Dialect::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dialect_is_c99() {
        let cfg = TranslatorConfig::default();
        assert!(cfg.is_c99());
    }

    #[test]
    fn builder_setters_chain() {
        let cfg = TranslatorConfig::new(Dialect::C89)
            .with_strict_constant_initializers(false)
            .with_max_scope_depth(16);
        assert_eq!(cfg.dialect, Dialect::C89);
        assert!(!cfg.strict_constant_initializers);
        assert_eq!(cfg.max_scope_depth, 16);
    }
}
