//! The parser core: specifier/declarator parsing, expressions, statements,
//! initializers, and the top-level driver, split one module per grammar
//! layer — the same shape as the teacher's own `codegen/` split into
//! `control_flow.rs`/`statements.rs`/`words.rs`.
//!
//! `ParseContext` folds the distilled spec's global mutable cursors
//! (`current_cfg`, both namespaces, break/continue/switch targets) into one
//! struct threaded explicitly through `&mut self` (spec.md §9 REDESIGN
//! FLAGS item 3), rather than left as process-wide statics.

pub mod decl;
pub mod declarator;
pub mod expr;
pub mod init;
pub mod specifiers;
pub mod stmt;

pub use specifiers::BasicType;

use crate::config::TranslatorConfig;
use crate::diagnostics::{Diagnostic, Result, SourceSpan};
use crate::ir::{BlockId, Cfg, IrBuilder, SwitchContext};
use crate::lexer::Lexer;
use crate::symbol::{Scopes, StorageClass, SymbolId};
use crate::token::{Token, TokenKind};
use crate::types::TypeArena;
use crate::types::TypeId;

/// Type arena, both namespaces, and the IR evaluator — the translation
/// unit's non-lexical state, owned for the lifetime of one `Parser`.
pub struct ParseContext {
    pub types: TypeArena,
    pub scopes: Scopes,
    pub ir: IrBuilder,
    pub config: TranslatorConfig,
}

impl ParseContext {
    pub fn new(config: TranslatorConfig) -> Self {
        ParseContext {
            types: TypeArena::new(),
            scopes: Scopes::new(),
            ir: IrBuilder::new(),
            config,
        }
    }
}

/// Recursive-descent driver over one translation unit. `cfg` and the
/// break/continue/switch cursors are what the distilled spec calls
/// `current_cfg` and the loop-target ambient state; here they are ordinary
/// fields, reset per external declaration by [`Parser::start_cfg`] and
/// saved/restored by local bindings around nested loops/switches rather
/// than through a macro.
pub struct Parser {
    lexer: Lexer,
    pub ctx: ParseContext,
    cfg: Cfg,
    break_target: Option<BlockId>,
    continue_target: Option<BlockId>,
    current_return_ty: Option<TypeId>,
    switch_stack: Vec<SwitchContext>,
}

impl Parser {
    pub fn new(source: &str, config: TranslatorConfig) -> Result<Self> {
        let lexer = Lexer::new(source)?;
        Ok(Parser {
            lexer,
            ctx: ParseContext::new(config),
            cfg: Cfg::new(None),
            break_target: None,
            continue_target: None,
            current_return_ty: None,
            switch_stack: Vec::new(),
        })
    }

    // ----- token helpers -----

    pub(crate) fn peek(&self) -> &Token {
        self.lexer.peek()
    }

    pub(crate) fn peekn(&self, k: usize) -> &Token {
        self.lexer.peekn(k)
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.lexer.next()
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        self.lexer.consume(kind)
    }

    pub(crate) fn span(&self) -> SourceSpan {
        self.peek().span
    }

    /// Push a scope on both namespaces, run `f`, pop on every exit path —
    /// including an error returned through `?` inside `f` — without the
    /// borrow conflict a live `ScopeGuard` would create against the further
    /// `&mut self` calls `f` needs to make (declarator/statement parsing).
    /// This is the practical rendition of spec.md §5's "every push_scope is
    /// paired with a pop_scope on every exit path".
    pub(crate) fn with_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.ctx.scopes.push_scope_raw();
        let result = f(self);
        self.ctx.scopes.pop_scope_raw();
        result
    }

    /// Reinitialize `current_cfg` for a fresh external declaration.
    pub(crate) fn start_cfg(&mut self, fun: Option<SymbolId>) -> BlockId {
        self.cfg = Cfg::new(fun);
        self.cfg.head
    }

    pub(crate) fn take_cfg(&mut self) -> Cfg {
        std::mem::replace(&mut self.cfg, Cfg::new(None))
    }

    pub(crate) fn cfg_mut(&mut self) -> &mut Cfg {
        &mut self.cfg
    }

    pub(crate) fn cfg_ref(&self) -> &Cfg {
        &self.cfg
    }

    pub(crate) fn break_target(&self) -> Option<BlockId> {
        self.break_target
    }

    pub(crate) fn continue_target(&self) -> Option<BlockId> {
        self.continue_target
    }

    pub(crate) fn set_loop_targets(&mut self, brk: Option<BlockId>, cont: Option<BlockId>) -> (Option<BlockId>, Option<BlockId>) {
        let prev = (self.break_target, self.continue_target);
        self.break_target = brk;
        self.continue_target = cont;
        prev
    }

    pub(crate) fn restore_loop_targets(&mut self, prev: (Option<BlockId>, Option<BlockId>)) {
        self.break_target = prev.0;
        self.continue_target = prev.1;
    }

    pub(crate) fn push_switch(&mut self, ctx: SwitchContext) {
        self.switch_stack.push(ctx);
    }

    pub(crate) fn pop_switch(&mut self) -> SwitchContext {
        self.switch_stack.pop().expect("pop_switch called with no pushed switch")
    }

    pub(crate) fn current_switch_mut(&mut self) -> Option<&mut SwitchContext> {
        self.switch_stack.last_mut()
    }

    pub(crate) fn current_return_ty(&self) -> Option<TypeId> {
        self.current_return_ty
    }

    pub(crate) fn set_current_return_ty(&mut self, ty: Option<TypeId>) -> Option<TypeId> {
        std::mem::replace(&mut self.current_return_ty, ty)
    }

    /// `is_type_specifier_start`-adjacent: true if `name` currently resolves
    /// to a typedef, used both by the declaration-specifier loop and by the
    /// cast-vs-parenthesized-expression lookahead in the expression parser.
    pub(crate) fn is_typedef_name(&self, name: &str) -> bool {
        self.ctx
            .scopes
            .ident
            .sym_lookup(name)
            .map(|id| self.ctx.scopes.ident.get(id).storage == StorageClass::Typedef)
            .unwrap_or(false)
    }

    /// Entry point: drives the token stream until EOF, emitting one `Cfg`
    /// per external declaration that produced a function body or a
    /// non-empty load-time initializer block (distilled §4.5 `parse()`).
    pub fn parse_translation_unit(&mut self) -> Result<Vec<Cfg>> {
        let mut units = Vec::new();
        while !self.lexer.at_eof() {
            self.start_cfg(None);
            if let Some(cfg) = self.external_declaration()? {
                units.push(cfg);
            }
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;

    #[test]
    fn parses_simple_file_scope_definition() {
        let mut parser = Parser::new("int x = 3;", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        assert!(!units[0].block(units[0].head).ops.is_empty());
    }

    #[test]
    fn parses_function_definition() {
        let mut parser = Parser::new("int f(int x) { return x; }", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].fun.is_some());
    }
}
