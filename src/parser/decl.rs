//! Top-level external declarations: file-scope variables (with the
//! tentative/definition/declaration storage-class mapping) and function
//! definitions — distilled §4.5.

use super::Parser;
use crate::diagnostics::{Diagnostic, Result, SourceSpan};
use crate::ir::{BlockId, Cfg, IrOp, Var};
use crate::symbol::{Linkage, StorageClass, Symbol};
use crate::token::TokenKind;
use crate::types::TypeId;

impl Parser {
    /// `external_declaration`: one declaration-specifier run followed by
    /// either a function body (only for the first declarator, and only
    /// when its type is a function) or a comma-separated declarator list
    /// terminated by `;`.
    pub(crate) fn external_declaration(&mut self) -> Result<Option<Cfg>> {
        let mut storage_class: Option<TokenKind> = None;
        let base = self.declaration_specifiers(Some(&mut storage_class))?;

        if self.at(TokenKind::Semicolon) {
            // A bare `struct S { ... };` / `enum E { ... };` with no declarator.
            self.advance();
            return Ok(None);
        }

        let (name, ty) = self.declarator(base)?;
        let name = name.ok_or_else(|| Diagnostic::syntax(self.span(), "declarator requires a name at file scope"))?;

        if self.ctx.types.is_function(ty) && self.at(TokenKind::LBrace) {
            return self.function_definition(storage_class, name, ty).map(Some);
        }

        let mut block = self.cfg.head;
        self.declare_one(storage_class, &name, ty, &mut block)?;
        while self.at(TokenKind::Comma) {
            self.advance();
            let (name, ty) = self.declarator(base)?;
            let name = name.ok_or_else(|| Diagnostic::syntax(self.span(), "declarator requires a name at file scope"))?;
            self.declare_one(storage_class, &name, ty, &mut block)?;
        }
        self.expect(TokenKind::Semicolon)?;

        if self.cfg.block(self.cfg.head).ops.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.take_cfg()))
        }
    }

    /// Register one file-scope declarator, mapping storage class to
    /// `(StorageClass, Linkage)`: `static` is always internal linkage,
    /// `extern` is a declaration only (an initializer on it is an error),
    /// and no storage class at all defaults to external linkage, tentative
    /// until an initializer shows up (distilled §4.5, §8 edge case).
    fn declare_one(&mut self, storage_class: Option<TokenKind>, name: &str, ty: TypeId, block: &mut BlockId) -> Result<()> {
        let span = self.span();

        if storage_class == Some(TokenKind::Typedef) {
            if self.at(TokenKind::Assign) {
                return Err(Diagnostic::semantic(span, "typedef cannot have an initializer"));
            }
            let depth = self.ctx.scopes.ident.depth();
            self.ctx
                .scopes
                .ident
                .sym_add(Symbol {
                    name: name.to_string(),
                    ty,
                    storage: StorageClass::Typedef,
                    linkage: Linkage::None,
                    depth,
                    enum_value: None,
                    is_definition: true,
                })
                .map_err(|msg| Diagnostic::symbol(span, msg))?;
            return Ok(());
        }

        let has_init = self.at(TokenKind::Assign);
        if storage_class == Some(TokenKind::Extern) && has_init {
            return Err(Diagnostic::semantic(span, "extern declaration cannot have an initializer"));
        }
        if !self.ctx.types.is_complete(ty) && !(has_init && self.ctx.types.is_array(ty)) {
            return Err(Diagnostic::ty(span, format!("'{}' declared with incomplete type", name)));
        }

        let (storage, linkage) = match storage_class {
            Some(TokenKind::Static) => (if has_init { StorageClass::Definition } else { StorageClass::Tentative }, Linkage::Intern),
            Some(TokenKind::Extern) => (StorageClass::Declaration, Linkage::Extern),
            _ => (if has_init { StorageClass::Definition } else { StorageClass::Tentative }, Linkage::Extern),
        };

        let existing = self.ctx.scopes.ident.lookup_current_scope(name);
        let sym_id = match existing {
            Some(id) => {
                let prior_is_definition = self.ctx.scopes.ident.get(id).is_definition;
                if prior_is_definition && storage == StorageClass::Definition {
                    return Err(Diagnostic::symbol(span, format!("redefinition of '{}'", name)));
                }
                if storage == StorageClass::Definition || !prior_is_definition {
                    let sym = self.ctx.scopes.ident.get_mut(id);
                    sym.storage = storage;
                    sym.is_definition = storage != StorageClass::Declaration;
                }
                id
            }
            None => {
                let depth = self.ctx.scopes.ident.depth();
                self.ctx
                    .scopes
                    .ident
                    .sym_add(Symbol {
                        name: name.to_string(),
                        ty,
                        storage,
                        linkage,
                        depth,
                        enum_value: None,
                        is_definition: storage != StorageClass::Declaration,
                    })
                    .map_err(|msg| Diagnostic::symbol(span, msg))?
            }
        };

        if has_init {
            self.advance();
            let target = Var::Direct { sym: sym_id, ty, offset: 0, lvalue: true };
            let ops_before = self.cfg.block(*block).ops.len();
            *block = self.initializer(*block, target)?;
            self.check_file_scope_initializer_is_constant(*block, ops_before, span)?;
        }

        Ok(())
    }

    /// Every op an initializer appended must carry only immediate operands
    /// — the distilled "non-constant initializer at load time" edge case
    /// (distilled §4.5, §8). Gated by
    /// [`crate::config::TranslatorConfig::strict_constant_initializers`].
    fn check_file_scope_initializer_is_constant(&self, block: BlockId, ops_before: usize, span: SourceSpan) -> Result<()> {
        if !self.ctx.config.strict_constant_initializers {
            return Ok(());
        }
        for op in &self.cfg.block(block).ops[ops_before..] {
            let ok = match op {
                IrOp::Copy { src, .. } => src.is_immediate(),
                IrOp::Store { value, .. } => value.is_immediate(),
                _ => false,
            };
            if !ok {
                return Err(Diagnostic::semantic(span, "file-scope initializer is not a compile-time constant"));
            }
        }
        Ok(())
    }

    /// A function definition: registers (or completes a prior prototype
    /// into) the function symbol at file scope, then parses the body with
    /// parameters bound one scope in, `__func__` synthesized alongside
    /// them, and `current_return_ty` set so `return` can type-check
    /// (distilled §4.5).
    fn function_definition(&mut self, storage_class: Option<TokenKind>, name: String, fn_ty: TypeId) -> Result<Cfg> {
        let span = self.span();
        if storage_class == Some(TokenKind::Typedef) {
            return Err(Diagnostic::semantic(span, "a function definition cannot be typedef"));
        }
        let linkage = match storage_class {
            Some(TokenKind::Static) => Linkage::Intern,
            _ => Linkage::Extern,
        };

        let existing = self.ctx.scopes.ident.lookup_current_scope(&name);
        let sym_id = match existing {
            Some(id) => {
                if self.ctx.scopes.ident.get(id).is_definition {
                    return Err(Diagnostic::symbol(span, format!("redefinition of function '{}'", name)));
                }
                let sym = self.ctx.scopes.ident.get_mut(id);
                sym.storage = StorageClass::Definition;
                sym.is_definition = true;
                sym.linkage = linkage;
                id
            }
            None => {
                let depth = self.ctx.scopes.ident.depth();
                self.ctx
                    .scopes
                    .ident
                    .sym_add(Symbol {
                        name: name.clone(),
                        ty: fn_ty,
                        storage: StorageClass::Definition,
                        linkage,
                        depth,
                        enum_value: None,
                        is_definition: true,
                    })
                    .map_err(|msg| Diagnostic::symbol(span, msg))?
            }
        };

        self.start_cfg(Some(sym_id));
        let ret_ty = self.ctx.types.deref_of(fn_ty).expect("function type always has a return type");
        let prev_ret = self.set_current_return_ty(Some(ret_ty));

        let body_result = self.with_scope(|this| {
            let nparams = this.ctx.types.nmembers(fn_ty);
            for i in 0..nparams {
                let member = this.ctx.types.get_member(fn_ty, i).expect("index within nmembers").clone();
                if member.name.is_empty() {
                    continue;
                }
                let param_ty = member.ty.expect("named parameter always carries a type");
                let depth = this.ctx.scopes.ident.depth();
                let param_sym = this
                    .ctx
                    .scopes
                    .ident
                    .sym_add(Symbol {
                        name: member.name.clone(),
                        ty: param_ty,
                        storage: StorageClass::Definition,
                        linkage: Linkage::None,
                        depth,
                        enum_value: None,
                        is_definition: true,
                    })
                    .map_err(|msg| Diagnostic::symbol(span, msg))?;
                this.cfg.cfg_register_param(param_sym);
            }
            this.register_func_name(&name)?;
            let body_entry = this.cfg.body;
            this.compound_statement(body_entry)
        });

        self.set_current_return_ty(prev_ret);
        let body_end = body_result?;

        if self.cfg.block(body_end).is_terminal() {
            if self.ctx.types.is_void(ret_ty) {
                self.ctx.ir.eval_return(span, &self.ctx.types, &mut self.cfg, body_end, None, ret_ty)?;
            } else {
                return Err(Diagnostic::semantic(span, "non-void function may fall off the end without returning a value"));
            }
        }

        Ok(self.take_cfg())
    }

    /// `__func__`: a synthesized `const char[]` naming the enclosing
    /// function, visible by name but not tracked as a CFG local (its value
    /// is a compile-time constant the evaluator materializes directly,
    /// not something that occupies a stack slot).
    fn register_func_name(&mut self, name: &str) -> Result<()> {
        let char_ty = self.ctx.types.char_ty();
        let len = name.len() as u32 + 1;
        let arr_ty = self.ctx.types.array_of(char_ty, Some(len));
        let depth = self.ctx.scopes.ident.depth();
        self.ctx
            .scopes
            .ident
            .sym_add(Symbol {
                name: "__func__".to_string(),
                ty: arr_ty,
                storage: StorageClass::Definition,
                linkage: Linkage::None,
                depth,
                enum_value: None,
                is_definition: true,
            })
            .map_err(|msg| Diagnostic::symbol(self.span(), msg))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TranslatorConfig;
    use crate::parser::Parser;

    #[test]
    fn tentative_definition_then_real_definition_merge() {
        let mut parser = Parser::new("int x; int x = 5;", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn extern_with_initializer_is_rejected() {
        let mut parser = Parser::new("extern int x = 5;", TranslatorConfig::default()).unwrap();
        assert!(parser.parse_translation_unit().is_err());
    }

    #[test]
    fn non_constant_file_scope_initializer_is_rejected() {
        let mut parser = Parser::new("int f(void); int x = f();", TranslatorConfig::default()).unwrap();
        assert!(parser.parse_translation_unit().is_err());
    }

    #[test]
    fn file_scope_incomplete_array_without_initializer_is_rejected() {
        let mut parser = Parser::new("int a[];", TranslatorConfig::default()).unwrap();
        assert!(parser.parse_translation_unit().is_err());
    }

    #[test]
    fn file_scope_incomplete_array_with_initializer_is_accepted() {
        let mut parser = Parser::new("int a[] = {1, 2, 3};", TranslatorConfig::default()).unwrap();
        assert!(parser.parse_translation_unit().is_ok());
    }

    #[test]
    fn function_definition_registers_params_and_return_type() {
        let mut parser = Parser::new("int add(int a, int b) { return a + b; }", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].locals.len(), 2);
    }

    #[test]
    fn void_function_falling_off_the_end_gets_implicit_return() {
        let mut parser = Parser::new("void f(void) { int x; }", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn non_void_function_falling_off_the_end_is_rejected() {
        let mut parser = Parser::new("int f(void) { }", TranslatorConfig::default()).unwrap();
        assert!(parser.parse_translation_unit().is_err());
    }
}
