//! Declarators: `* qual*` prefixes, identifiers, nested parenthesized
//! declarators, and the `[expr]`/`(params)` postfix chain — distilled
//! §4.1.

use super::Parser;
use crate::diagnostics::{Diagnostic, Result};
use crate::token::TokenKind;
use crate::types::{Qualifiers, TypeId};

enum Postfix {
    Array(Option<u32>),
    Function(Vec<(String, TypeId)>, bool),
}

impl Parser {
    /// `declarator`: pointer prefix then a direct declarator.
    pub fn declarator(&mut self, base: TypeId) -> Result<(Option<String>, TypeId)> {
        let base = self.pointer(base)?;
        self.direct_declarator(base)
    }

    /// `pointer`: zero or more `*`, each optionally followed by
    /// `const`/`volatile` qualifying the pointer itself (not the pointee).
    pub fn pointer(&mut self, mut base: TypeId) -> Result<TypeId> {
        while self.at(TokenKind::Star) {
            self.advance();
            let ptr = self.ctx.types.pointer_to(base);
            let mut qualifiers = Qualifiers::empty();
            while self.peek().kind.is_type_qualifier_keyword() {
                let tok = self.advance();
                qualifiers |= if tok.kind == TokenKind::Const { Qualifiers::CONST } else { Qualifiers::VOLATILE };
            }
            self.ctx.types.get_mut(ptr).qualifiers = qualifiers;
            base = ptr;
        }
        Ok(base)
    }

    /// `direct_declarator`: an identifier, a parenthesized inner declarator,
    /// or (in a type-name context) nothing, followed by the postfix chain.
    /// A nested inner declarator's tail is threaded onto this level's result
    /// by patching a placeholder `TypeId` in place, so `void (*f)(int)`
    /// parses as pointer-to-function-returning-void rather than
    /// function-returning-pointer (distilled §4.1).
    pub fn direct_declarator(&mut self, base: TypeId) -> Result<(Option<String>, TypeId)> {
        if self.at(TokenKind::Identifier) {
            let name = self.advance().lexeme;
            let ty = self.declarator_postfix(base)?;
            Ok((Some(name), ty))
        } else if self.at(TokenKind::LParen) {
            self.advance();
            let placeholder = self.ctx.types.void();
            let (name, inner_ty) = self.declarator(placeholder)?;
            self.expect(TokenKind::RParen)?;
            let outer_ty = self.declarator_postfix(base)?;
            let outer_node = self.ctx.types.get(outer_ty).clone();
            *self.ctx.types.get_mut(placeholder) = outer_node;
            Ok((name, inner_ty))
        } else {
            let ty = self.declarator_postfix(base)?;
            Ok((None, ty))
        }
    }

    /// The left-associative `[expr]`/`(params)` postfix chain. Dimensions
    /// are collected in declaration order, then applied to `base`
    /// innermost-first so the leftmost bracket becomes the outermost
    /// dimension (`a[3][4]` is 3 arrays of 4 ints, not the reverse).
    fn declarator_postfix(&mut self, base: TypeId) -> Result<TypeId> {
        let mut postfixes = Vec::new();
        let mut idx = 0usize;
        loop {
            if self.at(TokenKind::LBracket) {
                let span = self.span();
                self.advance();
                let count = if self.at(TokenKind::RBracket) {
                    None
                } else {
                    let n = self.constant_expression()?;
                    if n <= 0 {
                        return Err(Diagnostic::ty(span, "array dimension must be a positive integer"));
                    }
                    Some(n as u32)
                };
                self.expect(TokenKind::RBracket)?;
                if count.is_none() && idx != 0 {
                    return Err(Diagnostic::ty(span, "array size required except in the outermost dimension"));
                }
                postfixes.push(Postfix::Array(count));
            } else if self.at(TokenKind::LParen) {
                self.advance();
                let (params, vararg) = self.parameter_type_list()?;
                self.expect(TokenKind::RParen)?;
                postfixes.push(Postfix::Function(params, vararg));
            } else {
                break;
            }
            idx += 1;
        }

        let mut ty = base;
        for postfix in postfixes.into_iter().rev() {
            ty = match postfix {
                Postfix::Array(count) => self.ctx.types.array_of(ty, count),
                Postfix::Function(params, vararg) => self.ctx.types.function(ty, params, vararg),
            };
        }
        Ok(ty)
    }

    /// `void` alone means "no parameters"; a trailing `...` after at least
    /// one parameter marks vararg; a trailing comma before `)` is an error.
    pub fn parameter_type_list(&mut self) -> Result<(Vec<(String, TypeId)>, bool)> {
        let mut params = Vec::new();
        if self.at(TokenKind::Void) && self.peekn(1).kind == TokenKind::RParen {
            self.advance();
            return Ok((params, false));
        }
        if self.at(TokenKind::RParen) {
            return Ok((params, false));
        }
        let mut vararg = false;
        loop {
            if self.at(TokenKind::Dots) {
                self.advance();
                vararg = true;
                break;
            }
            let base = self.declaration_specifiers(None)?;
            let (name, ty) = self.declarator(base)?;
            params.push((name.unwrap_or_default(), ty));
            if self.at(TokenKind::Comma) {
                self.advance();
                if self.at(TokenKind::RParen) {
                    return Err(Diagnostic::syntax(self.span(), "trailing comma in parameter list"));
                }
                continue;
            }
            break;
        }
        Ok((params, vararg))
    }

    /// `type-name`: a specifier-qualifier-list plus an (often abstract)
    /// declarator, used by casts and `sizeof`.
    pub fn type_name(&mut self) -> Result<TypeId> {
        let base = self.declaration_specifiers(None)?;
        let base = self.pointer(base)?;
        let (_, ty) = self.direct_declarator(base)?;
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;

    #[test]
    fn parses_pointer_to_int() {
        let mut parser = Parser::new("*x", TranslatorConfig::default()).unwrap();
        let int_ty = parser.ctx.types.int();
        let (name, ty) = parser.declarator(int_ty).unwrap();
        assert_eq!(name.as_deref(), Some("x"));
        assert!(parser.ctx.types.is_pointer(ty));
    }

    #[test]
    fn array_of_array_nests_outermost_first() {
        let mut parser = Parser::new("a[3][4]", TranslatorConfig::default()).unwrap();
        let int_ty = parser.ctx.types.int();
        let (_, ty) = parser.declarator(int_ty).unwrap();
        assert!(parser.ctx.types.is_array(ty));
        assert_eq!(parser.ctx.types.size_of(ty), 3 * 4 * 4);
    }

    #[test]
    fn pointer_to_function_returning_void() {
        let mut parser = Parser::new("(*f)(int)", TranslatorConfig::default()).unwrap();
        let void_ty = parser.ctx.types.void();
        let (name, ty) = parser.declarator(void_ty).unwrap();
        assert_eq!(name.as_deref(), Some("f"));
        assert!(parser.ctx.types.is_pointer(ty));
        let pointee = parser.ctx.types.deref_of(ty).unwrap();
        assert!(parser.ctx.types.is_function(pointee));
    }
}
