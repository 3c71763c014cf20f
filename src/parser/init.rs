//! Initializers: brace-enclosed aggregate/array initializers with
//! trailing zero-fill, and the string-literal-into-char-array special
//! case — distilled §4.4.

use super::Parser;
use crate::diagnostics::{Diagnostic, Result, SourceSpan};
use crate::ir::{BlockId, Immediate, Var};
use crate::token::TokenKind;
use crate::types::{TypeId, TypeKind};

impl Parser {
    /// `initializer`: either a brace-enclosed aggregate initializer, a
    /// string literal assigned straight to a char array, or a plain
    /// `assignment_expression` assigned into `target`.
    pub fn initializer(&mut self, block: BlockId, target: Var) -> Result<BlockId> {
        if self.at(TokenKind::LBrace) {
            self.object_initializer(block, target)
        } else if self.at(TokenKind::StringConstant) && self.ctx.types.is_array(target.ty()) {
            self.string_initializer(block, target)
        } else {
            let span = self.span();
            let (block, value) = self.assignment_expr(block)?;
            self.ctx.ir.eval_assign(span, &mut self.cfg, block, target, value)?;
            Ok(block)
        }
    }

    /// A char array initialized directly from a string literal, completing
    /// an incomplete outer dimension to the literal's length plus the NUL
    /// terminator (distilled §4.4).
    fn string_initializer(&mut self, block: BlockId, target: Var) -> Result<BlockId> {
        let tok = self.advance();
        let char_ty = self.ctx.types.char_ty();
        let len = tok.lexeme.len() as u32 + 1;
        if !self.ctx.types.is_complete(target.ty()) {
            self.ctx.types.complete_array(target.ty(), len);
        }
        let str_ty = self.ctx.types.array_of(char_ty, Some(len));
        let value = Var::Immediate { ty: str_ty, imm: Immediate::Str(tok.lexeme) };
        self.ctx.ir.eval_assign(tok.span, &mut self.cfg, block, target, value)?;
        Ok(block)
    }

    /// `object_initializer`: `{ initializer (, initializer)* ,? }`. A
    /// struct consumes one initializer per member in order; a union
    /// initializes only its first member, after first zero-filling the
    /// whole union if that member is smaller than the union itself
    /// (distilled §4.4); an array completes an incomplete outer dimension
    /// to the number of initializers actually given. Trailing members/
    /// elements with no initializer are zero-filled (distilled §4.4, §8
    /// edge case).
    fn object_initializer(&mut self, block: BlockId, target: Var) -> Result<BlockId> {
        let span = self.span();
        self.expect(TokenKind::LBrace)?;
        let ty = self.ctx.types.unwrapped(target.ty());
        let mut block = block;

        if self.ctx.types.is_array(ty) {
            let elem_ty = self.ctx.types.deref_of(ty).expect("array always has an element type");
            let elem_size = self.ctx.types.size_of(elem_ty).max(1);
            let mut count = 0u32;
            while !self.at(TokenKind::RBrace) {
                let element = self.member_var(&target, count as i64 * elem_size as i64, elem_ty)?;
                block = self.initializer(block, element)?;
                count += 1;
                if self.at(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            if !self.ctx.types.is_complete(ty) {
                self.ctx.types.complete_array(ty, count);
            } else {
                let declared = self.ctx.types.size_of(ty) / elem_size;
                for i in count..declared {
                    let element = self.member_var(&target, i as i64 * elem_size as i64, elem_ty)?;
                    block = self.zero_initialize(block, element)?;
                }
            }
        } else if self.ctx.types.is_struct(ty) {
            let is_union = self.ctx.types.get(ty).kind == TypeKind::Union;
            let nmembers = self.ctx.types.nmembers(ty);

            if is_union && nmembers > 0 {
                let first_ty = self
                    .ctx
                    .types
                    .get_member(ty, 0)
                    .expect("union has at least one member")
                    .ty
                    .expect("aggregate members always carry a type");
                let first_size = self.ctx.types.size_of(first_ty);
                let union_size = self.ctx.types.size_of(ty);
                if first_size < union_size {
                    let char_ty = self.ctx.types.char_ty();
                    let byte_array_ty = self.ctx.types.array_of(char_ty, Some(union_size));
                    let zero_target = self.member_var(&target, 0, byte_array_ty)?;
                    block = self.zero_initialize(block, zero_target)?;
                }
            }

            let mut index = 0usize;
            while !self.at(TokenKind::RBrace) {
                if index >= nmembers {
                    return Err(Diagnostic::semantic(self.span(), "too many initializers for this aggregate"));
                }
                let member = self.ctx.types.get_member(ty, index).expect("index checked above").clone();
                let member_ty = member.ty.expect("aggregate members always carry a type");
                let element = self.member_var(&target, member.offset as i64, member_ty)?;
                block = self.initializer(block, element)?;
                index += 1;
                if is_union {
                    if self.at(TokenKind::Comma) {
                        self.advance();
                    }
                    break;
                }
                if self.at(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            if !is_union {
                for i in index..nmembers {
                    let member = self.ctx.types.get_member(ty, i).expect("index within nmembers").clone();
                    let member_ty = member.ty.expect("aggregate members always carry a type");
                    let element = self.member_var(&target, member.offset as i64, member_ty)?;
                    block = self.zero_initialize(block, element)?;
                }
            }
        } else {
            return Err(Diagnostic::semantic(span, "brace-enclosed initializer used on a scalar"));
        }

        if self.at(TokenKind::Comma) {
            self.advance();
        }
        self.expect(TokenKind::RBrace)?;
        Ok(block)
    }

    /// Recursively zero-fill `target` — a trailing struct member, array
    /// element, or scalar with no initializer supplied (distilled §4.4).
    fn zero_initialize(&mut self, block: BlockId, target: Var) -> Result<BlockId> {
        let ty = self.ctx.types.unwrapped(target.ty());
        if self.ctx.types.is_array(ty) {
            let elem_ty = self.ctx.types.deref_of(ty).expect("array always has an element type");
            let elem_size = self.ctx.types.size_of(elem_ty).max(1);
            let count = self.ctx.types.size_of(ty) / elem_size;
            let mut block = block;
            for i in 0..count {
                let element = self.member_var(&target, i as i64 * elem_size as i64, elem_ty)?;
                block = self.zero_initialize(block, element)?;
            }
            Ok(block)
        } else if self.ctx.types.is_struct(ty) {
            let nmembers = self.ctx.types.nmembers(ty);
            let mut block = block;
            for i in 0..nmembers {
                let member = self.ctx.types.get_member(ty, i).expect("index within nmembers").clone();
                let member_ty = member.ty.expect("aggregate members always carry a type");
                let element = self.member_var(&target, member.offset as i64, member_ty)?;
                block = self.zero_initialize(block, element)?;
            }
            Ok(block)
        } else {
            let zero = Var::Immediate { ty, imm: Immediate::Int(0) };
            self.ctx.ir.eval_assign(SourceSpan::default(), &mut self.cfg, block, target, zero)?;
            Ok(block)
        }
    }

    /// Project a member/element offset off an already-evaluated aggregate
    /// target. Initializers only ever target a plain object (a local or
    /// file-scope declaration), never something reached through a pointer,
    /// so `target` is always `Var::Direct`.
    fn member_var(&self, target: &Var, extra_offset: i64, ty: TypeId) -> Result<Var> {
        match target {
            Var::Direct { sym, offset, lvalue, .. } => Ok(Var::Direct {
                sym: *sym,
                ty,
                offset: offset + extra_offset,
                lvalue: *lvalue,
            }),
            _ => Err(Diagnostic::internal("initializer target is not a direct object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;
    use crate::parser::Parser;

    #[test]
    fn struct_initializer_zero_fills_trailing_members() {
        let mut parser = Parser::new("struct S { int a; int b; } s = { 1 };", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].block(units[0].head).ops.len(), 2);
    }

    #[test]
    fn array_initializer_completes_incomplete_dimension() {
        let mut parser = Parser::new("int a[] = { 1, 2, 3 };", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        let sym_id = parser.ctx.scopes.ident.sym_lookup("a").unwrap();
        let ty = parser.ctx.scopes.ident.get(sym_id).ty;
        assert_eq!(parser.ctx.types.size_of(ty), 12);
    }

    #[test]
    fn string_literal_initializes_char_array() {
        let mut parser = Parser::new(r#"char msg[] = "hi";"#, TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        let sym_id = parser.ctx.scopes.ident.sym_lookup("msg").unwrap();
        let ty = parser.ctx.scopes.ident.get(sym_id).ty;
        assert_eq!(parser.ctx.types.size_of(ty), 3);
    }

    #[test]
    fn union_initializer_zero_fills_before_first_member() {
        let mut parser = Parser::new("union U { char c; int x; } u = { 5 };", TranslatorConfig::default()).unwrap();
        let units = parser.parse_translation_unit().unwrap();
        assert_eq!(units.len(), 1);
        // one store per byte of the 4-byte zero-fill, plus the explicit c=5 store
        assert_eq!(units[0].block(units[0].head).ops.len(), 5);
    }
}
