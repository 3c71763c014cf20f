//! Expressions: the full precedence ladder from primary up through comma,
//! threading `(BlockId, Var)` through every level since any subexpression
//! may grow the CFG (a call, `&&`/`||`, `?:`) — distilled §4.2. All
//! semantics are delegated to [`crate::ir::IrBuilder`]; this module only
//! walks tokens and decides which evaluator method to call.

use super::Parser;
use crate::diagnostics::{Diagnostic, Result, SourceSpan};
use crate::ir::{BlockId, Immediate, IrOp, IrOpKind, Var};
use crate::token::{Token, TokenKind};
use crate::types::TypeId;

impl Parser {
    /// `constant_expression`: evaluate a conditional expression into a
    /// throwaway block, then demand it folded to an `Immediate` with no
    /// side-effecting op appended — used by enumerator values and array
    /// dimensions (distilled §4.2).
    pub fn constant_expression(&mut self) -> Result<i64> {
        let span = self.span();
        let scratch = self.cfg.cfg_block_init();
        let ops_before = self.cfg.block(scratch).ops.len();
        let (block, value) = self.conditional_expr(scratch)?;
        if block != scratch || self.cfg.block(block).ops.len() != ops_before {
            return Err(Diagnostic::semantic(span, "expression is not a compile-time constant"));
        }
        match value {
            Var::Immediate { imm: Immediate::Int(n), .. } => Ok(n),
            _ => Err(Diagnostic::semantic(span, "expression is not a compile-time constant")),
        }
    }

    /// `expression`: the comma operator, left-associative, discarding every
    /// value but the last.
    pub fn expression(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (mut block, mut value) = self.assignment_expr(block)?;
        while self.at(TokenKind::Comma) {
            self.advance();
            let (b2, v2) = self.assignment_expr(block)?;
            block = b2;
            value = v2;
        }
        Ok((block, value))
    }

    /// `assignment_expression`: `=` and the compound-assignment family,
    /// right-associative, falling back to `conditional_expression` when no
    /// assignment operator follows.
    pub fn assignment_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (block, lhs) = self.conditional_expr(block)?;
        let compound = match self.peek().kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(IrOpKind::Add),
            TokenKind::MinusAssign => Some(IrOpKind::Sub),
            TokenKind::StarAssign => Some(IrOpKind::Mul),
            TokenKind::SlashAssign => Some(IrOpKind::Div),
            TokenKind::PercentAssign => Some(IrOpKind::Mod),
            TokenKind::AmpAssign => Some(IrOpKind::BitAnd),
            TokenKind::PipeAssign => Some(IrOpKind::BitOr),
            TokenKind::CaretAssign => Some(IrOpKind::BitXor),
            _ => return Ok((block, lhs)),
        };
        let span = self.span();
        self.advance();
        let (block, rhs) = self.assignment_expr(block)?;
        let value = match compound {
            None => rhs,
            Some(op) => self.ctx.ir.eval_expr(&mut self.cfg, block, op, lhs.clone(), rhs)?,
        };
        let stored = self.ctx.ir.eval_assign(span, &mut self.cfg, block, lhs, value)?;
        Ok((block, stored))
    }

    /// `conditional_expression`: `a ? b : c`, the only other branch-creating
    /// construct besides `&&`/`||` and `if`/loops. The controlling value is
    /// recorded on `cond_block.expr`, the same slot a join block uses for
    /// its produced value; each arm writes the shared result temporary,
    /// created by the `then` arm's `eval_cast` and mirrored into the `else`
    /// arm with a plain `Copy`.
    pub fn conditional_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (cond_block, cond) = self.logical_or_expr(block)?;
        if !self.at(TokenKind::Question) {
            return Ok((cond_block, cond));
        }
        self.advance();
        let (then_block, else_block, next_block) = self.ctx.ir.eval_conditional(&mut self.cfg, cond_block, &cond);
        self.cfg.block_mut(cond_block).expr = Some(cond);
        let (then_block, then_value) = self.expression(then_block)?;
        self.expect(TokenKind::Colon)?;
        let (else_block, else_value) = self.conditional_expr(else_block)?;
        let result_ty = then_value.ty();
        let result = self.ctx.ir.eval_cast(&mut self.cfg, then_block, then_value, result_ty)?;
        self.push_copy(else_block, result.clone(), else_value);
        self.cfg.block_mut(then_block).jump[0] = Some(next_block);
        self.cfg.block_mut(else_block).jump[0] = Some(next_block);
        self.cfg.block_mut(next_block).expr = Some(result.clone());
        Ok((next_block, result))
    }

    fn push_copy(&mut self, block: BlockId, dest: Var, src: Var) {
        self.cfg.block_mut(block).ops.push(IrOp::Copy { dest, src });
    }

    fn logical_or_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (mut block, mut lhs) = self.logical_and_expr(block)?;
        while self.at(TokenKind::LogicalOr) {
            self.advance();
            let (rhs_entry, join, result) = self.ctx.ir.eval_logical_or(&mut self.ctx.types, &mut self.cfg, block, lhs);
            let (rhs_block, rhs_value) = self.logical_and_expr(rhs_entry)?;
            self.ctx.ir.finish_logical(&mut self.cfg, rhs_block, join, result.clone(), rhs_value);
            lhs = result;
            block = join;
        }
        Ok((block, lhs))
    }

    fn logical_and_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (mut block, mut lhs) = self.bitwise_or_expr(block)?;
        while self.at(TokenKind::LogicalAnd) {
            self.advance();
            let (rhs_entry, join, result) = self.ctx.ir.eval_logical_and(&mut self.ctx.types, &mut self.cfg, block, lhs);
            let (rhs_block, rhs_value) = self.bitwise_or_expr(rhs_entry)?;
            self.ctx.ir.finish_logical(&mut self.cfg, rhs_block, join, result.clone(), rhs_value);
            lhs = result;
            block = join;
        }
        Ok((block, lhs))
    }

    fn bitwise_or_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        self.left_assoc_binary(block, Self::bitwise_xor_expr, &[(TokenKind::Pipe, IrOpKind::BitOr)])
    }

    fn bitwise_xor_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        self.left_assoc_binary(block, Self::bitwise_and_expr, &[(TokenKind::Caret, IrOpKind::BitXor)])
    }

    fn bitwise_and_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        self.left_assoc_binary(block, Self::equality_expr, &[(TokenKind::Amp, IrOpKind::BitAnd)])
    }

    /// `==` lowers directly to `IR_EQ`; `!=` is the `IR_EQ(0, IR_EQ(a,b))`
    /// unary-not fallback (distilled §4.2/§6).
    fn equality_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (mut block, mut lhs) = self.relational_expr(block)?;
        loop {
            let negate = match self.peek().kind {
                TokenKind::EqEq => false,
                TokenKind::Neq => true,
                _ => break,
            };
            self.advance();
            let (b2, rhs) = self.relational_expr(block)?;
            block = b2;
            let eq = self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Eq, lhs, rhs)?;
            lhs = if negate {
                let int_ty = self.ctx.types.int();
                let zero = Var::Immediate { ty: int_ty, imm: Immediate::Int(0) };
                self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Eq, zero, eq)?
            } else {
                eq
            };
        }
        Ok((block, lhs))
    }

    /// `<` lowers as `GT(rhs, lhs)`, `<=` as `GE(rhs, lhs)`; `>`/`>=` use
    /// `IR_GT`/`IR_GE` directly (distilled §4.2).
    fn relational_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (mut block, mut lhs) = self.shift_expr(block)?;
        loop {
            let (op, swap) = match self.peek().kind {
                TokenKind::Gt => (IrOpKind::Gt, false),
                TokenKind::Geq => (IrOpKind::Ge, false),
                TokenKind::Lt => (IrOpKind::Gt, true),
                TokenKind::Leq => (IrOpKind::Ge, true),
                _ => break,
            };
            self.advance();
            let (b2, rhs) = self.shift_expr(block)?;
            block = b2;
            let (a, b) = if swap { (rhs, lhs) } else { (lhs, rhs) };
            lhs = self.ctx.ir.eval_expr(&mut self.cfg, block, op, a, b)?;
        }
        Ok((block, lhs))
    }

    fn shift_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        self.left_assoc_binary(block, Self::additive_expr, &[(TokenKind::Lshift, IrOpKind::Shl), (TokenKind::Rshift, IrOpKind::Shr)])
    }

    fn additive_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        self.left_assoc_binary(block, Self::multiplicative_expr, &[(TokenKind::Plus, IrOpKind::Add), (TokenKind::Minus, IrOpKind::Sub)])
    }

    fn multiplicative_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        self.left_assoc_binary(
            block,
            Self::cast_expr,
            &[(TokenKind::Star, IrOpKind::Mul), (TokenKind::Slash, IrOpKind::Div), (TokenKind::Percent, IrOpKind::Mod)],
        )
    }

    /// Shared shape for every strictly-left-associative binary level: parse
    /// one operand at `next`, then fold in `(op, IrOpKind)` pairs for as
    /// long as the lookahead matches one of `ops`.
    fn left_assoc_binary(
        &mut self,
        block: BlockId,
        next: fn(&mut Self, BlockId) -> Result<(BlockId, Var)>,
        ops: &[(TokenKind, IrOpKind)],
    ) -> Result<(BlockId, Var)> {
        let (mut block, mut lhs) = next(self, block)?;
        loop {
            let kind = self.peek().kind;
            let matched = ops.iter().find(|(k, _)| *k == kind).map(|(_, op)| *op);
            let Some(op) = matched else { break };
            self.advance();
            let (b2, rhs) = next(self, block)?;
            block = b2;
            lhs = self.ctx.ir.eval_expr(&mut self.cfg, block, op, lhs, rhs)?;
        }
        Ok((block, lhs))
    }

    /// `cast_expression`: `( type-name ) cast-expression` or a plain
    /// `unary_expression`, disambiguated by whether the token after `(`
    /// starts a type (distilled §4.2's 2-token lookahead).
    fn cast_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        if self.at(TokenKind::LParen) && self.starts_type_name(self.peekn(1)) {
            self.advance();
            let ty = self.type_name()?;
            self.expect(TokenKind::RParen)?;
            let (block, value) = self.cast_expr(block)?;
            let casted = self.ctx.ir.eval_cast(&mut self.cfg, block, value, ty)?;
            Ok((block, casted))
        } else {
            self.unary_expr(block)
        }
    }

    fn starts_type_name(&self, tok: &Token) -> bool {
        tok.kind.starts_specifier_qualifier() || (tok.kind == TokenKind::Identifier && self.is_typedef_name(&tok.lexeme))
    }

    /// `unary_expression`: prefix operators, `sizeof`, and pre-inc/dec,
    /// falling back to `postfix_expression`.
    fn unary_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Amp => {
                self.advance();
                let (block, operand) = self.cast_expr(block)?;
                let result = self.ctx.ir.eval_addr(tok.span, &mut self.ctx.types, &mut self.cfg, block, operand)?;
                Ok((block, result))
            }
            TokenKind::Star => {
                self.advance();
                let (block, operand) = self.cast_expr(block)?;
                let result = self.ctx.ir.eval_deref(tok.span, &self.ctx.types, operand)?;
                Ok((block, result))
            }
            TokenKind::Bang => {
                self.advance();
                let (block, operand) = self.cast_expr(block)?;
                let int_ty = self.ctx.types.int();
                let zero = Var::Immediate { ty: int_ty, imm: Immediate::Int(0) };
                let result = self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Eq, operand, zero)?;
                Ok((block, result))
            }
            TokenKind::Tilde => {
                self.advance();
                let (block, operand) = self.cast_expr(block)?;
                let result = self.ctx.ir.eval_unary(&mut self.cfg, block, IrOpKind::Not, operand)?;
                Ok((block, result))
            }
            TokenKind::Plus => {
                self.advance();
                self.cast_expr(block)
            }
            TokenKind::Minus => {
                self.advance();
                let (block, operand) = self.cast_expr(block)?;
                let ty = operand.ty();
                let zero = Var::Immediate { ty, imm: Immediate::Int(0) };
                let result = self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Sub, zero, operand)?;
                Ok((block, result))
            }
            TokenKind::Sizeof => {
                self.advance();
                self.parse_sizeof(block, tok.span)
            }
            TokenKind::Increment | TokenKind::Decrement => {
                self.advance();
                let is_inc = tok.kind == TokenKind::Increment;
                let (block, operand) = self.unary_expr(block)?;
                self.pre_incdec(tok.span, block, operand, is_inc)
            }
            _ => self.postfix_expr(block),
        }
    }

    fn parse_sizeof(&mut self, block: BlockId, span: SourceSpan) -> Result<(BlockId, Var)> {
        let ulong_ty = self.ctx.types.unsigned_long();
        if self.at(TokenKind::LParen) && self.starts_type_name(self.peekn(1)) {
            self.advance();
            let ty = self.type_name()?;
            self.expect(TokenKind::RParen)?;
            let size = self.sizeof_of(span, ty)?;
            Ok((block, Var::Immediate { ty: ulong_ty, imm: Immediate::Int(size as i64) }))
        } else {
            let (block, operand) = self.unary_expr(block)?;
            let size = self.sizeof_of(span, operand.ty())?;
            Ok((block, Var::Immediate { ty: ulong_ty, imm: Immediate::Int(size as i64) }))
        }
    }

    fn sizeof_of(&self, span: SourceSpan, ty: TypeId) -> Result<u32> {
        if self.ctx.types.is_function(ty) {
            return Err(Diagnostic::ty(span, "sizeof applied to a function type"));
        }
        if !self.ctx.types.is_complete(ty) {
            return Err(Diagnostic::ty(span, "sizeof applied to an incomplete type"));
        }
        Ok(self.ctx.types.size_of(ty))
    }

    /// Pre-increment/decrement: `++x` computes `x := x OP 1` and yields the
    /// updated value — exactly one store (distilled §8 invariant 6).
    fn pre_incdec(&mut self, span: SourceSpan, block: BlockId, operand: Var, is_inc: bool) -> Result<(BlockId, Var)> {
        if !operand.is_lvalue() {
            return Err(Diagnostic::ty(span, "increment/decrement target is not an lvalue"));
        }
        let ty = operand.ty();
        let one = Var::Immediate { ty, imm: Immediate::Int(1) };
        let op = if is_inc { IrOpKind::Add } else { IrOpKind::Sub };
        let updated = self.ctx.ir.eval_expr(&mut self.cfg, block, op, operand.clone(), one)?;
        let stored = self.ctx.ir.eval_assign(span, &mut self.cfg, block, operand, updated)?;
        Ok((block, stored))
    }

    /// `postfix_expression`: subscript, call, member access, and
    /// post-inc/dec, chained left to right off a `primary_expression`.
    fn postfix_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let (mut block, mut value) = self.primary_expr(block)?;
        loop {
            match self.peek().kind {
                TokenKind::LBracket => {
                    let span = self.span();
                    self.advance();
                    let (b2, index) = self.expression(block)?;
                    block = b2;
                    self.expect(TokenKind::RBracket)?;
                    value = self.eval_subscript(span, block, value, index)?;
                }
                TokenKind::LParen => {
                    let span = self.span();
                    self.advance();
                    let mut args = Vec::new();
                    if !self.at(TokenKind::RParen) {
                        loop {
                            let (b2, arg) = self.assignment_expr(block)?;
                            block = b2;
                            args.push(arg);
                            if self.at(TokenKind::Comma) {
                                self.advance();
                                continue;
                            }
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    let (fn_ty, ret_ty) = self.resolve_callee_type(span, value.ty())?;
                    value = self.ctx.ir.eval_call(span, &mut self.ctx.types, &mut self.cfg, block, value, ret_ty, fn_ty, args)?;
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let is_arrow = self.peek().kind == TokenKind::Arrow;
                    self.advance();
                    let field = self.expect(TokenKind::Identifier)?;
                    let (b2, v2) = self.eval_member_access(field.span, block, value, is_arrow, &field.lexeme)?;
                    block = b2;
                    value = v2;
                }
                TokenKind::Increment | TokenKind::Decrement => {
                    let span = self.span();
                    let is_inc = self.peek().kind == TokenKind::Increment;
                    self.advance();
                    value = self.post_incdec(span, block, value, is_inc)?;
                }
                _ => break,
            }
        }
        Ok((block, value))
    }

    /// Post-increment/decrement: materialize `copy := x`, then `x := x OP
    /// 1` — again exactly one store to `x` (distilled §8 invariant 6).
    fn post_incdec(&mut self, span: SourceSpan, block: BlockId, value: Var, is_inc: bool) -> Result<Var> {
        if !value.is_lvalue() {
            return Err(Diagnostic::ty(span, "increment/decrement target is not an lvalue"));
        }
        let ty = value.ty();
        let copy = self.ctx.ir.eval_cast(&mut self.cfg, block, value.clone(), ty)?;
        let one = Var::Immediate { ty, imm: Immediate::Int(1) };
        let op = if is_inc { IrOpKind::Add } else { IrOpKind::Sub };
        let updated = self.ctx.ir.eval_expr(&mut self.cfg, block, op, value.clone(), one)?;
        self.ctx.ir.eval_assign(span, &mut self.cfg, block, value, updated)?;
        Ok(copy)
    }

    /// `a[idx]` lowers to `*(a + idx*sizeof(elem))`, decaying an array
    /// operand to a pointer first (distilled §4.2).
    fn eval_subscript(&mut self, span: SourceSpan, block: BlockId, base: Var, index: Var) -> Result<Var> {
        let ptr = self.decay_to_pointer(span, block, base)?;
        let elem_ty = self.ctx.types.deref_of(ptr.ty()).expect("decayed pointer always has a pointee");
        let elem_size = self.ctx.types.size_of(elem_ty).max(1) as i64;
        let scaled_index = if elem_size == 1 {
            index
        } else {
            let int_ty = self.ctx.types.int();
            let size_imm = Var::Immediate { ty: int_ty, imm: Immediate::Int(elem_size) };
            self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Mul, index, size_imm)?
        };
        let addr = self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Add, ptr, scaled_index)?;
        self.ctx.ir.eval_deref(span, &self.ctx.types, addr)
    }

    fn decay_to_pointer(&mut self, span: SourceSpan, block: BlockId, value: Var) -> Result<Var> {
        if self.ctx.types.is_array(value.ty()) {
            let elem_ty = self.ctx.types.deref_of(value.ty()).expect("array always has an element type");
            let addr = self.ctx.ir.eval_addr(span, &mut self.ctx.types, &mut self.cfg, block, value)?;
            let ptr_ty = self.ctx.types.pointer_to(elem_ty);
            self.ctx.ir.eval_cast(&mut self.cfg, block, addr, ptr_ty)
        } else if self.ctx.types.is_pointer(value.ty()) {
            Ok(value)
        } else {
            Err(Diagnostic::ty(span, "subscripted value is not an array or pointer"))
        }
    }

    fn resolve_callee_type(&self, span: SourceSpan, ty: TypeId) -> Result<(TypeId, TypeId)> {
        let fn_ty = if self.ctx.types.is_function(ty) {
            ty
        } else if self.ctx.types.is_pointer(ty) {
            let pointee = self.ctx.types.deref_of(ty).expect("pointer type always has a pointee");
            if !self.ctx.types.is_function(pointee) {
                return Err(Diagnostic::ty(span, "called object is not a function or function pointer"));
            }
            pointee
        } else {
            return Err(Diagnostic::ty(span, "called object is not a function or function pointer"));
        };
        let ret_ty = self.ctx.types.deref_of(fn_ty).expect("function type always has a return type");
        Ok((fn_ty, ret_ty))
    }

    /// `.field`/`->field`: `.` stays within the same addressing mode as its
    /// base (offset arithmetic on a `Direct`, or on a `Deref`'s inner
    /// pointer); `->` always goes through a pointer add-then-dereference.
    fn eval_member_access(&mut self, span: SourceSpan, block: BlockId, base: Var, is_arrow: bool, field: &str) -> Result<(BlockId, Var)> {
        let agg_ty = if is_arrow {
            self.ctx.types.deref_of(base.ty()).ok_or_else(|| Diagnostic::ty(span, "-> requires a pointer to struct/union"))?
        } else {
            base.ty()
        };
        let canonical = self.ctx.types.unwrapped(agg_ty);
        if !self.ctx.types.is_struct(canonical) {
            return Err(Diagnostic::ty(span, "member access on a non-aggregate type"));
        }
        let member = self
            .ctx
            .types
            .find_type_member(canonical, field)
            .ok_or_else(|| Diagnostic::symbol(span, format!("no member named '{}'", field)))?
            .clone();
        let member_ty = member.ty.expect("aggregate members always carry a type");
        let member_offset = member.offset as i64;

        if is_arrow {
            let result = self.offset_through_pointer(block, base, member_offset, member_ty)?;
            return Ok((block, result));
        }

        match base {
            Var::Direct { sym, offset, lvalue, .. } => Ok((block, Var::Direct { sym, ty: member_ty, offset: offset + member_offset, lvalue })),
            Var::Deref { base: inner_ptr, .. } => {
                let result = self.offset_through_pointer(block, *inner_ptr, member_offset, member_ty)?;
                Ok((block, result))
            }
            Var::Immediate { .. } => Err(Diagnostic::ty(span, "member access on a non-lvalue")),
        }
    }

    /// `*(ptr + offset)` reinterpreted at `member_ty`, used for `->` and for
    /// `.` through an already-dereferenced base.
    fn offset_through_pointer(&mut self, block: BlockId, ptr: Var, offset: i64, member_ty: TypeId) -> Result<Var> {
        let span = SourceSpan::default();
        let int_ty = self.ctx.types.int();
        let offset_imm = Var::Immediate { ty: int_ty, imm: Immediate::Int(offset) };
        let advanced = self.ctx.ir.eval_expr(&mut self.cfg, block, IrOpKind::Add, ptr, offset_imm)?;
        let pointee_ptr_ty = self.ctx.types.pointer_to(member_ty);
        let advanced_ptr = self.ctx.ir.eval_cast(&mut self.cfg, block, advanced, pointee_ptr_ty)?;
        self.ctx.ir.eval_deref(span, &self.ctx.types, advanced_ptr)
    }

    /// `primary_expression`: identifiers (including the two `__builtin_va_*`
    /// magic names, dispatched to their own extra-argument parsers),
    /// literals, and parenthesized subexpressions.
    fn primary_expr(&mut self, block: BlockId) -> Result<(BlockId, Var)> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Identifier => {
                self.advance();
                if tok.lexeme == "__builtin_va_start" || tok.lexeme == "__builtin_va_arg" {
                    return self.parse_builtin_va(block, &tok.lexeme);
                }
                let sym_id = self
                    .ctx
                    .scopes
                    .ident
                    .sym_lookup(&tok.lexeme)
                    .ok_or_else(|| Diagnostic::symbol(tok.span, format!("undefined identifier '{}'", tok.lexeme)))?;
                let sym = self.ctx.scopes.ident.get(sym_id);
                Ok((block, Var::Direct { sym: sym_id, ty: sym.ty, offset: 0, lvalue: true }))
            }
            TokenKind::IntegerConstant => {
                self.advance();
                let lit = tok.intval.expect("IntegerConstant always carries an IntLit");
                let ty = if lit.is_long && lit.is_unsigned {
                    self.ctx.types.unsigned_long()
                } else if lit.is_long {
                    self.ctx.types.long()
                } else if lit.is_unsigned {
                    self.ctx.types.unsigned_int()
                } else {
                    self.ctx.types.int()
                };
                Ok((block, Var::Immediate { ty, imm: Immediate::Int(lit.value) }))
            }
            TokenKind::CharConstant => {
                self.advance();
                let lit = tok.intval.expect("CharConstant always carries an IntLit");
                let ty = self.ctx.types.char_ty();
                Ok((block, Var::Immediate { ty, imm: Immediate::Int(lit.value) }))
            }
            TokenKind::StringConstant => {
                self.advance();
                let char_ty = self.ctx.types.char_ty();
                let len = tok.lexeme.len() as u32 + 1;
                let ty = self.ctx.types.array_of(char_ty, Some(len));
                Ok((block, Var::Immediate { ty, imm: Immediate::Str(tok.lexeme) }))
            }
            TokenKind::LParen => {
                self.advance();
                let (block, value) = self.expression(block)?;
                self.expect(TokenKind::RParen)?;
                Ok((block, value))
            }
            _ => Err(Diagnostic::syntax(tok.span, format!("unexpected token '{}' in expression", tok.lexeme))),
        }
    }

    fn parse_builtin_va(&mut self, block: BlockId, name: &str) -> Result<(BlockId, Var)> {
        self.expect(TokenKind::LParen)?;
        if name == "__builtin_va_start" {
            let (block, va_list) = self.assignment_expr(block)?;
            self.expect(TokenKind::Comma)?;
            let (block, last_named) = self.assignment_expr(block)?;
            self.expect(TokenKind::RParen)?;
            self.ctx.ir.eval_va_start(&mut self.cfg, block, va_list, last_named);
            let void_ty = self.ctx.types.void();
            Ok((block, Var::Immediate { ty: void_ty, imm: Immediate::Int(0) }))
        } else {
            let (block, va_list) = self.assignment_expr(block)?;
            self.expect(TokenKind::Comma)?;
            let ty = self.type_name()?;
            self.expect(TokenKind::RParen)?;
            let result = self.ctx.ir.eval_va_arg(&mut self.cfg, block, va_list, ty);
            Ok((block, result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslatorConfig;
    use crate::parser::Parser;

    fn exprs_in(source: &str) -> Parser {
        Parser::new(source, TranslatorConfig::default()).unwrap()
    }

    #[test]
    fn additive_expression_emits_binary_op() {
        let mut parser = exprs_in("1 + 2");
        let block = parser.start_cfg(None);
        let (block, value) = parser.expression(block).unwrap();
        assert!(matches!(value, Var::Direct { .. }));
        assert_eq!(parser.cfg_ref().block(block).ops.len(), 1);
    }

    #[test]
    fn less_than_lowers_to_swapped_gt() {
        let mut parser = exprs_in("1 < 2");
        let block = parser.start_cfg(None);
        let (block, _) = parser.expression(block).unwrap();
        let ops = &parser.cfg_ref().block(block).ops;
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            IrOp::Binary { op, lhs, rhs, .. } => {
                assert_eq!(*op, IrOpKind::Gt);
                assert!(matches!(lhs, Var::Immediate { imm: Immediate::Int(2), .. }));
                assert!(matches!(rhs, Var::Immediate { imm: Immediate::Int(1), .. }));
            }
            other => panic!("expected a Binary op, got {other:?}"),
        }
    }

    #[test]
    fn logical_and_wires_rhs_entry_and_join() {
        let mut parser = exprs_in("1 && 2");
        let block = parser.start_cfg(None);
        let entry_len_before = parser.cfg_ref().blocks().len();
        let (join, value) = parser.expression(block).unwrap();
        assert!(parser.cfg_ref().blocks().len() > entry_len_before);
        assert!(matches!(value, Var::Direct { .. }));
        assert!(parser.cfg_ref().block(join).expr.is_some());
    }

    #[test]
    fn constant_expression_rejects_non_constant() {
        let mut parser = exprs_in("x");
        parser
            .ctx
            .scopes
            .ident
            .sym_add(crate::symbol::Symbol {
                name: "x".to_string(),
                ty: parser.ctx.types.int(),
                storage: crate::symbol::StorageClass::Definition,
                linkage: crate::symbol::Linkage::None,
                depth: 0,
                enum_value: None,
                is_definition: true,
            })
            .unwrap();
        assert!(parser.constant_expression().is_err());
    }

    #[test]
    fn constant_expression_accepts_arithmetic() {
        let mut parser = exprs_in("2 + 3 * 4");
        assert_eq!(parser.constant_expression().unwrap(), 14);
    }
}
