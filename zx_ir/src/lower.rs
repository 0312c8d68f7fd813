//! AST-to-IR lowering (spec component C10): a recursive walk over the
//! parsed translation unit that consults the symbol index, label scope and
//! enum registry and emits [`crate::module::Module`].

use crate::instruction::{Instruction, LabeledInstr, Opcode};
use crate::namegen::NameGen;
use crate::operand::Operand;
use crate::proc::{Arg, DataEntry, Decl as IrDecl, LocalVar, Procedure, Variable};
use crate::typebuild::{apply_declarator, build_base_type, declarator_name, eval_const_int};
use crate::types::IrType;
use crate::Module;
use std::collections::HashMap;
use std::rc::Rc;
use zx_common::{Diagnostics, Position};
use zx_parser::ast::{
    AdjustKind, BinOpKind, Decl, DeclKind, Declarator, DeclaratorKind, Expr, ExprKind, InitDeclarator, Specifier, Stmt,
    StmtKind, StorageClass, TranslationUnit, UnaryKind,
};
use zx_types::{BasicKind, CgType, CgTypeKind, EnumRegistry, LabelScope, SymbolIndex, SymbolKind};

pub struct LoweringResult {
    pub module: Module,
    pub diagnostics: Diagnostics,
    pub symbols: SymbolIndex,
    pub enums: EnumRegistry,
}

pub fn lower_translation_unit(unit: &TranslationUnit) -> LoweringResult {
    let mut lowering = Lowering {
        diagnostics: Diagnostics::new(),
        symbols: SymbolIndex::new(),
        enums: EnumRegistry::new(),
        module: Module::new(),
        string_count: 0,
    };
    for decl in &unit.items {
        lowering.lower_external_decl(decl);
    }
    lowering.emit_tentative_definitions();
    LoweringResult { module: lowering.module, diagnostics: lowering.diagnostics, symbols: lowering.symbols, enums: lowering.enums }
}

struct Lowering {
    diagnostics: Diagnostics,
    symbols: SymbolIndex,
    enums: EnumRegistry,
    module: Module,
    string_count: u32,
}

fn position_of(spec_or_tok: Option<&zx_lexer::Token>) -> Position {
    spec_or_tok.map(|t| t.begin().clone()).unwrap_or_else(|| Position::start(Rc::from("<unknown>")))
}

impl Lowering {
    fn lower_external_decl(&mut self, decl: &Decl) {
        match &decl.node {
            DeclKind::Global { specifiers, declarators, .. } => self.lower_global(specifiers, declarators, decl),
            DeclKind::Macro { name, .. } => {
                self.diagnostics.error(position_of(decl.first_tok()), format!("macro declaration '{name}' is not implemented"));
            }
            DeclKind::ExternC { items } => {
                for item in items {
                    self.lower_external_decl(item);
                }
            }
        }
    }

    fn lower_global(&mut self, specifiers: &Specifier, declarators: &[InitDeclarator], decl: &Decl) {
        let base = build_base_type(specifiers, &mut self.enums, &mut self.diagnostics);
        let storage = storage_class_of(specifiers);
        if storage == Some(StorageClass::Typedef) {
            return;
        }
        for init in declarators {
            let ty = apply_declarator(&init.declarator, base.clone());
            let Some(name) = declarator_name(&init.declarator) else { continue };
            let position = position_of(init.declarator.first_tok().or_else(|| decl.first_tok()));
            let name_rc: Rc<str> = Rc::from(name.as_str());

            if let CgTypeKind::Function { .. } = &ty.kind {
                let is_extern = storage == Some(StorageClass::Extern);
                let has_body = init.body.is_some();
                let kind = if is_extern && !has_body { SymbolKind::ExternFun } else { SymbolKind::Fun };
                if let Err(err) = self.symbols.declare(name_rc.clone(), position.clone(), kind, ty.clone(), has_body) {
                    self.diagnostics.error(position.clone(), err.to_string());
                }
                if let Some(body) = &init.body {
                    self.lower_procedure(&name_rc, &ty, &init.declarator, body, position);
                }
                continue;
            }

            let has_init = init.initializer.is_some();
            let is_extern = storage == Some(StorageClass::Extern);
            let (kind, is_defined) =
                if is_extern && !has_init { (SymbolKind::ExternVar, false) } else if has_init { (SymbolKind::Var, true) } else { (SymbolKind::TentativeVar, false) };
            if let Err(err) = self.symbols.declare(name_rc.clone(), position.clone(), kind, ty.clone(), is_defined) {
                self.diagnostics.error(position.clone(), err.to_string());
                continue;
            }
            if let Some(init_expr) = &init.initializer {
                let ir_ty = IrType::from_cg(&ty);
                match eval_const_int(init_expr) {
                    Some(value) => {
                        self.module.add(IrDecl::Variable(Variable { name: name_rc.clone(), data: vec![DataEntry { ty: ir_ty, value }] }));
                    }
                    None => {
                        self.diagnostics.error(position, format!("initializer for '{name}' is not a compile-time constant"));
                    }
                }
            }
        }
    }

    /// Tentative definitions (`int x;` at file scope, never given a body)
    /// that survived to the end of the unit become zero-initialized
    /// globals, matching ordinary C linkage rules for common symbols.
    fn emit_tentative_definitions(&mut self) {
        let pending: Vec<(Rc<str>, IrType)> = self
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::TentativeVar)
            .map(|s| (s.name.clone(), IrType::from_cg(&s.ty)))
            .collect();
        for (name, ty) in pending {
            self.module.add(IrDecl::Variable(Variable { name, data: vec![DataEntry { ty, value: 0 }] }));
        }
    }

    fn lower_procedure(&mut self, name: &Rc<str>, ty: &CgType, declarator: &Declarator, body: &Stmt, position: Position) {
        let CgTypeKind::Function { ret, params, .. } = &ty.kind else { unreachable!() };
        let is_void_return = ret.is_void();
        let mut proc = Procedure::new(name.clone(), if is_void_return { None } else { Some(IrType::from_cg(ret)) });
        let mut pc = ProcCtx {
            namegen: NameGen::new(),
            labels: LabelScope::new(),
            locals: HashMap::new(),
            break_stack: Vec::new(),
            continue_stack: Vec::new(),
            pending_label: None,
            epilogue_label: Rc::from("_L_epilogue"),
            return_slot: Rc::from("$ret"),
            return_ty: ret.as_ref().clone(),
            is_void_return,
        };
        pc.epilogue_label = pc.namegen.label();

        // The function's own declarator tree (not `ty`, which only carries
        // parameter *types*) is where parameter names live.
        if let Some(Declarator { node: DeclaratorKind::Function { params: ast_params, .. }, .. }) = find_function_node(declarator) {
            for (param_ty, ast_param) in params.iter().zip(ast_params.iter()) {
                let Some(param_name) = ast_param.declarator.as_ref().and_then(declarator_name) else { continue };
                let name_rc: Rc<str> = Rc::from(param_name.as_str());
                proc.args.push(Arg { name: name_rc.clone(), ty: IrType::from_cg(param_ty) });
                pc.locals.insert(name_rc, param_ty.clone());
            }
        }

        self.lower_stmt(body, &mut proc, &mut pc);
        if !pc.is_void_return && !always_returns(body) {
            self.diagnostics.error(position, format!("control reaches end of non-void function '{name}' without a return"));
        }
        std::mem::take(&mut pc.labels).finish(&mut self.diagnostics);
        if pc.pending_label.take().is_some() {
            proc.body.push(LabeledInstr { label: Some(pc.epilogue_label.clone()), instr: Instruction::new(Opcode::Mov, vec![Operand::Immediate(0)]) });
        } else {
            proc.body.push(LabeledInstr {
                label: Some(pc.epilogue_label.clone()),
                instr: Instruction::new(Opcode::Return, if pc.is_void_return { vec![] } else { vec![Operand::var(pc.return_slot.clone())] }),
            });
        }
        let is_arg = |n: &Rc<str>| proc.args.iter().any(|a| a.name == *n);
        let mut locals = Vec::new();
        for (n, t) in pc.locals.iter() {
            if !is_arg(n) {
                locals.push(LocalVar { name: n.clone(), ty: IrType::from_cg(t) });
            }
        }
        proc.locals = locals;
        self.module.add(IrDecl::Procedure(proc));
    }

    fn emit(&mut self, proc: &mut Procedure, pc: &mut ProcCtx, instr: Instruction) {
        let label = pc.pending_label.take();
        proc.body.push(LabeledInstr { label, instr });
    }

    fn set_label(&mut self, proc: &mut Procedure, pc: &mut ProcCtx, name: Rc<str>) {
        if pc.pending_label.is_some() {
            self.emit_anchor(proc, pc);
        }
        pc.pending_label = Some(name);
    }

    fn emit_anchor(&mut self, proc: &mut Procedure, pc: &mut ProcCtx) {
        self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![Operand::Immediate(0)]));
    }

    fn lower_stmt(&mut self, stmt: &Stmt, proc: &mut Procedure, pc: &mut ProcCtx) {
        match &stmt.node {
            StmtKind::Block { items } => {
                for item in items {
                    self.lower_stmt(item, proc, pc);
                }
            }
            StmtKind::If { cond, then_branch, else_ifs, else_branch } => {
                let end_label = pc.namegen.label();
                self.lower_if_arm(cond, then_branch, &end_label, proc, pc);
                for arm in else_ifs {
                    self.lower_if_arm(&arm.cond, &arm.then_branch, &end_label, proc, pc);
                }
                if let Some(else_stmt) = else_branch {
                    self.lower_stmt(else_stmt, proc, pc);
                }
                self.set_label(proc, pc, end_label);
            }
            StmtKind::While { cond, body } => {
                let header = pc.namegen.label();
                let end = pc.namegen.label();
                self.set_label(proc, pc, header.clone());
                let (v, _) = self.lower_expr(cond, proc, pc);
                self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![v, Operand::var(end.clone())]));
                pc.break_stack.push(end.clone());
                pc.continue_stack.push(header.clone());
                self.lower_stmt(body, proc, pc);
                pc.continue_stack.pop();
                pc.break_stack.pop();
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(header)]));
                self.set_label(proc, pc, end);
            }
            StmtKind::DoWhile { body, cond } => {
                let header = pc.namegen.label();
                let continue_label = pc.namegen.label();
                let end = pc.namegen.label();
                self.set_label(proc, pc, header.clone());
                pc.break_stack.push(end.clone());
                pc.continue_stack.push(continue_label.clone());
                self.lower_stmt(body, proc, pc);
                pc.continue_stack.pop();
                pc.break_stack.pop();
                self.set_label(proc, pc, continue_label);
                let (v, _) = self.lower_expr(cond, proc, pc);
                self.emit(proc, pc, Instruction::new(Opcode::BranchIfNonZero, vec![v, Operand::var(header)]));
                self.set_label(proc, pc, end);
            }
            StmtKind::For { init, cond, step, body } => {
                if let Some(init) = init {
                    self.lower_stmt(init, proc, pc);
                }
                let header = pc.namegen.label();
                let continue_label = pc.namegen.label();
                let end = pc.namegen.label();
                self.set_label(proc, pc, header.clone());
                if let Some(cond) = cond {
                    let (v, _) = self.lower_expr(cond, proc, pc);
                    self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![v, Operand::var(end.clone())]));
                }
                pc.break_stack.push(end.clone());
                pc.continue_stack.push(continue_label.clone());
                self.lower_stmt(body, proc, pc);
                pc.continue_stack.pop();
                pc.break_stack.pop();
                self.set_label(proc, pc, continue_label);
                if let Some(step) = step {
                    self.lower_expr(step, proc, pc);
                }
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(header)]));
                self.set_label(proc, pc, end);
            }
            StmtKind::Switch { scrutinee, body } => {
                let (v, _) = self.lower_expr(scrutinee, proc, pc);
                let mut cases = Vec::new();
                collect_cases(body, &mut cases, &mut pc.namegen);
                let mut default_label = None;
                let end = pc.namegen.label();
                for (value, label) in &cases {
                    match value {
                        Some(n) => {
                            let cmp = pc.namegen.temp();
                            self.emit(proc, pc, Instruction::new(Opcode::CmpEq, vec![v.clone(), Operand::Immediate(*n)]).with_result(cmp.clone(), IrType::I8));
                            self.emit(proc, pc, Instruction::new(Opcode::BranchIfNonZero, vec![Operand::var(cmp), Operand::var(label.clone())]));
                        }
                        None => default_label = Some(label.clone()),
                    }
                }
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(default_label.unwrap_or_else(|| end.clone()))]));
                pc.break_stack.push(end.clone());
                let mut queue: std::collections::VecDeque<_> = cases.into_iter().collect();
                self.lower_switch_body(body, proc, pc, &mut queue);
                pc.break_stack.pop();
                self.set_label(proc, pc, end);
            }
            StmtKind::Case { body, .. } | StmtKind::Default { body } => {
                self.lower_stmt(body, proc, pc);
            }
            StmtKind::Label { name, body } => {
                pc.labels.define(name, position_of(stmt.first_tok()), &mut self.diagnostics);
                self.set_label(proc, pc, Rc::from(format!("_user_{name}")));
                self.lower_stmt(body, proc, pc);
            }
            StmtKind::Goto { label } => {
                pc.labels.use_label(label, position_of(stmt.first_tok()));
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(format!("_user_{label}"))]));
            }
            StmtKind::Break => {
                if let Some(target) = pc.break_stack.last().cloned() {
                    self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(target)]));
                } else {
                    self.diagnostics.error(position_of(stmt.first_tok()), "'break' outside a loop or switch".to_string());
                }
            }
            StmtKind::Continue => {
                if let Some(target) = pc.continue_stack.last().cloned() {
                    self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(target)]));
                } else {
                    self.diagnostics.error(position_of(stmt.first_tok()), "'continue' outside a loop".to_string());
                }
            }
            StmtKind::Return { value } => {
                match value {
                    Some(expr) => {
                        let (v, _) = self.lower_expr(expr, proc, pc);
                        self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![v]).with_result(pc.return_slot.clone(), IrType::from_cg(&pc.return_ty)));
                    }
                    None => {}
                }
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(pc.epilogue_label.clone())]));
            }
            StmtKind::Null => {}
            StmtKind::Expr { expr } => {
                self.lower_expr(expr, proc, pc);
            }
            StmtKind::Decl { decl } => self.lower_local_decl(decl, proc, pc),
            StmtKind::Asm { .. } => {
                self.diagnostics.error(position_of(stmt.first_tok()), "inline asm statements are not implemented".to_string());
            }
            StmtKind::LoopMacro { name, .. } => {
                self.diagnostics.error(position_of(stmt.first_tok()), format!("loop macro '{name}' is not implemented"));
            }
        }
    }

    fn lower_if_arm(&mut self, cond: &Expr, then_branch: &Stmt, end_label: &Rc<str>, proc: &mut Procedure, pc: &mut ProcCtx) {
        let next = pc.namegen.label();
        let (v, _) = self.lower_expr(cond, proc, pc);
        self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![v, Operand::var(next.clone())]));
        self.lower_stmt(then_branch, proc, pc);
        self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(end_label.clone())]));
        self.set_label(proc, pc, next);
    }

    fn lower_switch_body(&mut self, stmt: &Stmt, proc: &mut Procedure, pc: &mut ProcCtx, queue: &mut std::collections::VecDeque<(Option<i64>, Rc<str>)>) {
        match &stmt.node {
            StmtKind::Switch { .. } => {
                // A nested switch owns its own cases; lower it normally.
                self.lower_stmt(stmt, proc, pc);
            }
            StmtKind::Block { items } => {
                for item in items {
                    self.lower_switch_body(item, proc, pc, queue);
                }
            }
            StmtKind::Case { value: _, body } => {
                if let Some((_, label)) = queue.pop_front() {
                    self.set_label(proc, pc, label);
                }
                self.lower_switch_body(body, proc, pc, queue);
            }
            StmtKind::Default { body } => {
                if let Some((_, label)) = queue.pop_front() {
                    self.set_label(proc, pc, label);
                }
                self.lower_switch_body(body, proc, pc, queue);
            }
            StmtKind::If { cond, then_branch, else_ifs, else_branch } => {
                // Cases may appear inside conditionals (Duff's-device-like
                // code); lower the shape directly rather than delegating
                // to `lower_stmt`, so labels still come off the shared
                // queue in the order `collect_cases` found them.
                let end_label = pc.namegen.label();
                let next = pc.namegen.label();
                let (v, _) = self.lower_expr(cond, proc, pc);
                self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![v, Operand::var(next.clone())]));
                self.lower_switch_body(then_branch, proc, pc, queue);
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(end_label.clone())]));
                self.set_label(proc, pc, next);
                for arm in else_ifs {
                    let next = pc.namegen.label();
                    let (v, _) = self.lower_expr(&arm.cond, proc, pc);
                    self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![v, Operand::var(next.clone())]));
                    self.lower_switch_body(&arm.then_branch, proc, pc, queue);
                    self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(end_label.clone())]));
                    self.set_label(proc, pc, next);
                }
                if let Some(else_stmt) = else_branch {
                    self.lower_switch_body(else_stmt, proc, pc, queue);
                }
                self.set_label(proc, pc, end_label);
            }
            StmtKind::While { cond, body } => {
                let header = pc.namegen.label();
                let end = pc.namegen.label();
                self.set_label(proc, pc, header.clone());
                let (v, _) = self.lower_expr(cond, proc, pc);
                self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![v, Operand::var(end.clone())]));
                pc.break_stack.push(end.clone());
                pc.continue_stack.push(header.clone());
                self.lower_switch_body(body, proc, pc, queue);
                pc.continue_stack.pop();
                pc.break_stack.pop();
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(header)]));
                self.set_label(proc, pc, end);
            }
            _ => self.lower_stmt(stmt, proc, pc),
        }
    }

    fn lower_local_decl(&mut self, decl: &Decl, proc: &mut Procedure, pc: &mut ProcCtx) {
        let DeclKind::Global { specifiers, declarators, .. } = &decl.node else {
            self.diagnostics.error(position_of(decl.first_tok()), "unsupported local declaration form".to_string());
            return;
        };
        let base = build_base_type(specifiers, &mut self.enums, &mut self.diagnostics);
        for init in declarators {
            let ty = apply_declarator(&init.declarator, base.clone());
            let Some(name) = declarator_name(&init.declarator) else { continue };
            let name_rc: Rc<str> = Rc::from(name.as_str());
            let ir_ty = IrType::from_cg(&ty);
            pc.locals.insert(name_rc.clone(), ty);
            if let Some(init_expr) = &init.initializer {
                let (v, _) = self.lower_expr(init_expr, proc, pc);
                self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![v]).with_result(name_rc, ir_ty));
            }
        }
    }

    /// Lowers an expression, returning the operand holding its value and
    /// the C type that value has (for the caller to apply conversions).
    fn lower_expr(&mut self, expr: &Expr, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        match &expr.node {
            ExprKind::IntLiteral { text } => {
                let v = crate::typebuild::eval_const_int(expr).unwrap_or(0);
                let _ = text;
                (Operand::Immediate(v), CgType::basic(BasicKind::Int))
            }
            ExprKind::CharLiteral { .. } => {
                let v = crate::typebuild::eval_const_int(expr).unwrap_or(0);
                (Operand::Immediate(v), CgType::basic(BasicKind::Char))
            }
            ExprKind::StringLiteral { text } => self.lower_string_literal(text, proc, pc),
            ExprKind::StringConcat { parts } => {
                let joined: String = parts
                    .iter()
                    .map(|p| match &p.node {
                        ExprKind::StringLiteral { text } => text.clone(),
                        _ => String::new(),
                    })
                    .collect();
                self.lower_string_literal(&joined, proc, pc)
            }
            ExprKind::Identifier { name } => {
                let name_rc: Rc<str> = Rc::from(name.as_str());
                if let Some(ty) = pc.locals.get(&name_rc) {
                    (Operand::Var(name_rc), ty.clone())
                } else if let Some(sym) = self.symbols.get(name) {
                    (Operand::Var(name_rc), sym.ty.clone())
                } else {
                    self.diagnostics.error(position_of(expr.first_tok()), format!("undefined identifier '{name}'"));
                    (Operand::Immediate(0), CgType::basic(BasicKind::Int))
                }
            }
            ExprKind::Paren { inner } => self.lower_expr(inner, proc, pc),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(op.clone(), lhs, rhs, expr, proc, pc),
            ExprKind::Conditional { cond, then_branch, else_branch } => {
                let (c, _) = self.lower_expr(cond, proc, pc);
                let else_label = pc.namegen.label();
                let end_label = pc.namegen.label();
                let result = pc.namegen.temp();
                self.emit(proc, pc, Instruction::new(Opcode::BranchIfZero, vec![c, Operand::var(else_label.clone())]));
                let (then_v, then_ty) = self.lower_expr(then_branch, proc, pc);
                let result_ty = IrType::from_cg(&then_ty);
                self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![then_v]).with_result(result.clone(), result_ty));
                self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(end_label.clone())]));
                self.set_label(proc, pc, else_label);
                let (else_v, _) = self.lower_expr(else_branch, proc, pc);
                self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![else_v]).with_result(result.clone(), result_ty));
                self.set_label(proc, pc, end_label);
                (Operand::var(result), then_ty)
            }
            ExprKind::Comma { lhs, rhs } => {
                self.lower_expr(lhs, proc, pc);
                self.lower_expr(rhs, proc, pc)
            }
            ExprKind::Call { callee, args } => self.lower_call(callee, args, proc, pc),
            ExprKind::Index { base, index } => {
                let (addr, base_ty) = self.lower_element_address(base, index, proc, pc);
                let elem_ty = element_type_of(&base_ty);
                let result = pc.namegen.temp();
                let ir_ty = IrType::from_cg(&elem_ty);
                self.emit(proc, pc, Instruction::new(Opcode::Load, vec![addr]).with_result(result.clone(), ir_ty));
                (Operand::var(result), elem_ty)
            }
            ExprKind::Deref { operand } => {
                let (p, pty) = self.lower_expr(operand, proc, pc);
                let elem_ty = element_type_of(&pty);
                let result = pc.namegen.temp();
                let ir_ty = IrType::from_cg(&elem_ty);
                self.emit(proc, pc, Instruction::new(Opcode::Load, vec![p]).with_result(result.clone(), ir_ty));
                (Operand::var(result), elem_ty)
            }
            ExprKind::AddrOf { operand } => {
                let name = match &operand.node {
                    ExprKind::Identifier { name } => name.clone(),
                    _ => {
                        self.diagnostics.error(position_of(expr.first_tok()), "'&' operand is not an addressable lvalue".to_string());
                        return (Operand::Immediate(0), CgType::pointer_to(CgType::basic(BasicKind::Void)));
                    }
                };
                let (_, ty) = self.lower_expr(operand, proc, pc);
                let result = pc.namegen.temp();
                self.emit(proc, pc, Instruction::new(Opcode::AddrOf, vec![Operand::var(name)]).with_result(result.clone(), IrType::I16));
                (Operand::var(result), CgType::pointer_to(ty))
            }
            ExprKind::SizeofExpr { operand } => {
                let (_, ty) = self.lower_expr(operand, proc, pc);
                let size = ty.size_of().unwrap_or(0) as i64;
                (Operand::Immediate(size), CgType::basic(BasicKind::UnsignedLong))
            }
            ExprKind::SizeofType { type_name, abstract_declarator } => {
                let base = build_base_type(type_name, &mut self.enums, &mut self.diagnostics);
                let ty = match abstract_declarator {
                    Some(d) => apply_declarator(d, base),
                    None => base,
                };
                let size = ty.size_of().unwrap_or(0) as i64;
                (Operand::Immediate(size), CgType::basic(BasicKind::UnsignedLong))
            }
            ExprKind::Cast { type_name, abstract_declarator, operand } => {
                let base = build_base_type(type_name, &mut self.enums, &mut self.diagnostics);
                let target = match abstract_declarator {
                    Some(d) => apply_declarator(d, base),
                    None => base,
                };
                let (v, source_ty) = self.lower_expr(operand, proc, pc);
                let result = self.lower_convert(v, &source_ty, &target, proc, pc);
                (result, target)
            }
            ExprKind::CompoundLiteral { .. } => {
                self.diagnostics.error(position_of(expr.first_tok()), "compound literals are not implemented".to_string());
                (Operand::Immediate(0), CgType::basic(BasicKind::Int))
            }
            ExprKind::Member { base, field } => self.lower_member(base, field, false, proc, pc),
            ExprKind::IndirectMember { base, field } => self.lower_member(base, field, true, proc, pc),
            ExprKind::Unary { op, operand } => {
                let (v, ty) = self.lower_expr(operand, proc, pc);
                match op {
                    UnaryKind::Plus => (v, ty),
                    UnaryKind::Minus => {
                        let result = pc.namegen.temp();
                        let ir_ty = IrType::from_cg(&ty);
                        self.emit(proc, pc, Instruction::new(Opcode::Neg, vec![v]).with_result(result.clone(), ir_ty));
                        (Operand::var(result), ty)
                    }
                    UnaryKind::BitwiseNot => {
                        let result = pc.namegen.temp();
                        let ir_ty = IrType::from_cg(&ty);
                        self.emit(proc, pc, Instruction::new(Opcode::Not, vec![v]).with_result(result.clone(), ir_ty));
                        (Operand::var(result), ty)
                    }
                    UnaryKind::LogicalNot => {
                        let result = pc.namegen.temp();
                        self.emit(proc, pc, Instruction::new(Opcode::LogNot, vec![v]).with_result(result.clone(), IrType::I8));
                        (Operand::var(result), CgType::basic(BasicKind::Int))
                    }
                }
            }
            ExprKind::Adjust { op, operand } => self.lower_adjust(op.clone(), operand, proc, pc),
        }
    }

    fn lower_string_literal(&mut self, text: &str, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        let name: Rc<str> = Rc::from(format!("__str{}", self.string_count));
        self.string_count += 1;
        let mut data: Vec<DataEntry> = text.bytes().map(|b| DataEntry { ty: IrType::I8, value: b as i64 }).collect();
        data.push(DataEntry { ty: IrType::I8, value: 0 });
        self.module.add(IrDecl::Variable(Variable { name: name.clone(), data }));
        let result = pc.namegen.temp();
        self.emit(proc, pc, Instruction::new(Opcode::AddrOf, vec![Operand::var(name)]).with_result(result.clone(), IrType::I16));
        (Operand::var(result), CgType::pointer_to(CgType::basic(BasicKind::Char)))
    }

    fn lower_binary(&mut self, op: BinOpKind, lhs: &Expr, rhs: &Expr, expr: &Expr, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        use BinOpKind::*;
        match op {
            Assign => {
                let (rv, rty) = self.lower_expr(rhs, proc, pc);
                self.lower_store(lhs, rv, &rty, proc, pc)
            }
            LogAnd | LogOr => self.lower_short_circuit(op, lhs, rhs, proc, pc),
            AddAssign | SubAssign | MulAssign | DivAssign | ModAssign | AndAssign | OrAssign | XorAssign | ShlAssign | ShrAssign => {
                let base_op = compound_to_binop(op);
                let (lv, lty) = self.lower_expr(lhs, proc, pc);
                let (rv, _) = self.lower_expr(rhs, proc, pc);
                let opcode = arith_opcode(base_op, is_unsigned(&lty));
                let result = pc.namegen.temp();
                let ir_ty = IrType::from_cg(&lty);
                self.emit(proc, pc, Instruction::new(opcode, vec![lv, rv]).with_result(result.clone(), ir_ty));
                self.lower_store(lhs, Operand::var(result), &lty, proc, pc)
            }
            _ => {
                let (lv, lty) = self.lower_expr(lhs, proc, pc);
                let (rv, rty) = self.lower_expr(rhs, proc, pc);
                let common = wider_of(&lty, &rty);
                let lv = self.lower_convert(lv, &lty, &common, proc, pc);
                let rv = self.lower_convert(rv, &rty, &common, proc, pc);
                let unsigned = is_unsigned(&common);
                let (opcode, result_ty) = match op {
                    Add => (Opcode::Add, common.clone()),
                    Sub => (Opcode::Sub, common.clone()),
                    Mul => (Opcode::Mul, common.clone()),
                    Div => (if unsigned { Opcode::UDiv } else { Opcode::Div }, common.clone()),
                    Mod => (if unsigned { Opcode::UMod } else { Opcode::Mod }, common.clone()),
                    Shl => (Opcode::Shl, lty.clone()),
                    Shr => (if is_unsigned(&lty) { Opcode::Shr } else { Opcode::AShr }, lty.clone()),
                    BitAnd => (Opcode::And, common.clone()),
                    BitOr => (Opcode::Or, common.clone()),
                    BitXor => (Opcode::Xor, common.clone()),
                    Eq => (Opcode::CmpEq, CgType::basic(BasicKind::Int)),
                    Ne => (Opcode::CmpNe, CgType::basic(BasicKind::Int)),
                    Lt => (if unsigned { Opcode::CmpLtU } else { Opcode::CmpLt }, CgType::basic(BasicKind::Int)),
                    Gt => (if unsigned { Opcode::CmpGtU } else { Opcode::CmpGt }, CgType::basic(BasicKind::Int)),
                    Le => (if unsigned { Opcode::CmpLeU } else { Opcode::CmpLe }, CgType::basic(BasicKind::Int)),
                    Ge => (if unsigned { Opcode::CmpGeU } else { Opcode::CmpGe }, CgType::basic(BasicKind::Int)),
                    _ => unreachable!(),
                };
                let _ = expr;
                let result = pc.namegen.temp();
                let ir_ty = IrType::from_cg(&result_ty);
                self.emit(proc, pc, Instruction::new(opcode, vec![lv, rv]).with_result(result.clone(), ir_ty));
                (Operand::var(result), result_ty)
            }
        }
    }

    fn lower_short_circuit(&mut self, op: BinOpKind, lhs: &Expr, rhs: &Expr, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        let result = pc.namegen.temp();
        let short_circuit_label = pc.namegen.label();
        let end_label = pc.namegen.label();
        let (lv, _) = self.lower_expr(lhs, proc, pc);
        let short_circuit_value = if op == BinOpKind::LogAnd { 0 } else { 1 };
        let branch_op = if op == BinOpKind::LogAnd { Opcode::BranchIfZero } else { Opcode::BranchIfNonZero };
        self.emit(proc, pc, Instruction::new(branch_op, vec![lv, Operand::var(short_circuit_label.clone())]));
        let (rv, _) = self.lower_expr(rhs, proc, pc);
        let normalized = pc.namegen.temp();
        self.emit(proc, pc, Instruction::new(Opcode::LogNot, vec![rv.clone()]).with_result(normalized.clone(), IrType::I8));
        self.emit(proc, pc, Instruction::new(Opcode::LogNot, vec![Operand::var(normalized)]).with_result(result.clone(), IrType::I8));
        self.emit(proc, pc, Instruction::new(Opcode::Jump, vec![Operand::var(end_label.clone())]));
        self.set_label(proc, pc, short_circuit_label);
        self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![Operand::Immediate(short_circuit_value)]).with_result(result.clone(), IrType::I8));
        self.set_label(proc, pc, end_label);
        (Operand::var(result), CgType::basic(BasicKind::Int))
    }

    fn lower_adjust(&mut self, op: AdjustKind, operand: &Expr, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        let (v, ty) = self.lower_expr(operand, proc, pc);
        let step = match &ty.kind {
            CgTypeKind::Pointer(inner) => inner.size_of().unwrap_or(1) as i64,
            _ => 1,
        };
        let is_inc = matches!(op, AdjustKind::PreIncrement | AdjustKind::PostIncrement);
        let opcode = if is_inc { Opcode::Add } else { Opcode::Sub };
        let updated = pc.namegen.temp();
        let ir_ty = IrType::from_cg(&ty);
        self.emit(proc, pc, Instruction::new(opcode, vec![v.clone(), Operand::Immediate(step)]).with_result(updated.clone(), ir_ty));
        let (stored, _) = self.lower_store(operand, Operand::var(updated.clone()), &ty, proc, pc);
        match op {
            AdjustKind::PreIncrement | AdjustKind::PreDecrement => (stored, ty),
            AdjustKind::PostIncrement | AdjustKind::PostDecrement => (v, ty),
        }
    }

    fn lower_store(&mut self, target: &Expr, value: Operand, ty: &CgType, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        match &target.node {
            ExprKind::Identifier { name } => {
                let name_rc: Rc<str> = Rc::from(name.as_str());
                let ir_ty = IrType::from_cg(ty);
                self.emit(proc, pc, Instruction::new(Opcode::Mov, vec![value]).with_result(name_rc.clone(), ir_ty));
                (Operand::var(name_rc), ty.clone())
            }
            ExprKind::Deref { operand } => {
                let (p, _) = self.lower_expr(operand, proc, pc);
                let ir_ty = IrType::from_cg(ty);
                self.emit(proc, pc, Instruction::new(Opcode::Store, vec![p, value.clone()]).with_ty(ir_ty));
                (value, ty.clone())
            }
            ExprKind::Index { base, index } => {
                let (addr, base_ty) = self.lower_element_address(base, index, proc, pc);
                let ir_ty = IrType::from_cg(&element_type_of(&base_ty));
                self.emit(proc, pc, Instruction::new(Opcode::Store, vec![addr, value.clone()]).with_ty(ir_ty));
                (value, ty.clone())
            }
            ExprKind::Paren { inner } => self.lower_store(inner, value, ty, proc, pc),
            _ => {
                self.diagnostics.error(position_of(target.first_tok()), "left-hand side of assignment is not an lvalue".to_string());
                (value, ty.clone())
            }
        }
    }

    fn lower_element_address(&mut self, base: &Expr, index: &Expr, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        let (base_v, base_ty) = self.lower_expr(base, proc, pc);
        let (index_v, _) = self.lower_expr(index, proc, pc);
        let elem_size = element_type_of(&base_ty).size_of().unwrap_or(1) as i64;
        let scaled = pc.namegen.temp();
        self.emit(proc, pc, Instruction::new(Opcode::Mul, vec![index_v, Operand::Immediate(elem_size)]).with_result(scaled.clone(), IrType::I16));
        let addr = pc.namegen.temp();
        self.emit(proc, pc, Instruction::new(Opcode::Add, vec![base_v, Operand::var(scaled)]).with_result(addr.clone(), IrType::I16));
        (Operand::var(addr), base_ty)
    }

    fn lower_member(&mut self, base: &Expr, field: &str, indirect: bool, proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        let (base_v, base_ty) = self.lower_expr(base, proc, pc);
        let record_ty = if indirect { element_type_of(&base_ty) } else { base_ty };
        let member = match &record_ty.kind {
            CgTypeKind::Record { members: Some(members), .. } => members.iter().find(|m| m.name == field),
            _ => None,
        };
        let Some(member) = member else {
            self.diagnostics.error(position_of(base.first_tok()), format!("no member named '{field}'"));
            return (Operand::Immediate(0), CgType::basic(BasicKind::Int));
        };
        let offset = member.offset.unwrap_or(0) as i64;
        let field_ty = member.ty.clone();
        let addr = if offset == 0 {
            base_v
        } else {
            let a = pc.namegen.temp();
            self.emit(proc, pc, Instruction::new(Opcode::Add, vec![base_v, Operand::Immediate(offset)]).with_result(a.clone(), IrType::I16));
            Operand::var(a)
        };
        let result = pc.namegen.temp();
        let ir_ty = IrType::from_cg(&field_ty);
        self.emit(proc, pc, Instruction::new(Opcode::Load, vec![addr]).with_result(result.clone(), ir_ty));
        (Operand::var(result), field_ty)
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], proc: &mut Procedure, pc: &mut ProcCtx) -> (Operand, CgType) {
        let ExprKind::Identifier { name } = &callee.node else {
            self.diagnostics.error(position_of(callee.first_tok()), "only direct calls to named functions are supported".to_string());
            return (Operand::Immediate(0), CgType::basic(BasicKind::Int));
        };
        let (variadic, ret_ty) = match self.symbols.get(name).map(|s| s.ty.clone()) {
            Some(CgType { kind: CgTypeKind::Function { ret, variadic, .. }, .. }) => (variadic, (*ret).clone()),
            _ => {
                self.diagnostics.error(position_of(callee.first_tok()), format!("call to undeclared function '{name}'"));
                (false, CgType::basic(BasicKind::Int))
            }
        };
        let arg_operands: Vec<Operand> = args.iter().map(|a| self.lower_expr(a, proc, pc).0).collect();
        let mut operands = vec![Operand::var(Rc::from(name.as_str()))];
        operands.push(Operand::List(arg_operands));
        let opcode = if variadic { Opcode::CallVariadic } else { Opcode::Call };
        if ret_ty.is_void() {
            self.emit(proc, pc, Instruction::new(opcode, operands));
            (Operand::Immediate(0), ret_ty)
        } else {
            let result = pc.namegen.temp();
            let ir_ty = IrType::from_cg(&ret_ty);
            self.emit(proc, pc, Instruction::new(opcode, operands).with_result(result.clone(), ir_ty));
            (Operand::var(result), ret_ty)
        }
    }

    fn lower_convert(&mut self, v: Operand, from: &CgType, to: &CgType, proc: &mut Procedure, pc: &mut ProcCtx) -> Operand {
        let from_ir = IrType::from_cg(from);
        let to_ir = IrType::from_cg(to);
        if from_ir.width() == to_ir.width() {
            return v;
        }
        let opcode = if from_ir.width() > to_ir.width() {
            Opcode::Trunc
        } else if is_unsigned(from) {
            Opcode::ZExt
        } else {
            Opcode::SExt
        };
        let result = pc.namegen.temp();
        self.emit(proc, pc, Instruction::new(opcode, vec![v]).with_result(result.clone(), to_ir));
        Operand::var(result)
    }
}

struct ProcCtx {
    namegen: NameGen,
    labels: LabelScope,
    locals: HashMap<Rc<str>, CgType>,
    break_stack: Vec<Rc<str>>,
    continue_stack: Vec<Rc<str>>,
    pending_label: Option<Rc<str>>,
    epilogue_label: Rc<str>,
    return_slot: Rc<str>,
    return_ty: CgType,
    is_void_return: bool,
}

fn storage_class_of(spec: &Specifier) -> Option<StorageClass> {
    match &spec.node {
        zx_parser::ast::SpecifierKind::DeclarationSpecifiers { storage, .. } => storage.first().cloned(),
        _ => None,
    }
}

fn is_unsigned(ty: &CgType) -> bool {
    matches!(&ty.kind, CgTypeKind::Basic(b) if b.is_unsigned()) || matches!(&ty.kind, CgTypeKind::Pointer(_))
}

fn wider_of(a: &CgType, b: &CgType) -> CgType {
    let (Some(sa), Some(sb)) = (a.size_of(), b.size_of()) else { return a.clone() };
    if sa >= sb {
        a.clone()
    } else {
        b.clone()
    }
}

fn element_type_of(ty: &CgType) -> CgType {
    match &ty.kind {
        CgTypeKind::Pointer(inner) | CgTypeKind::Array { element: inner, .. } => (**inner).clone(),
        _ => CgType::basic(BasicKind::Int),
    }
}

fn compound_to_binop(op: BinOpKind) -> BinOpKind {
    use BinOpKind::*;
    match op {
        AddAssign => Add,
        SubAssign => Sub,
        MulAssign => Mul,
        DivAssign => Div,
        ModAssign => Mod,
        AndAssign => BitAnd,
        OrAssign => BitOr,
        XorAssign => BitXor,
        ShlAssign => Shl,
        ShrAssign => Shr,
        other => other,
    }
}

fn arith_opcode(op: BinOpKind, unsigned: bool) -> Opcode {
    use BinOpKind::*;
    match op {
        Add => Opcode::Add,
        Sub => Opcode::Sub,
        Mul => Opcode::Mul,
        Div => if unsigned { Opcode::UDiv } else { Opcode::Div },
        Mod => if unsigned { Opcode::UMod } else { Opcode::Mod },
        BitAnd => Opcode::And,
        BitOr => Opcode::Or,
        BitXor => Opcode::Xor,
        Shl => Opcode::Shl,
        Shr => if unsigned { Opcode::Shr } else { Opcode::AShr },
        _ => Opcode::Mov,
    }
}

/// Descends through the pointer/array/paren wrappers a function's own
/// declarator can carry (`char *f(int x)`, `int (*f(void))[3]`) to the
/// `Function` node that actually carries the parameter list.
fn find_function_node(decl: &Declarator) -> Option<&Declarator> {
    match &decl.node {
        DeclaratorKind::Function { .. } => Some(decl),
        DeclaratorKind::Pointer { inner, .. } | DeclaratorKind::Paren { inner } | DeclaratorKind::Array { inner, .. } => {
            find_function_node(inner)
        }
        DeclaratorKind::Identifier { .. } | DeclaratorKind::NoIdentifier => None,
    }
}

/// Collects `case`/`default` labels in the order a depth-first walk of the
/// switch body encounters them, stopping at a nested switch's own body.
fn collect_cases(stmt: &Stmt, out: &mut Vec<(Option<i64>, Rc<str>)>, namegen: &mut NameGen) {
    match &stmt.node {
        StmtKind::Switch { .. } => {}
        StmtKind::Block { items } => {
            for item in items {
                collect_cases(item, out, namegen);
            }
        }
        StmtKind::Case { value, body } => {
            let v = eval_const_int(value).unwrap_or(0);
            out.push((Some(v), namegen.label()));
            collect_cases(body, out, namegen);
        }
        StmtKind::Default { body } => {
            out.push((None, namegen.label()));
            collect_cases(body, out, namegen);
        }
        StmtKind::If { then_branch, else_ifs, else_branch, .. } => {
            collect_cases(then_branch, out, namegen);
            for arm in else_ifs {
                collect_cases(&arm.then_branch, out, namegen);
            }
            if let Some(e) = else_branch {
                collect_cases(e, out, namegen);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::Label { body, .. } => collect_cases(body, out, namegen),
        StmtKind::For { body, .. } => collect_cases(body, out, namegen),
        _ => {}
    }
}

/// Conservative "every path through this statement hits a return"
/// check used for the missing-return diagnostic; false negatives (real
/// returns it fails to recognize) are acceptable, false positives are not,
/// so anything structurally unclear (switch, goto-based flow) counts as
/// not returning.
fn always_returns(stmt: &Stmt) -> bool {
    match &stmt.node {
        StmtKind::Return { .. } => true,
        StmtKind::Block { items } => items.last().is_some_and(always_returns),
        StmtKind::If { then_branch, else_ifs, else_branch, .. } => {
            let Some(else_branch) = else_branch else { return false };
            always_returns(then_branch) && else_ifs.iter().all(|a| always_returns(&a.then_branch)) && always_returns(else_branch)
        }
        StmtKind::Label { body, .. } => always_returns(body),
        _ => false,
    }
}
