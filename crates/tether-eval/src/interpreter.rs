//! The interpreter: persistent session state plus the statement walker.

use std::collections::HashSet;
use std::io::Write;
use std::rc::Rc;

use tether_types::ast::*;
use tracing::debug;

use crate::builtins;
use crate::env::{new_scope, Environment, Frame};
use crate::error::{EvalError, EvalResult, ExcKind, TraceFrame};
use crate::ops;
use crate::value::{Builtin, CallArgs, Function, FunctionBody, ParamSpec, Value};

/// Limits and naming for one interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Name reported in tracebacks.
    pub filename: String,
    /// Evaluation steps allowed per unit; `None` disables the budget.
    pub step_limit: Option<u64>,
    /// Deepest allowed chain of user-function calls.
    pub recursion_limit: u32,
    /// Bytes of native stack one unit may use. Reaching it raises
    /// `RecursionError` however shallow the call chain is, so evaluation
    /// fits on a 2 MiB thread.
    pub stack_limit: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            filename: "<console>".into(),
            step_limit: Some(10_000_000),
            recursion_limit: 200,
            stack_limit: 1024 * 1024,
        }
    }
}

/// A Tether interpreter holding one session's environment.
pub struct Interpreter {
    env: Environment,
    config: InterpreterConfig,
}

impl Interpreter {
    /// Create an interpreter with the standard builtins installed.
    pub fn new(config: InterpreterConfig) -> Self {
        let mut env = Environment::new();
        builtins::install(&mut env);
        Self { env, config }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Register an additional native function.
    pub fn define_builtin(
        &mut self,
        name: &str,
        func: impl Fn(&mut dyn Write, CallArgs) -> EvalResult<Value> + 'static,
    ) {
        self.env.define_builtin(Builtin::new(name, func));
    }

    /// Evaluate one expression unit and return its value.
    pub fn eval_expression(&mut self, expr: &Expr, out: &mut dyn Write) -> EvalResult<Value> {
        let mut exec = Exec::new(&mut self.env, &self.config, out);
        exec.set_line(expr.span.start_line);
        let result = exec.eval(expr);
        exec.finish(result)
    }

    /// Execute a statement unit for its effects.
    ///
    /// Effects made before a fault are kept.
    pub fn exec_statements(&mut self, stmts: &[Stmt], out: &mut dyn Write) -> EvalResult<()> {
        let mut exec = Exec::new(&mut self.env, &self.config, out);
        let result = exec.exec_block(stmts).map(|_| ());
        exec.finish(result)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Tree Walker
// ══════════════════════════════════════════════════════════════════════════════

/// How a statement finished.
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Position of one active frame, kept for tracebacks.
struct StackEntry {
    scope: String,
    line: u32,
}

/// Evaluation state for a single unit.
pub(crate) struct Exec<'a> {
    pub(crate) env: &'a mut Environment,
    config: &'a InterpreterConfig,
    pub(crate) out: &'a mut dyn Write,
    steps: u64,
    /// Stack position when the unit started.
    stack_base: usize,
    /// User-function activations, innermost last.
    pub(crate) frames: Vec<Frame>,
    stack: Vec<StackEntry>,
}

impl<'a> Exec<'a> {
    fn new(env: &'a mut Environment, config: &'a InterpreterConfig, out: &'a mut dyn Write) -> Self {
        Self {
            env,
            config,
            out,
            steps: 0,
            stack_base: stack_position(),
            frames: Vec::new(),
            stack: vec![StackEntry {
                scope: "<module>".into(),
                line: 1,
            }],
        }
    }

    fn finish<T>(&mut self, result: EvalResult<T>) -> EvalResult<T> {
        debug!(steps = self.steps, ok = result.is_ok(), "unit evaluated");
        result.map_err(|err| self.attach_traceback(err))
    }

    /// Consume one evaluation step.
    pub(crate) fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        match self.config.step_limit {
            Some(limit) if self.steps > limit => {
                Err(EvalError::new(ExcKind::RuntimeError, "step limit exceeded"))
            }
            _ => self.check_stack(),
        }
    }

    fn check_stack(&self) -> EvalResult<()> {
        if self.stack_base.abs_diff(stack_position()) > self.config.stack_limit {
            return Err(recursion_error());
        }
        Ok(())
    }

    fn set_line(&mut self, line: u32) {
        if let Some(top) = self.stack.last_mut() {
            top.line = line;
        }
    }

    /// Record the current stack on a fault that has none yet.
    fn attach_traceback(&self, err: EvalError) -> EvalError {
        match err {
            EvalError::Fault(mut fault) if fault.traceback.is_empty() => {
                fault.traceback = self
                    .stack
                    .iter()
                    .map(|entry| TraceFrame {
                        file: self.config.filename.clone(),
                        line: entry.line,
                        scope: entry.scope.clone(),
                    })
                    .collect();
                EvalError::Fault(fault)
            }
            other => other,
        }
    }

    // ── Statements ───────────────────────────────────────────────────────

    pub(crate) fn exec_block(&mut self, stmts: &[Stmt]) -> EvalResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EvalResult<Flow> {
        self.tick()?;
        self.set_line(stmt.span.start_line);
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign(target, value.clone())?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.exec_aug_assign(target, *op, value)?,
            StmtKind::Pass | StmtKind::Global(_) => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Del(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
            }
            StmtKind::Assert { test, message } => {
                if !self.eval(test)?.is_truthy() {
                    let message = match message {
                        Some(expr) => self.eval(expr)?.try_to_str()?,
                        None => String::new(),
                    };
                    return Err(EvalError::new(ExcKind::AssertionError, message));
                }
            }
            StmtKind::If(if_stmt) => {
                return if self.eval(&if_stmt.test)?.is_truthy() {
                    self.exec_block(&if_stmt.body)
                } else {
                    self.exec_block(&if_stmt.orelse)
                };
            }
            StmtKind::While(while_stmt) => {
                while self.eval(&while_stmt.test)?.is_truthy() {
                    match self.exec_block(&while_stmt.body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::For(for_stmt) => {
                let iterable = self.eval(&for_stmt.iter)?;
                for item in ops::iterate(&iterable)? {
                    self.tick()?;
                    self.assign(&for_stmt.target, item)?;
                    match self.exec_block(&for_stmt.body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::Def(def) => {
                let function = self.make_function(def)?;
                self.store(&def.name.name, Value::Function(Rc::new(function)));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_aug_assign(&mut self, target: &Target, op: BinOp, value: &Expr) -> EvalResult<()> {
        match target {
            Target::Name(ident) => {
                let current = self.load(&ident.name)?;
                let rhs = self.eval(value)?;
                let result = self.augmented(op, current, &rhs)?;
                self.store(&ident.name, result);
                Ok(())
            }
            Target::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval_target_index(index)?;
                let current = ops::get_item(&object, &index)?;
                let rhs = self.eval(value)?;
                let result = self.augmented(op, current, &rhs)?;
                ops::set_item(&object, &index, result)
            }
            Target::Tuple(_, _) => Err(EvalError::type_error(
                "illegal expression for augmented assignment",
            )),
        }
    }

    /// `+=` on a list extends it in place; everything else rebinds.
    fn augmented(&mut self, op: BinOp, current: Value, rhs: &Value) -> EvalResult<Value> {
        if let (BinOp::Add, Value::List(items)) = (op, &current) {
            let extra = ops::collect(rhs)?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        ops::binary_op(op, &current, rhs)
    }

    // ── Binding ──────────────────────────────────────────────────────────

    /// Bind a value to an assignment target.
    pub(crate) fn assign(&mut self, target: &Target, value: Value) -> EvalResult<()> {
        match target {
            Target::Name(ident) => {
                self.store(&ident.name, value);
                Ok(())
            }
            Target::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval_target_index(index)?;
                ops::set_item(&object, &index, value)
            }
            Target::Tuple(targets, _) => {
                let items = ops::collect(&value)?;
                if items.len() != targets.len() {
                    let message = if items.len() > targets.len() {
                        format!("too many values to unpack (expected {})", targets.len())
                    } else {
                        format!(
                            "not enough values to unpack (expected {}, got {})",
                            targets.len(),
                            items.len()
                        )
                    };
                    return Err(EvalError::value_error(message));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
        }
    }

    /// Index of a subscript target; slices cannot be assigned to.
    fn eval_target_index(&mut self, index: &Expr) -> EvalResult<Value> {
        if let ExprKind::Slice { .. } = index.kind {
            return Err(EvalError::type_error("slice assignment is not supported"));
        }
        self.eval(index)
    }

    fn delete(&mut self, target: &Target) -> EvalResult<()> {
        match target {
            Target::Name(ident) => {
                let name = ident.name.as_str();
                let removed = if let Some(frame) = self.local_frame(name) {
                    let mut locals = frame.locals.borrow_mut();
                    locals.remove(name)
                } else {
                    self.env.remove(name)
                };
                removed.map(|_| ()).ok_or_else(|| self.unbound(name))
            }
            Target::Subscript { object, index } => {
                let object = self.eval(object)?;
                let index = self.eval_target_index(index)?;
                ops::del_item(&object, &index)
            }
            Target::Tuple(targets, _) => targets.iter().try_for_each(|t| self.delete(t)),
        }
    }

    /// The innermost frame, if `name` is one of its locals.
    fn local_frame(&self, name: &str) -> Option<&Frame> {
        self.frames.last().filter(|frame| {
            frame.function.locals.contains(name) && !frame.function.globals.contains(name)
        })
    }

    pub(crate) fn store(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.local_frame(name) {
            frame.locals.borrow_mut().insert(name.to_string(), value);
        } else {
            self.env.define(name, value);
        }
    }

    /// Resolve a name: locals, enclosing functions, globals, builtins.
    pub(crate) fn load(&self, name: &str) -> EvalResult<Value> {
        if let Some(frame) = self.frames.last() {
            if let Some(found) = frame.locals.borrow().get(name) {
                return Ok(found.clone());
            }
            if self.local_frame(name).is_some() {
                return Err(self.unbound(name));
            }
            if !frame.function.globals.contains(name) {
                for scope in frame.function.enclosing.iter().rev() {
                    if let Some(found) = scope.borrow().get(name) {
                        return Ok(found.clone());
                    }
                }
            }
        }
        self.env.get(name).cloned().ok_or_else(|| self.unbound(name))
    }

    fn unbound(&self, name: &str) -> EvalError {
        if self.local_frame(name).is_some() {
            EvalError::new(
                ExcKind::UnboundLocalError,
                format!("local variable '{name}' referenced before assignment"),
            )
        } else {
            EvalError::new(ExcKind::NameError, format!("name '{name}' is not defined"))
        }
    }

    // ── Functions ────────────────────────────────────────────────────────

    fn make_function(&mut self, def: &FuncDef) -> EvalResult<Function> {
        let params = self.eval_params(&def.params)?;
        let mut locals: HashSet<String> = params.iter().map(|p| p.name.clone()).collect();
        let mut globals = HashSet::new();
        collect_bindings(&def.body, &mut locals, &mut globals);
        locals.retain(|name| !globals.contains(name));
        Ok(Function {
            name: def.name.name.clone(),
            params,
            body: FunctionBody::Block(def.body.clone().into()),
            locals,
            globals,
            enclosing: self.enclosing_scopes(),
        })
    }

    pub(crate) fn make_lambda(&mut self, params: &[Param], body: &Expr) -> EvalResult<Function> {
        let params = self.eval_params(params)?;
        Ok(Function {
            name: "<lambda>".into(),
            locals: params.iter().map(|p| p.name.clone()).collect(),
            params,
            body: FunctionBody::Expr(Rc::new(body.clone())),
            globals: HashSet::new(),
            enclosing: self.enclosing_scopes(),
        })
    }

    fn eval_params(&mut self, params: &[Param]) -> EvalResult<Vec<ParamSpec>> {
        params
            .iter()
            .map(|p| {
                let default = p.default.as_ref().map(|d| self.eval(d)).transpose()?;
                Ok(ParamSpec {
                    name: p.name.name.clone(),
                    default,
                })
            })
            .collect()
    }

    fn enclosing_scopes(&self) -> Vec<crate::env::Scope> {
        match self.frames.last() {
            Some(frame) => {
                let mut scopes = frame.function.enclosing.clone();
                scopes.push(frame.locals.clone());
                scopes
            }
            None => Vec::new(),
        }
    }

    /// Invoke a user function with evaluated arguments.
    pub(crate) fn call_function(&mut self, function: &Rc<Function>, args: CallArgs) -> EvalResult<Value> {
        if self.frames.len() >= self.config.recursion_limit as usize {
            return Err(recursion_error());
        }
        self.check_stack()?;
        let locals = new_scope();
        bind_arguments(function, args, &mut locals.borrow_mut())?;

        let line = match &function.body {
            FunctionBody::Expr(expr) => expr.span.start_line,
            FunctionBody::Block(body) => body.first().map_or(1, |s| s.span.start_line),
        };
        self.frames.push(Frame {
            locals,
            function: Rc::clone(function),
        });
        self.stack.push(StackEntry {
            scope: function.name.clone(),
            line,
        });

        let result = match &function.body {
            FunctionBody::Expr(expr) => self.eval(expr),
            FunctionBody::Block(body) => self.exec_block(body).map(|flow| match flow {
                Flow::Return(value) => value,
                _ => Value::None,
            }),
        };
        let result = result.map_err(|err| self.attach_traceback(err));

        self.stack.pop();
        self.frames.pop();
        result
    }
}

fn recursion_error() -> EvalError {
    EvalError::new(ExcKind::RecursionError, "maximum recursion depth exceeded")
}

/// Address of a local in a fresh frame. Only differences between two
/// positions are meaningful.
#[inline(never)]
fn stack_position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// Match call arguments to parameters.
fn bind_arguments(
    function: &Function,
    args: CallArgs,
    locals: &mut std::collections::HashMap<String, Value>,
) -> EvalResult<()> {
    let name = &function.name;
    let params = &function.params;
    if args.positional.len() > params.len() {
        let noun = if params.len() == 1 { "argument" } else { "arguments" };
        return Err(EvalError::type_error(format!(
            "{name}() takes {} positional {noun} but {} were given",
            params.len(),
            args.positional.len()
        )));
    }
    for (param, value) in params.iter().zip(args.positional) {
        locals.insert(param.name.clone(), value);
    }
    for (key, value) in args.keywords {
        if !params.iter().any(|p| p.name == key) {
            return Err(EvalError::type_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            )));
        }
        if locals.contains_key(&key) {
            return Err(EvalError::type_error(format!(
                "{name}() got multiple values for argument '{key}'"
            )));
        }
        locals.insert(key, value);
    }
    let mut missing = Vec::new();
    for param in params {
        if locals.contains_key(&param.name) {
            continue;
        }
        match &param.default {
            Some(default) => {
                locals.insert(param.name.clone(), default.clone());
            }
            None => missing.push(format!("'{}'", param.name)),
        }
    }
    if !missing.is_empty() {
        let noun = if missing.len() == 1 { "argument" } else { "arguments" };
        return Err(EvalError::type_error(format!(
            "{name}() missing {} required positional {noun}: {}",
            missing.len(),
            missing.join(" and ")
        )));
    }
    Ok(())
}

/// Gather the names a function body binds, and its `global` declarations.
/// Nested `def` bodies are not entered; their names are.
fn collect_bindings(stmts: &[Stmt], locals: &mut HashSet<String>, globals: &mut HashSet<String>) {
    fn bind(target: &Target, locals: &mut HashSet<String>) {
        let mut names = Vec::new();
        target.bound_names(&mut names);
        locals.extend(names.into_iter().map(String::from));
    }
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { targets, .. } => targets.iter().for_each(|t| bind(t, locals)),
            StmtKind::AugAssign { target, .. } => bind(target, locals),
            StmtKind::Del(targets) => targets.iter().for_each(|t| bind(t, locals)),
            StmtKind::Global(names) => globals.extend(names.iter().map(|n| n.name.clone())),
            StmtKind::Def(def) => {
                locals.insert(def.name.name.clone());
            }
            StmtKind::If(if_stmt) => {
                collect_bindings(&if_stmt.body, locals, globals);
                collect_bindings(&if_stmt.orelse, locals, globals);
            }
            StmtKind::While(while_stmt) => collect_bindings(&while_stmt.body, locals, globals),
            StmtKind::For(for_stmt) => {
                bind(&for_stmt.target, locals);
                collect_bindings(&for_stmt.body, locals, globals);
            }
            _ => {}
        }
    }
}
