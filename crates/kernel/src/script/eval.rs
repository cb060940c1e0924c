// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Tree-walking evaluator. Runs with the database write lock held; one
//! execution is one environment, seeded with the standard bindings plus
//! whatever the invoker passed, and thrown away afterwards.
//!
//! `db` and `game` are not values: they are names whose methods are wired
//! straight to the database and the scheduler, and mentioning them bare is
//! a name error.

use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

use morel_common::{ActionFailed, Kind, Lambda, ObjId, Object, Val};
use tracing::debug;

use crate::game::Event;
use crate::world::World;

use super::ast::{BinOp, Expr, Stmt, Target};
use super::{ScriptCtx, ScriptError, parse_program};

// Scripts can call lambdas that call lambdas, and handlers can dispatch
// events that run handlers. The chain is cut well before the stack is.
const MAX_SCRIPT_DEPTH: usize = 64;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard, ScriptError> {
        DEPTH.with(|d| {
            if d.get() >= MAX_SCRIPT_DEPTH {
                return Err(ScriptError::Value(
                    "maximum script recursion depth exceeded".to_string(),
                ));
            }
            d.set(d.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// Parse and run `code` with the standard environment plus `extra`
/// bindings. Returns the value of the last statement.
pub fn run_program(
    ctx: &mut ScriptCtx<'_, '_>,
    code: &str,
    extra: &[(&str, Val)],
) -> Result<Val, ScriptError> {
    let _depth = DepthGuard::enter()?;
    let stmts = parse_program(code)?;
    let mut interp = Interp::new(ctx, extra);
    interp.eval_stmts(&stmts)
}

/// Evaluate a lambda value: its captured environment layered over the
/// standard bindings of the current context.
pub fn call_lambda(ctx: &mut ScriptCtx<'_, '_>, lambda: &Lambda) -> Result<Val, ScriptError> {
    let _depth = DepthGuard::enter()?;
    let stmts = parse_program(&lambda.code)?;
    let mut interp = Interp::new(ctx, &[]);
    for (name, val) in &lambda.captures {
        interp.env.insert(name.clone(), val.clone());
    }
    interp.eval_stmts(&stmts)
}

/// Entry point for the scheduler: a lambda firing with no session attached.
pub fn run_scheduled(world: &World, lambda: &Lambda) -> Result<(), ScriptError> {
    let mut ws = world.db.write();
    let mut ctx = ScriptCtx {
        world,
        ws: &mut *ws,
        self_id: lambda.owner,
        caller: None,
        session: None,
    };
    call_lambda(&mut ctx, lambda).map(|_| ())
}

struct Interp<'a, 'w, 'ws> {
    ctx: &'a mut ScriptCtx<'w, 'ws>,
    env: HashMap<String, Val>,
}

impl<'a, 'w, 'ws> Interp<'a, 'w, 'ws> {
    fn new(ctx: &'a mut ScriptCtx<'w, 'ws>, extra: &[(&str, Val)]) -> Self {
        let mut env = HashMap::new();
        env.insert("self".to_string(), ctx.self_id.into());
        env.insert("caller".to_string(), ctx.caller.into());
        env.insert("here".to_string(), ctx.here());
        for (name, val) in extra {
            env.insert(name.to_string(), val.clone());
        }
        Interp { ctx, env }
    }

    fn eval_stmts(&mut self, stmts: &[Stmt]) -> Result<Val, ScriptError> {
        let mut last = Val::Nil;
        for stmt in stmts {
            last = self.eval_stmt(stmt)?;
        }
        Ok(last)
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> Result<Val, ScriptError> {
        match stmt {
            Stmt::Expr(e) => self.eval(e),
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                match target {
                    Target::Var(name) => {
                        self.env.insert(name.clone(), value);
                    }
                    Target::Attr { obj, name } => {
                        let obj = self.eval(obj)?;
                        self.set_attr(obj, name, value)?;
                    }
                }
                Ok(Val::Nil)
            }
            Stmt::If { arms, otherwise } => {
                for (cond, body) in arms {
                    if self.eval(cond)?.truthy() {
                        return self.eval_stmts(body);
                    }
                }
                match otherwise {
                    Some(body) => self.eval_stmts(body),
                    None => Ok(Val::Nil),
                }
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Val, ScriptError> {
        match expr {
            Expr::Nil => Ok(Val::Nil),
            Expr::Bool(b) => Ok(Val::Bool(*b)),
            Expr::Int(i) => Ok(Val::Int(*i)),
            Expr::Float(f) => Ok(Val::Float(*f)),
            Expr::Str(s) => Ok(Val::Str(s.clone())),
            Expr::ObjRef(n) => Ok(Val::Obj(ObjId(*n))),
            Expr::List(items) => {
                let vals = items
                    .iter()
                    .map(|i| self.eval(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Val::List(vals))
            }
            Expr::Ident(name) => match self.env.get(name) {
                Some(v) => Ok(v.clone()),
                None => Err(ScriptError::Name(format!("name '{name}' is not defined"))),
            },
            Expr::Lambda { src, .. } => Ok(Val::Lambda(Lambda {
                code: src.clone(),
                owner: self.ctx.self_id,
                captures: self.env.clone().into_iter().collect(),
            })),
            Expr::Neg(e) => match self.eval(e)? {
                Val::Int(i) => Ok(Val::Int(-i)),
                Val::Float(f) => Ok(Val::Float(-f)),
                v => Err(ScriptError::Type(format!("cannot negate {}", v.type_name()))),
            },
            Expr::Not(e) => Ok(Val::Bool(!self.eval(e)?.truthy())),
            Expr::And(a, b) => {
                let a = self.eval(a)?;
                if a.truthy() { self.eval(b) } else { Ok(a) }
            }
            Expr::Or(a, b) => {
                let a = self.eval(a)?;
                if a.truthy() { Ok(a) } else { self.eval(b) }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binop(*op, lhs, rhs)
            }
            Expr::Index { obj, index } => {
                let obj = self.eval(obj)?;
                let index = self.eval(index)?;
                index_val(obj, index)
            }
            Expr::Attr { obj, name } => {
                let obj = self.eval(obj)?;
                self.get_attr(obj, name)
            }
            Expr::Call { callee, args } => self.eval_call(callee, args),
            Expr::MethodCall { recv, name, args } => self.eval_method(recv, name, args),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Val, ScriptError> {
        if let Expr::Ident(name) = callee {
            match self.env.get(name) {
                Some(Val::Lambda(l)) => {
                    let l = l.clone();
                    return self.call_lambda_val(&l);
                }
                Some(v) => {
                    return Err(ScriptError::Type(format!(
                        "'{}' object is not callable",
                        v.type_name()
                    )));
                }
                None => {
                    let args = self.eval_args(args)?;
                    return self.call_builtin(name, args);
                }
            }
        }
        match self.eval(callee)? {
            Val::Lambda(l) => self.call_lambda_val(&l),
            v => Err(ScriptError::Type(format!(
                "'{}' object is not callable",
                v.type_name()
            ))),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Val>, ScriptError> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn call_lambda_val(&mut self, lambda: &Lambda) -> Result<Val, ScriptError> {
        call_lambda(self.ctx, lambda)
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Val>) -> Result<Val, ScriptError> {
        match name {
            "send" => {
                let text = one_arg("send", &args)?.to_string();
                match &self.ctx.session {
                    Some(session) => session.send(&text),
                    None => debug!(text, "script send with no session, dropped"),
                }
                Ok(Val::Nil)
            }
            "fail" => {
                let msg = one_arg("fail", &args)?.to_string();
                Err(ScriptError::Failed(ActionFailed::Custom(msg)))
            }
            "len" => match one_arg("len", &args)? {
                Val::Str(s) => Ok(Val::Int(s.chars().count() as i64)),
                Val::List(l) => Ok(Val::Int(l.len() as i64)),
                v => Err(ScriptError::Type(format!(
                    "'{}' object has no length",
                    v.type_name()
                ))),
            },
            "str" => Ok(Val::Str(one_arg("str", &args)?.to_string())),
            "int" => match one_arg("int", &args)? {
                Val::Int(i) => Ok(Val::Int(*i)),
                Val::Float(f) => Ok(Val::Int(*f as i64)),
                Val::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Val::Int)
                    .map_err(|_| ScriptError::Value(format!("invalid int literal: '{s}'"))),
                v => Err(ScriptError::Type(format!(
                    "cannot convert {} to int",
                    v.type_name()
                ))),
            },
            "find" => {
                let query = one_arg("find", &args)?.to_string();
                let caller = self.ctx.caller.ok_or_else(|| {
                    ScriptError::Name("find requires a caller".to_string())
                })?;
                let reach = self.ctx.ws.reachable_of(caller);
                let hits = self.ctx.ws.match_among(&query, &reach);
                match hits.first() {
                    Some(&id) => Ok(Val::Obj(id)),
                    None => Err(ScriptError::Failed(ActionFailed::ObjectNotFound(format!(
                        "You see nothing like '{query}' here."
                    )))),
                }
            }
            other => Err(ScriptError::Name(format!("name '{other}' is not defined"))),
        }
    }

    fn eval_method(&mut self, recv: &Expr, name: &str, args: &[Expr]) -> Result<Val, ScriptError> {
        // `db` and `game` resolve specially unless the script shadowed them.
        if let Expr::Ident(recv_name) = recv
            && !self.env.contains_key(recv_name)
        {
            if recv_name == "db" {
                let args = self.eval_args(args)?;
                return self.db_method(name, args);
            }
            if recv_name == "game" {
                let args = self.eval_args(args)?;
                return self.game_method(name, args);
            }
        }
        let recv = self.eval(recv)?;
        match recv {
            Val::Obj(id) => {
                let args = self.eval_args(args)?;
                self.obj_method(id, name, args)
            }
            v => Err(ScriptError::Attribute(format!(
                "'{}' object has no attribute '{name}'",
                v.type_name()
            ))),
        }
    }

    fn db_method(&mut self, name: &str, args: Vec<Val>) -> Result<Val, ScriptError> {
        match name {
            "get" => {
                let id = match one_arg("db.get", &args)? {
                    Val::Int(i) if *i >= 0 => ObjId(*i as u64),
                    Val::Obj(id) => *id,
                    v => {
                        return Err(ScriptError::Type(format!(
                            "db.get wants an id, not {}",
                            v.type_name()
                        )));
                    }
                };
                Ok(self.ctx.ws.contains(id).then_some(id).into())
            }
            "search" => {
                let query = one_arg("db.search", &args)?.to_string();
                let hits = self.ctx.ws.search(&query, None);
                Ok(Val::List(hits.into_iter().map(Val::Obj).collect()))
            }
            "add" => {
                let (kind, obj_name) = two_args("db.add", &args)?;
                let kind: Kind = kind
                    .to_string()
                    .parse()
                    .map_err(|_| ScriptError::Value(format!("unknown object type '{kind}'")))?;
                let obj = match kind {
                    Kind::Object => Object::object(&obj_name.to_string()),
                    Kind::Thing => Object::thing(&obj_name.to_string()),
                    Kind::Room => Object::room(&obj_name.to_string()),
                    Kind::Player => Object::player(&obj_name.to_string()),
                    Kind::Config => {
                        return Err(ScriptError::Value(
                            "the config object is a singleton".to_string(),
                        ));
                    }
                };
                Ok(Val::Obj(self.ctx.ws.add(obj)))
            }
            "remove" => {
                let id = match one_arg("db.remove", &args)? {
                    Val::Int(i) if *i >= 0 => ObjId(*i as u64),
                    Val::Obj(id) => *id,
                    v => {
                        return Err(ScriptError::Type(format!(
                            "db.remove wants an id, not {}",
                            v.type_name()
                        )));
                    }
                };
                self.ctx.ws.remove(id);
                Ok(Val::Nil)
            }
            other => Err(ScriptError::Attribute(format!(
                "the database has no method '{other}'"
            ))),
        }
    }

    fn game_method(&mut self, name: &str, args: Vec<Val>) -> Result<Val, ScriptError> {
        match name {
            "schedule" => {
                let (delay, event) = two_args("game.schedule", &args)?;
                let secs = match delay {
                    Val::Int(i) if *i >= 0 => *i as f64,
                    Val::Float(f) if *f >= 0.0 => *f,
                    v => {
                        return Err(ScriptError::Value(format!(
                            "game.schedule wants a non-negative delay, got {v}"
                        )));
                    }
                };
                let Val::Lambda(lambda) = event else {
                    return Err(ScriptError::Type(
                        "game.schedule wants a lambda event".to_string(),
                    ));
                };
                self.ctx
                    .world
                    .game
                    .schedule(Duration::from_secs_f64(secs), Event::Lambda(lambda.clone()));
                Ok(Val::Nil)
            }
            other => Err(ScriptError::Attribute(format!(
                "the game has no method '{other}'"
            ))),
        }
    }

    fn obj_method(&mut self, id: ObjId, name: &str, args: Vec<Val>) -> Result<Val, ScriptError> {
        match name {
            "emit" => {
                let msg = one_arg("emit", &args)?.to_string();
                let room = match self.ctx.ws.get(id) {
                    Some(o) if o.is_room() => Some(id),
                    Some(o) => o.location(),
                    None => None,
                };
                if let Some(room) = room {
                    crate::events::emit_to_room(self.ctx.world, self.ctx.ws, room, &msg);
                }
                Ok(Val::Nil)
            }
            "send" => {
                let obj = self
                    .ctx
                    .ws
                    .get(id)
                    .ok_or_else(|| ScriptError::Value(format!("{id} is gone")))?;
                if !obj.is_player() {
                    return Err(ScriptError::Attribute(format!(
                        "'{}' object has no attribute 'send'",
                        obj.fancy_name()
                    )));
                }
                let msg = one_arg("send", &args)?.to_string();
                self.ctx.world.sessions.send_to_player(id, &msg);
                Ok(Val::Nil)
            }
            "moveto" => {
                let dest = match one_arg("moveto", &args)? {
                    Val::Nil => None,
                    Val::Obj(d) => Some(*d),
                    v => {
                        return Err(ScriptError::Type(format!(
                            "moveto wants an object or nil, not {}",
                            v.type_name()
                        )));
                    }
                };
                self.ctx.ws.move_to(id, dest).map_err(|_| {
                    ScriptError::Failed(ActionFailed::Custom(format!(
                        "{} cannot be moved.",
                        self.ctx.ws.repr_of(id)
                    )))
                })?;
                Ok(Val::Nil)
            }
            "has_flag" => {
                let flag = one_arg("has_flag", &args)?.to_string();
                Ok(Val::Bool(self.ctx.ws.has_flag(id, &flag)))
            }
            "clone" => {
                if !args.is_empty() {
                    return Err(ScriptError::Value("clone takes no arguments".to_string()));
                }
                let copy = self
                    .ctx
                    .ws
                    .get(id)
                    .ok_or_else(|| ScriptError::Value(format!("{id} is gone")))?
                    .clone_fresh();
                Ok(Val::Obj(self.ctx.ws.add(copy)))
            }
            "dispatch" => {
                let event = one_arg("dispatch", &args)?.to_string();
                crate::events::dispatch_event(
                    self.ctx.world,
                    self.ctx.ws,
                    self.ctx.session.clone(),
                    self.ctx.caller,
                    id,
                    &event,
                    &[],
                )
                .map_err(ScriptError::Failed)?;
                Ok(Val::Nil)
            }
            other => {
                // an attribute holding a lambda is callable as a method
                match self.lookup_attr(id, other)? {
                    Val::Lambda(l) => self.call_lambda_val(&l),
                    v => Err(ScriptError::Type(format!(
                        "'{}' object is not callable",
                        v.type_name()
                    ))),
                }
            }
        }
    }

    fn get_attr(&mut self, obj: Val, name: &str) -> Result<Val, ScriptError> {
        match obj {
            Val::Obj(id) => self.lookup_attr(id, name),
            v => Err(ScriptError::Attribute(format!(
                "'{}' object has no attribute '{name}'",
                v.type_name()
            ))),
        }
    }

    fn lookup_attr(&mut self, id: ObjId, name: &str) -> Result<Val, ScriptError> {
        if name.starts_with('_') {
            return Err(ScriptError::Attribute(format!(
                "attribute '{name}' is private"
            )));
        }
        let fancy = self
            .ctx
            .ws
            .get(id)
            .map(|o| o.fancy_name())
            .ok_or_else(|| ScriptError::Value(format!("{id} is gone")))?;
        self.ctx.ws.attr(id, name).ok_or_else(|| {
            ScriptError::Attribute(format!("'{fancy}' object has no attribute '{name}'"))
        })
    }

    fn set_attr(&mut self, obj: Val, name: &str, value: Val) -> Result<(), ScriptError> {
        let Val::Obj(id) = obj else {
            return Err(ScriptError::Attribute(format!(
                "'{}' object has no attribute '{name}'",
                obj.type_name()
            )));
        };
        if name.starts_with('_') {
            return Err(ScriptError::Attribute(format!(
                "attribute '{name}' is private"
            )));
        }
        let object = self
            .ctx
            .ws
            .get_mut(id)
            .ok_or_else(|| ScriptError::Value(format!("{id} is gone")))?;
        match object.set_field(name, &value) {
            Ok(true) => Ok(()),
            Ok(false) => {
                object.attrs.insert(name.to_string(), value);
                Ok(())
            }
            Err(msg) => Err(ScriptError::Attribute(msg.to_string())),
        }
    }
}

fn one_arg<'v>(name: &str, args: &'v [Val]) -> Result<&'v Val, ScriptError> {
    match args {
        [v] => Ok(v),
        _ => Err(ScriptError::Value(format!(
            "{name} takes exactly one argument"
        ))),
    }
}

fn two_args<'v>(name: &str, args: &'v [Val]) -> Result<(&'v Val, &'v Val), ScriptError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(ScriptError::Value(format!(
            "{name} takes exactly two arguments"
        ))),
    }
}

fn index_val(obj: Val, index: Val) -> Result<Val, ScriptError> {
    let Val::Int(i) = index else {
        return Err(ScriptError::Type(format!(
            "indices must be ints, not {}",
            index.type_name()
        )));
    };
    let wrap = |i: i64, len: usize| -> Option<usize> {
        let len = len as i64;
        let i = if i < 0 { i + len } else { i };
        (0..len).contains(&i).then_some(i as usize)
    };
    match obj {
        Val::List(items) => wrap(i, items.len())
            .map(|ix| items[ix].clone())
            .ok_or_else(|| ScriptError::Value("list index out of range".to_string())),
        Val::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            wrap(i, chars.len())
                .map(|ix| Val::Str(chars[ix].to_string()))
                .ok_or_else(|| ScriptError::Value("string index out of range".to_string()))
        }
        v => Err(ScriptError::Type(format!(
            "'{}' object is not indexable",
            v.type_name()
        ))),
    }
}

fn binop(op: BinOp, lhs: Val, rhs: Val) -> Result<Val, ScriptError> {
    use BinOp::*;
    match op {
        Add => match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a + b)),
            (Val::Str(a), Val::Str(b)) => Ok(Val::Str(a + &b)),
            (Val::List(mut a), Val::List(b)) => {
                a.extend(b);
                Ok(Val::List(a))
            }
            (a, b) => numeric(a, b, "+", |x, y| x + y),
        },
        Sub => match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a - b)),
            (a, b) => numeric(a, b, "-", |x, y| x - y),
        },
        Mul => match (lhs, rhs) {
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a * b)),
            (a, b) => numeric(a, b, "*", |x, y| x * y),
        },
        Div => match (lhs, rhs) {
            (Val::Int(_), Val::Int(0)) => Err(ScriptError::Value("division by zero".to_string())),
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a / b)),
            (a, b) => numeric(a, b, "/", |x, y| x / y),
        },
        Mod => match (lhs, rhs) {
            (Val::Str(fmt), arg) => {
                let args = match arg {
                    Val::List(items) => items,
                    single => vec![single],
                };
                format_percent(&fmt, &args).map(Val::Str)
            }
            (Val::Int(_), Val::Int(0)) => Err(ScriptError::Value("modulo by zero".to_string())),
            (Val::Int(a), Val::Int(b)) => Ok(Val::Int(a.rem_euclid(b))),
            (a, b) => numeric(a, b, "%", |x, y| x % y),
        },
        Eq => Ok(Val::Bool(vals_equal(&lhs, &rhs))),
        Ne => Ok(Val::Bool(!vals_equal(&lhs, &rhs))),
        Lt | Le | Gt | Ge => {
            let ord = match (&lhs, &rhs) {
                (Val::Str(a), Val::Str(b)) => a.partial_cmp(b),
                (a, b) => match (as_float(a), as_float(b)) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => None,
                },
            };
            let Some(ord) = ord else {
                return Err(ScriptError::Type(format!(
                    "cannot compare {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            Ok(Val::Bool(match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
    }
}

fn as_float(v: &Val) -> Option<f64> {
    match v {
        Val::Int(i) => Some(*i as f64),
        Val::Float(f) => Some(*f),
        _ => None,
    }
}

fn numeric(a: Val, b: Val, op: &str, f: impl Fn(f64, f64) -> f64) -> Result<Val, ScriptError> {
    match (as_float(&a), as_float(&b)) {
        (Some(x), Some(y)) => Ok(Val::Float(f(x, y))),
        _ => Err(ScriptError::Type(format!(
            "unsupported operands for {op}: {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn vals_equal(a: &Val, b: &Val) -> bool {
    match (as_float(a), as_float(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// `%`-style formatting: `%s` takes anything, `%d` an integer, `%%` is a
/// literal percent.
fn format_percent(fmt: &str, args: &[Val]) -> Result<String, ScriptError> {
    let mut out = String::with_capacity(fmt.len());
    let mut args_iter = args.iter();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => {
                let arg = args_iter.next().ok_or_else(|| {
                    ScriptError::Value("not enough arguments for format string".to_string())
                })?;
                out.push_str(&arg.to_string());
            }
            Some('d') => {
                let arg = args_iter.next().ok_or_else(|| {
                    ScriptError::Value("not enough arguments for format string".to_string())
                })?;
                match arg {
                    Val::Int(i) => out.push_str(&i.to_string()),
                    v => {
                        return Err(ScriptError::Value(format!(
                            "%d format: a number is required, not {}",
                            v.type_name()
                        )));
                    }
                }
            }
            Some(other) => {
                return Err(ScriptError::Value(format!(
                    "unsupported format character '{other}'"
                )));
            }
            None => {
                return Err(ScriptError::Value(
                    "incomplete format at end of string".to_string(),
                ));
            }
        }
    }
    if args_iter.next().is_some() {
        return Err(ScriptError::Value(
            "not all arguments converted during string formatting".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn percent_formatting() {
        let args = vec![Val::Str("ada".into())];
        assert_eq!(
            format_percent("You wave at %s", &args).unwrap(),
            "You wave at ada"
        );
        assert_eq!(format_percent("100%%", &[]).unwrap(), "100%");
        assert_eq!(
            format_percent("%s has %d coins", &[Val::Str("bob".into()), Val::Int(4)]).unwrap(),
            "bob has 4 coins"
        );
        assert!(format_percent("%s %s", &args).is_err());
        assert!(format_percent("no slots", &args).is_err());
        assert!(format_percent("%d", &[Val::Str("x".into())]).is_err());
    }

    #[test]
    fn arithmetic_and_comparison() {
        assert_eq!(
            binop(BinOp::Add, Val::Int(2), Val::Int(3)).unwrap(),
            Val::Int(5)
        );
        assert_eq!(
            binop(BinOp::Add, Val::Str("a".into()), Val::Str("b".into())).unwrap(),
            Val::Str("ab".into())
        );
        assert_eq!(
            binop(BinOp::Eq, Val::Int(2), Val::Float(2.0)).unwrap(),
            Val::Bool(true)
        );
        assert!(binop(BinOp::Div, Val::Int(1), Val::Int(0)).is_err());
        assert!(binop(BinOp::Lt, Val::Int(1), Val::Str("x".into())).is_err());
    }

    #[test]
    fn indexing_wraps_negative() {
        let list = Val::List(vec![Val::Int(10), Val::Int(20)]);
        assert_eq!(index_val(list.clone(), Val::Int(-1)).unwrap(), Val::Int(20));
        assert!(index_val(list, Val::Int(5)).is_err());
    }
}
