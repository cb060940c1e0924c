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

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::ScriptError;
use super::ast::{BinOp, Expr, Stmt, Target};

#[derive(Parser)]
#[grammar = "script/grammar.pest"]
struct ScriptParser;

pub fn parse_program(src: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut pairs = ScriptParser::parse(Rule::program, src)
        .map_err(|e| ScriptError::Parse(e.to_string()))?;
    let program = pairs.next().expect("program rule always present");
    program
        .into_inner()
        .filter(|p| p.as_rule() == Rule::stmt)
        .map(build_stmt)
        .collect()
}

fn build_stmt(pair: Pair<Rule>) -> Result<Stmt, ScriptError> {
    let inner = pair.into_inner().next().expect("stmt has one child");
    match inner.as_rule() {
        Rule::if_stmt => build_if(inner),
        Rule::assign => build_assign(inner),
        Rule::expr => Ok(Stmt::Expr(build_expr(inner)?)),
        other => Err(ScriptError::Parse(format!("unexpected {other:?}"))),
    }
}

fn build_block(pair: Pair<Rule>) -> Result<Vec<Stmt>, ScriptError> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::stmt)
        .map(build_stmt)
        .collect()
}

fn build_if(pair: Pair<Rule>) -> Result<Stmt, ScriptError> {
    let mut arms = Vec::new();
    let mut otherwise = None;
    let mut cond = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::kw_if => {}
            Rule::expr => cond = Some(build_expr(p)?),
            Rule::block => {
                let body = build_block(p)?;
                let cond = cond.take().expect("condition precedes block");
                arms.push((cond, body));
            }
            Rule::elif_arm => {
                let mut cond = None;
                for q in p.into_inner() {
                    match q.as_rule() {
                        Rule::expr => cond = Some(build_expr(q)?),
                        Rule::block => {
                            arms.push((cond.take().expect("elif condition"), build_block(q)?))
                        }
                        _ => {}
                    }
                }
            }
            Rule::else_arm => {
                for q in p.into_inner() {
                    if q.as_rule() == Rule::block {
                        otherwise = Some(build_block(q)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(Stmt::If { arms, otherwise })
}

fn build_assign(pair: Pair<Rule>) -> Result<Stmt, ScriptError> {
    let mut inner = pair.into_inner();
    let target = build_postfix(inner.next().expect("assign target"))?;
    let value = build_expr(inner.next().expect("assign value"))?;
    let target = match target {
        Expr::Ident(name) => Target::Var(name),
        Expr::Attr { obj, name } => Target::Attr { obj: *obj, name },
        _ => {
            return Err(ScriptError::Parse(
                "cannot assign to that expression".to_string(),
            ));
        }
    };
    Ok(Stmt::Assign { target, value })
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    match pair.as_rule() {
        Rule::expr => build_expr(pair.into_inner().next().expect("expr child")),
        Rule::or_expr => build_logic(pair, Rule::kw_or),
        Rule::and_expr => build_logic(pair, Rule::kw_and),
        Rule::not_expr => {
            let mut inner = pair.into_inner().peekable();
            let first = inner.peek().expect("not_expr child").as_rule();
            if first == Rule::kw_not {
                inner.next();
                let operand = build_expr(inner.next().expect("not operand"))?;
                Ok(Expr::Not(Box::new(operand)))
            } else {
                build_expr(inner.next().expect("comparison"))
            }
        }
        Rule::comparison => {
            let mut inner = pair.into_inner();
            let lhs = build_expr(inner.next().expect("comparison lhs"))?;
            match inner.next() {
                None => Ok(lhs),
                Some(op_pair) => {
                    let op = match op_pair.as_str() {
                        "==" => BinOp::Eq,
                        "!=" => BinOp::Ne,
                        "<=" => BinOp::Le,
                        ">=" => BinOp::Ge,
                        "<" => BinOp::Lt,
                        ">" => BinOp::Gt,
                        other => return Err(ScriptError::Parse(format!("operator {other}"))),
                    };
                    let rhs = build_expr(inner.next().expect("comparison rhs"))?;
                    Ok(Expr::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    })
                }
            }
        }
        Rule::additive | Rule::multiplicative => build_arith(pair),
        Rule::unary => build_expr(pair.into_inner().next().expect("unary child")),
        Rule::neg => {
            let operand = build_expr(pair.into_inner().next().expect("neg operand"))?;
            Ok(Expr::Neg(Box::new(operand)))
        }
        Rule::postfix => build_postfix(pair),
        other => Err(ScriptError::Parse(format!("unexpected {other:?}"))),
    }
}

fn build_logic(pair: Pair<Rule>, op_rule: Rule) -> Result<Expr, ScriptError> {
    let mut acc = None;
    for p in pair.into_inner() {
        if p.as_rule() == op_rule {
            continue;
        }
        let rhs = build_expr(p)?;
        acc = Some(match acc {
            None => rhs,
            Some(lhs) => {
                if op_rule == Rule::kw_or {
                    Expr::Or(Box::new(lhs), Box::new(rhs))
                } else {
                    Expr::And(Box::new(lhs), Box::new(rhs))
                }
            }
        });
    }
    Ok(acc.expect("logic chain nonempty"))
}

fn build_arith(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    let mut inner = pair.into_inner();
    let mut acc = build_expr(inner.next().expect("arith lhs"))?;
    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "%" => BinOp::Mod,
            other => return Err(ScriptError::Parse(format!("operator {other}"))),
        };
        let rhs = build_expr(inner.next().expect("arith rhs"))?;
        acc = Expr::Binary {
            op,
            lhs: Box::new(acc),
            rhs: Box::new(rhs),
        };
    }
    Ok(acc)
}

fn build_postfix(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    let mut inner = pair.into_inner();
    let mut acc = build_primary(inner.next().expect("postfix primary"))?;
    for op in inner {
        let op = op.into_inner().next().expect("postfix op child");
        match op.as_rule() {
            Rule::call_args => {
                let args = op
                    .into_inner()
                    .map(build_expr)
                    .collect::<Result<Vec<_>, _>>()?;
                acc = match acc {
                    Expr::Attr { obj, name } => Expr::MethodCall {
                        recv: obj,
                        name,
                        args,
                    },
                    callee => Expr::Call {
                        callee: Box::new(callee),
                        args,
                    },
                };
            }
            Rule::index => {
                let idx = build_expr(op.into_inner().next().expect("index expr"))?;
                acc = Expr::Index {
                    obj: Box::new(acc),
                    index: Box::new(idx),
                };
            }
            Rule::attr_access => {
                let name = op
                    .into_inner()
                    .next()
                    .expect("attr name")
                    .as_str()
                    .to_string();
                acc = Expr::Attr {
                    obj: Box::new(acc),
                    name,
                };
            }
            other => return Err(ScriptError::Parse(format!("unexpected {other:?}"))),
        }
    }
    Ok(acc)
}

fn build_primary(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    let inner = pair.into_inner().next().expect("primary child");
    match inner.as_rule() {
        Rule::lambda => {
            let body_pair = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::expr)
                .expect("lambda body");
            let src = body_pair.as_str().trim().to_string();
            let body = build_expr(body_pair)?;
            Ok(Expr::Lambda {
                body: Box::new(body),
                src,
            })
        }
        Rule::literal => build_literal(inner),
        Rule::list => {
            let items = inner
                .into_inner()
                .map(build_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::List(items))
        }
        Rule::ident => Ok(Expr::Ident(inner.as_str().to_string())),
        Rule::expr => build_expr(inner),
        other => Err(ScriptError::Parse(format!("unexpected {other:?}"))),
    }
}

fn build_literal(pair: Pair<Rule>) -> Result<Expr, ScriptError> {
    let inner = pair.into_inner().next().expect("literal child");
    match inner.as_rule() {
        Rule::string => {
            let raw = inner
                .into_inner()
                .next()
                .map(|p| p.as_str())
                .unwrap_or_default();
            Ok(Expr::Str(unescape_literal(raw)))
        }
        Rule::float => inner
            .as_str()
            .parse::<f64>()
            .map(Expr::Float)
            .map_err(|e| ScriptError::Parse(e.to_string())),
        Rule::int => inner
            .as_str()
            .parse::<i64>()
            .map(Expr::Int)
            .map_err(|e| ScriptError::Parse(e.to_string())),
        Rule::objref => {
            let digits = &inner.as_str()[1..];
            digits
                .parse::<u64>()
                .map(Expr::ObjRef)
                .map_err(|e| ScriptError::Parse(e.to_string()))
        }
        Rule::bool_true => Ok(Expr::Bool(true)),
        Rule::bool_false => Ok(Expr::Bool(false)),
        Rule::nil => Ok(Expr::Nil),
        other => Err(ScriptError::Parse(format!("unexpected {other:?}"))),
    }
}

fn unescape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn statements_split_on_semicolons_and_newlines() {
        let stmts = parse_program("send(\"a\"); send(\"b\")\nsend(\"c\")").unwrap();
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn call_on_attribute_becomes_method_call() {
        let stmts = parse_program("here.emit(\"tick\")").unwrap();
        let Stmt::Expr(Expr::MethodCall { recv, name, args }) = &stmts[0] else {
            panic!("expected method call, got {stmts:?}");
        };
        assert_eq!(**recv, Expr::Ident("here".into()));
        assert_eq!(name, "emit");
        assert_eq!(args, &[Expr::Str("tick".into())]);
    }

    #[test]
    fn format_operator_parses() {
        let stmts = parse_program("send(\"You wave at %s\" % caller.name)").unwrap();
        let Stmt::Expr(Expr::Call { args, .. }) = &stmts[0] else {
            panic!("expected call");
        };
        assert!(matches!(
            args[0],
            Expr::Binary {
                op: BinOp::Mod,
                ..
            }
        ));
    }

    #[test]
    fn lambda_keeps_its_source_text() {
        let stmts = parse_program("game.schedule(2, lambda: here.emit(\"tick\"))").unwrap();
        let Stmt::Expr(Expr::MethodCall { args, .. }) = &stmts[0] else {
            panic!("expected method call");
        };
        let Expr::Lambda { src, .. } = &args[1] else {
            panic!("expected lambda, got {:?}", args[1]);
        };
        assert_eq!(src, "here.emit(\"tick\")");
    }

    #[test]
    fn assignment_targets() {
        assert!(parse_program("x = 1").is_ok());
        assert!(parse_program("self.mood = \"grim\"").is_ok());
        assert!(parse_program("3 = 4").is_err());
    }

    #[test]
    fn if_elif_else() {
        let stmts =
            parse_program("if x > 1 { send(\"big\") } elif x == 1 { send(\"one\") } else { send(\"small\") }")
                .unwrap();
        let Stmt::If { arms, otherwise } = &stmts[0] else {
            panic!("expected if");
        };
        assert_eq!(arms.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn keywords_do_not_eat_identifiers() {
        let stmts = parse_program("notebook").unwrap();
        assert_eq!(stmts[0], Stmt::Expr(Expr::Ident("notebook".into())));
    }

    #[test]
    fn string_escapes() {
        let stmts = parse_program(r#"send("a\nb\t\"q\"")"#).unwrap();
        let Stmt::Expr(Expr::Call { args, .. }) = &stmts[0] else {
            panic!();
        };
        assert_eq!(args[0], Expr::Str("a\nb\t\"q\"".into()));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_program("if {").is_err());
        assert!(parse_program("x ===== y").is_err());
    }
}
