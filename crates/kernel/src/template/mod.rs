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

//! Template markers in descriptions: `{name}`, `{if x}…{else}…{endif}`,
//! `{for x in y}…{endfor}`. Rendered at look-time against the described
//! object; a malformed template degrades to the raw text, a name that does
//! not resolve renders as nothing. Attributes holding lambdas are called.

use std::collections::HashMap;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use tracing::debug;

use morel_common::{ObjId, Val};

use crate::script::{self, ScriptCtx};

#[derive(Parser)]
#[grammar = "template/grammar.pest"]
struct TemplateParser;

/// Render `src` as seen by `looker` looking at `target`. `{self.…}` and
/// bare names resolve against the target, `{looker.…}` against the viewer.
pub fn render(ctx: &mut ScriptCtx<'_, '_>, target: ObjId, looker: Option<ObjId>, src: &str) -> String {
    if !src.contains('{') {
        return src.to_string();
    }
    let parsed = match TemplateParser::parse(Rule::template, src) {
        Ok(mut pairs) => pairs.next().expect("template rule"),
        Err(e) => {
            debug!(%e, "unparseable description template");
            return src.to_string();
        }
    };

    let mut scope = HashMap::new();
    scope.insert("self".to_string(), Val::Obj(target));
    if let Some(looker) = looker {
        scope.insert("looker".to_string(), Val::Obj(looker));
    }

    let mut out = String::new();
    for piece in parsed.into_inner().filter(|p| p.as_rule() == Rule::piece) {
        render_piece(ctx, target, &mut scope, piece, &mut out);
    }
    out
}

fn render_piece(
    ctx: &mut ScriptCtx<'_, '_>,
    target: ObjId,
    scope: &mut HashMap<String, Val>,
    piece: Pair<Rule>,
    out: &mut String,
) {
    let inner = piece.into_inner().next().expect("piece child");
    match inner.as_rule() {
        Rule::text => out.push_str(inner.as_str()),
        Rule::var_tag => {
            let dotted = first_of(&inner, Rule::dotted);
            if let Some(val) = resolve(ctx, target, scope, &dotted) {
                out.push_str(&val.to_string());
            }
        }
        Rule::if_block => {
            let mut cond = false;
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::if_open => {
                        let dotted = first_of(&part, Rule::dotted);
                        cond = resolve(ctx, target, scope, &dotted)
                            .map(|v| v.truthy())
                            .unwrap_or(false);
                    }
                    Rule::piece if cond => render_piece(ctx, target, scope, part, out),
                    Rule::else_part if !cond => {
                        for sub in part.into_inner().filter(|p| p.as_rule() == Rule::piece) {
                            render_piece(ctx, target, scope, sub, out);
                        }
                    }
                    _ => {}
                }
            }
        }
        Rule::for_block => {
            let mut var_name = String::new();
            let mut items = Vec::new();
            let mut body = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::for_open => {
                        var_name = first_of(&part, Rule::name);
                        let dotted = first_of(&part, Rule::dotted);
                        if let Some(Val::List(list)) = resolve(ctx, target, scope, &dotted) {
                            items = list;
                        }
                    }
                    Rule::piece => body.push(part),
                    _ => {}
                }
            }
            for item in items {
                scope.insert(var_name.clone(), item);
                for sub in &body {
                    render_piece(ctx, target, scope, sub.clone(), out);
                }
            }
            scope.remove(&var_name);
        }
        _ => {}
    }
}

fn first_of(pair: &Pair<Rule>, rule: Rule) -> String {
    pair.clone()
        .into_inner()
        .find(|p| p.as_rule() == rule)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// Walk a dotted path: the head comes from the scope (`self`, `looker`,
/// loop variables) or, failing that, the target's own attributes; each
/// further segment is an attribute of the value so far. Lambdas encountered
/// anywhere are invoked.
fn resolve(
    ctx: &mut ScriptCtx<'_, '_>,
    target: ObjId,
    scope: &HashMap<String, Val>,
    dotted: &str,
) -> Option<Val> {
    let mut segments = dotted.split('.');
    let head = segments.next()?;

    let mut current = match scope.get(head) {
        Some(v) => v.clone(),
        None => ctx.ws.attr(target, head)?,
    };
    current = deref(ctx, current)?;

    for segment in segments {
        let Val::Obj(id) = current else {
            return None;
        };
        if segment.starts_with('_') {
            return None;
        }
        current = deref(ctx, ctx.ws.attr(id, segment)?)?;
    }
    Some(current)
}

fn deref(ctx: &mut ScriptCtx<'_, '_>, val: Val) -> Option<Val> {
    match val {
        Val::Lambda(l) => match script::call_lambda(ctx, &l) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("template lambda failed: {e}");
                None
            }
        },
        v => Some(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use morel_common::Object;
    use morel_db::Database;

    use crate::world::{World, WorldOptions};

    fn with_ctx(f: impl FnOnce(&mut ScriptCtx<'_, '_>, ObjId)) {
        let world = World::boot(Arc::new(Database::new()), WorldOptions::default());
        let target = {
            let mut ws = world.db.write();
            let id = ws.add(Object::thing("lamp"));
            ws.get_mut(id)
                .unwrap()
                .attrs
                .insert("lit".into(), Val::Bool(true));
            ws.get_mut(id)
                .unwrap()
                .attrs
                .insert("wattage".into(), Val::Int(60));
            id
        };
        let mut ws = world.db.write();
        let mut ctx = ScriptCtx {
            world: &world,
            ws: &mut *ws,
            self_id: Some(target),
            caller: None,
            session: None,
        };
        f(&mut ctx, target);
    }

    #[test]
    fn bare_names_resolve_on_the_target() {
        with_ctx(|ctx, target| {
            assert_eq!(
                render(ctx, target, None, "A {wattage}W lamp called {name}."),
                "A 60W lamp called lamp."
            );
        });
    }

    #[test]
    fn if_else_blocks() {
        with_ctx(|ctx, target| {
            assert_eq!(
                render(ctx, target, None, "{if lit}glowing{else}dark{endif}"),
                "glowing"
            );
            assert_eq!(
                render(ctx, target, None, "{if missing}glowing{else}dark{endif}"),
                "dark"
            );
        });
    }

    #[test]
    fn malformed_templates_degrade_to_raw_text() {
        with_ctx(|ctx, target| {
            let raw = "{if lit}never closed";
            assert_eq!(render(ctx, target, None, raw), raw);
        });
    }

    #[test]
    fn unresolved_names_render_as_nothing() {
        with_ctx(|ctx, target| {
            assert_eq!(render(ctx, target, None, "a {nothing} b"), "a  b");
        });
    }

    #[test]
    fn plain_text_passes_through() {
        with_ctx(|ctx, target| {
            assert_eq!(render(ctx, target, None, "just text"), "just text");
        });
    }
}
