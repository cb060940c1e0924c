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

//! The engineering surface: raw code, attributes, flags, and runtime
//! authoring of commands, matchers and event handlers. Targets are named by
//! prefix or `#id`; code text travels through the one-line command channel
//! with `\n`, `\t` and `\\` escapes.

use lazy_static::lazy_static;
use regex::Regex;

use morel_common::util::unescape;
use morel_common::{ActionFailed, CmdFlags, CustomAction, Lambda, ObjId, Val};
use morel_db::WorldState;

use crate::actions::{BuiltinCmd, CmdError, Ctx};
use crate::dispatch::{TARGET_NAME, TARGET_NAME_REST, TARGET_REST};
use crate::script::{self, ScriptCtx};

use super::{repr_val, resolve_target};

pub static ENGINEER_CMDS: &[BuiltinCmd] = &[
    BuiltinCmd {
        name: "eval",
        help: "eval <code>: evaluate the code and print the result.",
        run: cmd_eval,
    },
    BuiltinCmd {
        name: "exec",
        help: "exec <code>: execute raw code.",
        run: cmd_exec,
    },
    BuiltinCmd {
        name: "examine",
        help: "examine <object>: display commands and attributes of an object.\n<object> can be a # database ID.",
        run: cmd_examine,
    },
    BuiltinCmd {
        name: "setattr",
        help: "setattr <object> <attribute> <value>: set an attribute on an object.\n<object> can be a # database ID.\n<value> can be a # database ID or lambda: <code>, otherwise it is a string.",
        run: cmd_setattr,
    },
    BuiltinCmd {
        name: "delattr",
        help: "delattr <object> <attribute>: delete an attribute on an object.\n<object> can be a # database ID.",
        run: cmd_delattr,
    },
    BuiltinCmd {
        name: "cmd",
        help: "cmd <object> <name>[:<flags>] <code>: add a command to an object.\nFlags: o=owner, p=peers in the room, i=occupants inside.",
        run: cmd_cmd,
    },
    BuiltinCmd {
        name: "match",
        help: "match <object> [<name>[:<flags>]:]<regex> <code>: add a regex-matched action to an object.",
        run: cmd_match,
    },
    BuiltinCmd {
        name: "delcmd",
        help: "delcmd <object> <name>: remove a command from an object.",
        run: cmd_delcmd,
    },
    BuiltinCmd {
        name: "setevent",
        help: "setevent <object> <event> <code>: attach an event handler to an object.",
        run: cmd_setevent,
    },
    BuiltinCmd {
        name: "delevent",
        help: "delevent <object> <event>: detach an event handler from an object.",
        run: cmd_delevent,
    },
    BuiltinCmd {
        name: "setflag",
        help: "setflag <object> <flag>: set a flag on an object.\n<object> can be a # database ID.",
        run: cmd_setflag,
    },
    BuiltinCmd {
        name: "resetflag",
        help: "resetflag <object> <flag>: reset a flag on an object.\n<object> can be a # database ID.",
        run: cmd_resetflag,
    },
];

lazy_static! {
    /// `[name[:flags]:]regex` — the middle operand of `match`.
    static ref MATCH_SPEC: Regex =
        Regex::new(r"^(?:(\w+)(?::([opi]+))?:)?(.+)$").expect("static regex");
}

fn cmd_eval(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(code) = rest else {
        return Err(ActionFailed::BadSyntax("Eval what?".into()).into());
    };
    let mut ws = ctx.world.db.write();
    let mut sctx = ScriptCtx {
        world: ctx.world,
        ws: &mut *ws,
        self_id: Some(ctx.player),
        caller: Some(ctx.player),
        session: Some(ctx.session.clone()),
    };
    let value = script::run_program(&mut sctx, code, &[])?;
    let rendered = repr_val(&ws, &value);
    ctx.send(&rendered);
    Ok(())
}

fn cmd_exec(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(code) = rest else {
        return Err(ActionFailed::BadSyntax("Exec what?".into()).into());
    };
    let mut ws = ctx.world.db.write();
    let mut sctx = ScriptCtx {
        world: ctx.world,
        ws: &mut *ws,
        self_id: Some(ctx.player),
        caller: Some(ctx.player),
        session: Some(ctx.session.clone()),
    };
    script::run_program(&mut sctx, &unescape(code), &[])?;
    Ok(())
}

fn cmd_examine(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let Some(query) = rest else {
        return Err(ActionFailed::BadSyntax("Examine what?".into()).into());
    };
    let ws = ctx.world.db.read();
    let target = resolve_target(&ws, ctx.player, query)?;
    ctx.send(&format!("{}:", ws.repr_of(target)));
    let Some(obj) = ws.get(target) else {
        return Ok(());
    };
    for name in obj.visible_attr_names() {
        if let Some(val) = ws.attr(target, &name) {
            ctx.send(&format!("  {name}: {}", repr_val(&ws, &val)));
        }
    }
    for (name, action) in &obj.custom_cmds {
        ctx.send(&format!("  cmd {name}: {}", action.summary()));
    }
    for (event, code) in &obj.custom_events {
        ctx.send(&format!(
            "  event {event}: <code: {}>",
            morel_common::util::escape(code)
        ));
    }
    Ok(())
}

/// How `setattr` reads its value operand: a db ref, a lambda, a number, or
/// failing all of those, a string with escapes expanded.
fn parse_value(ws: &WorldState, owner: ObjId, raw: &str) -> Result<Val, CmdError> {
    if let Some(body) = raw.strip_prefix("lambda:") {
        let code = unescape(body.trim());
        script::parse_program(&code)?;
        return Ok(Val::Lambda(Lambda {
            code,
            owner: Some(owner),
            captures: Default::default(),
        }));
    }
    if raw.starts_with('#') {
        let id = ws
            .dbref(raw)
            .ok_or_else(|| ActionFailed::ObjectNotFound(format!("No such object {raw}.")))?;
        return Ok(Val::Obj(id));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Val::Int(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Ok(Val::Float(f));
    }
    Ok(Val::Str(unescape(raw)))
}

fn cmd_setattr(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME_REST.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help setattr".into()))?;
    let (token, attr, raw) = (&caps[1], caps[2].to_string(), &caps[3]);

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let value = parse_value(&ws, target, raw)?;
    let Some(obj) = ws.get_mut(target) else {
        return Ok(());
    };
    match obj.set_field(&attr, &value) {
        Ok(true) => {}
        Ok(false) => {
            obj.attrs.insert(attr, value);
        }
        Err(msg) => return Err(ActionFailed::NotPermitted(msg.to_string()).into()),
    }
    Ok(())
}

fn cmd_delattr(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help delattr".into()))?;
    let (token, attr) = (&caps[1], &caps[2]);

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let Some(obj) = ws.get_mut(target) else {
        return Ok(());
    };
    if obj.attrs.remove(attr).is_none() {
        return Err(ActionFailed::NoSuchAttribute(attr.to_string()).into());
    }
    Ok(())
}

fn cmd_cmd(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME_REST.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try 'help cmd'. Haha.".into()))?;
    let (token, name_spec, raw_code) = (&caps[1], &caps[2], &caps[3]);

    let (name, flags) = parse_name_spec(name_spec)?;
    let code = unescape(raw_code);
    script::parse_program(&code)?;

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let target_name = ws.name_of(target);
    if let Some(obj) = ws.get_mut(target) {
        obj.custom_cmds
            .insert(name.clone(), CustomAction::Script { code, flags });
    }
    ctx.send(&format!("Added command {name} to {target_name}"));
    Ok(())
}

fn cmd_match(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME_REST.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help match".into()))?;
    let (token, spec, raw_code) = (&caps[1], &caps[2], &caps[3]);

    let spec_caps = MATCH_SPEC
        .captures(spec)
        .ok_or_else(|| ActionFailed::BadSyntax("Try help match".into()))?;
    let pattern = spec_caps[3].to_string();
    let flags = match spec_caps.get(2) {
        Some(f) => parse_flags(f.as_str())?,
        None => CmdFlags::default(),
    };
    let name = spec_caps
        .get(1)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| {
            pattern
                .split_whitespace()
                .next()
                .unwrap_or(&pattern)
                .to_string()
        });

    if let Err(e) = Regex::new(&pattern) {
        return Err(ActionFailed::BadSyntax(format!("bad regex: {e}")).into());
    }
    let code = unescape(raw_code);
    script::parse_program(&code)?;

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let target_name = ws.name_of(target);
    if let Some(obj) = ws.get_mut(target) {
        obj.custom_cmds.insert(
            name.clone(),
            CustomAction::Matcher {
                pattern,
                code,
                flags,
            },
        );
    }
    ctx.send(&format!("Added matcher {name} to {target_name}"));
    Ok(())
}

fn cmd_delcmd(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help delcmd".into()))?;
    let (token, name) = (&caps[1], &caps[2]);

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let target_name = ws.name_of(target);
    let removed = ws
        .get_mut(target)
        .map(|o| o.custom_cmds.remove(name).is_some())
        .unwrap_or(false);
    if !removed {
        return Err(ActionFailed::ObjectNotFound(format!(
            "No command {name} on {target_name}"
        ))
        .into());
    }
    ctx.send(&format!("Removed command {name} from {target_name}"));
    Ok(())
}

fn cmd_setevent(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME_REST.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help setevent".into()))?;
    let (token, event, raw_code) = (&caps[1], &caps[2], &caps[3]);

    let code = unescape(raw_code);
    script::parse_program(&code)?;

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let target_name = ws.name_of(target);
    if let Some(obj) = ws.get_mut(target) {
        obj.custom_events.insert(event.to_string(), code);
    }
    ctx.send(&format!("Added {event} handler to {target_name}"));
    Ok(())
}

fn cmd_delevent(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_NAME.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help delevent".into()))?;
    let (token, event) = (&caps[1], &caps[2]);

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    let target_name = ws.name_of(target);
    let removed = ws
        .get_mut(target)
        .map(|o| o.custom_events.remove(event).is_some())
        .unwrap_or(false);
    if !removed {
        return Err(ActionFailed::ObjectNotFound(format!(
            "No {event} handler on {target_name}"
        ))
        .into());
    }
    ctx.send(&format!("Removed {event} handler from {target_name}"));
    Ok(())
}

fn cmd_setflag(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_REST.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help setflag".into()))?;
    let (token, flag) = (&caps[1], caps[2].trim());

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    if let Some(obj) = ws.get_mut(target) {
        obj.flags.insert(flag.to_string());
    }
    Ok(())
}

fn cmd_resetflag(ctx: &mut Ctx<'_>, rest: Option<&str>) -> Result<(), CmdError> {
    let caps = rest
        .and_then(|r| TARGET_REST.captures(r))
        .ok_or_else(|| ActionFailed::BadSyntax("Try help setflag".into()))?;
    let (token, flag) = (&caps[1], caps[2].trim());

    let mut ws = ctx.world.db.write();
    let target = resolve_target(&ws, ctx.player, token)?;
    if let Some(obj) = ws.get_mut(target) {
        // resetting an absent flag is a no-op
        obj.flags.remove(flag);
    }
    Ok(())
}

fn parse_name_spec(spec: &str) -> Result<(String, CmdFlags), CmdError> {
    match spec.split_once(':') {
        None => Ok((spec.to_string(), CmdFlags::default())),
        Some((name, flags)) => Ok((name.to_string(), parse_flags(flags)?)),
    }
}

fn parse_flags(flags: &str) -> Result<CmdFlags, CmdError> {
    flags
        .parse()
        .map_err(|c| ActionFailed::BadSyntax(format!("unknown command flag '{c}'")).into())
}
