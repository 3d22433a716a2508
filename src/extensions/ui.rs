//! The `beacon/ui` component framework shared by every extension.
//!
//! Component constructors only tag a props table with its `type`; rendering
//! belongs to the frontend. The table is built once per Lua state and handed
//! out read-only, so all extensions see the same framework identity.

use std::rc::Rc;

use mlua::{DeserializeOptions, Function, Lua, LuaSerdeExt, Table, Value};

use super::error::ExtensionResult;
use crate::commands::{EscapeHandler, RenderResult};

/// Module name extensions `require` to get the component framework.
pub const UI_MODULE: &str = "beacon/ui";

/// Component constructors exposed on the framework table.
pub const COMPONENTS: &[&str] = &[
    "text", "markdown", "list", "item", "section", "detail", "form", "field", "action", "grid",
];

/// Frame kind used when a returned table carries no `type`.
const FALLBACK_KIND: &str = "view";

/// Build the canonical framework table.
pub fn build(lua: &Lua) -> mlua::Result<Table> {
    let ui = lua.create_table()?;

    for &kind in COMPONENTS {
        let ctor = lua.create_function(move |lua, props: Value| {
            let table = match props {
                Value::Table(t) => t,
                Value::Nil => lua.create_table()?,
                other => {
                    let t = lua.create_table()?;
                    t.set("text", other)?;
                    t
                }
            };
            table.set("type", kind)?;
            Ok(table)
        })?;
        ui.set(kind, ctor)?;
    }
    ui.set("version", env!("CARGO_PKG_VERSION"))?;

    freeze(lua, ui)
}

/// Read-only proxy over `original`.
fn freeze(lua: &Lua, original: Table) -> mlua::Result<Table> {
    let mt = lua.create_table()?;
    mt.set("__index", original)?;
    mt.set(
        "__newindex",
        lua.create_function(|_, (_t, key, _val): (Value, String, Value)| {
            Err::<(), _>(mlua::Error::RuntimeError(format!(
                "{UI_MODULE} is read-only (attempted to set '{key}')"
            )))
        })?,
    )?;
    mt.set("__metatable", false)?;

    let proxy = lua.create_table()?;
    proxy.set_metatable(Some(mt));
    Ok(proxy)
}

/// Convert a handler's Lua return value into a frame.
///
/// `nil` and `false` mean "nothing to show". Tables become component trees
/// (functions inside them are dropped, except a top-level `on_escape`, which
/// becomes the frame's escape handler). Scalars become text frames.
pub fn render_from_lua(lua: &Lua, value: Value) -> ExtensionResult<Option<RenderResult>> {
    let result = match value {
        Value::Nil | Value::Boolean(false) => return Ok(None),
        Value::Table(table) => {
            let kind: Option<String> = table.get("type")?;
            let on_escape: Option<Function> = table.get("on_escape")?;
            let props: serde_json::Value = lua.from_value_with(
                Value::Table(table),
                DeserializeOptions::new().deny_unsupported_types(false),
            )?;

            let result = RenderResult::new(kind.unwrap_or_else(|| FALLBACK_KIND.to_string()), props);
            match on_escape {
                Some(func) => result.with_escape_handler(lua_escape_handler(func)),
                None => result,
            }
        }
        Value::String(s) => RenderResult::text(String::from(s.to_string_lossy())),
        Value::Integer(i) => RenderResult::text(i.to_string()),
        Value::Number(n) => RenderResult::text(n.to_string()),
        Value::Boolean(true) => RenderResult::text("true"),
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "cannot render a {} value",
                other.type_name()
            ))
            .into())
        }
    };
    Ok(Some(result))
}

fn lua_escape_handler(func: Function) -> EscapeHandler {
    Rc::new(move || match func.call::<Value>(()) {
        Ok(Value::Boolean(allowed)) => allowed,
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "escape handler failed, allowing pop");
            true
        }
    })
}
