//! The agent script sandbox (spec §4.7), grounded in the
//! `swissarmyhammer-swissarmyhammer` manifest's use of `rquickjs` for
//! embedded script execution — the only example in the retrieval pack
//! that reaches for an embedded JS engine rather than a host-language
//! runtime.
//!
//! A fresh `AsyncContext` is built per call, shares no globals with any
//! previous call, and receives exactly the capability set spec §4.7
//! names: the frozen `opensrc` API object, a handful of safe JS
//! builtins, and nothing else. `require`, `process`, timers, and
//! dynamic `import()` are never defined, so referencing them raises
//! QuickJS's own `ReferenceError` — the isolation the spec asks for
//! falls directly out of what the context does *not* expose, rather
//! than an explicit deny-list.

use crate::sandbox_api::SandboxApi;
use opensrc_domain::error::{Error, Result};
use rquickjs::function::Async;
use rquickjs::{AsyncContext, AsyncRuntime, CatchResultExt, Ctx, Exception, Function, Object, Value};
use std::sync::Arc;
use std::time::Duration;

/// Compiles and runs one agent-authored script, honoring `deadline` for
/// the script's combined sync+async lifetime.
pub struct Sandbox {
    runtime: AsyncRuntime,
}

impl Sandbox {
    pub async fn new() -> Result<Self> {
        let runtime = AsyncRuntime::new().map_err(|e| Error::internal(format!("failed to start QuickJS runtime: {e}")))?;
        Ok(Self { runtime })
    }

    /// Evaluate `code` as an expression producing a callable (an arrow
    /// function, per spec §4.7), invoke it with no arguments, and
    /// return its resolved value stringified to JSON text. Any
    /// exception raised inside the sandbox, or a deadline overrun,
    /// surfaces as an `Error` rather than a panic.
    pub async fn execute(&self, api: Arc<SandboxApi>, code: &str, deadline: Duration) -> Result<String> {
        let context = AsyncContext::full(&self.runtime)
            .await
            .map_err(|e| Error::internal(format!("failed to create QuickJS context: {e}")))?;

        let run = run_script(context, api, code.to_string());
        match tokio::time::timeout(deadline, run).await {
            Ok(result) => result,
            Err(_) => Err(Error::execution_timeout(deadline.as_millis() as u64)),
        }
    }
}

async fn run_script(context: AsyncContext, api: Arc<SandboxApi>, code: String) -> Result<String> {
    rquickjs::async_with!(context => |ctx| {
        install_globals(&ctx, api).map_err(|e| Error::code_execution(e.to_string()))?;

        let callable: Value = ctx.eval(code.into_bytes()).catch(&ctx).map_err(|e| Error::code_execution(e.to_string()))?;
        let func = callable
            .as_function()
            .ok_or_else(|| Error::code_execution("script did not evaluate to a callable"))?;

        let result: Value = func.call(()).catch(&ctx).map_err(|e| Error::code_execution(e.to_string()))?;
        let result = resolve_if_promise(&ctx, result).await?;
        stringify(&ctx, result)
    })
    .await
}

/// Arrow `async () => ...` functions return a Promise; plain arrow
/// functions return their value directly. Both are handled, since
/// spec §4.7 only says "a callable", not which calling convention.
async fn resolve_if_promise<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Result<Value<'js>> {
    let Some(promise) = value.as_promise() else { return Ok(value) };
    promise.clone().into_future::<Value>().await.catch(ctx).map_err(|e| Error::code_execution(e.to_string()))
}

fn stringify(ctx: &Ctx<'_>, value: Value<'_>) -> Result<String> {
    if value.is_undefined() {
        return Ok("undefined".to_string());
    }
    if let Some(s) = value.as_string() {
        return s.to_string().map_err(|e| Error::code_execution(e.to_string()));
    }
    let json = ctx.globals().get::<_, Object>("JSON").map_err(|e| Error::code_execution(e.to_string()))?;
    let stringify: Function = json.get("stringify").map_err(|e| Error::code_execution(e.to_string()))?;
    stringify.call((value,)).catch(ctx).map_err(|e| Error::code_execution(e.to_string()))
}

/// Install the frozen `opensrc` API object plus the handful of safe
/// builtins spec §4.7 names. Every other ambient capability (timers,
/// network, subprocess, filesystem, process metadata, dynamic
/// `import()`, reflective host access) is denied simply by never being
/// defined in this fresh context.
fn install_globals(ctx: &Ctx<'_>, api: Arc<SandboxApi>) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    let opensrc = build_opensrc_object(ctx, api)?;
    globals.set("opensrc", opensrc)?;
    globals.set("console", build_console(ctx)?)?;
    freeze_builtin_prototypes(ctx)?;
    Ok(())
}

fn build_console<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;
    console.set("log", Function::new(ctx.clone(), || {})?)?;
    console.set("error", Function::new(ctx.clone(), || {})?)?;
    console.set("warn", Function::new(ctx.clone(), || {})?)?;
    Ok(console)
}

/// Freeze `Object`/`Array`/`String`/`Number`/`Boolean`/`Function`'s
/// prototypes before executing user code, per spec §4.7's explicit
/// anti-prototype-pollution step.
fn freeze_builtin_prototypes(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    ctx.eval::<(), _>(
        r"
        for (const ctor of [Object, Array, String, Number, Boolean, Function]) {
            Object.freeze(ctor.prototype);
        }
        ",
    )
}

/// Rethrow a domain `Error` as a plain JS `Error` carrying its message,
/// so an agent sees `err.message` rather than an opaque QuickJS
/// exception.
fn throw<'js, T>(ctx: &Ctx<'js>, result: Result<T>) -> rquickjs::Result<T> {
    result.map_err(|e| Exception::throw_message(ctx, &e.to_string()))
}

/// Every `SandboxApi` method hands back a `serde_json::Value`; rather
/// than implementing `IntoJs` for it, round-trip it through the
/// context's own `JSON.parse` — the same approach `stringify` above
/// takes in reverse with `JSON.stringify`.
fn json_to_js<'js>(ctx: &Ctx<'js>, value: serde_json::Value) -> rquickjs::Result<Value<'js>> {
    let text = value.to_string();
    let json = ctx.globals().get::<_, Object>("JSON")?;
    let parse: Function = json.get("parse")?;
    parse.call((text,))
}

/// Extract one optional field from a caller-supplied options object —
/// every multi-option call in spec §6 takes its trailing parameter as
/// `{field?, ...}` rather than one positional argument per option
/// (e.g. `grep(pattern, {sources?, include?, maxResults?})`). A missing
/// object or a missing key both yield `None`, matching what an absent
/// positional argument would have done.
fn opt_field<'js, T: rquickjs::FromJs<'js>>(obj: &Option<Object<'js>>, key: &str) -> rquickjs::Result<Option<T>> {
    match obj {
        Some(o) => o.get(key),
        None => Ok(None),
    }
}

/// `astGrep`'s `lang` option accepts either a single language name or
/// an array of them (spec §6: `lang: string | string[]`); normalizes
/// both shapes (and an absent field) to a `Vec`.
fn lang_field<'js>(obj: &Option<Object<'js>>, key: &str) -> rquickjs::Result<Vec<String>> {
    let Some(obj) = obj else { return Ok(Vec::new()) };
    let value: Value = obj.get(key)?;
    if value.is_undefined() || value.is_null() {
        return Ok(Vec::new());
    }
    if let Some(s) = value.as_string() {
        return Ok(vec![s.to_string()?]);
    }
    if let Some(arr) = value.as_array() {
        return arr.iter::<String>().collect();
    }
    Ok(Vec::new())
}

fn build_opensrc_object<'js>(ctx: &Ctx<'js>, api: Arc<SandboxApi>) -> rquickjs::Result<Object<'js>> {
    let obj = Object::new(ctx.clone())?;

    {
        let api = Arc::clone(&api);
        obj.set("list", Function::new(ctx.clone(), move |ctx: Ctx<'js>| json_to_js(&ctx, api.list()))?)?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "has",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, name: String, version: Option<String>| {
                json_to_js(&ctx, api.has(&name, version.as_deref()))
            })?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "get",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, name: String| json_to_js(&ctx, api.get(&name)))?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "files",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, source: String, pattern: Option<String>| {
                let value = throw(&ctx, api.files(&source, pattern.as_deref()))?;
                json_to_js(&ctx, value)
            })?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "tree",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, source: String, opts: Option<Object<'js>>| {
                let depth: Option<u32> = opt_field(&opts, "depth")?;
                let pattern: Option<String> = opt_field(&opts, "pattern")?;
                let value = throw(&ctx, api.tree(&source, depth, pattern.as_deref()))?;
                json_to_js(&ctx, value)
            })?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "read",
            Function::new(
                ctx.clone(),
                Async(move |ctx: Ctx<'js>, source: String, path: String| {
                    let api = Arc::clone(&api);
                    async move {
                        let value = throw(&ctx, api.read(&source, &path).await)?;
                        json_to_js(&ctx, value)
                    }
                }),
            )?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "readMany",
            Function::new(
                ctx.clone(),
                Async(move |ctx: Ctx<'js>, source: String, paths: Vec<String>| {
                    let api = Arc::clone(&api);
                    async move {
                        let value = throw(&ctx, api.read_many(&source, paths).await)?;
                        json_to_js(&ctx, value)
                    }
                }),
            )?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "grep",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, pattern: String, opts: Option<Object<'js>>| {
                let sources: Option<Vec<String>> = opt_field(&opts, "sources")?;
                let include: Option<String> = opt_field(&opts, "include")?;
                let max_results: Option<usize> = opt_field(&opts, "maxResults")?;
                let value = throw(&ctx, api.grep(&pattern, sources, include.as_deref(), max_results))?;
                json_to_js(&ctx, value)
            })?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "astGrep",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, source: String, pattern: String, opts: Option<Object<'js>>| {
                let glob_pattern: Option<String> = opt_field(&opts, "glob")?;
                let langs = lang_field(&opts, "lang")?;
                let limit: Option<usize> = opt_field(&opts, "limit")?;
                let value = throw(&ctx, api.ast_grep(&source, &pattern, glob_pattern.as_deref(), &langs, limit))?;
                json_to_js(&ctx, value)
            })?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "semanticSearch",
            Function::new(
                ctx.clone(),
                Async(move |ctx: Ctx<'js>, query: String, opts: Option<Object<'js>>| {
                    let api = Arc::clone(&api);
                    async move {
                        let sources: Option<Vec<String>> = opt_field(&opts, "sources")?;
                        let top_k: Option<usize> = opt_field(&opts, "topK")?;
                        let value = throw(&ctx, api.semantic_search(&query, sources, top_k).await)?;
                        json_to_js(&ctx, value)
                    }
                }),
            )?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "resolve",
            Function::new(ctx.clone(), move |ctx: Ctx<'js>, spec: String| {
                let value = throw(&ctx, api.resolve(&spec))?;
                json_to_js(&ctx, value)
            })?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "fetch",
            Function::new(
                ctx.clone(),
                Async(move |ctx: Ctx<'js>, specs: Vec<String>, opts: Option<Object<'js>>| {
                    let api = Arc::clone(&api);
                    async move {
                        let modify: Option<bool> = opt_field(&opts, "modify")?;
                        let value = throw(&ctx, api.fetch(specs, modify.unwrap_or(false)).await)?;
                        json_to_js(&ctx, value)
                    }
                }),
            )?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "remove",
            Function::new(
                ctx.clone(),
                Async(move |ctx: Ctx<'js>, names: Vec<String>| {
                    let api = Arc::clone(&api);
                    async move {
                        let value = throw(&ctx, api.remove(names).await)?;
                        json_to_js(&ctx, value)
                    }
                }),
            )?,
        )?;
    }
    {
        let api = Arc::clone(&api);
        obj.set(
            "clean",
            Function::new(
                ctx.clone(),
                Async(move |ctx: Ctx<'js>, opts: Option<Object<'js>>| {
                    let api = Arc::clone(&api);
                    async move {
                        let packages: Option<bool> = opt_field(&opts, "packages")?;
                        let repos: Option<bool> = opt_field(&opts, "repos")?;
                        let npm: Option<bool> = opt_field(&opts, "npm")?;
                        let pypi: Option<bool> = opt_field(&opts, "pypi")?;
                        let crates: Option<bool> = opt_field(&opts, "crates")?;
                        let value = throw(
                            &ctx,
                            api.clean(
                                packages.unwrap_or(false),
                                repos.unwrap_or(false),
                                npm.unwrap_or(false),
                                pypi.unwrap_or(false),
                                crates.unwrap_or(false),
                            )
                            .await,
                        )?;
                        json_to_js(&ctx, value)
                    }
                }),
            )?,
        )?;
    }

    obj.freeze()?;
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stringify_handles_undefined_and_strings() {
        let runtime = AsyncRuntime::new().unwrap();
        let context = AsyncContext::full(&runtime).await.unwrap();
        rquickjs::async_with!(context => |ctx| {
            let undef = Value::new_undefined(ctx.clone());
            assert_eq!(stringify(&ctx, undef).unwrap(), "undefined");
        })
        .await;
    }
}
