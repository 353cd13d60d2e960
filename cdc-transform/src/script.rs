use cdc_model::{ChangeEvent, Error, EventSink, Result};
use rquickjs::function::Async;
use rquickjs::{async_with, AsyncContext, AsyncRuntime, CatchResultExt, Ctx, Function, Object, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// An embedded ECMAScript transform (spec §4.6.3). The script source is
/// validated once at load time; after that a fresh [`AsyncRuntime`] +
/// [`AsyncContext`] pair is created for every event, so no mutable state
/// ever survives across events.
pub struct ScriptTransformer {
    source: String,
    sink: Option<Arc<dyn EventSink>>,
}

impl ScriptTransformer {
    /// Load-time validation: the source must evaluate to a callable, or
    /// define a global `transform` function (spec §4.6.3 "Script shape").
    /// Fails fast in a throwaway runtime if neither shape is present.
    pub async fn load(source: String, sink: Option<Arc<dyn EventSink>>) -> Result<Self> {
        let runtime = AsyncRuntime::new()
            .map_err(|e| Error::Config(format!("cannot create script runtime: {e}")))?;
        let context = AsyncContext::full(&runtime)
            .await
            .map_err(|e| Error::Config(format!("cannot create script context: {e}")))?;

        let resolvable = async_with!(context => |ctx| {
            resolve_transform_fn(&ctx, &source).catch(&ctx).is_ok()
        })
        .await;

        if !resolvable {
            return Err(Error::Config(
                "transformer.script must evaluate to a function or define a global `transform`"
                    .into(),
            ));
        }

        Ok(ScriptTransformer { source, sink })
    }

    /// Run the script against one event (spec §4.6.3 "Invocation").
    /// Returns `Ok(None)` when the script rejects the event (returned
    /// `null`/`undefined`); `Err` only for script exceptions or
    /// marshalling failures, which the Pipeline logs and drops.
    pub async fn transform(&self, event: &ChangeEvent) -> Result<Option<ChangeEvent>> {
        let input_json = serde_json::to_string(&event)
            .map_err(|e| Error::Transform(format!("cannot serialize event for script: {e}")))?;

        let runtime = AsyncRuntime::new()
            .map_err(|e| Error::Transform(format!("cannot create script runtime: {e}")))?;
        let context = AsyncContext::full(&runtime)
            .await
            .map_err(|e| Error::Transform(format!("cannot create script context: {e}")))?;

        let sink = self.sink.clone();
        let source = self.source.clone();

        let output_json: Option<String> = async_with!(context => |ctx| {
            install_console(&ctx).catch(&ctx)?;
            install_nats(&ctx, sink).catch(&ctx)?;

            let input_value: Value = ctx
                .json_parse(input_json.clone())
                .catch(&ctx)?;

            let func = resolve_transform_fn(&ctx, &source).catch(&ctx)?;
            let result: Value = func.call((input_value,)).catch(&ctx)?;

            if result.is_undefined() || result.is_null() {
                Ok::<_, rquickjs::Error>(None)
            } else {
                let text: rquickjs::String = ctx.json_stringify(result).catch(&ctx)?.ok_or_else(|| {
                    rquickjs::Error::Exception
                })?;
                Ok(Some(text.to_string().catch(&ctx)?))
            }
        })
        .await
        .map_err(|e| Error::Transform(format!("script execution failed: {e}")))?;

        let output_json = match output_json {
            None => {
                info!(database = event.database.as_str(), table = event.table.as_str(), "event rejected by script");
                return Ok(None);
            }
            Some(json) => json,
        };

        let value: serde_json::Value = serde_json::from_str(&output_json)
            .map_err(|e| Error::Transform(format!("script returned invalid JSON: {e}")))?;
        let mut transformed = ChangeEvent::from_json_value(&value)
            .map_err(|e| Error::Transform(format!("script result missing canonical fields: {e}")))?;
        transformed.raw_bytes = Some(output_json.into_bytes());
        Ok(Some(transformed))
    }
}

/// Shape (a): the source is a single expression evaluating to a callable, so
/// the program's completion value *is* the transform function. Shape (b):
/// the source is one or more statements that define a global `transform`
/// function (possibly alongside helper `const`/`function` declarations), so
/// the completion value is not callable and `transform` is read off
/// `globalThis` instead (spec §4.6.3 "Script shape").
fn resolve_transform_fn<'js>(ctx: &Ctx<'js>, source: &str) -> rquickjs::Result<Function<'js>> {
    let completion: Value = ctx.eval(source.to_string())?;
    if let Some(func) = completion.into_function() {
        return Ok(func);
    }
    let transform: Value = ctx.globals().get("transform")?;
    transform.into_function().ok_or(rquickjs::Error::Exception)
}

fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    console.set("log", Function::new(ctx.clone(), |args: rquickjs::function::Rest<String>| {
        debug!(target: "cdc_script", "{}", args.0.join(" "));
    })?)?;
    console.set("info", Function::new(ctx.clone(), |args: rquickjs::function::Rest<String>| {
        info!(target: "cdc_script", "{}", args.0.join(" "));
    })?)?;
    console.set("warn", Function::new(ctx.clone(), |args: rquickjs::function::Rest<String>| {
        warn!(target: "cdc_script", "{}", args.0.join(" "));
    })?)?;
    console.set("error", Function::new(ctx.clone(), |args: rquickjs::function::Rest<String>| {
        error!(target: "cdc_script", "{}", args.0.join(" "));
    })?)?;
    console.set("debug", Function::new(ctx.clone(), |args: rquickjs::function::Rest<String>| {
        debug!(target: "cdc_script", "{}", args.0.join(" "));
    })?)?;
    ctx.globals().set("console", console)?;
    Ok(())
}

/// `data`/`value` may be a JS string (used as-is) or any other
/// JSON-serializable value, which is JSON-encoded first (spec §4.6.3
/// `nats.publish`/`nats.kv.put` contract).
fn js_value_to_bytes(ctx: &Ctx<'_>, value: Value<'_>) -> std::result::Result<Vec<u8>, String> {
    if let Some(s) = value.as_string() {
        return s
            .to_string()
            .map(|s| s.into_bytes())
            .map_err(|e| format!("nats payload is not valid UTF-8: {e}"));
    }
    let json = ctx
        .json_stringify(value)
        .map_err(|e| format!("cannot JSON-encode nats payload: {e}"))?
        .ok_or_else(|| "cannot JSON-encode nats payload: undefined".to_string())?;
    json.to_string()
        .map(|s| s.into_bytes())
        .map_err(|e| format!("cannot JSON-encode nats payload: {e}"))
}

fn install_nats(ctx: &Ctx<'_>, sink: Option<Arc<dyn EventSink>>) -> rquickjs::Result<()> {
    let nats = Object::new(ctx.clone())?;

    let publish_sink = sink.clone();
    nats.set(
        "publish",
        Function::new(
            ctx.clone(),
            Async(move |ctx: Ctx<'_>, subject: String, data: Value<'_>| {
                let sink = publish_sink.clone();
                async move {
                    let bytes = js_value_to_bytes(&ctx, data)?;
                    match sink {
                        Some(sink) => sink
                            .publish_raw(&subject, &bytes)
                            .await
                            .map_err(|e| format!("nats.publish failed: {e}")),
                        None => Err("nats.publish: no sink configured".to_string()),
                    }
                }
            }),
        )?,
    )?;

    let kv = Object::new(ctx.clone())?;

    let get_sink = sink.clone();
    kv.set(
        "get",
        Function::new(
            ctx.clone(),
            Async(move |bucket: String, key: String| {
                let sink = get_sink.clone();
                async move {
                    match sink {
                        Some(sink) => sink
                            .kv_get(&bucket, &key)
                            .await
                            .map(|opt| opt.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
                            .map_err(|e| format!("nats.kv.get failed: {e}")),
                        None => Err("nats.kv.get: no sink configured".to_string()),
                    }
                }
            }),
        )?,
    )?;

    let put_sink = sink.clone();
    kv.set(
        "put",
        Function::new(
            ctx.clone(),
            Async(move |ctx: Ctx<'_>, bucket: String, key: String, value: Value<'_>| {
                let sink = put_sink.clone();
                async move {
                    let bytes = js_value_to_bytes(&ctx, value)?;
                    match sink {
                        Some(sink) => sink
                            .kv_put(&bucket, &key, &bytes)
                            .await
                            .map_err(|e| format!("nats.kv.put failed: {e}")),
                        None => Err("nats.kv.put: no sink configured".to_string()),
                    }
                }
            }),
        )?,
    )?;

    let delete_sink = sink;
    kv.set(
        "delete",
        Function::new(
            ctx.clone(),
            Async(move |bucket: String, key: String| {
                let sink = delete_sink.clone();
                async move {
                    match sink {
                        Some(sink) => sink
                            .kv_delete(&bucket, &key)
                            .await
                            .map_err(|e| format!("nats.kv.delete failed: {e}")),
                        None => Err("nats.kv.delete: no sink configured".to_string()),
                    }
                }
            }),
        )?,
    )?;

    nats.set("kv", kv)?;
    ctx.globals().set("nats", nats)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_model::{ChangeEvent, ColumnValue, Row};

    fn sample_event() -> ChangeEvent {
        let mut row = Row::new();
        row.insert("id", ColumnValue::Int(1));
        ChangeEvent::insert("shop", "orders", 1, vec![row])
    }

    #[tokio::test]
    async fn shape_a_single_expression_resolves() {
        let source = "(function(e) { return e; })".to_string();
        let transformer = ScriptTransformer::load(source, None).await.unwrap();
        let result = transformer.transform(&sample_event()).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn shape_b_global_transform_alongside_a_helper_statement_resolves() {
        let source = r#"
            const PREFIX = "mysql-cdc";
            function transform(e) {
                e.rows[0].source = PREFIX;
                return e;
            }
        "#
        .to_string();
        let transformer = ScriptTransformer::load(source, None).await.unwrap();
        let event = transformer
            .transform(&sample_event())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event.rows[0].get_ci("source"),
            Some(&ColumnValue::Text("mysql-cdc".to_string()))
        );
    }

    #[tokio::test]
    async fn source_with_neither_shape_fails_to_load() {
        let source = "const x = 1;".to_string();
        let err = ScriptTransformer::load(source, None).await;
        assert!(err.is_err());
    }
}
