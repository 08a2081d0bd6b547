use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use rquickjs::{Ctx, Exception, Function, Object};
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use super::runtime::ScriptEngine;
use crate::bridge::{FlushReport, NativeBridge};
use crate::canvas::{CanvasOp, GraphicsContext};
use crate::transport::Properties;

/// Runs application scripts against a [`NativeBridge`].
///
/// Scripts see a global `bridge` object. Every script turn (an `eval` or a delivered
/// native event) ends by raising the flush signal, so mutations issued during the
/// turn reach the native side before control returns.
pub struct ScriptHost {
    engine: ScriptEngine,
    bridge: Rc<RefCell<NativeBridge>>,
    canvases: Canvases,
}

type Canvases = Rc<RefCell<HashMap<String, GraphicsContext>>>;

impl ScriptHost {
    pub fn new(bridge: NativeBridge) -> Result<Self> {
        let engine = ScriptEngine::new()?;
        let bridge = Rc::new(RefCell::new(bridge));
        let canvases: Canvases = Rc::default();
        install_bridge_bindings(&engine, Rc::clone(&bridge), Rc::clone(&canvases))
            .context("failed to install bridge bindings")?;
        Ok(Self {
            engine,
            bridge,
            canvases,
        })
    }

    pub fn bridge(&self) -> Rc<RefCell<NativeBridge>> {
        Rc::clone(&self.bridge)
    }

    /// Evaluates a script as one turn and flushes at its end.
    ///
    /// The flush happens even when the script throws; the script error is returned
    /// afterwards.
    pub fn eval(&self, source: &str, filename: &str) -> Result<FlushReport> {
        let outcome = self.engine.eval(source, filename);
        let report = self.flush()?;
        outcome.with_context(|| format!("script {filename} failed"))?;
        Ok(report)
    }

    /// Evaluates an expression as one turn and returns its value.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let outcome = self.engine.eval_with(source, filename);
        self.flush()?;
        outcome
    }

    /// Delivers a native-originated event to script handlers, then flushes.
    ///
    /// Returns the number of handlers that were registered for the event.
    pub fn notify(&self, id: &str, event: &str, detail: &JsonValue) -> Result<usize> {
        let detail_json = serde_json::to_string(detail)?;
        let outcome = self.engine.with_context(|ctx| {
            let bridge: Object = ctx.globals().get("bridge")?;
            let dispatch: Function = bridge.get("__dispatch")?;
            dispatch.call::<_, u32>((id, event, detail_json))
        });
        if let Err(err) = self.engine.drain_jobs() {
            error!(target: "quickjs", error = %err, "failed to drain jobs after event");
        }
        self.flush()?;

        let handled = outcome.with_context(|| format!("'{event}' handler for {id} failed"))?;
        debug!(target: "bridge", %id, %event, handled, "delivered native event");
        Ok(handled as usize)
    }

    /// Operations a script-created canvas has packed but not yet drawn.
    pub fn canvas_pending(&self, id: &str) -> Option<usize> {
        self.canvases.borrow().get(id).map(GraphicsContext::pending)
    }

    /// Raises the bridge's flush signal.
    pub fn flush(&self) -> Result<FlushReport> {
        let report = self
            .bridge
            .try_borrow_mut()
            .map_err(|_| anyhow!("bridge is already borrowed"))?
            .trigger_flush()?;
        Ok(report)
    }
}

fn install_bridge_bindings(
    engine: &ScriptEngine,
    bridge: Rc<RefCell<NativeBridge>>,
    canvases: Canvases,
) -> Result<()> {
    engine.with_context(|ctx| {
        let global = ctx.globals();

        {
            let bridge_ref = Rc::clone(&bridge);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, object_type: String, properties: String| -> rquickjs::Result<String> {
                    let properties = parse_properties(&ctx, &properties)?;
                    let mut bridge = borrow_bridge(&ctx, &bridge_ref)?;
                    let id = bridge.allocate_id();
                    bridge.enqueue_create(id.clone(), object_type, properties);
                    Ok(id)
                },
            )?
            .with_name("__nb_create")?;
            global.set("__nb_create", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String, properties: String| -> rquickjs::Result<()> {
                    let properties = parse_properties(&ctx, &properties)?;
                    borrow_bridge(&ctx, &bridge_ref)?.enqueue_set(&id, properties);
                    Ok(())
                },
            )?
            .with_name("__nb_set")?;
            global.set("__nb_set", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String, event: String, enabled: bool| -> rquickjs::Result<()> {
                    borrow_bridge(&ctx, &bridge_ref)?.enqueue_listen(id, event, enabled);
                    Ok(())
                },
            )?
            .with_name("__nb_listen")?;
            global.set("__nb_listen", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let canvases_ref = Rc::clone(&canvases);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String| -> rquickjs::Result<()> {
                    // canvases must also leave the flush signal
                    let removed = canvases_ref.borrow_mut().remove(&id);
                    let mut bridge = borrow_bridge(&ctx, &bridge_ref)?;
                    match removed {
                        Some(mut canvas) => canvas.dispose(&mut *bridge),
                        None => bridge.enqueue_destroy(id),
                    }
                    Ok(())
                },
            )?
            .with_name("__nb_destroy")?;
            global.set("__nb_destroy", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String, property: String| -> rquickjs::Result<String> {
                    let result = borrow_bridge(&ctx, &bridge_ref)?.get(&id, &property);
                    match result {
                        Ok(value) => encode_value(&ctx, &value),
                        Err(err) => throw(&ctx, err),
                    }
                },
            )?
            .with_name("__nb_get")?;
            global.set("__nb_get", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>,
                      id: String,
                      method: String,
                      parameters: String|
                      -> rquickjs::Result<String> {
                    let parameters = parse_properties(&ctx, &parameters)?;
                    let result = borrow_bridge(&ctx, &bridge_ref)?.call(&id, &method, &parameters);
                    match result {
                        Ok(value) => encode_value(&ctx, &value),
                        Err(err) => throw(&ctx, err),
                    }
                },
            )?
            .with_name("__nb_call")?;
            global.set("__nb_call", func)?;
        }

        // Canvas
        {
            let bridge_ref = Rc::clone(&bridge);
            let canvases_ref = Rc::clone(&canvases);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, properties: String| -> rquickjs::Result<String> {
                    let properties = parse_properties(&ctx, &properties)?;
                    let mut bridge = borrow_bridge(&ctx, &bridge_ref)?;
                    let canvas = GraphicsContext::new(&mut *bridge, properties);
                    let id = canvas.id().to_string();
                    canvases_ref.borrow_mut().insert(id.clone(), canvas);
                    Ok(id)
                },
            )?
            .with_name("__nb_canvas_create")?;
            global.set("__nb_canvas_create", func)?;
        }

        {
            let canvases_ref = Rc::clone(&canvases);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String, name: String, args: String| -> rquickjs::Result<()> {
                    let args: Vec<JsonValue> = match serde_json::from_str(&args) {
                        Ok(args) => args,
                        Err(err) => return throw(&ctx, err),
                    };
                    let canvases = canvases_ref.borrow();
                    let Some(canvas) = canvases.get(&id) else {
                        return throw(&ctx, format!("unknown canvas '{id}'"));
                    };
                    match canvas.draw(&name, &args) {
                        Ok(()) => Ok(()),
                        Err(err) => throw(&ctx, err),
                    }
                },
            )?
            .with_name("__nb_canvas_draw")?;
            global.set("__nb_canvas_draw", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let canvases_ref = Rc::clone(&canvases);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String| -> rquickjs::Result<bool> {
                    let canvases = canvases_ref.borrow();
                    let Some(canvas) = canvases.get(&id) else {
                        return throw(&ctx, format!("unknown canvas '{id}'"));
                    };
                    let result = canvas.flush(&mut *borrow_bridge(&ctx, &bridge_ref)?);
                    match result {
                        Ok(drawn) => Ok(drawn),
                        Err(err) => throw(&ctx, err),
                    }
                },
            )?
            .with_name("__nb_canvas_flush")?;
            global.set("__nb_canvas_flush", func)?;
        }

        {
            let bridge_ref = Rc::clone(&bridge);
            let canvases_ref = Rc::clone(&canvases);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, id: String| -> rquickjs::Result<()> {
                    let removed = canvases_ref.borrow_mut().remove(&id);
                    if let Some(mut canvas) = removed {
                        canvas.dispose(&mut *borrow_bridge(&ctx, &bridge_ref)?);
                    }
                    Ok(())
                },
            )?
            .with_name("__nb_canvas_dispose")?;
            global.set("__nb_canvas_dispose", func)?;
        }

        {
            let names: Vec<String> = CanvasOp::ALL
                .iter()
                .map(|op| op.name().to_string())
                .collect();
            global.set("__nb_canvas_ops", names)?;
        }

        ctx.eval::<(), _>(BRIDGE_BOOTSTRAP.as_bytes())
    })
}

fn borrow_bridge<'a>(
    ctx: &Ctx<'_>,
    bridge: &'a Rc<RefCell<NativeBridge>>,
) -> rquickjs::Result<RefMut<'a, NativeBridge>> {
    match bridge.try_borrow_mut() {
        Ok(bridge) => Ok(bridge),
        Err(_) => throw(ctx, "bridge is busy"),
    }
}

fn parse_properties(ctx: &Ctx<'_>, json: &str) -> rquickjs::Result<Properties> {
    match serde_json::from_str::<Properties>(json) {
        Ok(properties) => Ok(properties),
        Err(err) => throw(ctx, format!("properties must be a plain object: {err}")),
    }
}

fn encode_value(ctx: &Ctx<'_>, value: &JsonValue) -> rquickjs::Result<String> {
    match serde_json::to_string(value) {
        Ok(json) => Ok(json),
        Err(err) => throw(ctx, err),
    }
}

fn throw<T>(ctx: &Ctx<'_>, err: impl Display) -> rquickjs::Result<T> {
    let message = err.to_string();
    error!(target: "quickjs", "bridge call failed: {message}");
    Err(Exception::throw_message(ctx, &message))
}

const BRIDGE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const handlers = new Map();
    const encode = (value) => JSON.stringify(value === undefined ? {} : value);

    const handlersFor = (id, event, create) => {
        let events = handlers.get(id);
        if (!events) {
            if (!create) {
                return null;
            }
            events = new Map();
            handlers.set(id, events);
        }
        let list = events.get(event);
        if (!list && create) {
            list = [];
            events.set(event, list);
        }
        return list || null;
    };

    const canvasOps = global.__nb_canvas_ops;

    global.bridge = {
        create(type, properties) {
            return global.__nb_create(String(type), encode(properties));
        },
        set(id, properties) {
            global.__nb_set(id, encode(properties));
        },
        get(id, name) {
            return JSON.parse(global.__nb_get(id, String(name)));
        },
        call(id, method, parameters) {
            return JSON.parse(global.__nb_call(id, String(method), encode(parameters)));
        },
        on(id, event, handler) {
            if (typeof handler !== 'function') {
                throw new TypeError('handler must be a function');
            }
            const list = handlersFor(id, event, true);
            if (list.length === 0) {
                global.__nb_listen(id, event, true);
            }
            list.push(handler);
        },
        off(id, event, handler) {
            const list = handlersFor(id, event, false);
            if (!list) {
                return;
            }
            if (handler) {
                const index = list.indexOf(handler);
                if (index >= 0) {
                    list.splice(index, 1);
                }
            } else {
                list.length = 0;
            }
            if (list.length === 0) {
                handlers.get(id).delete(event);
                global.__nb_listen(id, event, false);
            }
        },
        destroy(id) {
            handlers.delete(id);
            global.__nb_destroy(id);
        },
        canvas(properties) {
            const id = global.__nb_canvas_create(encode(properties));
            const gc = {
                id,
                draw(name, ...args) {
                    global.__nb_canvas_draw(id, String(name), JSON.stringify(args));
                    return gc;
                },
                flush() {
                    return global.__nb_canvas_flush(id);
                },
                dispose() {
                    global.__nb_canvas_dispose(id);
                },
            };
            for (const name of canvasOps) {
                gc[name] = (...args) => gc.draw(name, ...args);
            }
            return gc;
        },
        __dispatch(id, event, detailJson) {
            const list = handlersFor(id, event, false);
            if (!list) {
                return 0;
            }
            const detail = JSON.parse(detailJson);
            const snapshot = list.slice();
            for (const handler of snapshot) {
                handler.call(null, detail, id);
            }
            return snapshot.length;
        },
    };
})();
"#;
