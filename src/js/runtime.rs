use anyhow::{Context as AnyhowContext, Result};
use rquickjs::{Context, Ctx, Error as JsError, Function, Runtime, Value};

/// Upper bound on promise jobs drained per turn.
const MAX_JOBS: usize = 1000;

/// QuickJS runtime plus the single context scripts run in.
///
/// `console.*` is forwarded to `tracing` under the `quickjs` target, and pending
/// promise jobs are drained after every evaluation so a turn is complete when
/// `eval` returns.
pub struct ScriptEngine {
    runtime: Runtime,
    context: Context,
}

impl ScriptEngine {
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new().context("failed to create QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        let engine = Self { runtime, context };
        engine.init_console()?;
        Ok(engine)
    }

    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let script = with_source_url(source, filename);
        let value = self.with_context(|ctx| ctx.eval::<V, _>(script))?;
        self.drain_jobs()?;
        Ok(value)
    }

    /// Runs `f` inside the context, turning a pending JS exception into its message.
    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        match self.context.with(f) {
            Ok(value) => Ok(value),
            Err(JsError::Exception) => {
                let message = self
                    .context
                    .with(|ctx| capture_exception_message(&ctx))
                    .unwrap_or_else(|| "QuickJS exception".to_string());
                Err(anyhow::anyhow!(message))
            }
            Err(err) => Err(anyhow::Error::from(err)),
        }
    }

    /// Executes queued promise jobs. Returns how many ran.
    pub fn drain_jobs(&self) -> Result<usize> {
        let mut executed = 0;
        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    executed += 1;
                    if executed >= MAX_JOBS {
                        tracing::warn!(
                            target: "quickjs",
                            "stopped draining jobs after {} iterations",
                            MAX_JOBS
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::error!(target: "quickjs", "job failed: {:?}", job_exception);
                    break;
                }
            }
        }
        if executed > 0 {
            tracing::debug!(target: "quickjs", executed, "drained pending jobs");
        }
        Ok(executed)
    }

    fn init_console(&self) -> Result<()> {
        self.with_context(|ctx| {
            let log_fn = Function::new(ctx.clone(), log_from_js)?.with_name("__nb_log")?;
            ctx.globals().set("__nb_log", log_fn)?;
            ctx.eval::<(), _>(CONSOLE_BOOTSTRAP.as_bytes())
        })
    }
}

fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
    let mut script = String::with_capacity(source.len() + filename.len() + 32);
    script.push_str(source);
    if !source.ends_with('\n') {
        script.push('\n');
    }
    script.push_str("//# sourceURL=");
    script.push_str(filename);
    script.push('\n');
    script.into_bytes()
}

fn log_from_js(level: String, message: String) -> rquickjs::Result<()> {
    match level.as_str() {
        "error" => tracing::error!(target: "quickjs", "{message}"),
        "warn" => tracing::warn!(target: "quickjs", "{message}"),
        "debug" => tracing::debug!(target: "quickjs", "{message}"),
        _ => tracing::info!(target: "quickjs", "{message}"),
    }
    Ok(())
}

fn capture_exception_message(ctx: &Ctx<'_>) -> Option<String> {
    let exception: Value = ctx.catch();

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            return Some(message);
        }
    }
    if let Some(text) = exception.as_string() {
        return text.to_string().ok();
    }

    Some(format!("{:?}", exception))
}

const CONSOLE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value !== null && typeof value === 'object') {
                return JSON.stringify(value);
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };

    const forward = (level) => (...args) => {
        try {
            global.__nb_log(level, args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };

    global.console = {
        log: forward('info'),
        info: forward('info'),
        warn: forward('warn'),
        error: forward('error'),
        debug: forward('debug'),
    };
})();
"#;
