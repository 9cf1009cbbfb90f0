//! Verbs and placeholders every reactor script can use

use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{Local, Utc};
use reactor_engine::{Extensions, Flow, Value};
use tracing::info;

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Register the standard verbs (`log`, `wait`, `fail`, `unset`) and
/// placeholders (`now`, `date`, `time`, `timestamp`, `sync`)
pub fn install(extensions: &Extensions) {
    extensions.register_verb("log", |interp, args| {
        info!(target: "script", "[{}] {}", interp.trigger_name(), joined(args));
        Ok(Flow::Continue)
    });

    extensions.register_verb("wait", |_, args| {
        let ms = args
            .first()
            .and_then(Value::as_f64)
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .context("`wait` expects a non-negative number of milliseconds")?;
        std::thread::sleep(Duration::from_millis(ms as u64));
        Ok(Flow::Continue)
    });

    extensions.register_verb("fail", |_, args| {
        if args.is_empty() {
            bail!("script failed");
        }
        bail!("{}", joined(args));
    });

    extensions.register_verb("unset", |interp, args| {
        for name in args.iter().filter_map(Value::as_str) {
            interp.remove_var(name);
        }
        Ok(Flow::Continue)
    });

    extensions.register_placeholder("now", |_, _| Ok(Value::from(Local::now().to_rfc3339())));
    extensions.register_placeholder("date", |_, _| {
        Ok(Value::from(Local::now().format("%Y-%m-%d").to_string()))
    });
    extensions.register_placeholder("time", |_, _| {
        Ok(Value::from(Local::now().format("%H:%M:%S").to_string()))
    });
    extensions.register_placeholder("timestamp", |_, _| Ok(Value::Int(Utc::now().timestamp())));
    extensions.register_placeholder("sync", |interp, _| Ok(Value::Bool(interp.is_sync())));
}
