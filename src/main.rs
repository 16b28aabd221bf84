use anyhow::{bail, Context, Result};
use fanout::{init_tracing_once, FanOut, FanOutOptions};
use std::env;
use std::thread;
use std::time::Duration;

const DEFAULT_ITEMS: usize = 32;
const DEFAULT_DELAY_MS: u64 = 20;

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(Some(raw.trim().parse::<T>().with_context(|| format!("{key}={raw}"))?)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {key}")),
    }
}

fn main() -> Result<()> {
    init_tracing_once();

    let mut opts = match env::var("FANOUT_CONFIG") {
        Ok(path) => FanOutOptions::from_json_file(&path)?,
        Err(_) => FanOutOptions::default().with_progress(true).with_progress_label("Simulated work"),
    };
    if let Some(n) = env_parse::<usize>("FANOUT_PARALLEL")? {
        opts = opts.with_max_parallel(n);
    }
    let items = env_parse::<usize>("FANOUT_ITEMS")?.unwrap_or(DEFAULT_ITEMS);
    let delay = Duration::from_millis(env_parse::<u64>("FANOUT_DELAY_MS")?.unwrap_or(DEFAULT_DELAY_MS));
    let fail_at = env_parse::<usize>("FANOUT_FAIL_AT")?;

    let summary = FanOut::with_options(opts.with_label("demo")).run_with_token(items, |index, token| {
        // Sleep in small steps so a failure elsewhere cuts this item short.
        let step = Duration::from_millis(5);
        let mut slept = Duration::ZERO;
        while slept < delay {
            if token.is_cancelled() {
                return Ok(());
            }
            thread::sleep(step);
            slept += step;
        }
        if fail_at == Some(index) {
            bail!("simulated failure");
        }
        Ok(())
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
