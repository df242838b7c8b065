//! Pipeline orchestration: one-shot and watch modes.
//!
//! One-shot runs ingest then digest and returns. Watch mode repeats that
//! cycle on a steady interval until the shared cancellation token fires —
//! SIGINT and SIGTERM both cancel it, and the current cycle is abandoned
//! at its next await point. A cycle that fails aborts the watch and
//! propagates its error.

use anyhow::{bail, Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{parse_duration, Config, TasteProfile};
use crate::digest::{run_digest, DigestOptions};
use crate::ingest::{print_report, run_pull};
use crate::store::Store;

/// Parse the `--every` flag. Empty means one-shot; anything else must be a
/// positive duration.
pub fn parse_every(value: &str) -> Result<Option<Duration>> {
    if value.is_empty() {
        return Ok(None);
    }
    let interval = parse_duration(value).context("parse --every")?;
    if interval.is_zero() {
        bail!("--every must be greater than zero");
    }
    Ok(Some(interval))
}

/// One pull-then-digest cycle.
pub async fn run_once(
    config: &Config,
    profile: &TasteProfile,
    store: &Store,
    options: &DigestOptions,
) -> Result<()> {
    let report = run_pull(config, store).await?;
    print_report(&report);
    run_digest(config, profile, store, options).await
}

/// Cancel `token` on SIGINT or SIGTERM.
pub fn cancel_on_signals(token: CancellationToken) {
    tokio::spawn(async move {
        let interrupt = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut terminate =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(stream) => stream,
                    Err(err) => {
                        eprintln!("warning: install SIGTERM handler: {err}");
                        let _ = interrupt.await;
                        token.cancel();
                        return;
                    }
                };
            tokio::select! {
                _ = interrupt => {}
                _ = terminate.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = interrupt.await;
        }

        token.cancel();
    });
}

/// Run `cycle` immediately and then on every tick of `interval` until the
/// token is cancelled. A failing cycle aborts the watch.
pub async fn run_watch<F, Fut>(
    interval: Duration,
    token: CancellationToken,
    mut cycle: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    tokio::select! {
        _ = token.cancelled() => return Ok(()),
        result = cycle() => result?,
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // the immediate first tick was the run above

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            _ = ticker.tick() => {
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    result = cycle() => result?,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn every_flag_validation() {
        assert_eq!(parse_every("").unwrap(), None);
        assert_eq!(
            parse_every("30m").unwrap(),
            Some(Duration::from_secs(1800))
        );
        assert!(parse_every("0s").is_err());
        assert!(parse_every("soon").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_runs_until_cancelled() {
        let token = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let watch_token = token.clone();
        let watch_runs = Arc::clone(&runs);
        let handle = tokio::spawn(run_watch(
            Duration::from_secs(60),
            watch_token,
            move || {
                let runs = Arc::clone(&watch_runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        ));

        // First run is immediate; two more ticks follow under paused time.
        tokio::time::sleep(Duration::from_secs(130)).await;
        token.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_cycle_aborts_the_watch() {
        let token = CancellationToken::new();
        let result = run_watch(Duration::from_secs(60), token, || async {
            anyhow::bail!("cycle exploded")
        })
        .await;

        assert!(result.is_err());
    }
}
