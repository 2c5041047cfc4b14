use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::stats::{ self, RunSummary };

use tokio::{ runtime::{ Builder, Runtime }, task::JoinHandle, time::{ sleep_until, Instant } };
use tokio_util::sync::CancellationToken;
use tracing::{ debug, info };

/// Runner joins the dispatcher and the stats collector for one run.
#[derive(Debug)]
pub struct Runner {
    config: Config,
    dispatcher: Dispatcher,
    cancel: CancellationToken, // cancelled on Ctrl+C
}

impl Runner {
    /*------------------==| Public Functions |==-------------------------*/
    /// Create a new Runner. Fails on unusable TLS material before any
    /// request is sent.
    pub fn new(config: Config) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        Ok(Self {
            config,
            dispatcher,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancelling this token ends the run early; the summary still covers
    /// every sample collected so far.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Main entry point: build the runtime and block until the summary is ready
    pub fn run(self) -> Result<RunSummary> {
        let runtime = Self::get_runtime(self.config.threads)?;
        runtime.block_on(self.execute())
    }

    pub async fn execute(self) -> Result<RunSummary> {
        let Runner { config, dispatcher, cancel } = self;

        // The deadline cancels a child token so Ctrl+C and the time limit share one signal
        let run_token = cancel.child_token();
        let timer = Instant::now()
            .checked_add(config.time_limit)
            .map(|deadline| Self::spawn_deadline_timer(deadline, run_token.clone()));

        info!(
            "Sending {} request(s) to {} using {} worker(s), time limit {:?}",
            config.requests,
            dispatcher.url(),
            config.concurrency.min(config.requests),
            config.time_limit
        );

        let (pool, mut samples) = dispatcher.start(run_token.clone());
        let summary = stats::collect(
            config.requests,
            &config.status_pattern,
            &mut samples,
            &run_token
        ).await;

        // Idle workers exit now, busy ones once their request finishes
        drop(samples);
        run_token.cancel();
        if let Some(timer) = timer {
            timer.abort();
        }
        pool.await??;

        info!(
            "Run finished: {} request(s) in {:?} ({} errors, {} timeouts)",
            summary.total_requests,
            summary.elapsed,
            summary.total_errors,
            summary.total_timeouts
        );
        Ok(summary)
    }

    /*-------------------==| Private/Helpers |==----------------------- */

    fn spawn_deadline_timer(deadline: Instant, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    debug!("Time limit reached");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }

    /// Helper function to create the tokio runtime
    fn get_runtime(threads: usize) -> Result<Runtime> {
        Ok(Builder::new_multi_thread().worker_threads(threads).enable_all().build()?)
    }
}
