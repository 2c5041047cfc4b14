mod config;
mod dispatcher;
mod error;
mod report;
mod runner;
mod sample;
mod stats;
mod tls;

#[cfg(test)]
mod test_support;

use config::Config;
use report::Report;
use runner::Runner;

use tokio_util::sync::CancellationToken;
use tracing::Level;

fn main() {
    if let Err(err) = try_main() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn try_main() -> error::Result<()> {
    let config = Config::parse()?;
    init_tracing(config.verbosity);

    let runner = Runner::new(config)?;
    let url = runner.config().url.clone();
    let concurrency = runner.config().concurrency;
    let summarize = runner.config().summarize;

    // First Ctrl+C stops the run and still reports, a second one exits
    let cancel = runner.cancel_token();
    ctrlc
        ::set_handler(move || {
            if !first_interrupt(&cancel) {
                eprintln!("Interrupted again, exiting without a report");
                std::process::exit(130);
            }
        })
        .expect("Error setting Ctrl+C handler");

    let summary = runner.run()?;
    Report::new(&summary, &url, concurrency).print(summarize)?;
    Ok(())
}

/// Cancels the run on the first interrupt. Returns false once the run was
/// already cancelled.
fn first_interrupt(cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    cancel.cancel();
    true
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_interrupt_is_not_absorbed() {
        let cancel = CancellationToken::new();
        assert!(first_interrupt(&cancel));
        assert!(cancel.is_cancelled());
        assert!(!first_interrupt(&cancel));
    }
}
