use crate::config::Config;
use crate::error::Result;
use crate::sample::{ LatencySample, Ticket };
use crate::tls;

use std::io;
use std::sync::Arc;
use std::time::Duration;
use isahc::{
    config::Configurable,
    error::ErrorKind,
    http::StatusCode,
    AsyncReadResponseExt,
    HttpClient,
    ResponseExt,
};
use tokio::{ sync::{ mpsc, Mutex }, task::{ JoinHandle, JoinSet }, time::Instant };
use tokio_util::sync::CancellationToken;
use tracing::{ debug, trace, warn };
use url::Url;

type TicketQueue = Arc<Mutex<mpsc::Receiver<Ticket>>>;

/// Worker pool that drains a fixed queue of tickets against one shared client.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: HttpClient, // shared by all workers, pools connections internally
    url: Url,
    concurrency: usize,
    requests: usize,
}

impl Dispatcher {
    /// Build the shared client. Bad TLS material fails here, before any request.
    pub fn new(config: &Config) -> Result<Self> {
        let builder = HttpClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .metrics(true);

        let (builder, url) = match &config.tls {
            Some(tls_config) => tls::configure(builder, tls_config, &config.url)?,
            None => (builder, config.url.clone()),
        };

        Ok(Self {
            client: builder.build()?,
            url,
            concurrency: config.concurrency,
            requests: config.requests,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Spawn the pool and hand back the sample stream. The stream ends once
    /// every worker has exited.
    pub fn start(
        self,
        cancel: CancellationToken
    ) -> (JoinHandle<Result<()>>, mpsc::Receiver<LatencySample>) {
        let (samples_tx, samples_rx) = mpsc::channel(self.requests.max(1));
        let handle = tokio::spawn(self.run(cancel, samples_tx));
        (handle, samples_rx)
    }

    pub async fn run(
        self,
        cancel: CancellationToken,
        samples: mpsc::Sender<LatencySample>
    ) -> Result<()> {
        // Every ticket is queued before the first worker starts
        let (tickets_tx, tickets_rx) = mpsc::channel(self.requests.max(1));
        for index in 0..self.requests {
            if tickets_tx.send(Ticket(index)).await.is_err() {
                break;
            }
        }
        drop(tickets_tx);

        let tickets: TicketQueue = Arc::new(Mutex::new(tickets_rx));
        let workers = self.concurrency.min(self.requests);
        debug!("Starting {} worker(s) for {} request(s) to {}", workers, self.requests, self.url);

        let url: Arc<str> = Arc::from(self.url.as_str());
        let mut set = JoinSet::new();
        for id in 0..workers {
            set.spawn(
                worker(
                    id,
                    self.client.clone(),
                    url.clone(),
                    tickets.clone(),
                    samples.clone(),
                    cancel.clone()
                )
            );
        }
        drop(samples);

        // Join every worker, not just the first to finish
        let mut failure = None;
        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                warn!("Worker task failed: {}", err);
                failure.get_or_insert(err);
            }
        }
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

async fn worker(
    id: usize,
    client: HttpClient,
    url: Arc<str>,
    tickets: TicketQueue,
    samples: mpsc::Sender<LatencySample>,
    cancel: CancellationToken
) {
    let mut attempted = 0usize;
    let mut failed = 0usize;
    loop {
        let ticket = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Worker {} stopping: run cancelled", id);
                break;
            }
            ticket = next_ticket(&tickets) => ticket,
        };
        let Some(ticket) = ticket else {
            break; // queue drained
        };

        let sample = send_request(&client, &url).await;
        match sample.status_code() {
            Some(code) => trace!("Worker {} ticket {}: {} in {:?}", id, ticket.0, code, sample.total()),
            None => trace!("Worker {} ticket {}: {:?}", id, ticket.0, sample.outcome),
        }
        attempted += 1;
        if sample.is_timed_out() || sample.is_errored() {
            failed += 1;
        }

        if samples.send(sample).await.is_err() {
            debug!("Worker {} stopping: collector finished", id);
            break;
        }
    }
    debug!("Worker {} exited after {} request(s), {} failed", id, attempted, failed);
}

async fn next_ticket(tickets: &TicketQueue) -> Option<Ticket> {
    tickets.lock().await.recv().await
}

/// Send one GET and turn whatever happens into a sample.
pub async fn send_request(client: &HttpClient, url: &str) -> LatencySample {
    let start = Instant::now();

    let mut response = match client.get_async(url).await {
        Ok(res) => res,
        Err(err) => {
            return if matches!(err.kind(), ErrorKind::Timeout) {
                LatencySample::timed_out()
            } else {
                LatencySample::errored()
            };
        }
    };

    // drain the body so the connection goes back to the pool
    if let Err(err) = response.consume().await {
        return classify_io_error(&err);
    }

    let elapsed = start.elapsed();
    let (connection, server) = match response.metrics() {
        Some(metrics) => split_phases(
            metrics.name_lookup_time() + metrics.connect_time(),
            metrics.total_time()
        ),
        None => (Duration::ZERO, elapsed),
    };

    let status = response.status();
    LatencySample::completed(connection, server, status.as_u16(), status_line(status))
}

/// Connection phase is DNS + TCP; everything after it counts as server time.
fn split_phases(connection: Duration, total: Duration) -> (Duration, Duration) {
    let connection = connection.min(total);
    (connection, total - connection)
}

fn classify_io_error(err: &io::Error) -> LatencySample {
    if err.kind() == io::ErrorKind::TimedOut {
        LatencySample::timed_out()
    } else {
        LatencySample::errored()
    }
}

/// "200 OK" style status text, as matched by the status pattern. The reason
/// is the canonical phrase for the code; the server's own reason phrase is not
/// exposed by the client and is never matched.
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
