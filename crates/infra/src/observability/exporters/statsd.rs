//! StatsD push exporter
//!
//! Buffers StatsD lines in memory and sends them to an agent over UDP on a
//! fixed interval. Emission never blocks on the network: lines are handed to a
//! background flush task through an unbounded channel.
//!
//! ## Protocol
//! ```text
//! <PREFIX><NAME>.<LABEL1>.<LABEL2>...:<VALUE>|<TYPE>
//! ```
//!
//! Labels are not tags here: every label element becomes a dotted path
//! segment, keys included. Examples:
//! - Timer: `app.sql_operation.driver.sqlite.operation.select:1.250000|ms`
//! - Counter: `app.jobs.queue.default:1|c`
//! - Gauge: `app.pool.idle:3|g`
//!
//! ## Lifecycle
//! `new` → `open` → emit… → `close`. Emitting before `open` or after `close`
//! is a [`LifecycleError`]; `close` flushes whatever is buffered.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use parking_lot::Mutex;
use statskit_common::{LifecycleError, Labels, StatsClient, StatsResult};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

/// Default StatsD agent address
pub const DEFAULT_STATSD_ADDR: &str = "localhost:8125";

/// Default interval between buffer flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest accepted flush interval; shorter values are raised to it
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Largest datagram the flush task will build (fits a 1500 byte MTU)
pub const MAX_DATAGRAM_SIZE: usize = 1432;

enum State {
    Idle,
    Open { sender: mpsc::UnboundedSender<String>, task: JoinHandle<()> },
    Closed,
}

impl State {
    const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Open { .. } => "open",
            Self::Closed => "closed",
        }
    }
}

/// Buffered StatsD client
///
/// Thread-safe; share it behind an `Arc`. [`StatsdClient::open`] must run
/// inside a tokio runtime.
pub struct StatsdClient {
    /// Agent address (`host:port`)
    address: String,
    /// Metric prefix, empty or ending with `.`
    prefix: String,
    /// Interval between flushes
    flush_interval: Duration,
    state: Mutex<State>,
}

impl StatsdClient {
    /// Create a client; no socket is opened until [`StatsdClient::open`].
    ///
    /// A non-empty `prefix` gets a trailing `.` if it lacks one.
    /// `flush_interval` is raised to at least [`MIN_FLUSH_INTERVAL`].
    pub fn new(address: impl Into<String>, prefix: &str, flush_interval: Duration) -> Self {
        let prefix = if prefix.is_empty() || prefix.ends_with('.') {
            prefix.to_string()
        } else {
            format!("{prefix}.")
        };

        Self {
            address: address.into(),
            prefix,
            flush_interval: flush_interval.max(MIN_FLUSH_INTERVAL),
            state: Mutex::new(State::Idle),
        }
    }

    /// Client for the default local agent with a 2 second flush interval.
    pub fn with_prefix(prefix: &str) -> Self {
        Self::new(DEFAULT_STATSD_ADDR, prefix, DEFAULT_FLUSH_INTERVAL)
    }

    /// Normalised prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Interval between buffer flushes.
    pub const fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Whether the client currently accepts metrics.
    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), State::Open { .. })
    }

    /// Resolve the agent, connect a UDP socket and start the flush task.
    ///
    /// # Errors
    /// - [`LifecycleError::AlreadyOpen`] if already open
    /// - [`LifecycleError::Closed`] if the client was closed
    /// - [`StatsError::SendFailed`](statskit_common::StatsError::SendFailed)
    ///   if the address cannot be resolved or the socket cannot be set up
    pub async fn open(&self) -> StatsResult<()> {
        self.ensure_idle()?;

        let target = resolve(&self.address).await?;
        let bind_addr = match target.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;

        let mut state = self.state.lock();
        // Another caller may have opened while the socket was being set up.
        match *state {
            State::Idle => {}
            State::Open { .. } => return Err(LifecycleError::AlreadyOpen.into()),
            State::Closed => return Err(LifecycleError::Closed.into()),
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_flush_loop(socket, receiver, self.flush_interval));
        *state = State::Open { sender, task };

        info!(address = %self.address, %target, interval = ?self.flush_interval, "statsd client opened");
        Ok(())
    }

    /// Stop accepting metrics, flush the buffer and release the socket.
    ///
    /// # Errors
    /// - [`LifecycleError::NotOpen`] if never opened
    /// - [`LifecycleError::Closed`] if already closed
    pub async fn close(&self) -> StatsResult<()> {
        let previous = {
            let mut state = self.state.lock();
            match *state {
                State::Idle => return Err(LifecycleError::NotOpen.into()),
                State::Closed => return Err(LifecycleError::Closed.into()),
                State::Open { .. } => {}
            }
            std::mem::replace(&mut *state, State::Closed)
        };

        if let State::Open { sender, task } = previous {
            // Dropping the sender ends the flush loop after a final flush.
            drop(sender);
            if let Err(e) = task.await {
                warn!(error = %e, "statsd flush task did not finish cleanly");
            }
        }

        info!(address = %self.address, "statsd client closed");
        Ok(())
    }

    fn ensure_idle(&self) -> StatsResult<()> {
        match *self.state.lock() {
            State::Idle => Ok(()),
            State::Open { .. } => Err(LifecycleError::AlreadyOpen.into()),
            State::Closed => Err(LifecycleError::Closed.into()),
        }
    }

    /// Build the full dotted key for `name` and `labels`.
    ///
    /// The caller's labels are read, never modified.
    pub fn key(&self, name: &str, labels: &Labels) -> String {
        let mut key = String::with_capacity(self.prefix.len() + name.len() + labels.len() * 16);
        key.push_str(&self.prefix);
        key.push_str(&sanitize_name(name));
        for label in labels {
            key.push('.');
            key.push_str(&sanitize_label(label));
        }
        key
    }

    fn enqueue(&self, line: String) -> StatsResult<()> {
        match &*self.state.lock() {
            State::Open { sender, .. } => {
                trace!(%line, "buffered statsd line");
                sender.send(line).map_err(|_| LifecycleError::Closed.into())
            }
            State::Idle => Err(LifecycleError::NotOpen.into()),
            State::Closed => Err(LifecycleError::Closed.into()),
        }
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient")
            .field("address", &self.address)
            .field("prefix", &self.prefix)
            .field("flush_interval", &self.flush_interval)
            .field("state", &self.state.lock().name())
            .finish()
    }
}

impl StatsClient for StatsdClient {
    fn timing(&self, name: &str, labels: &Labels, duration: Duration) -> StatsResult<()> {
        let millis = duration.as_secs_f64() * 1000.0;
        self.enqueue(format!("{}:{millis:.6}|ms", self.key(name, labels)))
    }

    fn incr(&self, name: &str, labels: &Labels, value: i64) -> StatsResult<()> {
        self.enqueue(format!("{}:{value}|c", self.key(name, labels)))
    }

    fn gauge(&self, name: &str, labels: &Labels, value: f64) -> StatsResult<()> {
        self.enqueue(format!("{}:{value}|g", self.key(name, labels)))
    }
}

// ============================================================================
// Key sanitisation
// ============================================================================

/// Lowercase and replace protocol characters. Dots are kept as separators.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ':' | '|' | '@' | '#' => '-',
            c if c.is_whitespace() => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Like [`sanitize_name`] but dots are replaced too, so one label is one segment.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '.' | ':' | '|' | '@' | '#' => '-',
            c if c.is_whitespace() => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

// ============================================================================
// Flush task
// ============================================================================

async fn resolve(address: &str) -> io::Result<SocketAddr> {
    tokio::net::lookup_host(address).await?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("no address found for {address}"))
    })
}

async fn run_flush_loop(
    socket: UdpSocket,
    mut receiver: mpsc::UnboundedReceiver<String>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buffer = Vec::new();

    loop {
        tokio::select! {
            line = receiver.recv() => match line {
                Some(line) => buffer.push(line),
                None => break,
            },
            _ = ticker.tick() => flush(&socket, &mut buffer).await,
        }
    }

    flush(&socket, &mut buffer).await;
    debug!("statsd flush task stopped");
}

async fn flush(socket: &UdpSocket, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }

    let lines = buffer.len();
    for datagram in pack_datagrams(buffer.drain(..), MAX_DATAGRAM_SIZE) {
        // UDP is best-effort: a failed send drops that datagram only.
        if let Err(e) = socket.send(datagram.as_bytes()).await {
            warn!(error = %e, bytes = datagram.len(), "failed to send statsd datagram");
        }
    }
    trace!(lines, "flushed statsd buffer");
}

/// Join lines with `\n` into datagrams no longer than `max_size` bytes.
///
/// A single line longer than `max_size` is sent on its own.
fn pack_datagrams(lines: impl IntoIterator<Item = String>, max_size: usize) -> Vec<String> {
    let mut datagrams = Vec::new();
    let mut current = String::new();

    for line in lines {
        let needed = if current.is_empty() { line.len() } else { current.len() + 1 + line.len() };
        if needed > max_size && !current.is_empty() {
            datagrams.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(&line);
    }

    if !current.is_empty() {
        datagrams.push(current);
    }
    datagrams
}
