use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::debug;

use crate::breeds::{BreedCatalog, Round};
use crate::game::{GameEvent, ImageTicket};
use crate::image_pool::{
    ImageError, ImageHandle, ImagePool, ImageResolver, PreloadProgress, PreloadReport,
};

/// Unified event type consumed by the app runner
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// One more preload request settled
    Preload(PreloadProgress),
    PoolReady {
        round: Round,
        pool: ImagePool,
        report: PreloadReport,
    },
    ImageResolved {
        ticket: ImageTicket,
        result: Result<ImageHandle, ImageError>,
    },
}

/// Source of app events (keyboard, resize, background loads)
pub trait AppEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;

    /// Handle for background tasks to post their results into the loop
    fn sender(&self) -> Sender<AppEvent>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let input_tx = tx.clone();

        std::thread::spawn(move || loop {
            match event::read() {
                Ok(CtEvent::Key(key)) => {
                    if input_tx.send(AppEvent::Key(key)).is_err() {
                        break;
                    }
                }
                Ok(CtEvent::Resize(_, _)) => {
                    if input_tx.send(AppEvent::Resize).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        });

        Self { tx, rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Event source fed by hand, for tests and headless runs
pub struct TestEventSource {
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
}

impl TestEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl Default for TestEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    fn sender(&self) -> Sender<AppEvent> {
        self.tx.clone()
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: AppEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: AppEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    pub fn sender(&self) -> Sender<AppEvent> {
        self.event_source.sender()
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> AppEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => AppEvent::Tick,
        }
    }
}

/// Runs image work on a tokio runtime and posts results back as [`AppEvent`]s
pub struct Loader<R: ImageResolver + 'static> {
    handle: tokio::runtime::Handle,
    resolver: Arc<R>,
    tx: Sender<AppEvent>,
}

impl<R: ImageResolver + 'static> Loader<R> {
    pub fn new(handle: tokio::runtime::Handle, resolver: Arc<R>, tx: Sender<AppEvent>) -> Self {
        Self {
            handle,
            resolver,
            tx,
        }
    }

    /// Start whatever background work `event` asks for. Returns whether it
    /// was a loading request.
    pub fn dispatch(&self, event: &GameEvent, catalog: &BreedCatalog) -> bool {
        match event {
            GameEvent::PreloadRequested {
                round,
                count,
                dispatch_gap,
            } => {
                self.preload(
                    *round,
                    catalog.breeds_for_round(*round).to_vec(),
                    *count,
                    *dispatch_gap,
                );
                true
            }
            GameEvent::ImageRequested(ticket) => {
                self.fetch(ticket.clone());
                true
            }
            _ => false,
        }
    }

    pub fn preload(&self, round: Round, breeds: Vec<String>, count: usize, dispatch_gap: Duration) {
        let resolver = Arc::clone(&self.resolver);
        let tx = self.tx.clone();
        debug!(%round, count, "spawning preload");
        self.handle.spawn(async move {
            let progress_tx = tx.clone();
            let mut pool = ImagePool::new();
            let report = pool
                .populate(&*resolver, round, &breeds, count, dispatch_gap, |progress| {
                    let _ = progress_tx.send(AppEvent::Preload(progress));
                })
                .await;
            let _ = tx.send(AppEvent::PoolReady {
                round,
                pool,
                report,
            });
        });
    }

    pub fn fetch(&self, ticket: ImageTicket) {
        let resolver = Arc::clone(&self.resolver);
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            let result = resolver.resolve(&ticket.breed).await;
            let _ = tx.send(AppEvent::ImageResolved { ticket, result });
        });
    }
}
