use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_millis(1_000);

pub trait TypingListener: Send + Sync {
    fn typing_started(&self);
    fn typing_stopped(&self);
}

/// Identifies the keystroke a stop timer was armed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingTicket(u64);

/// Debounce bookkeeping shared by every timer driver.
///
/// Only the ticket from the latest keystroke can fire, and it fires once.
#[derive(Debug, Default)]
pub struct TypingDebounce {
    generation: u64,
    pending: bool,
}

impl TypingDebounce {
    pub fn keystroke(&mut self) -> TypingTicket {
        self.generation = self.generation.wrapping_add(1);
        self.pending = true;
        TypingTicket(self.generation)
    }

    /// Consumes the pending stop if `ticket` is still current.
    pub fn elapsed(&mut self, ticket: TypingTicket) -> bool {
        if !self.pending || ticket.0 != self.generation {
            return false;
        }

        self.pending = false;
        true
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Emits "typing started" on every keystroke and "typing stopped" once the
/// input has been idle for `idle`.
///
/// Timers run on the given tokio runtime. Dropping the notifier aborts any
/// pending timer without emitting "stopped".
pub struct TypingNotifier<L: ?Sized> {
    runtime: Handle,
    idle: Duration,
    listener: Arc<L>,
    debounce: Arc<Mutex<TypingDebounce>>,
    timer: Option<JoinHandle<()>>,
}

impl<L> TypingNotifier<L>
where
    L: TypingListener + ?Sized + 'static,
{
    pub fn new(runtime: Handle, idle: Duration, listener: Arc<L>) -> Self {
        Self {
            runtime,
            idle,
            listener,
            debounce: Arc::new(Mutex::new(TypingDebounce::default())),
            timer: None,
        }
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }

    pub fn keystroke(&mut self) {
        self.listener.typing_started();

        let ticket = self.debounce.lock().keystroke();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let listener = Arc::clone(&self.listener);
        let debounce = Arc::clone(&self.debounce);
        let idle = self.idle;
        self.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(idle).await;

            // A keystroke racing this wake-up bumps the generation first.
            let fire = debounce.lock().elapsed(ticket);
            if fire {
                listener.typing_stopped();
            }
        }));
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.lock().is_pending()
    }

    pub fn cancel(&mut self) {
        self.debounce.lock().cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<L: ?Sized> Drop for TypingNotifier<L> {
    fn drop(&mut self) {
        self.debounce.lock().cancel();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
