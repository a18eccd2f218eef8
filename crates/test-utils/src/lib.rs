pub mod fixtures;

use std::error::Error as StdError;
use std::sync::{Mutex, Once};
use std::time::{Duration, Instant};

use classpath_oracle::ScanLogger;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Poll `condition` every 20ms until it holds or `timeout` passes.
/// Returns the last result.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Default deadline for filesystem events to arrive.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
    pub level: Level,
    pub message: String,
    pub cause: Option<String>,
}

/// [`ScanLogger`] that keeps everything it is told, for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LoggedMessage>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LoggedMessage> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages_at(Level::WARN)
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl ScanLogger for RecordingLogger {
    fn log(&self, level: Level, message: &str, cause: Option<&(dyn StdError + 'static)>) {
        self.entries.lock().unwrap().push(LoggedMessage {
            level,
            message: message.to_string(),
            cause: cause.map(|c| c.to_string()),
        });
    }
}
