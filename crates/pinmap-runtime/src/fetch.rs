#![forbid(unsafe_code)]

//! Where pins come from.
//!
//! A [`PinSource`] returns the full list of people to show. The runtime does
//! not care how: closures, fixtures ([`StaticSource`]), a JSON file
//! ([`JsonFileSource`], feature `json`), or a network client all fit.
//!
//! [`FetchWorker`] runs one fetch on a background thread and hands the result
//! back over a channel. The result is applied to the stores on the thread
//! that polls the worker, so observables never cross threads.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Source returns `Err` | Caller gets the error; stores keep their value |
//! | Worker panics | `FetchError::Disconnected` on the next poll |
//! | Result late | `wait_timeout` returns `FetchError::TimedOut` |

use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pinmap_core::Person;
use tracing::{debug, warn};

use crate::error::FetchError;

/// Something that can produce the list of people to pin.
pub trait PinSource {
    fn fetch(&self) -> Result<Vec<Person>, FetchError>;
}

impl<F> PinSource for F
where
    F: Fn() -> Result<Vec<Person>, FetchError>,
{
    fn fetch(&self) -> Result<Vec<Person>, FetchError> {
        self()
    }
}

/// A fixed list, returned on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    people: Vec<Person>,
}

impl StaticSource {
    #[must_use]
    pub fn new(people: Vec<Person>) -> Self {
        Self { people }
    }
}

impl PinSource for StaticSource {
    fn fetch(&self) -> Result<Vec<Person>, FetchError> {
        Ok(self.people.clone())
    }
}

/// Reads a JSON array of people from a file on every fetch.
#[cfg(feature = "json")]
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: std::path::PathBuf,
}

#[cfg(feature = "json")]
impl JsonFileSource {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(feature = "json")]
impl PinSource for JsonFileSource {
    fn fetch(&self) -> Result<Vec<Person>, FetchError> {
        let file = std::fs::File::open(&self.path)?;
        let people: Vec<Person> = serde_json::from_reader(io::BufReader::new(file))
            .map_err(|err| FetchError::Parse(format!("{}: {err}", self.path.display())))?;
        for person in &people {
            if let Some(location) = &person.location {
                location.validate().map_err(|err| {
                    FetchError::Parse(format!(
                        "{}: person {}: {err}",
                        self.path.display(),
                        person.id
                    ))
                })?;
            }
        }
        Ok(people)
    }
}

/// One fetch running on a background thread.
#[derive(Debug)]
pub struct FetchWorker {
    rx: mpsc::Receiver<Result<Vec<Person>, FetchError>>,
    handle: Option<JoinHandle<()>>,
}

impl FetchWorker {
    /// Start fetching from `source` on a new thread.
    pub fn spawn<S>(source: S) -> io::Result<Self>
    where
        S: PinSource + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let handle = thread::Builder::new()
            .name("pinmap-fetch".into())
            .spawn(move || {
                let result = source.fetch();
                if let Err(err) = &result {
                    warn!(error = %err, "background fetch failed");
                }
                // The receiver may be gone if the worker was dropped.
                let _ = tx.send(result);
            })?;
        debug!("fetch worker started");
        Ok(Self {
            rx,
            handle: Some(handle),
        })
    }

    /// The result, if the fetch has finished. Returns `None` while it is
    /// still running.
    pub fn try_result(&mut self) -> Option<Result<Vec<Person>, FetchError>> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.join();
                Some(Err(FetchError::Disconnected))
            }
        }
    }

    /// Block until the fetch finishes.
    pub fn wait(mut self) -> Result<Vec<Person>, FetchError> {
        let result = self.rx.recv().unwrap_or(Err(FetchError::Disconnected));
        self.join();
        result
    }

    /// Block for at most `timeout`. On timeout the worker keeps running
    /// detached and its result is discarded.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<Vec<Person>, FetchError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => {
                self.join();
                result
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "fetch timed out");
                self.handle.take();
                Err(FetchError::TimedOut(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                self.join();
                Err(FetchError::Disconnected)
            }
        }
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinmap_core::Location;

    fn people() -> Vec<Person> {
        vec![Person::new(1, "A").with_location(Location::new(10.0, 20.0).unwrap())]
    }

    #[test]
    fn static_source_returns_fixture() {
        let source = StaticSource::new(people());
        assert_eq!(source.fetch().unwrap(), people());
        assert_eq!(source.fetch().unwrap(), people());
    }

    #[test]
    fn closures_are_sources() {
        let failing = || -> Result<Vec<Person>, FetchError> {
            Err(FetchError::Unavailable("backend down".into()))
        };
        assert!(matches!(failing.fetch(), Err(FetchError::Unavailable(_))));
    }

    #[test]
    fn worker_delivers_result() {
        let worker = FetchWorker::spawn(StaticSource::new(people())).unwrap();
        assert_eq!(worker.wait().unwrap(), people());
    }

    #[test]
    fn worker_try_result_eventually_ready() {
        let mut worker = FetchWorker::spawn(StaticSource::new(people())).unwrap();
        let result = loop {
            if let Some(result) = worker.try_result() {
                break result;
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(result.unwrap(), people());
    }

    #[test]
    fn worker_propagates_source_error() {
        let worker = FetchWorker::spawn(|| -> Result<Vec<Person>, FetchError> {
            Err(FetchError::Unavailable("503".into()))
        })
        .unwrap();
        assert!(matches!(worker.wait(), Err(FetchError::Unavailable(msg)) if msg == "503"));
    }

    #[test]
    fn worker_times_out() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = std::sync::Mutex::new(release_rx);
        let worker = FetchWorker::spawn(move || -> Result<Vec<Person>, FetchError> {
            let _ = release_rx
                .lock()
                .expect("release lock poisoned")
                .recv_timeout(Duration::from_secs(5));
            Ok(Vec::new())
        })
        .unwrap();
        let result = worker.wait_timeout(Duration::from_millis(10));
        assert!(matches!(result, Err(FetchError::TimedOut(d)) if d == Duration::from_millis(10)));
        let _ = release_tx.send(());
    }

    #[test]
    fn panicking_source_reports_disconnected() {
        let worker = FetchWorker::spawn(|| -> Result<Vec<Person>, FetchError> {
            panic!("source exploded")
        })
        .unwrap();
        assert!(matches!(worker.wait(), Err(FetchError::Disconnected)));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_file_source_reads_people() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":1,"name":"A","location":{{"lat":10.0,"long":20.0}}}},{{"id":2,"name":"B"}}]"#
        )
        .unwrap();
        let source = JsonFileSource::new(file.path());
        let people = source.fetch().unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].location, Some(Location::new(10.0, 20.0).unwrap()));
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_file_source_errors() {
        use std::io::Write;

        let missing = JsonFileSource::new("/definitely/not/here.json");
        assert!(matches!(missing.fetch(), Err(FetchError::Io(_))));

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"not":"a list"}}"#).unwrap();
        assert!(matches!(
            JsonFileSource::new(bad.path()).fetch(),
            Err(FetchError::Parse(_))
        ));

        let mut out_of_range = tempfile::NamedTempFile::new().unwrap();
        write!(
            out_of_range,
            r#"[{{"id":1,"name":"A","location":{{"lat":120.0,"long":0.0}}}}]"#
        )
        .unwrap();
        assert!(matches!(
            JsonFileSource::new(out_of_range.path()).fetch(),
            Err(FetchError::Parse(msg)) if msg.contains("latitude")
        ));
    }
}
