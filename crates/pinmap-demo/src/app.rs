#![forbid(unsafe_code)]

//! One demo run: load pins, sign in, drop pins, collect what the map shows.

use std::fmt;
use std::io::{self, Write};

use pinmap_core::{Person, PersonId};
use pinmap_runtime::{
    Artifact, JsonFileSource, MemorySurface, PinSource, RenderSurface, Session, SessionConfig,
    SessionError, StaticSource, SurfaceOp,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::Opts;

const FIXTURE: &str = include_str!("../assets/pins.json");

/// The built-in pins.
pub fn fixture() -> Result<Vec<Person>, serde_json::Error> {
    serde_json::from_str(FIXTURE)
}

#[derive(Debug)]
pub enum AppError {
    Fixture(serde_json::Error),
    Session(SessionError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixture(err) => write!(f, "built-in fixture is invalid: {err}"),
            Self::Session(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fixture(err) => Some(err),
            Self::Session(err) => Some(err),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub artifacts: Vec<Artifact>,
    /// Surface commands, oldest first.
    pub log: Vec<SurfaceOp>,
    /// Names by person id, for display.
    pub names: Vec<(PersonId, String)>,
    /// Errors raised inside store subscriptions.
    pub faults: Vec<String>,
}

impl Report {
    fn name_of(&self, id: PersonId) -> &str {
        self.names
            .iter()
            .rev()
            .find(|(pid, _)| *pid == id)
            .map_or("?", |(_, name)| name.as_str())
    }
}

/// Run the demo against an in-memory map.
///
/// `config` is the session configuration before `--key` is applied; the
/// binary reads it from the environment.
pub fn run(opts: &Opts, mut config: SessionConfig) -> Result<Report, AppError> {
    if let Some(key) = opts.key {
        config = config.with_reconcile_key(key);
    }

    let mut session = Session::new(config, opts.user_id, MemorySurface::new());
    match &opts.pins {
        Some(path) => load(&mut session, JsonFileSource::new(path), opts.background)?,
        None => {
            let people = fixture().map_err(AppError::Fixture)?;
            load(&mut session, StaticSource::new(people), opts.background)?;
        }
    }

    let user = session
        .pins_store()
        .find(PersonId(opts.user_id))
        .unwrap_or_else(|| Person::new(opts.user_id, opts.user_name.clone()));
    session.sign_in(user)?;
    for location in &opts.drops {
        session.drop_pin(*location)?;
    }

    let faults: Vec<String> = session
        .take_faults()
        .iter()
        .map(ToString::to_string)
        .collect();
    for fault in &faults {
        warn!(%fault, "fault during update");
    }

    let names = session.pins().into_iter().map(|p| (p.id, p.name)).collect();
    let (artifacts, log) = session.with_surface(|s| (s.artifacts(), s.log().to_vec()));
    info!(
        artifacts = artifacts.len(),
        commands = log.len(),
        "demo finished"
    );
    Ok(Report {
        artifacts,
        log,
        names,
        faults,
    })
}

fn load<P>(
    session: &mut Session<MemorySurface>,
    source: P,
    background: bool,
) -> Result<(), AppError>
where
    P: PinSource + Send + 'static,
{
    let count = if background {
        session.refresh_in_background(source)?;
        session.finish_refresh()?.unwrap_or(0)
    } else {
        session.refresh(&source)?
    };
    info!(count, "pins loaded");
    Ok(())
}

/// Plain-text listing: artifacts, then the command log.
pub fn write_text(report: &Report, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "pins ({}):", report.artifacts.len())?;
    for artifact in &report.artifacts {
        writeln!(
            out,
            "  {} {} [{}] at {}",
            artifact.id, artifact.title, artifact.person, artifact.position
        )?;
    }
    writeln!(out, "commands ({}):", report.log.len())?;
    for op in &report.log {
        match op {
            SurfaceOp::Added { artifact, person } => {
                writeln!(out, "  + {artifact} {}", report.name_of(*person))?;
            }
            SurfaceOp::Removed { artifact, person } => {
                writeln!(out, "  - {artifact} {}", report.name_of(*person))?;
            }
        }
    }
    for fault in &report.faults {
        writeln!(out, "fault: {fault}")?;
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Pin {
        artifact: u64,
        person: u64,
        title: &'a str,
        lat: f64,
        long: f64,
    },
    Added {
        artifact: u64,
        person: u64,
    },
    Removed {
        artifact: u64,
        person: u64,
    },
    Fault {
        message: &'a str,
    },
}

/// One JSON object per line: pins, then commands, then faults.
pub fn write_json(report: &Report, out: &mut impl Write) -> io::Result<()> {
    let pins = report.artifacts.iter().map(|a| Line::Pin {
        artifact: a.id.0,
        person: a.person.0,
        title: &a.title,
        lat: a.position.lat,
        long: a.position.long,
    });
    let commands = report.log.iter().map(|op| match *op {
        SurfaceOp::Added { artifact, person } => Line::Added {
            artifact: artifact.0,
            person: person.0,
        },
        SurfaceOp::Removed { artifact, person } => Line::Removed {
            artifact: artifact.0,
            person: person.0,
        },
    });
    let faults = report.faults.iter().map(|f| Line::Fault { message: f });
    for line in pins.chain(commands).chain(faults) {
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }
    Ok(())
}
