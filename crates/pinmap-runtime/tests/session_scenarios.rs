//! End-to-end session scenarios.
//!
//! Each test drives a [`Session`] over a [`MemorySurface`] and checks the
//! surface command log, which is what a user of the map would actually see.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;

use pinmap_core::{Location, Person, PersonId};
use pinmap_runtime::{
    FetchError, MemorySurface, ReconcileKey, Reentrancy, RenderSurface, Session, SessionConfig,
    SessionError, StaticSource, SurfaceOp,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn at(lat: f64, long: f64) -> Location {
    Location::new(lat, long).unwrap()
}

fn pinned(id: u64, name: &str, lat: f64, long: f64) -> Person {
    Person::new(id, name).with_location(at(lat, long))
}

fn session_with(key: ReconcileKey) -> Session<MemorySurface> {
    init_tracing();
    Session::new(
        SessionConfig::default().with_reconcile_key(key),
        1,
        MemorySurface::new(),
    )
}

fn queued_session(key: ReconcileKey) -> Session<MemorySurface> {
    init_tracing();
    Session::new(
        SessionConfig::default()
            .with_reconcile_key(key)
            .with_reentrancy(Reentrancy::Queue),
        1,
        MemorySurface::new(),
    )
}

fn shown(session: &Session<MemorySurface>) -> Vec<PersonId> {
    let mut persons = session.with_surface(|s| s.persons());
    persons.sort();
    persons
}

fn take_log(session: &Session<MemorySurface>) -> Vec<SurfaceOp> {
    session.with_surface(MemorySurface::take_log)
}

fn removed(log: &[SurfaceOp]) -> Vec<PersonId> {
    log.iter()
        .filter_map(|op| match op {
            SurfaceOp::Removed { person, .. } => Some(*person),
            SurfaceOp::Added { .. } => None,
        })
        .collect()
}

fn added(log: &[SurfaceOp]) -> Vec<PersonId> {
    log.iter()
        .filter_map(|op| match op {
            SurfaceOp::Added { person, .. } => Some(*person),
            SurfaceOp::Removed { .. } => None,
        })
        .collect()
}

#[test]
fn fetched_pins_are_drawn() {
    let session = session_with(ReconcileKey::Identity);
    let fetched = vec![pinned(1, "A", 10.0, 20.0)];

    session
        .refresh(&StaticSource::new(fetched.clone()))
        .unwrap();

    assert_eq!(session.pins(), fetched);
    let log = take_log(&session);
    assert_eq!(added(&log), vec![PersonId(1)]);
    assert!(removed(&log).is_empty());
    let artifacts = session.with_surface(|s| s.artifacts());
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].position, at(10.0, 20.0));
    assert_eq!(artifacts[0].title, "A");
}

#[test]
fn late_subscribers_see_no_history() {
    let session = session_with(ReconcileKey::Identity);
    let source = StaticSource::new(vec![pinned(2, "B", 2.0, 2.0)]);
    for _ in 0..3 {
        session.refresh(&source).unwrap();
    }

    let calls = Rc::new(RefCell::new(0usize));
    let sink = Rc::clone(&calls);
    let sub = session
        .pins_store()
        .subscribe(move |_| *sink.borrow_mut() += 1);
    assert_eq!(*calls.borrow(), 0);

    session.refresh(&source).unwrap();
    assert_eq!(*calls.borrow(), 1);
    sub.cancel();
    session.refresh(&source).unwrap();
    assert_eq!(*calls.borrow(), 1);
}

#[test]
fn repeated_sign_in_keeps_one_user_entry() {
    let session = session_with(ReconcileKey::Identity);
    session
        .refresh(&StaticSource::new(vec![
            pinned(1, "Me", 1.0, 1.0),
            pinned(2, "B", 2.0, 2.0),
        ]))
        .unwrap();

    let me = pinned(1, "Me", 1.0, 1.0);
    session.sign_in(me.clone()).unwrap();
    session.sign_in(me.clone()).unwrap();

    let pins = session.pins();
    let mut ids: Vec<PersonId> = pins.iter().map(|p| p.id).collect();
    assert_eq!(ids.last(), Some(&PersonId(1)));
    ids.sort();
    assert_eq!(ids, vec![PersonId(1), PersonId(2)]);
    assert_eq!(shown(&session), vec![PersonId(1), PersonId(2)]);
    assert!(session.take_faults().is_empty());
}

#[test]
fn replacing_one_person_is_one_remove_and_one_add() {
    let session = session_with(ReconcileKey::Identity);
    session
        .refresh(&StaticSource::new(vec![
            pinned(1, "A", 1.0, 1.0),
            pinned(2, "B", 2.0, 2.0),
        ]))
        .unwrap();
    take_log(&session);

    session
        .refresh(&StaticSource::new(vec![
            pinned(1, "A", 1.0, 1.0),
            pinned(3, "C", 3.0, 3.0),
        ]))
        .unwrap();

    let log = take_log(&session);
    assert_eq!(removed(&log), vec![PersonId(2)]);
    assert_eq!(added(&log), vec![PersonId(3)]);
    assert_eq!(shown(&session), vec![PersonId(1), PersonId(3)]);
}

#[test]
fn shared_coordinates_by_identity() {
    let session = session_with(ReconcileKey::Identity);
    session
        .refresh(&StaticSource::new(vec![
            pinned(2, "B", 1.0, 1.0),
            pinned(3, "C", 1.0, 1.0),
        ]))
        .unwrap();
    assert_eq!(shown(&session), vec![PersonId(2), PersonId(3)]);
    take_log(&session);

    session.pins_store().remove(PersonId(3)).unwrap();
    let log = take_log(&session);
    assert_eq!(removed(&log), vec![PersonId(3)]);
    assert!(added(&log).is_empty());
    assert_eq!(shown(&session), vec![PersonId(2)]);
}

#[test]
fn shared_coordinates_collapse_under_coordinate_key() {
    let session = session_with(ReconcileKey::Coordinate);
    session
        .refresh(&StaticSource::new(vec![
            pinned(2, "B", 1.0, 1.0),
            pinned(3, "C", 1.0, 1.0),
        ]))
        .unwrap();
    // Only the first person at a coordinate gets a pin.
    assert_eq!(shown(&session), vec![PersonId(2)]);
    take_log(&session);

    // Removing C takes B's pin, then the remaining B is redrawn.
    session.pins_store().remove(PersonId(3)).unwrap();
    let log = take_log(&session);
    assert_eq!(removed(&log), vec![PersonId(2)]);
    assert_eq!(added(&log), vec![PersonId(2)]);
}

#[test]
fn dropping_a_pin_moves_it() {
    let session = session_with(ReconcileKey::Identity);
    session
        .refresh(&StaticSource::new(vec![pinned(2, "B", 2.0, 2.0)]))
        .unwrap();
    session.sign_in(Person::new(1, "Me")).unwrap();
    assert!(!session.is_pinned());

    session.drop_pin(at(5.0, 5.0)).unwrap();
    session.drop_pin(at(6.0, 6.0)).unwrap();

    let mine: Vec<Location> = session.with_surface(|s| {
        s.artifacts()
            .into_iter()
            .filter(|a| a.person == PersonId(1))
            .map(|a| a.position)
            .collect()
    });
    assert_eq!(mine, vec![at(6.0, 6.0)]);
}

#[test]
fn stale_fetch_keeps_map() {
    let session = session_with(ReconcileKey::Identity);
    session
        .refresh(&StaticSource::new(vec![pinned(2, "B", 2.0, 2.0)]))
        .unwrap();
    take_log(&session);

    let offline =
        || -> Result<Vec<Person>, FetchError> { Err(FetchError::Unavailable("no network".into())) };
    let err = session.refresh(&offline).unwrap_err();
    assert!(matches!(err, SessionError::StaleFetch(_)));
    assert!(take_log(&session).is_empty());
    assert_eq!(shown(&session), vec![PersonId(2)]);
}

#[test]
fn background_fetch_is_applied_when_polled() {
    let mut session = session_with(ReconcileKey::Identity);
    session
        .refresh_in_background(StaticSource::new(vec![pinned(4, "D", 4.0, 4.0)]))
        .unwrap();

    let mut applied = None;
    for _ in 0..1000 {
        if let Some(count) = session.poll_refresh().unwrap() {
            applied = Some(count);
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(applied, Some(1));
    assert_eq!(shown(&session), vec![PersonId(4)]);
    assert_eq!(session.poll_refresh().unwrap(), None);
}

#[test]
fn slow_background_fetch_times_out() {
    init_tracing();
    let mut session = Session::new(
        SessionConfig::default().with_fetch_timeout(Duration::from_millis(10)),
        1,
        MemorySurface::new(),
    );
    session
        .refresh_in_background(|| -> Result<Vec<Person>, FetchError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(Vec::new())
        })
        .unwrap();

    let err = session.finish_refresh().unwrap_err();
    assert!(matches!(
        err,
        SessionError::StaleFetch(FetchError::TimedOut(_))
    ));
    assert!(!session.is_refreshing());
    assert!(!session.pins_store().is_loaded());
}

#[test]
fn queued_reentrancy_applies_nested_updates() {
    init_tracing();
    let session = Session::new(
        SessionConfig::default().with_reentrancy(Reentrancy::Queue),
        1,
        MemorySurface::new(),
    );
    session.sign_in(Person::new(1, "Me")).unwrap();

    // A subscriber that renames the user once, from inside the notification.
    let store = session.current_user_store().clone();
    let renamed = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&renamed);
    let _sub = session.current_user_store().subscribe(move |user| {
        if !*flag.borrow() && user.name == "Me" {
            *flag.borrow_mut() = true;
            store.set(user.clone().with_name("Me (verified)")).unwrap();
        }
    });

    session.drop_pin(at(7.0, 7.0)).unwrap();
    assert_eq!(session.current_user().unwrap().name, "Me (verified)");
    let titles: Vec<String> =
        session.with_surface(|s| s.artifacts().into_iter().map(|a| a.title).collect());
    assert_eq!(titles, vec!["Me (verified)".to_string()]);
    assert!(session.take_faults().is_empty());
}

#[test]
fn queued_removals_in_one_round_reach_the_map() {
    for key in [ReconcileKey::Identity, ReconcileKey::Coordinate] {
        let session = queued_session(key);
        let source = StaticSource::new(vec![
            pinned(1, "A", 1.0, 1.0),
            pinned(2, "B", 2.0, 2.0),
            pinned(3, "C", 3.0, 3.0),
        ]);
        session.refresh(&source).unwrap();

        // Two removals from inside one pins notification.
        let store = session.pins_store().clone();
        let fired = Rc::new(Cell::new(false));
        let once = Rc::clone(&fired);
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let results = Rc::clone(&outcomes);
        let _sub = session.pins_store().subscribe(move |_| {
            if !once.replace(true) {
                results.borrow_mut().push(store.remove(PersonId(2)));
                results.borrow_mut().push(store.remove(PersonId(3)));
            }
        });

        session.refresh(&source).unwrap();

        let outcomes = outcomes.borrow();
        assert!(matches!(&outcomes[0], Ok(Some(p)) if p.id == PersonId(2)));
        assert!(matches!(&outcomes[1], Ok(Some(p)) if p.id == PersonId(3)));
        let ids: Vec<PersonId> = session.pins().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![PersonId(1)], "key {key}");
        assert_eq!(shown(&session), vec![PersonId(1)], "key {key}");
        assert!(session.take_faults().is_empty());
    }
}

#[test]
fn queued_user_edits_in_one_round_reach_the_map() {
    let session = queued_session(ReconcileKey::Identity);
    session
        .refresh(&StaticSource::new(vec![pinned(2, "B", 2.0, 2.0)]))
        .unwrap();
    session.sign_in(Person::new(1, "Me")).unwrap();

    // Rename and move the user from inside the notification for the first drop.
    let store = session.current_user_store().clone();
    let fired = Rc::new(Cell::new(false));
    let once = Rc::clone(&fired);
    let _sub = session.current_user_store().subscribe(move |user| {
        if user.is_located() && !once.replace(true) {
            store.edit(|p| p.name = "Me (verified)".into()).unwrap();
            store.relocate(at(5.0, 5.0)).unwrap();
        }
    });

    session.drop_pin(at(1.0, 1.0)).unwrap();

    let me = session.current_user().unwrap();
    assert_eq!(me.name, "Me (verified)");
    assert_eq!(me.location, Some(at(5.0, 5.0)));
    let mine: Vec<(Location, String)> = session.with_surface(|s| {
        s.artifacts()
            .into_iter()
            .filter(|a| a.person == PersonId(1))
            .map(|a| (a.position, a.title))
            .collect()
    });
    assert_eq!(mine, vec![(at(5.0, 5.0), "Me (verified)".to_string())]);
    assert_eq!(shown(&session), vec![PersonId(1), PersonId(2)]);
    assert!(session.take_faults().is_empty());
}
