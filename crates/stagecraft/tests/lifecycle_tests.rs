use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use stagecraft::actor::{Actor, Context};
use stagecraft::actor_proxy;
use stagecraft::dead_letters::{DeadLetter, DeadLettersListener};
use stagecraft::error::{ActorError, FailureReason};
use stagecraft::message::Outcome;
use stagecraft::stage::{Definition, Stage};

// --- Test Actors ---

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count_of(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }
}

struct HookedActor {
    log: EventLog,
}

#[async_trait]
impl Actor for HookedActor {
    async fn before_start(&mut self, _context: &mut Context) -> Outcome {
        self.log.record("before_start");
        Ok(())
    }

    async fn after_stop(&mut self, _context: &mut Context) -> Outcome {
        self.log.record("after_stop");
        Ok(())
    }
}

impl HookedActor {
    async fn touch(&mut self, _context: &mut Context) -> Outcome {
        self.log.record("touch");
        Ok(())
    }
}

actor_proxy! {
    pub proxy Hooked for HookedActor {
        fn touch();
    }
}

struct ParentActor {
    log: EventLog,
}

#[async_trait]
impl Actor for ParentActor {
    async fn before_start(&mut self, context: &mut Context) -> Outcome {
        let log = self.log.clone();
        let child = context
            .child_actor_for(Definition::of(move || Ok(HookedActor { log: log.clone() })).named("child"))
            .await
            .map_err(|fault| FailureReason::because(fault.to_string()))?;
        Hooked::new(child);
        Ok(())
    }
}

actor_proxy! {
    pub proxy Parent for ParentActor {}
}

struct RecordingListener {
    letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl DeadLettersListener for RecordingListener {
    fn handle(&self, dead_letter: &DeadLetter) -> Result<(), FailureReason> {
        self.letters.lock().unwrap().push(dead_letter.clone());
        Ok(())
    }
}

async fn eventually(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("never happened: {what}");
}

// --- Tests ---

#[tokio::test]
async fn stop_runs_after_stop_exactly_once() {
    let stage = Stage::new("stop-once").await;
    let log = EventLog::default();
    let spawned = log.clone();
    let hooked = Hooked::new(
        stage
            .actor_for(Definition::of(move || Ok(HookedActor { log: spawned.clone() })))
            .await
            .expect("actor should start"),
    );

    hooked.touch();
    hooked.stop();
    hooked.stop();
    hooked.stop();
    eventually("actor stopped", || hooked.is_stopped()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(log.count_of("after_stop"), 1);
    assert_eq!(log.count_of("before_start"), 1);
    stage.terminate().await;
}

#[tokio::test]
async fn sends_after_stop_become_dead_letters() {
    let stage = Stage::new("late-send").await;
    let letters = Arc::new(Mutex::new(Vec::new()));
    stage
        .dead_letters()
        .expect("dead letters actor")
        .register_listener(Arc::new(RecordingListener {
            letters: letters.clone(),
        }));

    let log = EventLog::default();
    let spawned = log.clone();
    let hooked = Hooked::new(
        stage
            .actor_for(Definition::of(move || Ok(HookedActor { log: spawned.clone() })))
            .await
            .expect("actor should start"),
    );
    hooked.stop();
    eventually("actor stopped", || hooked.is_stopped()).await;

    hooked.touch();
    eventually("dead letter reported", || !letters.lock().unwrap().is_empty()).await;

    let letters = letters.lock().unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].representation(), "Hooked.touch()");
    assert_eq!(letters[0].address(), hooked.address());
    // the invocation was never executed
    assert_eq!(log.count_of("touch"), 0);
    stage.terminate().await;
}

#[tokio::test]
async fn failed_construction_surfaces_and_registers_nothing() {
    let stage = Stage::new("construction").await;
    let before = stage.actor_count();

    let refused = stage
        .actor_for(Definition::of(|| {
            Err::<HookedActor, _>(FailureReason::because("no disk"))
        }))
        .await;
    assert!(matches!(refused, Err(ActorError::ConstructionFailed(_))));
    assert_eq!(stage.actor_count(), before);
    stage.terminate().await;
}

#[tokio::test]
async fn failed_before_start_is_a_construction_failure() {
    struct Unstartable;

    #[async_trait]
    impl Actor for Unstartable {
        async fn before_start(&mut self, _context: &mut Context) -> Outcome {
            Err(FailureReason::because("refusing to start"))
        }
    }

    let stage = Stage::new("before-start").await;
    let before = stage.actor_count();
    let refused = stage.actor_for(Definition::of(|| Ok(Unstartable))).await;
    match refused {
        Err(ActorError::ConstructionFailed(reason)) => {
            assert_eq!(reason.message(), "refusing to start");
        }
        _ => panic!("expected a construction failure"),
    }
    assert_eq!(stage.actor_count(), before);
    stage.terminate().await;
}

#[tokio::test]
async fn stopping_a_parent_stops_its_children() {
    let stage = Stage::new("subtree").await;
    let log = EventLog::default();
    let spawned = log.clone();
    let parent = Parent::new(
        stage
            .actor_for(Definition::of(move || Ok(ParentActor { log: spawned.clone() })))
            .await
            .expect("parent should start"),
    );
    // the child started inside before_start
    assert_eq!(log.count_of("before_start"), 1);

    parent.stop();
    eventually("child stopped with its parent", || {
        log.count_of("after_stop") == 1
    })
    .await;
    stage.terminate().await;
}

#[tokio::test]
async fn a_secured_actor_refuses_stage_and_parent_access() {
    struct Hermit {
        log: EventLog,
    }

    impl Actor for Hermit {}

    impl Hermit {
        async fn withdraw(&mut self, context: &mut Context) -> Outcome {
            context.secure();
            if context.stage().is_err() {
                self.log.record("stage refused");
            }
            if context.parent_as::<Sealed>().is_err() {
                self.log.record("parent refused");
            }
            Ok(())
        }
    }

    actor_proxy! {
        pub proxy Sealed for Hermit {
            fn withdraw();
        }
    }

    let stage = Stage::new("secured").await;
    let log = EventLog::default();
    let spawned = log.clone();
    let sealed = Sealed::new(
        stage
            .actor_for(Definition::of(move || Ok(Hermit { log: spawned.clone() })))
            .await
            .expect("actor should start"),
    );
    sealed.withdraw();
    eventually("both accessors refused", || {
        log.events() == ["stage refused", "parent refused"]
    })
    .await;
    stage.terminate().await;
}

#[tokio::test]
async fn terminated_stage_refuses_new_actors() {
    let stage = Stage::new("terminated").await;
    stage.terminate().await;
    let log = EventLog::default();
    let refused = stage
        .actor_for(Definition::of(move || Ok(HookedActor { log: log.clone() })))
        .await;
    assert!(matches!(refused, Err(ActorError::StageTerminated)));
}
