use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagecraft::actor::{Actor, Context};
use stagecraft::actor_proxy;
use stagecraft::dead_letters::{DeadLetter, DeadLettersListener};
use stagecraft::error::FailureReason;
use stagecraft::message::Outcome;
use stagecraft::stage::{Definition, Stage};

// --- Test Actor & Listeners ---

#[derive(Default)]
struct QuietActor;

impl Actor for QuietActor {}

impl QuietActor {
    async fn ping(&mut self, _context: &mut Context) -> Outcome {
        Ok(())
    }

    async fn tag(&mut self, _context: &mut Context, _label: String, _weight: u32) -> Outcome {
        Ok(())
    }
}

actor_proxy! {
    pub proxy Quiet for QuietActor {
        fn ping();
        fn tag(label: String, weight: u32);
    }
}

struct FailingListener {
    attempts: Arc<AtomicUsize>,
}

impl DeadLettersListener for FailingListener {
    fn handle(&self, _dead_letter: &DeadLetter) -> Result<(), FailureReason> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FailureReason::because("listener down"))
    }
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
async fn a_failing_listener_never_blocks_the_others() {
    let stage = Stage::new("fan-out").await;
    let dead_letters = stage.dead_letters().expect("dead letters actor");

    let attempts = Arc::new(AtomicUsize::new(0));
    let letters = Arc::new(Mutex::new(Vec::new()));
    dead_letters.register_listener(Arc::new(FailingListener {
        attempts: attempts.clone(),
    }));
    dead_letters.register_listener(Arc::new(RecordingListener {
        letters: letters.clone(),
    }));

    let quiet = Quiet::new(
        stage
            .actor_for(Definition::of(|| Ok(QuietActor)))
            .await
            .expect("actor should start"),
    );
    quiet.stop();
    eventually("actor stopped", || quiet.is_stopped()).await;
    quiet.ping();

    eventually("second listener still saw the letter", || {
        !letters.lock().unwrap().is_empty()
    })
    .await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let letters = letters.lock().unwrap();
    assert_eq!(letters.len(), 1);
    assert!(letters[0].representation().contains("ping"));
    assert_eq!(letters[0].reason(), Some("actor stopped"));
    stage.terminate().await;
}

#[tokio::test]
async fn a_letter_carries_the_exact_call_representation() {
    let stage = Stage::new("representation").await;
    let letters = Arc::new(Mutex::new(Vec::new()));
    stage
        .dead_letters()
        .expect("dead letters actor")
        .register_listener(Arc::new(RecordingListener {
            letters: letters.clone(),
        }));

    let quiet = Quiet::new(
        stage
            .actor_for(Definition::of(|| Ok(QuietActor)))
            .await
            .expect("actor should start"),
    );
    quiet.stop();
    eventually("actor stopped", || quiet.is_stopped()).await;
    quiet.tag("urgent".to_string(), 3);

    eventually("letter reported", || !letters.lock().unwrap().is_empty()).await;
    let letters = letters.lock().unwrap();
    assert_eq!(letters[0].representation(), "Quiet.tag(label, weight)");
    stage.terminate().await;
}

#[tokio::test]
async fn every_listener_sees_every_letter() {
    let stage = Stage::new("every-letter").await;
    let dead_letters = stage.dead_letters().expect("dead letters actor");

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    dead_letters.register_listener(Arc::new(RecordingListener {
        letters: first.clone(),
    }));
    dead_letters.register_listener(Arc::new(RecordingListener {
        letters: second.clone(),
    }));

    let quiet = Quiet::new(
        stage
            .actor_for(Definition::of(|| Ok(QuietActor)))
            .await
            .expect("actor should start"),
    );
    quiet.stop();
    eventually("actor stopped", || quiet.is_stopped()).await;
    quiet.ping();
    quiet.ping();
    quiet.ping();

    eventually("all letters fanned out", || {
        first.lock().unwrap().len() == 3 && second.lock().unwrap().len() == 3
    })
    .await;
    stage.terminate().await;
}
