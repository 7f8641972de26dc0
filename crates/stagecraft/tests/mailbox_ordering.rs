use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagecraft::actor::{Actor, Context};
use stagecraft::actor_proxy;
use stagecraft::completes::{answer, CompletesEventually};
use stagecraft::message::Outcome;
use stagecraft::stage::{Definition, Stage};

// --- Test Actor ---

#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct RecorderActor {
    log: EventLog,
}

impl Actor for RecorderActor {}

impl RecorderActor {
    async fn record(&mut self, _context: &mut Context, label: String) -> Outcome {
        self.log.record(label);
        Ok(())
    }

    async fn work(&mut self, _context: &mut Context, label: String) -> Outcome {
        self.log.record(format!("{label}:start"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.log.record(format!("{label}:end"));
        Ok(())
    }

    async fn flush(&mut self, _context: &mut Context, answers: CompletesEventually) -> Outcome {
        answers.with(Box::new(()));
        Ok(())
    }
}

actor_proxy! {
    pub proxy Recorder for RecorderActor {
        fn record(label: String);
        fn work(label: String);
        fn flush(answers: CompletesEventually);
    }
}

async fn spawn_recorder(stage: &Stage, log: &EventLog) -> Recorder {
    let log = log.clone();
    Recorder::new(
        stage
            .actor_for(Definition::of(move || Ok(RecorderActor { log: log.clone() })))
            .await
            .expect("recorder should start"),
    )
}

async fn flushed(stage: &Stage, recorder: &Recorder) {
    let (sink, done) = answer::<()>();
    let answers = stage.completes_for(sink).await.expect("completes channel");
    recorder.flush(answers.clone());
    done.outcome().await.expect("flush answer");
    answers.conclude();
}

// --- Tests ---

#[tokio::test]
async fn one_sender_is_delivered_in_send_order() {
    let stage = Stage::new("fifo").await;
    let log = EventLog::default();
    let recorder = spawn_recorder(&stage, &log).await;

    let expected: Vec<String> = (0..20).map(|n| format!("m{n}")).collect();
    for label in &expected {
        recorder.record(label.clone());
    }
    flushed(&stage, &recorder).await;

    assert_eq!(log.events(), expected);
    stage.terminate().await;
}

#[tokio::test]
async fn invocations_never_overlap() {
    let stage = Stage::new("in-flight").await;
    let log = EventLog::default();
    let recorder = spawn_recorder(&stage, &log).await;

    let mut senders = Vec::new();
    for sender in 0..4 {
        let recorder = recorder.clone();
        senders.push(tokio::spawn(async move {
            for n in 0..5 {
                recorder.work(format!("s{sender}-{n}"));
            }
        }));
    }
    for sender in senders {
        sender.await.expect("sender task");
    }
    flushed(&stage, &recorder).await;

    // strict start/end pairing proves at most one invocation in flight
    let events = log.events();
    assert_eq!(events.len(), 40);
    for pair in events.chunks(2) {
        let started = pair[0].strip_suffix(":start").expect("start first");
        let ended = pair[1].strip_suffix(":end").expect("end second");
        assert_eq!(started, ended);
    }
    stage.terminate().await;
}

#[tokio::test]
async fn each_sender_keeps_its_own_order() {
    let stage = Stage::new("per-sender").await;
    let log = EventLog::default();
    let recorder = spawn_recorder(&stage, &log).await;

    let mut senders = Vec::new();
    for sender in 0..3 {
        let recorder = recorder.clone();
        senders.push(tokio::spawn(async move {
            for n in 0..10 {
                recorder.record(format!("s{sender}-{n}"));
            }
        }));
    }
    for sender in senders {
        sender.await.expect("sender task");
    }
    flushed(&stage, &recorder).await;

    let events = log.events();
    for sender in 0..3 {
        let prefix = format!("s{sender}-");
        let seen: Vec<&String> = events.iter().filter(|e| e.starts_with(&prefix)).collect();
        let expected: Vec<String> = (0..10).map(|n| format!("s{sender}-{n}")).collect();
        assert_eq!(seen.len(), 10);
        for (actual, expected) in seen.iter().zip(&expected) {
            assert_eq!(*actual, expected);
        }
    }
    stage.terminate().await;
}
