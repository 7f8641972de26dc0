use std::sync::{Arc, Mutex};
use std::time::Duration;

use stagecraft::actor::{Actor, Context};
use stagecraft::actor_proxy;
use stagecraft::completes::{answer, CompletesEventually, CompletionSink};
use stagecraft::dead_letters::{DeadLetter, DeadLettersListener};
use stagecraft::error::FailureReason;
use stagecraft::message::Outcome;
use stagecraft::stage::{Definition, Stage};

// --- Test Actor ---

#[derive(Default)]
struct DoublerActor;

impl Actor for DoublerActor {}

impl DoublerActor {
    async fn double(&mut self, _context: &mut Context, x: u32, answers: CompletesEventually) -> Outcome {
        answers.with(Box::new(x * 2));
        Ok(())
    }

    /// Answers through the actor's own pooled channel instead of one the
    /// caller created.
    async fn double_pooled(
        &mut self,
        context: &mut Context,
        x: u32,
        sink: Box<dyn CompletionSink>,
    ) -> Outcome {
        let answers = context
            .completes_eventually(sink)
            .await
            .map_err(|fault| FailureReason::because(fault.to_string()))?;
        answers.with(Box::new(x * 2));
        Ok(())
    }
}

actor_proxy! {
    pub proxy Doubler for DoublerActor {
        fn double(x: u32, answers: CompletesEventually);
        fn double_pooled(x: u32, sink: Box<dyn CompletionSink>);
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

async fn spawn_doubler(stage: &Stage) -> Doubler {
    Doubler::new(
        stage
            .actor_for(Definition::of(|| Ok(DoublerActor)))
            .await
            .expect("doubler should start"),
    )
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
async fn a_deferred_value_crosses_the_actor_boundary() {
    let stage = Stage::new("deferred").await;
    let doubler = spawn_doubler(&stage).await;

    let (sink, value) = answer::<u32>();
    let answers = stage.completes_for(sink).await.expect("completes channel");
    doubler.double(21, answers.clone());

    assert_eq!(value.outcome().await, Some(42));
    answers.conclude();
    stage.terminate().await;
}

#[tokio::test]
async fn the_pooled_channel_answers_repeated_requests() {
    let stage = Stage::new("pooled").await;
    let doubler = spawn_doubler(&stage).await;

    let (first_sink, first) = answer::<u32>();
    doubler.double_pooled(1, first_sink);
    assert_eq!(first.outcome().await, Some(2));

    // the second request re-targets the same cached channel
    let (second_sink, second) = answer::<u32>();
    doubler.double_pooled(7, second_sink);
    assert_eq!(second.outcome().await, Some(14));
    stage.terminate().await;
}

#[tokio::test]
async fn a_concluded_channel_degrades_to_dead_letters() {
    let stage = Stage::new("concluded").await;
    let letters = Arc::new(Mutex::new(Vec::new()));
    stage
        .dead_letters()
        .expect("dead letters actor")
        .register_listener(Arc::new(RecordingListener {
            letters: letters.clone(),
        }));

    let (sink, value) = answer::<u32>();
    let answers = stage.completes_for(sink).await.expect("completes channel");
    answers.conclude();
    eventually("channel actor stopped", || answers.is_stopped()).await;

    answers.with(Box::new(5u32));
    // the pending retarget may be dead-lettered ahead of the late value, so
    // look for the value's representation rather than position
    eventually("late value became a dead letter", || {
        letters
            .lock()
            .unwrap()
            .iter()
            .any(|letter| letter.representation() == "CompletesEventually.with(value)")
    })
    .await;
    // the awaitable side sees the channel close, not a value
    assert_eq!(value.outcome().await, None);
    stage.terminate().await;
}
