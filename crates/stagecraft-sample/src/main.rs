//! One full fail/restart/answer cycle against a supervised worker.
//!
//! The run submits a batch of jobs with a poison pill in the middle. The
//! poison job fails the worker, its supervisor restarts it, the remaining
//! jobs are re-delivered to the fresh state, and the final count comes back
//! through a deferred-result channel. A last job sent after the worker
//! stopped shows up as a dead letter.

mod worker;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use stagecraft::completes::answer;
use stagecraft::error::ActorError;
use stagecraft::stage::{Definition, Stage};
use stagecraft::tracing::setup_tracing;

use crate::worker::{Job, RestartSupervisor, UndeliveredWorkListener, Worker, WorkerActor};

#[tokio::main]
async fn main() -> Result<(), ActorError> {
    setup_tracing();

    let stage = Stage::new("sample").await;
    if let Some(dead_letters) = stage.dead_letters() {
        dead_letters.register_listener(Arc::new(UndeliveredWorkListener));
    }

    let worker = Worker::new(
        stage
            .actor_for(
                Definition::of(|| Ok(WorkerActor::default()))
                    .named("worker")
                    .supervised_by(Arc::new(RestartSupervisor)),
            )
            .await?,
    );

    let jobs = ["parse", "index", "poison", "compact", "report"];
    for (id, payload) in jobs.iter().enumerate() {
        worker.process(Job {
            id: id as u32 + 1,
            payload: payload.to_string(),
        });
    }

    // the count survives only since the restart, so the poison pill and the
    // jobs before it are not in it
    let (sink, total) = answer::<u32>();
    let answers = stage.completes_for(sink).await?;
    worker.total(answers.clone());
    match total.outcome().await {
        Some(processed) => info!(processed, "final count"),
        None => info!("no count came back"),
    }
    answers.conclude();

    worker.stop();
    tokio::time::sleep(Duration::from_millis(50)).await;
    worker.process(Job {
        id: 99,
        payload: "too late".to_string(),
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    stage.terminate().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
