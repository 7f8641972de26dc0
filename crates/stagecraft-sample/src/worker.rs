//! A supervised job-processing worker.
//!
//! The worker counts the jobs it processes and fails on a poison job. Its
//! supervisor answers every failure with a restart, so the count starts over
//! and the jobs buffered during the failure are re-delivered to the fresh
//! state.

use async_trait::async_trait;
use tracing::{info, warn};

use stagecraft::actor::{Actor, Context};
use stagecraft::actor_proxy;
use stagecraft::completes::CompletesEventually;
use stagecraft::dead_letters::{DeadLetter, DeadLettersListener};
use stagecraft::error::FailureReason;
use stagecraft::message::Outcome;
use stagecraft::supervision::{Supervised, Supervisor};

#[derive(Clone, Debug)]
pub struct Job {
    pub id: u32,
    pub payload: String,
}

#[derive(Default)]
pub struct WorkerActor {
    processed: u32,
}

#[async_trait]
impl Actor for WorkerActor {
    async fn before_start(&mut self, context: &mut Context) -> Outcome {
        info!(worker = context.name(), "worker ready");
        Ok(())
    }

    async fn after_restart(&mut self, context: &mut Context, reason: &FailureReason) -> Outcome {
        info!(worker = context.name(), error = %reason, "worker restarted with a clean slate");
        Ok(())
    }

    async fn after_stop(&mut self, context: &mut Context) -> Outcome {
        info!(worker = context.name(), processed = self.processed, "worker stopped");
        Ok(())
    }
}

impl WorkerActor {
    pub async fn process(&mut self, _context: &mut Context, job: Job) -> Outcome {
        if job.payload == "poison" {
            return Err(FailureReason::because(format!("job {} is poison", job.id)));
        }
        self.processed += 1;
        info!(job = job.id, payload = %job.payload, total = self.processed, "processed");
        Ok(())
    }

    pub async fn total(&mut self, _context: &mut Context, answers: CompletesEventually) -> Outcome {
        answers.with(Box::new(self.processed));
        Ok(())
    }
}

actor_proxy! {
    pub proxy Worker for WorkerActor {
        fn process(job: Job);
        fn total(answers: CompletesEventually);
    }
}

/// Answers every worker failure with a restart.
pub struct RestartSupervisor;

impl Supervisor for RestartSupervisor {
    fn inform(&self, reason: &FailureReason, supervised: Supervised) {
        warn!(address = %supervised.address(), error = %reason, "worker failed; restarting");
        supervised.restart();
    }
}

/// Prints every piece of work that could not be delivered.
pub struct UndeliveredWorkListener;

impl DeadLettersListener for UndeliveredWorkListener {
    fn handle(&self, dead_letter: &DeadLetter) -> Result<(), FailureReason> {
        info!(dead_letter = %dead_letter, "work went undelivered");
        Ok(())
    }
}
