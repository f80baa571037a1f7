//! Fire-and-forget task submission.
//!
//! Actuation side effects run off the tracking loop. Nothing waits on a
//! submitted task; a task that fails is logged by the runner and forgotten.

use anyhow::Result;

pub type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

pub trait TaskRunner: Send {
    /// Start `task`. Must not block on its completion.
    fn submit(&self, name: &str, task: Task);
}

/// Spawns one named OS thread per task.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadRunner;

impl TaskRunner for ThreadRunner {
    fn submit(&self, name: &str, task: Task) {
        let label = name.to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("rig-{}", name))
            .spawn(move || {
                if let Err(err) = task() {
                    log::error!("{} task failed: {:#}", label, err);
                }
            });
        if let Err(err) = spawned {
            log::error!("failed to spawn {} task: {}", name, err);
        }
    }
}

/// Runs tasks on the calling thread. For tests and single-threaded tools.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineRunner;

impl TaskRunner for InlineRunner {
    fn submit(&self, name: &str, task: Task) {
        if let Err(err) = task() {
            log::error!("{} task failed: {:#}", name, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    #[test]
    fn thread_runner_does_not_block_caller() {
        let (tx, rx) = mpsc::channel();
        let started = std::time::Instant::now();
        ThreadRunner.submit(
            "slow",
            Box::new(move || {
                std::thread::sleep(Duration::from_millis(200));
                tx.send(()).map_err(|e| anyhow!("send: {}", e))
            }),
        );
        assert!(started.elapsed() < Duration::from_millis(150));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn failures_stay_inside_the_runner() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        InlineRunner.submit(
            "broken",
            Box::new(move || {
                flag.store(true, Ordering::SeqCst);
                Err(anyhow!("boom"))
            }),
        );
        assert!(ran.load(Ordering::SeqCst));
    }
}
