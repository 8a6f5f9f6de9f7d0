//! Background simulator feed.
//!
//! Runs a particle source on its own thread so the frame pipeline never
//! waits on simulation. Only the newest snapshot is consumed.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use bytemuck::Zeroable;

use super::particle::Particle;

/// Anything that advances particle state by one step.
pub trait ParticleSource: Send + 'static {
    /// Number of particles this source produces. Fixed for its lifetime.
    fn particle_count(&self) -> usize;

    /// Advance by `dt` seconds and write the new state into `out`.
    fn step(&mut self, dt: f32, out: &mut [Particle]);
}

/// Commands sent from the renderer to the simulator thread.
#[derive(Debug)]
enum FeedCommand {
    /// Simulate one step of `dt` seconds.
    Step { dt: f32 },
    /// Stop the simulator thread.
    Stop,
}

/// One simulated frame.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Monotonic step counter.
    pub step: u64,
    pub particles: Vec<Particle>,
}

/// Handle to a simulator running in the background.
pub struct SimulatorFeed {
    tx: Sender<FeedCommand>,
    rx: Receiver<Snapshot>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatorFeed {
    /// Spawn a simulator thread for `source`.
    pub fn spawn<S: ParticleSource>(source: S) -> Self {
        let (cmd_tx, cmd_rx) = channel::<FeedCommand>();
        let (snap_tx, snap_rx) = channel::<Snapshot>();

        let handle = thread::spawn(move || {
            feed_loop(source, cmd_rx, snap_tx);
        });

        Self {
            tx: cmd_tx,
            rx: snap_rx,
            handle: Some(handle),
        }
    }

    /// Ask for the next simulation step.
    pub fn request_step(&self, dt: f32) {
        let _ = self.tx.send(FeedCommand::Step { dt });
    }

    /// Newest available snapshot, dropping older ones (non-blocking).
    pub fn try_latest(&self) -> Option<Snapshot> {
        let mut latest = None;
        while let Ok(snap) = self.rx.try_recv() {
            latest = Some(snap);
        }
        latest
    }

    /// Block until a snapshot arrives, then return the newest one queued.
    pub fn wait_latest(&self) -> Option<Snapshot> {
        let first = self.rx.recv().ok()?;
        Some(self.try_latest().unwrap_or(first))
    }

    /// Stop the simulator and wait for it to finish.
    pub fn stop(&mut self) {
        let _ = self.tx.send(FeedCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SimulatorFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Main simulator loop - runs in background thread.
fn feed_loop<S: ParticleSource>(mut source: S, rx: Receiver<FeedCommand>, tx: Sender<Snapshot>) {
    let mut state = vec![Particle::zeroed(); source.particle_count()];
    let mut step = 0u64;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            FeedCommand::Step { dt } => {
                source.step(dt, &mut state);
                step += 1;
                let snap = Snapshot {
                    step,
                    particles: state.clone(),
                };
                if tx.send(snap).is_err() {
                    break; // renderer disconnected
                }
            }
            FeedCommand::Stop => break,
        }
    }
    tracing::debug!(steps = step, "simulator feed stopped");
}
