//! Drives a [`ForceSimulation`] from a tokio interval and publishes every
//! frame. The task idles while the layout is settled and wakes up on drag
//! commands. Stopping or dropping the handle tears the loop down.

use crate::layout::{ForceSimulation, Frame, SimulationState};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub enum DragCommand {
    Start { id: String },
    Move { id: String, x: f64, y: f64 },
    End { id: String },
}

pub struct LayoutAnimation {
    frames: watch::Receiver<Frame>,
    commands: mpsc::UnboundedSender<DragCommand>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<ForceSimulation>>,
}

impl LayoutAnimation {
    /// Must be called from within a tokio runtime.
    pub fn spawn(simulation: ForceSimulation, frame_interval: Duration) -> Self {
        let (frame_tx, frames) = watch::channel(simulation.frame());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = oneshot::channel();

        let task = tokio::spawn(run(simulation, frame_interval, frame_tx, command_rx, stop_rx));

        Self {
            frames,
            commands,
            stop: Some(stop),
            task: Some(task),
        }
    }

    /// A receiver that observes every published frame.
    pub fn subscribe(&self) -> watch::Receiver<Frame> {
        self.frames.clone()
    }

    pub fn latest(&self) -> Frame {
        self.frames.borrow().clone()
    }

    pub fn drag_start(&self, id: &str) -> bool {
        self.send(DragCommand::Start { id: id.to_string() })
    }

    pub fn drag_to(&self, id: &str, x: f64, y: f64) -> bool {
        self.send(DragCommand::Move {
            id: id.to_string(),
            x,
            y,
        })
    }

    pub fn drag_end(&self, id: &str) -> bool {
        self.send(DragCommand::End { id: id.to_string() })
    }

    fn send(&self, command: DragCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Ask the step loop to end. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Wait until the layout settles (or the loop ends) and return the frame.
    pub async fn settled(&self) -> Frame {
        let mut frames = self.subscribe();
        loop {
            {
                let frame = frames.borrow_and_update();
                if frame.state != SimulationState::Running {
                    return frame.clone();
                }
            }
            if frames.changed().await.is_err() {
                return frames.borrow().clone();
            }
        }
    }

    /// Stop the loop and take the simulation back.
    pub async fn finish(mut self) -> Option<ForceSimulation> {
        self.stop();
        let task = self.task.take()?;
        match task.await {
            Ok(simulation) => Some(simulation),
            Err(e) => {
                tracing::warn!(error = %e, "layout animation ended abnormally");
                None
            }
        }
    }
}

impl Drop for LayoutAnimation {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut simulation: ForceSimulation,
    frame_interval: Duration,
    frames: watch::Sender<Frame>,
    mut commands: mpsc::UnboundedReceiver<DragCommand>,
    mut stop: oneshot::Receiver<()>,
) -> ForceSimulation {
    let mut interval = time::interval(frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        if simulation.state() == SimulationState::Running {
            tokio::select! {
                _ = &mut stop => break,
                Some(command) = commands.recv() => apply(&mut simulation, command),
                _ = interval.tick() => {
                    let now = Instant::now();
                    let frame = simulation.step(now - last);
                    last = now;
                    if frame.state == SimulationState::Settled {
                        tracing::debug!(tick = frame.tick, "layout settled");
                    }
                    let _ = frames.send(frame);
                }
            }
        } else {
            tokio::select! {
                _ = &mut stop => break,
                command = commands.recv() => match command {
                    Some(command) => {
                        apply(&mut simulation, command);
                        interval.reset();
                        last = Instant::now();
                    }
                    None => break,
                },
            }
        }
    }

    simulation.stop();
    let _ = frames.send(simulation.frame());
    simulation
}

fn apply(simulation: &mut ForceSimulation, command: DragCommand) {
    let accepted = match &command {
        DragCommand::Start { id } => simulation.drag_start(id),
        DragCommand::Move { id, x, y } => simulation.drag_to(id, *x, *y),
        DragCommand::End { id } => simulation.drag_end(id),
    };
    if !accepted {
        tracing::debug!(?command, "ignored drag command");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KnowledgeGraph;
    use crate::layout::{LayoutParams, TICK_INTERVAL};
    use crate::model::{KnowledgeGraphData, KnowledgeGraphLink, KnowledgeGraphNode};

    fn simulation() -> ForceSimulation {
        let data = KnowledgeGraphData {
            nodes: ["QuantumLeap", "Synapse", "Dr. Lena Petrova"]
                .iter()
                .map(|id| KnowledgeGraphNode {
                    id: id.to_string(),
                    group: "organization".to_string(),
                })
                .collect(),
            links: vec![KnowledgeGraphLink {
                source: "QuantumLeap".to_string(),
                target: "Synapse".to_string(),
                relationship: "unveiled".to_string(),
            }],
        };
        ForceSimulation::new(&KnowledgeGraph::from_data(&data), LayoutParams::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn settles_then_idles() {
        let animation = LayoutAnimation::spawn(simulation(), TICK_INTERVAL);
        let settled = animation.settled().await;
        assert_eq!(settled.state, SimulationState::Settled);

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(animation.latest().tick, settled.tick);

        let simulation = animation.finish().await.unwrap();
        assert_eq!(simulation.state(), SimulationState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn drag_wakes_a_settled_layout() {
        let animation = LayoutAnimation::spawn(simulation(), TICK_INTERVAL);
        let settled = animation.settled().await;

        assert!(animation.drag_start("Synapse"));
        assert!(animation.drag_to("Synapse", 10.0, 20.0));

        let mut frames = animation.subscribe();
        let pinned = loop {
            frames.changed().await.unwrap();
            let frame = frames.borrow_and_update().clone();
            if frame.tick > settled.tick {
                break frame;
            }
        };
        assert_eq!(pinned.state, SimulationState::Running);
        assert_eq!((pinned.nodes[1].x, pinned.nodes[1].y), (10.0, 20.0));

        assert!(animation.drag_end("Synapse"));
        let resettled = animation.settled().await;
        assert_eq!(resettled.state, SimulationState::Settled);
        assert!(resettled.tick > pinned.tick);

        animation.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop_mid_animation() {
        let mut animation = LayoutAnimation::spawn(simulation(), TICK_INTERVAL);
        time::sleep(TICK_INTERVAL * 3).await;
        animation.stop();

        let last = animation.settled().await;
        assert_eq!(last.state, SimulationState::Stopped);
        assert!(last.tick < 300);
        assert!(animation.finish().await.is_some());
    }
}
