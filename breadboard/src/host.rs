//! Runs an [`Engine`] on a tokio task.
//!
//! The task owns the engine outright. Callers talk to it over an `mpsc`
//! command channel and read frames from a `watch` channel that always holds
//! the latest snapshot. Wall-clock time between frames is fed to
//! [`Engine::step`], so `time_scale` behaves as it does in a local loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::components::Firmware;
use crate::core::SimError;
use crate::engine::{Edit, Engine, Snapshot};

/// Default frame period, roughly 60 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

const COMMAND_BUFFER: usize = 64;

enum HostCommand {
    Edit(Edit),
    SetRunning(bool),
    SetTimeScale(f64, oneshot::Sender<Result<(), SimError>>),
    RunTicks(u64, oneshot::Sender<()>),
    InstallFirmware {
        component: String,
        firmware: Box<dyn Firmware>,
        reply: oneshot::Sender<Result<(), SimError>>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
    Export(oneshot::Sender<Result<Value, SimError>>),
    Import(Value, oneshot::Sender<Result<(), SimError>>),
    Shutdown,
}

pub struct SimulationHost {
    commands: mpsc::Sender<HostCommand>,
    frames: watch::Receiver<Arc<Snapshot>>,
    task: JoinHandle<Engine>,
}

impl SimulationHost {
    /// Move `engine` onto a new task. Must be called inside a tokio runtime.
    pub fn spawn(engine: Engine) -> Self {
        Self::spawn_with_interval(engine, DEFAULT_FRAME_INTERVAL)
    }

    pub fn spawn_with_interval(engine: Engine, frame_interval: Duration) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (frames_tx, frames) = watch::channel(Arc::new(engine.snapshot()));
        let task = tokio::spawn(run(engine, receiver, frames_tx, frame_interval));
        Self {
            commands,
            frames,
            task,
        }
    }

    async fn send(&self, command: HostCommand) -> Result<(), SimError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SimError::HostClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HostCommand,
    ) -> Result<T, SimError> {
        let (reply, response) = oneshot::channel();
        self.send(make(reply)).await?;
        response.await.map_err(|_| SimError::HostClosed)
    }

    /// Queue an edit for the next tick.
    pub async fn submit(&self, edit: Edit) -> Result<(), SimError> {
        self.send(HostCommand::Edit(edit)).await
    }

    pub async fn set_running(&self, running: bool) -> Result<(), SimError> {
        self.send(HostCommand::SetRunning(running)).await
    }

    pub async fn set_time_scale(&self, time_scale: f64) -> Result<(), SimError> {
        self.request(|reply| HostCommand::SetTimeScale(time_scale, reply))
            .await?
    }

    /// Run exactly `ticks` ticks and wait for them to finish.
    pub async fn run_ticks(&self, ticks: u64) -> Result<(), SimError> {
        self.request(|reply| HostCommand::RunTicks(ticks, reply)).await
    }

    pub async fn install_firmware(
        &self,
        component: &str,
        firmware: Box<dyn Firmware>,
    ) -> Result<(), SimError> {
        let component = component.to_string();
        self.request(|reply| HostCommand::InstallFirmware {
            component,
            firmware,
            reply,
        })
        .await?
    }

    /// Snapshot taken after every command sent before this one.
    pub async fn snapshot(&self) -> Result<Snapshot, SimError> {
        self.request(HostCommand::Snapshot).await
    }

    pub async fn export_document(&self) -> Result<Value, SimError> {
        self.request(HostCommand::Export).await?
    }

    pub async fn import_document(&self, document: Value) -> Result<(), SimError> {
        self.request(|reply| HostCommand::Import(document, reply))
            .await?
    }

    /// Receiver that always holds the most recent frame.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.frames.clone()
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.frames.borrow().clone()
    }

    /// Stop the task and take the engine back.
    pub async fn shutdown(self) -> Result<Engine, SimError> {
        // A closed channel means the task is already finishing.
        let _ = self.commands.send(HostCommand::Shutdown).await;
        self.task.await.map_err(|_| SimError::HostClosed)
    }
}

fn publish(engine: &Engine, frames: &watch::Sender<Arc<Snapshot>>) {
    frames.send_replace(Arc::new(engine.snapshot()));
}

async fn run(
    mut engine: Engine,
    mut commands: mpsc::Receiver<HostCommand>,
    frames: watch::Sender<Arc<Snapshot>>,
    frame_interval: Duration,
) -> Engine {
    tracing::info!(interval_ms = frame_interval.as_millis() as u64, "simulation host started");
    let mut interval = time::interval(frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    HostCommand::Shutdown => break,
                    HostCommand::Edit(edit) => engine.submit(edit),
                    HostCommand::SetRunning(running) => {
                        engine.set_running(running);
                        last = Instant::now();
                    }
                    HostCommand::SetTimeScale(scale, reply) => {
                        let _ = reply.send(engine.set_time_scale(scale));
                    }
                    HostCommand::RunTicks(ticks, reply) => {
                        engine.run_ticks(ticks);
                        publish(&engine, &frames);
                        let _ = reply.send(());
                    }
                    HostCommand::InstallFirmware { component, firmware, reply } => {
                        let _ = reply.send(engine.install_firmware(&component, firmware));
                    }
                    HostCommand::Snapshot(reply) => {
                        let _ = reply.send(engine.snapshot());
                    }
                    HostCommand::Export(reply) => {
                        let _ = reply.send(engine.export_document());
                    }
                    HostCommand::Import(document, reply) => {
                        let result = engine.import_document(document);
                        if result.is_ok() {
                            publish(&engine, &frames);
                        }
                        let _ = reply.send(result);
                    }
                }
            }
            _ = interval.tick() => {
                let now = Instant::now();
                let elapsed_ms = now.duration_since(last).as_secs_f64() * 1000.0;
                last = now;
                if engine.step(elapsed_ms) > 0 {
                    publish(&engine, &frames);
                }
            }
        }
    }

    tracing::info!(now_ms = engine.now_ms(), "simulation host stopped");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ComponentKind, DeviceInput, Reading};
    use serde_json::json;

    fn paused_engine() -> Engine {
        let mut engine = Engine::with_seed(11);
        engine.set_running(false);
        engine.add_component("sw", ComponentKind::ToggleSwitch).unwrap();
        engine
    }

    #[tokio::test]
    async fn test_commands_apply_in_order() {
        let host = SimulationHost::spawn(paused_engine());
        host.submit(Edit::Input {
            component: "sw".into(),
            input: DeviceInput::Toggle,
        })
        .await
        .unwrap();
        host.run_ticks(3).await.unwrap();

        let snapshot = host.snapshot().await.unwrap();
        assert_eq!(snapshot.state.sim_time_ms, 3);
        assert_eq!(
            snapshot.state.component("sw").unwrap().outputs["on"],
            Reading::Bool(true)
        );
        assert_eq!(host.latest().state.sim_time_ms, 3);

        let engine = host.shutdown().await.unwrap();
        assert_eq!(engine.now_ms(), 3);
    }

    #[tokio::test]
    async fn test_errors_come_back_to_the_caller() {
        let host = SimulationHost::spawn(paused_engine());
        assert!(matches!(
            host.set_time_scale(0.0).await,
            Err(SimError::Config(_))
        ));
        assert!(host.import_document(json!({ "schemaVersion": 42 })).await.is_err());

        let exported = host.export_document().await.unwrap();
        assert_eq!(exported["components"][0]["id"], "sw");
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_running_host_advances_time() {
        let mut engine = paused_engine();
        engine.set_running(true);
        let host = SimulationHost::spawn_with_interval(engine, Duration::from_millis(2));
        let mut frames = host.subscribe();
        frames.changed().await.unwrap();
        assert!(frames.borrow().state.sim_time_ms > 0);
        host.shutdown().await.unwrap();
    }
}
