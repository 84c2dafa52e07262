//! Proxy for the global solution controller.
//!
//! Owns both controller connections:
//! - the request socket carries the registration round trip and the
//!   fire-and-forget monitor/event reports
//! - the subscribe socket is handed to a background listener thread that
//!   dispatches pushed commands addressed to this solution

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use super::command::{CommandPush, ControllerMessage};
use super::dispatcher::CommandDispatcher;
use super::envelope::{self, Envelope};
use super::error::{ControlError, TransportError};
use super::transport::{FrameSocket, ZmqFrameSocket};
use crate::common::config::ControllerConfig;

const REGISTER_SEQUENCE: u32 = 1;
const REPORT_SEQUENCE: u32 = 0;

/// Who this solution is, as announced at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionIdentity {
    pub network_name: String,
    pub solution_name: String,
    pub command_list: Vec<String>,
    pub event_list: Vec<String>,
}

/// Destination for best-effort telemetry. Failures are logged, never returned.
pub trait ReportSink: Send + Sync {
    fn monitor_report(&self, monitor_type: &str, value: serde_json::Value, unit: &str);

    fn event(&self, event_type: &str);
}

pub struct ControllerProxy {
    identity: SolutionIdentity,
    config: ControllerConfig,
    request: Mutex<Option<Box<dyn FrameSocket>>>,
    subscriber: Mutex<Option<Box<dyn FrameSocket>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
}

impl ControllerProxy {
    pub fn new(identity: SolutionIdentity, config: ControllerConfig) -> Self {
        Self {
            identity,
            config,
            request: Mutex::new(None),
            subscriber: Mutex::new(None),
            listener: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open the request and subscribe connections. Calling it again once
    /// connected does nothing.
    pub fn connect(&self) -> Result<(), ControlError> {
        if lock(&self.request).is_some() {
            return Ok(());
        }
        let context = zmq::Context::new();
        let request = ZmqFrameSocket::dealer(
            &context,
            &self.config.address,
            self.config.request_port,
            self.config.send_timeout(),
        )?;
        let subscriber = ZmqFrameSocket::subscriber(&context, &self.config.address, self.config.subscribe_port, b"")?;

        log::info!(
            "Connected to solution controller (request {}, subscribe {})",
            request.endpoint(),
            subscriber.endpoint()
        );
        self.attach(Box::new(request), Box::new(subscriber));
        Ok(())
    }

    /// Use already established sockets instead of dialing the controller.
    pub fn attach(&self, request: Box<dyn FrameSocket>, subscriber: Box<dyn FrameSocket>) {
        *lock(&self.request) = Some(request);
        *lock(&self.subscriber) = Some(subscriber);
    }

    /// Announce this solution and wait (bounded) for the controller's answer.
    ///
    /// Returns true only for a `registerResponse` reply. Transport failures,
    /// timeouts and unparseable replies all yield false; nothing is retried.
    pub fn register(&self) -> bool {
        match self.try_register() {
            Ok(true) => {
                log::info!("Received registration registerResponse for {}", self.identity.solution_name);
                true
            }
            Ok(false) => {
                log::warn!("Controller answered the registration with something other than registerResponse");
                false
            }
            Err(err) => {
                log::error!("Registration of {} failed: {}", self.identity.solution_name, err);
                false
            }
        }
    }

    fn try_register(&self) -> Result<bool, ControlError> {
        log::info!(
            "Registering {} for network {}",
            self.identity.solution_name,
            self.identity.network_name
        );
        let request = Envelope::json(
            REGISTER_SEQUENCE,
            &ControllerMessage::RegisterRequest {
                solution: self.identity.solution_name.clone(),
                command_list: self.identity.command_list.clone(),
                event_list: self.identity.event_list.clone(),
            },
        )?;

        let mut guard = lock(&self.request);
        let socket = guard.as_mut().ok_or(ControlError::NotConnected)?;
        envelope::send(socket.as_mut(), &request)?;

        socket.set_read_timeout(Some(self.config.register_timeout()))?;
        let reply = envelope::receive(socket.as_mut());
        socket.set_read_timeout(None)?;

        let body = reply?.body_json()?;
        Ok(matches!(
            serde_json::from_value::<ControllerMessage>(body),
            Ok(ControllerMessage::RegisterResponse {})
        ))
    }

    /// Spawn the background thread that receives command pushes and feeds
    /// `dispatcher`. The subscribe socket moves into that thread.
    pub fn start_command_listener(&self, dispatcher: CommandDispatcher) -> Result<(), ControlError> {
        let mut socket = lock(&self.subscriber).take().ok_or(ControlError::NotConnected)?;
        socket.set_read_timeout(Some(self.config.listener_poll()))?;

        let solution_name = self.identity.solution_name.clone();
        let shutdown = self.shutdown.clone();
        let listening = self.listening.clone();
        listening.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new().name("command-listener".to_string()).spawn(move || {
            command_listener(socket, &dispatcher, &solution_name, &shutdown);
            listening.store(false, Ordering::SeqCst);
        });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.listening.store(false, Ordering::SeqCst);
                return Err(TransportError::Io(err).into());
            }
        };
        *lock(&self.listener) = Some(handle);
        Ok(())
    }

    /// Whether the listener thread is still receiving commands.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn send_monitor_report(
        &self,
        monitor_type: &str,
        value: serde_json::Value,
        unit: &str,
    ) -> Result<(), ControlError> {
        self.send(&ControllerMessage::MonitorReport {
            monitor_type: monitor_type.to_string(),
            monitor_value: value,
            monitor_unit: unit.to_string(),
        })
    }

    pub fn send_event(&self, event_type: &str) -> Result<(), ControlError> {
        self.send(&ControllerMessage::EventReport {
            solution: self.identity.solution_name.clone(),
            event_type: event_type.to_string(),
        })
    }

    fn send(&self, message: &ControllerMessage) -> Result<(), ControlError> {
        let envelope = Envelope::json(REPORT_SEQUENCE, message)?;
        let mut guard = lock(&self.request);
        let socket = guard.as_mut().ok_or(ControlError::NotConnected)?;
        envelope::send(socket.as_mut(), &envelope)
    }

    /// Stop and join the listener, then close both connections.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = lock(&self.listener).take() {
            if handle.join().is_err() {
                log::error!("Command listener thread panicked");
            }
        }
        lock(&self.request).take();
        lock(&self.subscriber).take();
    }
}

impl Drop for ControllerProxy {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ReportSink for ControllerProxy {
    fn monitor_report(&self, monitor_type: &str, value: serde_json::Value, unit: &str) {
        if let Err(err) = self.send_monitor_report(monitor_type, value, unit) {
            log::warn!("Dropping {} monitor report: {}", monitor_type, err);
        }
    }

    fn event(&self, event_type: &str) {
        if let Err(err) = self.send_event(event_type) {
            log::warn!("Dropping {} event report: {}", event_type, err);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receive loop of the listener thread.
///
/// Timeouts only give the loop a chance to observe `shutdown`. Malformed
/// messages are dropped; a broken connection ends the loop.
fn command_listener(
    mut socket: Box<dyn FrameSocket>,
    dispatcher: &CommandDispatcher,
    solution_name: &str,
    shutdown: &AtomicBool,
) {
    log::info!("Command listener started for {}", solution_name);
    while !shutdown.load(Ordering::SeqCst) {
        let envelope = match envelope::receive(socket.as_mut()) {
            Ok(envelope) => envelope,
            Err(ControlError::Transport(TransportError::Timeout)) => continue,
            Err(err) if !err.is_fatal() => {
                log::warn!("Dropping undecodable command message: {}", err);
                continue;
            }
            Err(err) => {
                log::error!(
                    "Command listener terminated: {}. Commands from the controller are no longer received",
                    err
                );
                return;
            }
        };
        handle_push(&envelope, dispatcher, solution_name);
    }
    log::info!("Command listener stopped");
}

/// Dispatch the commands of one push addressed to `solution_name`.
/// Returns how many command names were dispatched.
fn handle_push(envelope: &Envelope, dispatcher: &CommandDispatcher, solution_name: &str) -> usize {
    let push: CommandPush = match serde_json::from_slice(&envelope.body) {
        Ok(push) => push,
        Err(err) => {
            log::warn!("Dropping command push with invalid body: {}", err);
            return 0;
        }
    };
    let names = push.commands_for(solution_name);
    for name in &names {
        dispatcher.dispatch(name);
    }
    names.len()
}
