//! Maps command names pushed by the controller onto local handlers.

use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;

use super::command::SolutionCommand;

/// Failure raised by a command handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("control event queue is full")]
    QueueFull,
}

/// Zero-argument handler bound to a command.
pub type CommandHandler = Box<dyn Fn() -> Result<(), HandlerError> + Send>;

/// What `dispatch` did with a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed(SolutionCommand),
    /// Handler returned an error or panicked; already logged.
    Failed(SolutionCommand),
    /// Known command without a bound handler.
    Unbound(SolutionCommand),
    /// Not a command of this solution. Expected on a shared topic.
    Unknown,
}

#[derive(Default)]
pub struct CommandDispatcher {
    handlers: Vec<(SolutionCommand, CommandHandler)>,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `command`, replacing any previous binding.
    pub fn bind<F>(&mut self, command: SolutionCommand, handler: F) -> &mut Self
    where
        F: Fn() -> Result<(), HandlerError> + Send + 'static,
    {
        let handler: CommandHandler = Box::new(handler);
        match self.handlers.iter_mut().find(|(bound, _)| *bound == command) {
            Some(entry) => entry.1 = handler,
            None => self.handlers.push((command, handler)),
        }
        self
    }

    /// Names of the bound commands in binding order, as announced at registration.
    pub fn command_names(&self) -> Vec<String> {
        self.handlers.iter().map(|(command, _)| command.name().to_string()).collect()
    }

    /// Run the handler registered for `name`.
    ///
    /// Handler errors and panics are contained here so one bad command never
    /// stops the commands that follow it.
    pub fn dispatch(&self, name: &str) -> DispatchOutcome {
        let Some(command) = SolutionCommand::from_name(name) else {
            log::debug!("Ignoring unknown command {:?}", name);
            return DispatchOutcome::Unknown;
        };
        let Some((_, handler)) = self.handlers.iter().find(|(bound, _)| *bound == command) else {
            log::debug!("No handler bound for {}", command);
            return DispatchOutcome::Unbound(command);
        };

        log::info!("Execute command: {}", command);
        match catch_unwind(AssertUnwindSafe(|| handler())) {
            Ok(Ok(())) => DispatchOutcome::Executed(command),
            Ok(Err(err)) => {
                log::warn!("Command {} failed: {}", command, err);
                DispatchOutcome::Failed(command)
            }
            Err(_) => {
                log::error!("Command {} handler panicked", command);
                DispatchOutcome::Failed(command)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() -> Result<(), HandlerError> + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_invokes_bound_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = CommandDispatcher::new();
        dispatcher.bind(SolutionCommand::Blacklist, counting(&hits));

        assert_eq!(dispatcher.dispatch("6LOWPAN_BLACKLIST"), DispatchOutcome::Executed(SolutionCommand::Blacklist));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_and_unbound_names_are_ignored() {
        let mut dispatcher = CommandDispatcher::new();
        dispatcher.bind(SolutionCommand::Blacklist, || Ok(()));

        assert_eq!(dispatcher.dispatch("SELF_DESTRUCT"), DispatchOutcome::Unknown);
        assert_eq!(dispatcher.dispatch("TRAFFIC_LOW"), DispatchOutcome::Unbound(SolutionCommand::TrafficLow));
    }

    #[test]
    fn test_failing_handlers_do_not_affect_later_dispatch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = CommandDispatcher::new();
        dispatcher
            .bind(SolutionCommand::Blacklist, || Err(HandlerError::QueueFull))
            .bind(SolutionCommand::Whitelist, || panic!("boom"))
            .bind(SolutionCommand::TrafficLow, counting(&hits));

        assert_eq!(dispatcher.dispatch("6LOWPAN_BLACKLIST"), DispatchOutcome::Failed(SolutionCommand::Blacklist));
        assert_eq!(dispatcher.dispatch("6LOWPAN_WHITELIST"), DispatchOutcome::Failed(SolutionCommand::Whitelist));
        assert_eq!(dispatcher.dispatch("TRAFFIC_LOW"), DispatchOutcome::Executed(SolutionCommand::TrafficLow));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rebinding_keeps_registration_order() {
        let mut dispatcher = CommandDispatcher::new();
        dispatcher
            .bind(SolutionCommand::Whitelist, || Ok(()))
            .bind(SolutionCommand::Blacklist, || Ok(()))
            .bind(SolutionCommand::Whitelist, || Err(HandlerError::QueueFull));

        assert_eq!(dispatcher.command_names(), vec!["6LOWPAN_WHITELIST", "6LOWPAN_BLACKLIST"]);
        assert_eq!(dispatcher.dispatch("6LOWPAN_WHITELIST"), DispatchOutcome::Failed(SolutionCommand::Whitelist));
    }
}
