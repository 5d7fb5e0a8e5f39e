use std::collections::HashMap;

use futures::future::LocalBoxFuture;
use tracing::debug;

use crate::db::User;
use crate::error::{CommandError, CommandResult};
use crate::handlers::{self, AppState};
use crate::session;

/// A command name and its positional arguments, as typed on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Exactly `N` arguments, or an argument error quoting `usage`.
    pub fn expect_args<const N: usize>(&self, usage: &str) -> CommandResult<[&str; N]> {
        if self.args.len() != N {
            return Err(CommandError::Argument(format!(
                "`{}` expects {} argument(s), usage: {}",
                self.name, N, usage
            )));
        }
        Ok(std::array::from_fn(|i| self.args[i].as_str()))
    }
}

pub type UngatedHandler =
    for<'a> fn(&'a mut AppState, &'a Command) -> LocalBoxFuture<'a, CommandResult>;

pub type GatedHandler =
    for<'a> fn(&'a mut AppState, &'a User, &'a Command) -> LocalBoxFuture<'a, CommandResult>;

#[derive(Clone, Copy)]
pub enum Handler {
    Ungated(UngatedHandler),
    /// Runs only once the session resolves to a stored user.
    Gated(GatedHandler),
}

impl Handler {
    pub async fn call(&self, state: &mut AppState, command: &Command) -> CommandResult {
        match *self {
            Handler::Ungated(handler) => handler(state, command).await,
            Handler::Gated(handler) => session::protect(handler, state, command).await,
        }
    }
}

#[derive(Default)]
pub struct Commands {
    handlers: HashMap<String, Handler>,
}

impl Commands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command the CLI understands.
    pub fn standard() -> Self {
        let mut commands = Self::new();
        commands.register("register", Handler::Ungated(handlers::register));
        commands.register("login", Handler::Ungated(handlers::login));
        commands.register("reset", Handler::Ungated(handlers::reset));
        commands.register("users", Handler::Ungated(handlers::users));
        commands.register("feeds", Handler::Ungated(handlers::feeds));
        commands.register("addfeed", Handler::Gated(handlers::add_feed));
        commands.register("follow", Handler::Gated(handlers::follow));
        commands.register("unfollow", Handler::Gated(handlers::unfollow));
        commands.register("following", Handler::Gated(handlers::following));
        commands.register("agg", Handler::Gated(handlers::agg));
        commands.register("browse", Handler::Gated(handlers::browse));
        commands
    }

    /// Replaces any handler already registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, handler: Handler) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn run(&self, state: &mut AppState, command: &Command) -> CommandResult {
        let handler = self
            .handlers
            .get(&command.name)
            .ok_or_else(|| CommandError::UnknownCommand(command.name.clone()))?;

        debug!("Running `{}` with {} argument(s)", command.name, command.args.len());
        handler.call(state, command).await
    }
}
