//! Who the current command runs as.
//!
//! The session is loaded from configuration when the process starts and
//! written back only after a command succeeds. Gated handlers never read it
//! directly; they receive the [`User`] that [`authorize`] resolved.

use crate::db::{Database, User};
use crate::error::{CommandError, CommandResult};
use crate::handlers::AppState;
use crate::router::{Command, GatedHandler};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    current_user_name: Option<String>,
}

impl Session {
    pub fn new(current_user_name: Option<String>) -> Self {
        Self { current_user_name }
    }

    pub fn current_user_name(&self) -> Option<&str> {
        self.current_user_name.as_deref()
    }

    pub fn login(&mut self, name: impl Into<String>) {
        self.current_user_name = Some(name.into());
    }
}

/// Resolves the session's user name against the store. Looked up fresh on every call.
pub async fn authorize(db: &Database, session: &Session) -> CommandResult<User> {
    let name = session
        .current_user_name()
        .ok_or_else(|| CommandError::Unauthenticated("no user is logged in".to_string()))?;

    db.get_user_by_name(name)
        .await?
        .ok_or_else(|| CommandError::Unauthenticated(format!("user `{name}` does not exist")))
}

/// Runs `handler` as the session's user, or fails without running it.
pub async fn protect(
    handler: GatedHandler,
    state: &mut AppState,
    command: &Command,
) -> CommandResult {
    let user = authorize(&state.db, &state.session).await?;
    handler(state, &user, command).await
}
