//! Resolved identity handed in by the (out-of-scope) auth layer.
//!
//! The engine never sees credentials; workflows receive an [`Actor`] with
//! the user id and organizer flag already resolved.

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub organizer: bool,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            organizer: false,
        }
    }

    pub fn organizer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            organizer: true,
        }
    }

    /// Resolve an optional identity, failing when none was supplied.
    pub fn resolve(user_id: Option<String>, organizer: bool) -> Result<Self> {
        match user_id {
            Some(user_id) => Ok(Self { user_id, organizer }),
            None => Err(EngineError::NotAuthenticated),
        }
    }

    pub fn require_organizer(&self) -> Result<()> {
        if self.organizer {
            Ok(())
        } else {
            Err(EngineError::NotOrganizer(self.user_id.clone()))
        }
    }
}
