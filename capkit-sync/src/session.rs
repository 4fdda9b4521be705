//! Session tracking: which identity the workspace is bound to, and the
//! session-level flags UI code reads.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use capkit_core::{AuthUser, ModuleName, UserId};

/// Workflow stage of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Start,
    Build,
    Grow,
}

/// Top-level view the app shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Landing,
    Stage(Stage),
}

/// Published on every session change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionState {
    /// Bound workspace (= signed-in uid).
    pub workspace: Option<UserId>,
    pub logged_in: bool,
    /// Subscriptions for the bound workspace have been issued. Says nothing
    /// about whether any data has arrived yet.
    pub data_loaded: bool,
    /// Modules whose subscription has delivered at least one snapshot.
    pub delivered: BTreeSet<ModuleName>,
    pub view: View,
}

/// How an auth notification relates to the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthTransition {
    SignedIn(AuthUser),
    /// Same uid reported again (profile fields may have changed).
    Refreshed,
    Switched { previous: UserId, user: AuthUser },
    SignedOut { previous: Option<UserId> },
}

pub(crate) struct SessionTracker {
    state: watch::Sender<SessionState>,
    user: Option<AuthUser>,
}

impl SessionTracker {
    pub(crate) fn new(state: watch::Sender<SessionState>) -> Self {
        Self { state, user: None }
    }

    /// Classify an auth notification and remember the reported user.
    pub(crate) fn observe(&mut self, user: Option<AuthUser>) -> AuthTransition {
        let previous = self.user.take();
        self.user = user.clone();
        match (previous, user) {
            (previous, None) => AuthTransition::SignedOut {
                previous: previous.map(|u| u.uid),
            },
            (None, Some(user)) => AuthTransition::SignedIn(user),
            (Some(previous), Some(user)) if previous.uid == user.uid => AuthTransition::Refreshed,
            (Some(previous), Some(user)) => AuthTransition::Switched {
                previous: previous.uid,
                user,
            },
        }
    }

    pub(crate) fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub(crate) fn bind(&self, uid: &UserId) {
        self.state.send_modify(|s| {
            s.workspace = Some(uid.clone());
            s.logged_in = true;
        });
    }

    pub(crate) fn mark_loaded(&self) {
        self.state.send_modify(|s| s.data_loaded = true);
    }

    pub(crate) fn mark_delivered(&self, module: ModuleName) {
        self.state.send_if_modified(|s| s.delivered.insert(module));
    }

    pub(crate) fn unbind(&self) {
        self.state.send_modify(|s| {
            s.workspace = None;
            s.logged_in = false;
            s.data_loaded = false;
            s.delivered.clear();
            s.view = View::Landing;
        });
    }

    pub(crate) fn navigate(&self, view: View) {
        self.state.send_if_modified(|s| {
            let changed = s.view != view;
            s.view = view;
            changed
        });
    }

    pub(crate) fn workspace(&self) -> Option<UserId> {
        self.state.borrow().workspace.clone()
    }

    pub(crate) fn data_loaded(&self) -> bool {
        self.state.borrow().data_loaded
    }
}
