//! Identity provider seam.
//!
//! The coordinator only needs a stream of auth states and a way to request
//! sign-out. [`LocalIdentity`] is an in-process provider driven by the
//! caller (CLI sessions, tests).

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::watch;

use capkit_core::AuthUser;

use crate::error::SyncError;

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Current auth state plus every later change. `None` = signed out.
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;

    /// Ask the provider to end the session. On success the provider reports
    /// `None` on [`auth_state`](Self::auth_state).
    async fn sign_out(&self) -> Result<(), SyncError>;
}

#[derive(Debug)]
pub struct LocalIdentity {
    state: watch::Sender<Option<AuthUser>>,
    reject_sign_out: AtomicBool,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            reject_sign_out: AtomicBool::new(false),
        }
    }

    /// A provider that starts out signed in as `user`.
    pub fn signed_in(user: AuthUser) -> Self {
        let identity = Self::new();
        identity.sign_in(user);
        identity
    }

    pub fn sign_in(&self, user: AuthUser) {
        self.state.send_replace(Some(user));
    }

    pub fn current(&self) -> Option<AuthUser> {
        self.state.borrow().clone()
    }

    /// Make [`IdentityProvider::sign_out`] fail without changing state.
    pub fn set_reject_sign_out(&self, reject: bool) {
        self.reject_sign_out.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.state.subscribe()
    }

    async fn sign_out(&self) -> Result<(), SyncError> {
        if self.reject_sign_out.load(Ordering::SeqCst) {
            return Err(SyncError::Identity("sign-out rejected".to_string()));
        }
        self.state.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_sign_in_and_sign_out() {
        let identity = LocalIdentity::new();
        let mut rx = identity.auth_state();
        assert!(rx.borrow_and_update().is_none());

        identity.sign_in(AuthUser::new("u1"));
        rx.changed().await.expect("changed");
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|u| u.uid.0.clone()),
            Some("u1".to_string())
        );

        identity.sign_out().await.expect("sign out");
        rx.changed().await.expect("changed");
        assert!(rx.borrow().is_none());
    }

    #[tokio::test]
    async fn rejected_sign_out_keeps_the_user() {
        let identity = LocalIdentity::signed_in(AuthUser::new("u1"));
        identity.set_reject_sign_out(true);
        assert!(identity.sign_out().await.is_err());
        assert!(identity.current().is_some());
    }
}
