//! UI-facing handles.
//!
//! Reads come straight from watch channels published by the coordinator.
//! Writes are commands: they are applied in submission order by the
//! coordinator, so a value passed to [`ModuleHandle::set`] becomes visible
//! to [`ModuleHandle::get`] once the coordinator has processed it.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use capkit_core::{ModuleData, ModuleName, UserProfile};

use crate::error::SyncError;
use crate::module_sync::ModuleEdit;
use crate::persister::WritePhase;
use crate::runtime::Command;
use crate::session::{SessionState, View};

/// Type-erased `watch::Receiver<T>` per module.
pub(crate) type MirrorSet = HashMap<ModuleName, Box<dyn Any + Send + Sync>>;

#[derive(Clone)]
pub struct WorkspaceHandle {
    commands: mpsc::UnboundedSender<Command>,
    session: watch::Receiver<SessionState>,
    profile: watch::Receiver<Option<UserProfile>>,
    mirrors: Arc<MirrorSet>,
}

impl WorkspaceHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        session: watch::Receiver<SessionState>,
        profile: watch::Receiver<Option<UserProfile>>,
        mirrors: MirrorSet,
    ) -> Self {
        Self {
            commands,
            session,
            profile,
            mirrors: Arc::new(mirrors),
        }
    }

    fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .map_err(|_| SyncError::ChannelClosed("coordinator"))
    }

    /// Handle for the module whose payload type is `T`.
    pub fn module<T: ModuleData>(&self) -> Result<ModuleHandle<T>, SyncError> {
        let mirror = self
            .mirrors
            .get(&T::MODULE)
            .and_then(|mirror| mirror.downcast_ref::<watch::Receiver<T>>())
            .ok_or(SyncError::ModuleType { module: T::MODULE })?;
        Ok(ModuleHandle {
            commands: self.commands.clone(),
            mirror: mirror.clone(),
            _payload: PhantomData,
        })
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    pub fn session(&self) -> SessionState {
        self.session.borrow().clone()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.session.clone()
    }

    /// Resolves once a workspace is bound and its subscriptions issued.
    pub async fn wait_until_loaded(&self) -> Result<SessionState, SyncError> {
        self.wait_for_session(|s| s.data_loaded).await
    }

    /// Resolves once `module`'s subscription has delivered its first
    /// snapshot for the bound workspace.
    pub async fn wait_until_delivered(
        &self,
        module: ModuleName,
    ) -> Result<SessionState, SyncError> {
        self.wait_for_session(move |s| s.delivered.contains(&module)).await
    }

    /// Resolves once no workspace is bound.
    pub async fn wait_until_signed_out(&self) -> Result<SessionState, SyncError> {
        self.wait_for_session(|s| !s.logged_in).await
    }

    async fn wait_for_session(
        &self,
        predicate: impl FnMut(&SessionState) -> bool,
    ) -> Result<SessionState, SyncError> {
        let mut session = self.session.clone();
        let state = session
            .wait_for(predicate)
            .await
            .map_err(|_| SyncError::ChannelClosed("session"))?;
        Ok(state.clone())
    }

    pub fn navigate(&self, view: View) -> Result<(), SyncError> {
        self.send(Command::Navigate(view))
    }

    /// Ask the identity provider to sign out. The workspace resets when the
    /// provider reports the signed-out state; a provider failure is only
    /// logged.
    pub fn sign_out(&self) -> Result<(), SyncError> {
        self.send(Command::SignOut)
    }

    // -----------------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------------

    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.borrow().clone()
    }

    pub fn watch_profile(&self) -> watch::Receiver<Option<UserProfile>> {
        self.profile.clone()
    }

    pub async fn wait_for_profile(&self) -> Result<UserProfile, SyncError> {
        let mut profile = self.profile.clone();
        let current = profile
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SyncError::ChannelClosed("profile"))?;
        current.clone().ok_or(SyncError::ChannelClosed("profile"))
    }

    /// Publish `profile` locally and merge-write it right away.
    pub fn update_profile(&self, profile: UserProfile) -> Result<(), SyncError> {
        self.send(Command::UpdateProfile(profile))
    }

    // -----------------------------------------------------------------------
    // Coordinator
    // -----------------------------------------------------------------------

    pub async fn write_phase(&self, module: ModuleName) -> Result<WritePhase, SyncError> {
        let (respond_to, response) = oneshot::channel();
        self.send(Command::WritePhase { module, respond_to })?;
        response
            .await
            .map_err(|_| SyncError::ChannelClosed("coordinator"))
    }

    /// Stop the coordinator. Pending debounced writes are dropped.
    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Command::Shutdown)
    }
}

/// Typed access to one module.
pub struct ModuleHandle<T: ModuleData> {
    commands: mpsc::UnboundedSender<Command>,
    mirror: watch::Receiver<T>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: ModuleData> Clone for ModuleHandle<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            mirror: self.mirror.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T: ModuleData> ModuleHandle<T> {
    pub fn module(&self) -> ModuleName {
        T::MODULE
    }

    pub fn get(&self) -> T {
        self.mirror.borrow().clone()
    }

    pub fn set(&self, value: T) -> Result<(), SyncError> {
        self.edit(ModuleEdit::Replace(Box::new(value)))
    }

    /// Edit the current value in place.
    pub fn update(&self, apply: impl FnOnce(&mut T) + Send + 'static) -> Result<(), SyncError> {
        self.edit(ModuleEdit::Update(Box::new(move |any: &mut dyn Any| {
            if let Some(value) = any.downcast_mut::<T>() {
                apply(value);
            }
        })))
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.mirror.clone()
    }

    fn edit(&self, edit: ModuleEdit) -> Result<(), SyncError> {
        self.commands
            .send(Command::Edit {
                module: T::MODULE,
                edit,
            })
            .map_err(|_| SyncError::ChannelClosed("coordinator"))
    }
}
