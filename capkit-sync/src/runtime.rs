//! The coordinator task.
//!
//! One task owns every piece of sync state and handles, strictly in arrival
//! order: auth changes from the identity provider, commands from handles,
//! and internal events (remote deliveries, debounce fires, write results).
//! Deliveries and timer fires carry the session epoch they were created
//! under; anything from an earlier epoch is dropped on arrival.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use capkit_core::document;
use capkit_core::{
    AuthUser, Canvas, Copywriting, DocumentPath, Economics, Grow, MarketResearch, Mindset,
    ModuleData, ModuleName, Personas, ProductDesign, Sales, UserId, UserProfile,
};
use capkit_store::{DocumentStore, Snapshot, SnapshotResult, StoreError};

use crate::config::{LoadGate, SyncConfig};
use crate::error::SyncError;
use crate::handle::{MirrorSet, WorkspaceHandle};
use crate::identity::IdentityProvider;
use crate::module_sync::{ModuleEdit, ModuleSlot, ModuleSync};
use crate::persister::{DebouncedPersister, WritePhase};
use crate::session::{AuthTransition, SessionState, SessionTracker, View};
use crate::subscriptions::{SubscriptionManager, SubscriptionTarget};
use crate::suppressor::RemoteSuppressor;

pub(crate) enum Event {
    Remote {
        epoch: u64,
        target: SubscriptionTarget,
        delivery: SnapshotResult,
    },
    Flush {
        epoch: u64,
        module: ModuleName,
        generation: u64,
    },
    WriteSettled {
        epoch: u64,
        module: ModuleName,
        result: Result<(), StoreError>,
    },
}

pub(crate) enum Command {
    Edit {
        module: ModuleName,
        edit: ModuleEdit,
    },
    UpdateProfile(UserProfile),
    Navigate(View),
    SignOut,
    WritePhase {
        module: ModuleName,
        respond_to: oneshot::Sender<WritePhase>,
    },
    Shutdown,
}

/// Entry point for starting a workspace sync session.
pub struct WorkspaceSync;

impl WorkspaceSync {
    /// Spawn the coordinator on the current tokio runtime.
    ///
    /// The coordinator runs until [`WorkspaceHandle::shutdown`] is called or
    /// every handle has been dropped.
    pub fn spawn<S, I>(
        store: Arc<S>,
        identity: Arc<I>,
        config: SyncConfig,
    ) -> Result<(WorkspaceHandle, JoinHandle<Result<(), SyncError>>), SyncError>
    where
        S: DocumentStore,
        I: IdentityProvider,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(SessionState::default());
        let (profile_tx, profile_rx) = watch::channel(None);

        let mut modules = BTreeMap::new();
        let mut mirrors = MirrorSet::new();
        register::<Canvas>(&mut modules, &mut mirrors)?;
        register::<MarketResearch>(&mut modules, &mut mirrors)?;
        register::<Personas>(&mut modules, &mut mirrors)?;
        register::<Copywriting>(&mut modules, &mut mirrors)?;
        register::<Mindset>(&mut modules, &mut mirrors)?;
        register::<ProductDesign>(&mut modules, &mut mirrors)?;
        register::<Economics>(&mut modules, &mut mirrors)?;
        register::<Sales>(&mut modules, &mut mirrors)?;
        register::<Grow>(&mut modules, &mut mirrors)?;

        let auth = identity.auth_state();
        let coordinator = Coordinator {
            store,
            identity,
            persister: DebouncedPersister::new(config.debounce(), events_tx.clone()),
            config,
            session: SessionTracker::new(session_tx),
            profile: profile_tx,
            modules,
            suppressor: RemoteSuppressor::new(),
            subscriptions: SubscriptionManager::default(),
            events_tx,
            epoch: 0,
        };
        let task = tokio::spawn(coordinator.run(auth, commands_rx, events_rx));
        let handle = WorkspaceHandle::new(commands_tx, session_rx, profile_rx, mirrors);
        Ok((handle, task))
    }
}

fn register<T: ModuleData>(
    modules: &mut BTreeMap<ModuleName, Box<dyn ModuleSlot>>,
    mirrors: &mut MirrorSet,
) -> Result<(), SyncError> {
    let (sync, mirror) = ModuleSync::<T>::for_data()?;
    mirrors.insert(T::MODULE, Box::new(mirror) as Box<dyn Any + Send + Sync>);
    modules.insert(sync.module(), Box::new(sync));
    Ok(())
}

struct Coordinator {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    config: SyncConfig,
    session: SessionTracker,
    profile: watch::Sender<Option<UserProfile>>,
    modules: BTreeMap<ModuleName, Box<dyn ModuleSlot>>,
    suppressor: RemoteSuppressor,
    persister: DebouncedPersister,
    subscriptions: SubscriptionManager,
    events_tx: mpsc::UnboundedSender<Event>,
    epoch: u64,
}

impl Coordinator {
    async fn run(
        mut self,
        mut auth: watch::Receiver<Option<AuthUser>>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) -> Result<(), SyncError> {
        let initial = auth.borrow_and_update().clone();
        self.on_auth(initial);

        let mut auth_open = true;
        loop {
            tokio::select! {
                changed = auth.changed(), if auth_open => match changed {
                    Ok(()) => {
                        let user = auth.borrow_and_update().clone();
                        self.on_auth(user);
                    }
                    Err(_) => {
                        tracing::debug!("identity provider dropped its auth stream");
                        auth_open = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(event) = events.recv() => self.on_event(event),
            }
        }

        self.persister.cancel_all();
        self.subscriptions.close_all();
        tracing::info!("workspace sync stopped");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    fn on_auth(&mut self, user: Option<AuthUser>) {
        match self.session.observe(user) {
            AuthTransition::SignedIn(user) => self.open_session(&user.uid),
            AuthTransition::Refreshed => tracing::debug!("auth state refreshed"),
            AuthTransition::Switched { previous, user } => {
                tracing::info!(previous = %previous, uid = %user.uid, "switching user");
                self.close_session();
                self.open_session(&user.uid);
            }
            AuthTransition::SignedOut {
                previous: Some(previous),
            } => {
                tracing::info!(uid = %previous, "signed out");
                self.close_session();
            }
            AuthTransition::SignedOut { previous: None } => {}
        }
    }

    fn open_session(&mut self, uid: &UserId) {
        self.epoch += 1;
        self.session.bind(uid);
        self.subscriptions
            .open_all(&*self.store, uid, self.epoch, &self.events_tx);
        self.session.mark_loaded();
        tracing::info!(
            uid = %uid,
            subscriptions = self.subscriptions.len(),
            "workspace bound"
        );
    }

    fn close_session(&mut self) {
        self.epoch += 1;
        self.persister.cancel_all();
        self.subscriptions.close_all();
        self.suppressor.clear();
        for module in self.modules.values_mut() {
            module.reset();
        }
        self.profile.send_replace(None);
        self.session.unbind();
    }

    fn can_persist(&self, module: ModuleName) -> bool {
        if self.session.workspace().is_none() || !self.session.data_loaded() {
            return false;
        }
        match self.config.load_gate {
            LoadGate::SubscriptionsIssued => true,
            LoadGate::FirstSnapshot => self.subscriptions.has_delivered(module),
        }
    }

    fn after_change(&mut self, module: ModuleName) {
        if self.can_persist(module) {
            self.persister.schedule(module, self.epoch);
        } else {
            tracing::debug!(module = %module, "change not persisted: workspace not ready");
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Edit { module, edit } => self.on_edit(module, edit),
            Command::UpdateProfile(profile) => self.on_update_profile(profile),
            Command::Navigate(view) => self.session.navigate(view),
            Command::SignOut => {
                let identity = self.identity.clone();
                tokio::spawn(async move {
                    if let Err(err) = identity.sign_out().await {
                        tracing::warn!(error = %err, "sign-out failed");
                    }
                });
            }
            Command::WritePhase { module, respond_to } => {
                let _ = respond_to.send(self.persister.phase(module));
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    fn on_edit(&mut self, module: ModuleName, edit: ModuleEdit) {
        let Some(slot) = self.modules.get_mut(&module) else {
            return;
        };
        if let Err(err) = slot.apply_local(edit) {
            tracing::warn!(module = %module, error = %err, "rejected local edit");
            return;
        }
        self.suppressor.mark_local(module);
        self.after_change(module);
    }

    fn on_update_profile(&mut self, profile: UserProfile) {
        self.profile.send_replace(Some(profile.clone()));
        match self.session.workspace() {
            Some(uid) => self.write_profile(&uid, &profile),
            None => tracing::debug!("profile updated while signed out; not persisted"),
        }
    }

    fn write_profile(&self, uid: &UserId, profile: &UserProfile) {
        let patch = match document::sanitize(profile) {
            Ok(value) => document::wrap(value),
            Err(err) => {
                tracing::warn!(error = %err, "could not encode profile");
                return;
            }
        };
        let path = DocumentPath::profile(uid);
        let store = self.store.clone();
        tokio::spawn(async move {
            match store.set_merge(&path, patch).await {
                Ok(()) => tracing::debug!(path = %path, "profile written"),
                Err(err) => tracing::warn!(path = %path, error = %err, "profile write failed"),
            }
        });
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Remote {
                epoch,
                target,
                delivery,
            } => {
                if epoch != self.epoch {
                    tracing::trace!(?target, "dropping delivery from a closed session");
                    return;
                }
                match delivery {
                    Ok(snapshot) => self.on_snapshot(target, snapshot),
                    Err(err) => {
                        tracing::warn!(?target, error = %err, "subscription delivery failed");
                    }
                }
            }
            Event::Flush {
                epoch,
                module,
                generation,
            } => {
                if epoch == self.epoch && self.persister.take_due(module, generation) {
                    self.flush(module);
                }
            }
            Event::WriteSettled {
                epoch,
                module,
                result,
            } => {
                match result {
                    Ok(()) => tracing::info!(module = %module, "module written"),
                    Err(err) => tracing::warn!(module = %module, error = %err, "module write failed"),
                }
                if epoch == self.epoch {
                    self.persister.write_settled(module);
                }
            }
        }
    }

    fn on_snapshot(&mut self, target: SubscriptionTarget, snapshot: Snapshot) {
        self.subscriptions.record_delivery(target);
        let module = match target {
            SubscriptionTarget::Module(module) => module,
            SubscriptionTarget::Profile => return self.on_profile_snapshot(snapshot),
        };
        self.session.mark_delivered(module);

        let Some(document) = snapshot.document else {
            tracing::debug!(module = %module, "no stored document; keeping local state");
            return;
        };
        let Some(slot) = self.modules.get_mut(&module) else {
            return;
        };
        if let Err(err) = slot.apply_remote(document) {
            tracing::warn!(module = %module, error = %err, "ignoring undecodable document");
            return;
        }
        self.suppressor.mark_remote(module);
        self.after_change(module);
    }

    fn on_profile_snapshot(&mut self, snapshot: Snapshot) {
        match snapshot.document {
            Some(document) => match serde_json::from_value::<UserProfile>(Value::Object(document))
            {
                Ok(profile) => {
                    self.profile.send_replace(Some(profile));
                }
                Err(err) => tracing::warn!(error = %err, "ignoring undecodable profile"),
            },
            None => {
                let (Some(user), Some(uid)) = (self.session.user(), self.session.workspace())
                else {
                    return;
                };
                tracing::info!(uid = %uid, "creating default profile");
                let profile = UserProfile::default_for(user, Utc::now());
                self.write_profile(&uid, &profile);
            }
        }
    }

    fn flush(&mut self, module: ModuleName) {
        if self.suppressor.consume_if_remote(module) {
            tracing::debug!(module = %module, "skipping write of a remote value");
            return;
        }
        let Some(uid) = self.session.workspace() else {
            return;
        };
        let Some(slot) = self.modules.get(&module) else {
            return;
        };
        let payload = match slot.write_payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(module = %module, error = %err, "could not encode module");
                return;
            }
        };

        self.persister.begin_write(module);
        let path = DocumentPath::module(&uid, module);
        let store = self.store.clone();
        let events = self.events_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = store.set_merge(&path, payload).await;
            let _ = events.send(Event::WriteSettled {
                epoch,
                module,
                result,
            });
        });
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` filter. Safe to call more than once.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
