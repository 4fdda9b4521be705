//! `capkit edit`: change one module through a real sync session.
//!
//! The edit goes through the coordinator exactly like a UI edit would: sign
//! in, wait for the module's first snapshot, apply, let the debounce window
//! elapse, wait for the write to settle, shut down.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use capkit_core::{AuthUser, DocumentPath, ModuleData, ModuleName, UserId};
use capkit_store::DocumentStore;
use capkit_sync::{
    init_tracing, LocalIdentity, ModuleSync, WorkspaceHandle, WorkspaceSync, WritePhase,
};

use super::{open_store, runtime, with_module_type};
use crate::{CliEnv, ModuleArg};

const PHASE_POLL: Duration = Duration::from_millis(25);

/// Arguments for `capkit edit`.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Workspace (user id) to edit.
    pub uid: String,

    /// Module to change.
    pub module: ModuleArg,

    /// JSON value. Objects are merged into the current value key by key;
    /// anything else replaces it.
    pub value: String,
}

impl EditArgs {
    pub fn run(self, env: &CliEnv) -> Result<()> {
        let patch: Value =
            serde_json::from_str(&self.value).context("edit value is not valid JSON")?;
        let ModuleArg(module) = self.module;

        init_tracing();
        let runtime = runtime()?;
        let saved = runtime.block_on(async {
            with_module_type!(module, T => apply_edit::<T>(env, &self.uid, patch).await)
        })?;

        println!("{} {} saved for '{}'", "✓".green(), module, self.uid);
        println!("{}", serde_json::to_string_pretty(&saved)?);
        Ok(())
    }
}

async fn apply_edit<T: ModuleData>(env: &CliEnv, uid: &str, patch: Value) -> Result<Value> {
    let store = Arc::new(open_store(env));
    let identity = Arc::new(LocalIdentity::signed_in(AuthUser::new(uid)));
    let (handle, task) = WorkspaceSync::spawn(store.clone(), identity, env.config.clone())?;

    handle
        .wait_until_delivered(T::MODULE)
        .await
        .context("workspace did not load")?;
    let module = handle.module::<T>()?;
    let next = merge_patch(&module.get(), patch)?;
    module.set(next.clone())?;
    wait_until_idle(&handle, T::MODULE).await?;

    handle.shutdown()?;
    task.await.context("sync coordinator panicked")??;

    // The coordinator only logs write failures; confirm the store has it.
    let path = DocumentPath::module(&UserId::from(uid), T::MODULE);
    let stored = store.get(&path).await?;
    let (sync, _mirror) = ModuleSync::<T>::for_data()?;
    match stored.map(|document| sync.decode(document)).transpose()? {
        Some(value) if value == next => Ok(serde_json::to_value(value)?),
        _ => bail!("write to {path} did not reach the store; see the log above"),
    }
}

async fn wait_until_idle(handle: &WorkspaceHandle, module: ModuleName) -> Result<()> {
    while handle.write_phase(module).await? != WritePhase::Idle {
        tokio::time::sleep(PHASE_POLL).await;
    }
    Ok(())
}

/// Apply a JSON patch: top-level keys of an object patch replace the
/// corresponding keys of the current value.
fn merge_patch<T: ModuleData>(current: &T, patch: Value) -> Result<T> {
    let mut value = serde_json::to_value(current)?;
    match (&mut value, patch) {
        (Value::Object(target), Value::Object(patch)) => target.extend(patch),
        (slot, patch) => *slot = patch,
    }
    serde_json::from_value(value)
        .with_context(|| format!("value does not fit the {} module", T::MODULE))
}
