//! `capkit watch`: follow a workspace until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use capkit_core::{AuthUser, ModuleData, ModuleName};
use capkit_sync::{init_tracing, LocalIdentity, WorkspaceHandle, WorkspaceSync};

use super::{open_store, runtime, with_module_type};
use crate::CliEnv;

/// Arguments for `capkit watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Workspace (user id) to follow.
    pub uid: String,
}

impl WatchArgs {
    pub fn run(self, env: &CliEnv) -> Result<()> {
        init_tracing();
        let runtime = runtime()?;
        runtime.block_on(async {
            let store = Arc::new(open_store(env));
            let identity = Arc::new(LocalIdentity::signed_in(AuthUser::new(self.uid.as_str())));
            let (handle, task) = WorkspaceSync::spawn(store, identity, env.config.clone())?;
            handle
                .wait_until_loaded()
                .await
                .context("workspace did not load")?;

            for module in ModuleName::ALL {
                with_module_type!(module, T => print_changes::<T>(&handle)?);
            }
            println!("watching '{}' (ctrl-c to stop)", self.uid);

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            handle.shutdown()?;
            task.await.context("sync coordinator panicked")??;
            Ok::<(), anyhow::Error>(())
        })
    }
}

/// Print every change of `T`'s mirror as one JSON line.
fn print_changes<T: ModuleData>(handle: &WorkspaceHandle) -> Result<()> {
    let mut mirror = handle.module::<T>()?.subscribe();
    tokio::spawn(async move {
        while mirror.changed().await.is_ok() {
            let line = serde_json::to_string(&*mirror.borrow_and_update());
            match line {
                Ok(line) => println!("{} {line}", T::MODULE.as_str().cyan()),
                Err(err) => tracing::warn!(module = %T::MODULE, error = %err, "unprintable value"),
            }
        }
    });
    Ok(())
}
