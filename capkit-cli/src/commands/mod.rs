pub mod config;
pub mod edit;
pub mod show;
pub mod watch;

use anyhow::{Context, Result};

use capkit_store::FileStore;
use capkit_sync::paths::store_root;

use crate::CliEnv;

/// Expand `$body` with `$T` naming the payload type of `$module`.
macro_rules! with_module_type {
    ($module:expr, $T:ident => $body:expr) => {
        match $module {
            capkit_core::ModuleName::Canvas => {
                type $T = capkit_core::Canvas;
                $body
            }
            capkit_core::ModuleName::MarketResearch => {
                type $T = capkit_core::MarketResearch;
                $body
            }
            capkit_core::ModuleName::Personas => {
                type $T = capkit_core::Personas;
                $body
            }
            capkit_core::ModuleName::Copywriting => {
                type $T = capkit_core::Copywriting;
                $body
            }
            capkit_core::ModuleName::Mindset => {
                type $T = capkit_core::Mindset;
                $body
            }
            capkit_core::ModuleName::ProductDesign => {
                type $T = capkit_core::ProductDesign;
                $body
            }
            capkit_core::ModuleName::Economics => {
                type $T = capkit_core::Economics;
                $body
            }
            capkit_core::ModuleName::Sales => {
                type $T = capkit_core::Sales;
                $body
            }
            capkit_core::ModuleName::Grow => {
                type $T = capkit_core::Grow;
                $body
            }
        }
    };
}
pub(crate) use with_module_type;

pub(crate) fn open_store(env: &CliEnv) -> FileStore {
    FileStore::new(store_root(&env.home))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}
