//! Bookshelf application library
//!
//! Feature modules (books, reviews) and the server entrypoint shared by the
//! `bookshelf-app` binary and the `bookshelf` CLI.

pub mod modules;

use anyhow::Context;
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Build a registry holding every feature module
pub fn build_registry(settings: &Settings) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings);
    registry
}

/// Initialize modules, serve until a shutdown signal, then stop modules
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = build_registry(&settings);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry
        .init_modules(&ctx)
        .await
        .context("module initialization failed")?;
    registry
        .start_modules(&ctx)
        .await
        .context("module start failed")?;

    let served = bookshelf_http::start_server(&registry, &settings).await;

    registry
        .stop_modules()
        .await
        .context("module shutdown failed")?;

    served
}

/// Create any collection file that does not exist yet
pub async fn init_data(settings: &Settings) -> anyhow::Result<()> {
    let registry = build_registry(settings);
    let ctx = InitCtx { settings };
    registry.init_modules(&ctx).await
}
