pub mod books;
pub mod reviews;

use bookshelf_kernel::{settings::Settings, ModuleRegistry};

/// Register all feature modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, settings: &Settings) {
    registry.register(books::create_module(settings));
    registry.register(reviews::create_module(settings));
}
