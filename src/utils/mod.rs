pub mod emulator_paths;
pub mod image_cache;
pub mod logging;
pub mod output;
pub mod settings;
pub mod timespan;
pub mod title;
pub mod validation;
