pub mod interfaces;

pub use interfaces::{config, scope_path};
