// Application wiring and lifecycle.

#[allow(clippy::module_inception)]
mod app;

pub use app::App;
