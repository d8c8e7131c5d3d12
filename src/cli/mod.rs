pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod detect;
pub mod dispatch;
pub mod env;
pub mod fill;
pub mod identify;
pub mod output;
pub mod profile;
pub mod runtime;

pub use app::run;
