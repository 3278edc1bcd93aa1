mod model;
mod service;

pub use model::{Environment, EnvironmentPatch, NewEnvironment};
