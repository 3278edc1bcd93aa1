mod model;
mod service;

pub use model::{NewProject, Project, ProjectFilter, ProjectPatch};
