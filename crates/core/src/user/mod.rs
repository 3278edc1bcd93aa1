mod model;
mod service;

pub use model::{Credentials, NewUser, User};
