// HTTP API for registration requests

mod register;

pub use register::{create_router, AppState};
