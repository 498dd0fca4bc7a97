mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectorBackend, ModelLoadError};
pub use backends::{MotionBackend, StubBackend};
pub use registry::BackendRegistry;
pub use result::Detection;
