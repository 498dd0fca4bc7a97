mod motion;
mod stub;

pub use motion::MotionBackend;
pub use stub::StubBackend;
