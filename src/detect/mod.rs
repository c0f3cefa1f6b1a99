//! Detection port: frame source plus inference backend behind one capability.

mod backend;
pub mod backends;
mod port;
pub mod postprocess;
mod result;
pub mod ssd;

pub use backend::InferenceBackend;
pub use backends::StubBackend;
pub use port::{open_port, DetectionPort, SsdPort};
pub use result::{PortReading, RawDetection};
