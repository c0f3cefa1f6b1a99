//! facecast
//!
//! Periodic face detection published through a polling HTTP API.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! ```text
//! DetectionPort -> DetectorLoop -> SnapshotStore -> ApiServer -> display clients
//! ```
//!
//! and cancellation flows back through one shared `Shutdown`.
//!
//! # Module Structure
//!
//! - `ingest`: Frame sources (synthetic, still images)
//! - `detect`: Inference backends, SSD decoding, the detection port, post-processing
//! - `detector`: Fixed-cadence loop owning the port
//! - `store`: Versioned latest-snapshot slot
//! - `etag`: Cache-validation tokens
//! - `api`: `/healthz`, `/faces`, static files
//! - `shutdown`: Signal-driven cancellation
//! - `config`: File + environment configuration
//! - `client`: `/faces` polling client

pub mod api;
pub mod client;
pub mod config;
pub mod detect;
pub mod detector;
pub mod etag;
pub mod ingest;
pub mod shutdown;
pub mod snapshot;
pub mod store;

pub use api::{ApiConfig, ApiHandle, ApiServer};
pub use client::{FacesClient, FacesPoll};
pub use config::{ApiSettings, DetectorSettings, FaceConfig};
pub use detect::{open_port, DetectionPort, PortReading, RawDetection, SsdPort};
pub use detector::{DetectorHandle, DetectorLoop, DetectorLoopConfig, DetectorState};
pub use ingest::{Frame, FrameSource};
pub use shutdown::Shutdown;
pub use snapshot::{Detection, Landmark, Rect, Snapshot};
pub use store::SnapshotStore;
