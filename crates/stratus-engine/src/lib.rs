//! Object lifecycle engine of the Stratus gateway.
//!
//! The engine joins the authorization pipeline, the transactional metadata
//! store, the streaming encrypted write path, and the recycle queue into the
//! object put/get/delete and multipart flows.
//!
//! # Architecture
//!
//! ```text
//! HTTP layer (routing, XML, signatures -- external)
//!        |
//!        v
//! AuthPipeline (stratus-auth)      -> decorated Credential
//!        |
//!        v
//! StorageGateway::ops              -> bucket ACL check, write/read flows
//!      |     |      |
//!      v     v      v
//! MetaStore  Cluster RecycleQueue
//! (stratus-meta)   (blob backend)  (async blob reclamation)
//! ```

pub mod cluster;
pub mod config;
pub mod encryption;
pub mod error;
pub mod gateway;
pub mod ops;
pub mod placement;
pub mod recycle;
pub mod stream;

pub use cluster::{Cluster, ClusterRegistry, MemCluster};
pub use config::EngineConfig;
pub use encryption::SseRequest;
pub use error::{EngineError, EngineResult};
pub use gateway::StorageGateway;
pub use ops::list::{ListObjectsInput, ListVersionsInput};
pub use ops::multipart::{
    CompleteMultipartOutput, CompletedPart, CopyPartInput, CreateMultipartInput, ListPartsOutput,
    UploadPartInput, UploadPartOutput, MAX_PART_NUMBER, MAX_PART_SIZE, MIN_PART_SIZE,
};
pub use ops::object::{
    DeleteObjectOutput, GetObjectInput, GetObjectOutput, PutObjectInput, PutObjectOutput,
};
pub use recycle::{spawn_recycle_workers, RecycleEntry, RecycleQueue};
pub use stream::StreamVerifier;
