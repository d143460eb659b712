//! In-process integration tests for the Stratus object gateway.
//!
//! Each test builds a [`TestEnv`]: a gateway over the in-memory metadata
//! client and an in-memory cluster, with the recycle receiver kept on the
//! side so tests can observe exactly which blobs were queued for
//! reclamation. The HTTP surface is out of scope, so tests drive the engine
//! operations directly with pre-resolved credentials.

use std::sync::{Arc, Once};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Mutex};

use stratus_auth::{AuthError, AuthRequest, AuthResult, Credential, SignatureVerifier};
use stratus_engine::{
    Cluster, ClusterRegistry, EngineConfig, GetObjectInput, MemCluster, PutObjectInput,
    PutObjectOutput, RecycleEntry, RecycleQueue, StorageGateway,
};
use stratus_meta::types::Acl;
use stratus_meta::{MemMetaClient, MetaClient};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// A gateway wired to in-memory backends, with the recycle receiver held
/// open for assertions.
pub struct TestEnv {
    /// The gateway under test.
    pub gateway: StorageGateway,
    /// The in-memory blob backend.
    pub cluster: Arc<MemCluster>,
    /// The in-memory metadata client.
    pub meta: Arc<MemMetaClient>,
    /// Receiver side of the recycle queue (no workers are running).
    pub recycle_rx: Mutex<mpsc::Receiver<RecycleEntry>>,
}

/// Build a fresh environment with default engine configuration.
#[must_use]
pub fn test_env() -> TestEnv {
    test_env_with_config(EngineConfig::default())
}

/// Build a fresh environment with a custom engine configuration.
#[must_use]
pub fn test_env_with_config(config: EngineConfig) -> TestEnv {
    init_tracing();
    let meta = Arc::new(MemMetaClient::new());
    let cluster = Arc::new(MemCluster::new("mem-fs"));
    let mut registry = ClusterRegistry::new();
    registry.register(Arc::clone(&cluster) as Arc<dyn Cluster>);

    let (queue, rx) = RecycleQueue::new(256);
    let gateway = StorageGateway::new(
        Arc::clone(&meta) as Arc<dyn MetaClient>,
        Arc::new(registry),
        queue,
        config,
    );
    TestEnv {
        gateway,
        cluster,
        meta,
        recycle_rx: Mutex::new(rx),
    }
}

/// The bucket owner's root credential.
#[must_use]
pub fn owner() -> Credential {
    Credential::root("owner-acct", "owner")
}

/// A root credential for a different account.
#[must_use]
pub fn stranger() -> Credential {
    Credential::root("stranger-acct", "stranger")
}

/// Generate a unique bucket name for a test.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

impl TestEnv {
    /// Create a bucket owned by [`owner`] with the given ACL.
    pub async fn make_bucket(&self, name: &str, acl: Acl) {
        self.gateway
            .create_bucket(&owner(), name, acl)
            .await
            .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    }

    /// PUT a byte payload under a key with default metadata.
    pub async fn put_bytes(&self, bucket: &str, key: &str, data: &[u8]) -> PutObjectOutput {
        let input = PutObjectInput::new(
            bucket,
            key,
            data.len() as u64,
            Box::new(std::io::Cursor::new(data.to_vec())),
        );
        self.gateway
            .put_object(&owner(), input)
            .await
            .unwrap_or_else(|e| panic!("put {bucket}/{key} failed: {e}"))
    }

    /// GET the latest version of a key and read it fully.
    pub async fn get_bytes(&self, bucket: &str, key: &str) -> Vec<u8> {
        let output = self
            .gateway
            .get_object(&owner(), GetObjectInput::new(bucket, key))
            .await
            .unwrap_or_else(|e| panic!("get {bucket}/{key} failed: {e}"));
        let mut body = output.body;
        let mut data = Vec::new();
        body.read_to_end(&mut data)
            .await
            .unwrap_or_else(|e| panic!("read body of {bucket}/{key} failed: {e}"));
        data
    }

    /// Wait for the next recycle entry; panics after five seconds.
    pub async fn expect_recycle(&self) -> RecycleEntry {
        tokio::time::timeout(Duration::from_secs(5), async {
            self.recycle_rx.lock().await.recv().await
        })
        .await
        .expect("timed out waiting for a recycle entry")
        .expect("recycle channel closed")
    }

    /// Assert that no recycle entry is pending right now.
    pub async fn assert_no_recycle(&self) {
        let pending = self.recycle_rx.lock().await.try_recv();
        assert!(pending.is_err(), "unexpected recycle entry: {pending:?}");
    }
}

/// Hex MD5 of a byte slice, for ETag assertions.
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    use digest::Digest;
    hex::encode(md5::Md5::digest(data))
}

/// A signature verifier resolving every signed request to a fixed credential.
pub struct StaticVerifier(pub Credential);

impl SignatureVerifier for StaticVerifier {
    fn verify(&self, _request: &AuthRequest) -> AuthResult<Credential> {
        Ok(self.0.clone())
    }
}

/// A signature verifier that always rejects.
pub struct RejectingVerifier;

impl SignatureVerifier for RejectingVerifier {
    fn verify(&self, _request: &AuthRequest) -> AuthResult<Credential> {
        Err(AuthError::SignatureDoesNotMatch)
    }
}

mod test_auth;
mod test_list;
mod test_object;
mod test_recycle;
mod test_versioning;
