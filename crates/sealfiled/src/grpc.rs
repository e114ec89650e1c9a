//! tonic gRPC server over Unix domain socket

use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use sealfile_backup::BackupService;
use sealfile_core::proto::{
    sealfile_daemon_server::{SealfileDaemon, SealfileDaemonServer},
    *,
};
use sealfile_core::SealError;
use sealfile_storage::OpendalStore;

use crate::metrics::Metrics;

/// Implementation of the SealfileDaemon gRPC service
pub struct SealfileDaemonImpl {
    service: BackupService<OpendalStore>,
    metrics: Metrics,
    storage_backend: String,
    storage_ok: bool,
    fingerprint: String,
    start_time: Instant,
}

impl SealfileDaemonImpl {
    pub fn new(
        service: BackupService<OpendalStore>,
        metrics: Metrics,
        storage_backend: String,
        storage_ok: bool,
        fingerprint: String,
    ) -> Self {
        Self {
            service,
            metrics,
            storage_backend,
            storage_ok,
            fingerprint,
            start_time: Instant::now(),
        }
    }

    /// Record the outcome and convert the error for the wire.
    fn finish<T>(
        &self,
        op: &str,
        started: Instant,
        bytes_in: usize,
        bytes_out: impl Fn(&T) -> usize,
        result: Result<T, SealError>,
    ) -> Result<Response<T>, Status> {
        let out = result.as_ref().map(&bytes_out).unwrap_or(0);
        self.metrics
            .observe(op, &result, bytes_in, out, started.elapsed());
        match result {
            Ok(v) => Ok(Response::new(v)),
            Err(e) => {
                warn!(op, kind = e.kind().as_str(), "request failed: {e}");
                Err(e.into())
            }
        }
    }
}

#[tonic::async_trait]
impl SealfileDaemon for SealfileDaemonImpl {
    async fn status(
        &self,
        _request: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        Ok(Response::new(StatusResponse {
            version: env!("CARGO_PKG_VERSION").into(),
            storage_backend: self.storage_backend.clone(),
            storage_ok: self.storage_ok,
            uptime_secs: self.start_time.elapsed().as_secs() as i64,
            public_key_fingerprint: self.fingerprint.clone(),
        }))
    }

    async fn backup(
        &self,
        request: Request<BackupRequest>,
    ) -> Result<Response<BackupResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();
        let len = req.file.len();

        let result = async {
            let receipt = self.service.backup(&req.file, &req.filename).await?;
            Ok::<_, SealError>(BackupResponse {
                content_id: receipt.content_id.to_string(),
                metadata_json: receipt.metadata.to_json()?,
            })
        }
        .await;

        self.finish("backup", started, len, |_| 0, result)
    }

    async fn restore(
        &self,
        request: Request<RestoreRequest>,
    ) -> Result<Response<RestoreResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = self
            .service
            .restore(
                &req.content_id,
                &req.key_hex,
                &req.iv_hex,
                &req.expected_hash_hex,
            )
            .await
            .map(|file| RestoreResponse { file });

        self.finish("restore", started, 0, |r| r.file.len(), result)
    }

    async fn verify_metadata(
        &self,
        request: Request<VerifyMetadataRequest>,
    ) -> Result<Response<VerifyMetadataResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();

        let result = self
            .service
            .verify_metadata(&req.metadata_json)
            .map(|valid| VerifyMetadataResponse { valid });

        self.finish("verify_metadata", started, req.metadata_json.len(), |_| 0, result)
    }

    async fn decrypt_only(
        &self,
        request: Request<DecryptOnlyRequest>,
    ) -> Result<Response<DecryptOnlyResponse>, Status> {
        let started = Instant::now();
        let req = request.into_inner();
        let expected = Some(req.expected_hash_hex.as_str()).filter(|h| !h.is_empty());

        let result = self
            .service
            .decrypt_only(&req.ciphertext, &req.key_hex, &req.iv_hex, expected)
            .map(|file| DecryptOnlyResponse { file });

        self.finish(
            "decrypt_only",
            started,
            req.ciphertext.len(),
            |r| r.file.len(),
            result,
        )
    }
}

/// Start the gRPC server on a Unix domain socket
pub async fn serve(
    socket_path: &Path,
    impl_: SealfileDaemonImpl,
    max_message_bytes: usize,
) -> Result<()> {
    // Remove stale socket if it exists
    if socket_path.exists() {
        tokio::fs::remove_file(socket_path).await?;
    }

    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let listener = UnixListener::bind(socket_path)?;
    let stream = UnixListenerStream::new(listener);

    info!(socket = %socket_path.display(), max_message_bytes, "gRPC server ready");

    let svc = SealfileDaemonServer::new(impl_)
        .max_decoding_message_size(max_message_bytes)
        .max_encoding_message_size(max_message_bytes);

    Server::builder()
        .add_service(svc)
        .serve_with_incoming(stream)
        .await
        .map_err(|e| anyhow::anyhow!("gRPC server error: {e}"))
}
