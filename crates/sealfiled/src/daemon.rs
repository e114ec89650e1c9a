//! Daemon lifecycle: keys, storage, health check, metrics, gRPC server

use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use sealfile_backup::BackupService;
use sealfile_core::config::{SealConfig, StorageBackend};
use sealfile_crypto::CryptoEngine;
use sealfile_storage::{OpendalStore, S3Credentials};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::grpc::SealfileDaemonImpl;
use crate::metrics::{HealthState, Metrics};

pub async fn run(config: SealConfig) -> Result<()> {
    info!("daemon starting");

    // ── Signing key ──────────────────────────────────────────────────────
    // The public key file is optional; when present it must match.
    let public_key = config
        .crypto
        .public_key
        .exists()
        .then_some(config.crypto.public_key.as_path());
    let engine = CryptoEngine::load(&config.crypto.private_key, public_key).with_context(|| {
        format!(
            "loading signing key {} (generate one with `sealfile keygen`)",
            config.crypto.private_key.display()
        )
    })?;
    let fingerprint = engine.public_key().fingerprint().unwrap_or_default();
    let engine = Arc::new(engine);

    // ── Storage ──────────────────────────────────────────────────────────
    let creds = match config.storage.backend {
        StorageBackend::S3 => Some(S3Credentials::from_env()?),
        StorageBackend::Fs | StorageBackend::Memory => None,
    };
    let operator = sealfile_storage::build_from_core_config(&config.storage, creds.as_ref())
        .context("building storage operator")?;

    let store = OpendalStore::new(operator, config.storage.prefix.clone());
    let storage_ok = match store.health().await {
        Ok(()) => {
            info!(backend = config.storage.backend.as_str(), "storage: connected");
            true
        }
        Err(e) => {
            // Keep going; /readyz keeps probing.
            warn!(backend = config.storage.backend.as_str(), "storage: {e}");
            false
        }
    };
    if config.storage.backend == StorageBackend::Memory {
        warn!("storage backend is in-memory: backups are lost when the daemon exits");
    }

    let service = BackupService::new(engine, store.clone());

    // ── Metrics ──────────────────────────────────────────────────────────
    let mut registry = Registry::default();
    let metrics = Metrics::new(&mut registry);
    if let Some(addr) = config.daemon.metrics_addr.clone() {
        let state = HealthState {
            registry: Arc::new(registry),
            store,
        };
        tokio::spawn(async move {
            if let Err(e) = crate::metrics::serve(addr, state).await {
                error!("metrics server failed: {e}");
            }
        });
    }

    notify_ready();

    // ── gRPC ─────────────────────────────────────────────────────────────
    let impl_ = SealfileDaemonImpl::new(
        service,
        metrics,
        config.storage.backend.as_str().to_string(),
        storage_ok,
        fingerprint,
    );

    info!(socket = %config.daemon.socket.display(), "gRPC: listening");

    crate::grpc::serve(&config.daemon.socket, impl_, config.daemon.max_message_bytes).await
}

fn notify_ready() {
    // sd_notify(READY=1) when running under systemd; no-op without $NOTIFY_SOCKET
    if let Ok(socket) = std::env::var("NOTIFY_SOCKET") {
        use std::os::unix::net::UnixDatagram;
        if let Ok(sock) = UnixDatagram::unbound() {
            let _ = sock.send_to(b"READY=1\n", &socket);
            tracing::debug!(notify_socket = %socket, "sent systemd READY=1");
        }
    }
}
