//! The worker side of the request channel: drain descriptors, run them
//! against the store, write replies back into the shared region.

use gabbro_icc::{ChannelError, Descriptor, RequestChannel, RequestKind};
use gabbro_store::KvStore;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Executes channel requests against a [`KvStore`].
///
/// One engine is shared by all worker threads; both collaborators are
/// behind `Arc`s, so several engines over distinct channels can coexist in
/// one process (nothing here is global).
pub struct KvEngine {
    channel: Arc<RequestChannel>,
    store: Arc<KvStore>,
}

impl KvEngine {
    pub fn new(channel: Arc<RequestChannel>, store: Arc<KvStore>) -> Self {
        KvEngine { channel, store }
    }

    /// Runs a single request against the store and returns the completed
    /// reply descriptor. `Put` stores the pair and echoes the request;
    /// `Get` fills `value` with the stored value, or 0 for a missing key.
    pub fn execute(&self, request: &Descriptor) -> Descriptor {
        let mut reply = *request;
        match request.kind {
            RequestKind::Put => {
                self.store.put(request.key, request.value);
            }
            RequestKind::Get => {
                reply.value = self.store.get(request.key).unwrap_or(0);
            }
        }
        reply
    }

    /// Blocks for one request, executes it, and writes the reply at the
    /// request's `reply_offset`.
    pub fn serve_one(&self) -> Result<(), ChannelError> {
        let request = self.channel.receive();
        let reply = self.execute(&request);
        self.channel.write_reply(&reply)
    }

    /// Serves requests forever. A rejected reply offset is the client's
    /// fault, not a reason to kill the worker: it is logged and the loop
    /// moves on.
    pub fn run(&self) {
        loop {
            if let Err(e) = self.serve_one() {
                tracing::warn!(error = %e, "dropping reply for bad offset");
            }
        }
    }

    /// Spawns `workers` threads, each running [`KvEngine::run`].
    pub fn spawn_workers(self: Arc<Self>, workers: usize) -> Vec<JoinHandle<()>> {
        (0..workers)
            .map(|id| {
                let engine = Arc::clone(&self);
                std::thread::Builder::new()
                    .name(format!("gabbro-worker-{id}"))
                    .spawn(move || {
                        tracing::info!(worker = id, "worker started");
                        engine.run();
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect()
    }
}
