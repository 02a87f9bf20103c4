//! In-memory [`AgentApi`] for tests

use super::client::AgentApi;
use super::types::{ByteStream, SessionDescriptor};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Scripted agent: health, session listing and reply chunks are all set by
/// the test.
pub struct MockAgent {
    healthy: AtomicBool,
    healthy_after: Mutex<Option<(Instant, Duration)>>,
    probes: AtomicUsize,
    fail_requests: AtomicBool,
    sessions: Mutex<Vec<SessionDescriptor>>,
    next_session: AtomicUsize,
    reply_chunks: Mutex<Vec<Result<Bytes>>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            healthy_after: Mutex::new(None),
            probes: AtomicUsize::new(0),
            fail_requests: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            next_session: AtomicUsize::new(1),
            reply_chunks: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Report unhealthy until `delay` has elapsed from now (tokio clock).
    pub fn healthy_after(&self, delay: Duration) {
        self.healthy.store(false, Ordering::SeqCst);
        *self.healthy_after.lock().unwrap() = Some((Instant::now(), delay));
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Make every listing/create/send request fail
    pub fn fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    pub fn with_sessions(self, ids: &[&str]) -> Self {
        *self.sessions.lock().unwrap() = ids.iter().map(|id| SessionDescriptor::new(*id)).collect();
        self
    }

    /// Chunks returned for the next message submission
    pub fn reply_with(&self, chunks: &[&str]) {
        *self.reply_chunks.lock().unwrap() = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
    }

    /// Chunks followed by a transport error
    pub fn reply_then_fail(&self, chunks: &[&str]) {
        self.reply_with(chunks);
        self.reply_chunks
            .lock()
            .unwrap()
            .push(Err(Error::Agent("connection reset".to_string())));
    }

    /// `(session_id, text)` of every submitted message
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn check_fail(&self) -> Result<()> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(Error::Agent("HTTP 500: agent exploded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AgentApi for MockAgent {
    async fn probe(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some((since, delay)) = *self.healthy_after.lock().unwrap() {
            if since.elapsed() >= delay {
                return true;
            }
        }
        self.healthy.load(Ordering::SeqCst)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionDescriptor>> {
        self.check_fail()?;
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn create_session(&self) -> Result<SessionDescriptor> {
        self.check_fail()?;
        let n = self.next_session.fetch_add(1, Ordering::SeqCst);
        let session = SessionDescriptor::new(format!("ses_new_{}", n));
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn send_message(&self, session_id: &str, text: &str) -> Result<ByteStream> {
        self.check_fail()?;
        self.sent
            .lock()
            .unwrap()
            .push((session_id.to_string(), text.to_string()));
        let chunks = std::mem::take(&mut *self.reply_chunks.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
