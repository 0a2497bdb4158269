//! Peer connection seam.
//!
//! Joining an invited entity means reaching peers that hold it. The
//! transport itself lives outside this crate; the join flow only needs a
//! [`PeerConnector`] that either succeeds or fails, reporting progress as
//! it goes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use weft_core::{EntityRef, TopicHash};
use weft_invite::{InviteSecret, PeerHints, ValidatedInvite};

use crate::error::Result;

/// A progress report from an in-flight connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinProgress {
    pub current: u32,
    pub total: u32,
    pub status: String,
}

impl JoinProgress {
    pub fn new(current: u32, total: u32, status: impl Into<String>) -> Self {
        Self {
            current,
            total,
            status: status.into(),
        }
    }
}

/// What a connector needs to reach the invited entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub target: EntityRef,
    pub topic: Option<TopicHash>,
    pub hints: PeerHints,
    /// Embedded secret, or the password the joiner typed in.
    pub secret: Option<InviteSecret>,
}

impl ConnectRequest {
    pub fn for_invite(validated: &ValidatedInvite, password: Option<&str>) -> Self {
        let invite = &validated.invite;
        let secret = match (&invite.secret, password) {
            (Some(secret), _) => Some(secret.clone()),
            (None, Some(password)) => Some(InviteSecret::Password(password.to_string())),
            (None, None) => None,
        };
        Self {
            target: invite.target.clone(),
            topic: invite.topic(),
            hints: invite.hints.clone(),
            secret,
        }
    }
}

/// Establishes connectivity to the peers holding an entity.
///
/// Progress is lossy: report with `try_send` and ignore errors, since the
/// channel may be full or nobody may be listening. Never wait on it.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        request: &ConnectRequest,
        progress: &mpsc::Sender<JoinProgress>,
    ) -> Result<()>;
}

/// An in-memory connector for tests and offline use.
pub mod memory {
    use super::*;
    use crate::error::WeftError;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Records every request and answers with a fixed result.
    #[derive(Debug, Default)]
    pub struct LoopbackConnector {
        requests: Mutex<Vec<ConnectRequest>>,
        failure: Option<String>,
        delay: Option<Duration>,
    }

    impl LoopbackConnector {
        /// A connector that always succeeds.
        pub fn new() -> Self {
            Self::default()
        }

        /// A connector that always fails with `reason`.
        pub fn failing(reason: impl Into<String>) -> Self {
            Self {
                failure: Some(reason.into()),
                ..Self::default()
            }
        }

        /// Wait this long before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Requests seen so far.
        pub async fn requests(&self) -> Vec<ConnectRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl PeerConnector for LoopbackConnector {
        async fn connect(
            &self,
            request: &ConnectRequest,
            progress: &mpsc::Sender<JoinProgress>,
        ) -> Result<()> {
            self.requests.lock().await.push(request.clone());
            let _ = progress.try_send(JoinProgress::new(1, 2, "discovering peers"));

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(reason) = &self.failure {
                return Err(WeftError::Connect(reason.clone()));
            }

            let _ = progress.try_send(JoinProgress::new(2, 2, "connected"));
            Ok(())
        }
    }
}
