//! Joining an entity through an invitation.
//!
//! ```text
//! Idle ─► Parsing ─► Invalid
//!                 └► Parsed ─► Validating ─► Expired
//!                                         ├► Invalid
//!                                         ├► Failed
//!                                         └► Validated ─► Joining ─► Failed
//!                                                                 └► Joined
//! any non-terminal state ─► Cancelled
//! ```
//!
//! `Joined` is only reported after the grant has been merged into the
//! permission cache. After cancellation nothing is mutated: late responses
//! from the token service or the connector are dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use weft_core::{EntityType, PermissionLevel};
use weft_invite::{
    InviteError, InviteValidator, TokenService, ValidatedInvite, ValidationWarning,
};
use weft_perms::{PermissionService, UpgradeOutcome};

use crate::config::JoinPolicy;
use crate::connect::{ConnectRequest, JoinProgress, PeerConnector};

/// Progress reports buffered between the connector and the caller.
const PROGRESS_BUFFER: usize = 16;

/// How a successful join changed the viewer's access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum JoinOutcome {
    Granted {
        level: PermissionLevel,
    },
    Upgraded {
        from: PermissionLevel,
        to: PermissionLevel,
    },
    AlreadySufficient {
        current: PermissionLevel,
    },
    /// The target workspace was already joined at this level or higher.
    AlreadyMember {
        current: PermissionLevel,
    },
}

impl JoinOutcome {
    pub fn level(&self) -> PermissionLevel {
        match *self {
            JoinOutcome::Granted { level } => level,
            JoinOutcome::Upgraded { to, .. } => to,
            JoinOutcome::AlreadySufficient { current } | JoinOutcome::AlreadyMember { current } => {
                current
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            JoinOutcome::AlreadyMember { current } => {
                format!("You are already a member with {current} access.")
            }
            other => UpgradeOutcome::from(*other).message(),
        }
    }
}

impl From<UpgradeOutcome> for JoinOutcome {
    fn from(outcome: UpgradeOutcome) -> Self {
        match outcome {
            UpgradeOutcome::Granted { level } => JoinOutcome::Granted { level },
            UpgradeOutcome::Upgraded { from, to } => JoinOutcome::Upgraded { from, to },
            UpgradeOutcome::AlreadySufficient { current } => {
                JoinOutcome::AlreadySufficient { current }
            }
        }
    }
}

impl From<JoinOutcome> for UpgradeOutcome {
    fn from(outcome: JoinOutcome) -> Self {
        match outcome {
            JoinOutcome::Granted { level } => UpgradeOutcome::Granted { level },
            JoinOutcome::Upgraded { from, to } => UpgradeOutcome::Upgraded { from, to },
            JoinOutcome::AlreadySufficient { current } | JoinOutcome::AlreadyMember { current } => {
                UpgradeOutcome::AlreadySufficient { current }
            }
        }
    }
}

/// Where a join attempt stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum JoinState {
    Idle,
    Parsing,
    Invalid { reason: String },
    Parsed,
    Validating,
    Expired { expiry: Option<i64> },
    Validated { warning: Option<ValidationWarning> },
    Joining,
    Failed { reason: String },
    Joined { outcome: JoinOutcome },
    Cancelled,
}

impl JoinState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JoinState::Invalid { .. }
                | JoinState::Expired { .. }
                | JoinState::Failed { .. }
                | JoinState::Joined { .. }
                | JoinState::Cancelled
        )
    }

    /// Whether the machine may move from `self` to `next`.
    pub fn allows(&self, next: &JoinState) -> bool {
        use JoinState::*;
        if matches!(next, Cancelled) {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Idle, Parsing)
                | (Parsing, Invalid { .. })
                | (Parsing, Parsed)
                | (Parsed, Validating)
                | (Validating, Expired { .. })
                | (Validating, Invalid { .. })
                | (Validating, Failed { .. })
                | (Validating, Validated { .. })
                | (Validated { .. }, Joining)
                | (Joining, Failed { .. })
                | (Joining, Joined { .. })
        )
    }

    fn name(&self) -> &'static str {
        match self {
            JoinState::Idle => "idle",
            JoinState::Parsing => "parsing",
            JoinState::Invalid { .. } => "invalid",
            JoinState::Parsed => "parsed",
            JoinState::Validating => "validating",
            JoinState::Expired { .. } => "expired",
            JoinState::Validated { .. } => "validated",
            JoinState::Joining => "joining",
            JoinState::Failed { .. } => "failed",
            JoinState::Joined { .. } => "joined",
            JoinState::Cancelled => "cancelled",
        }
    }
}

/// Input to a join attempt.
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    /// Raw link or share URL, as pasted.
    pub link: String,
    /// Password typed by the joiner, for invites that do not embed one.
    pub password: Option<String>,
}

impl JoinRequest {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// One join attempt. Single use.
pub struct JoinFlow {
    validator: InviteValidator,
    policy: JoinPolicy,
    tokens: Arc<dyn TokenService>,
    connector: Arc<dyn PeerConnector>,
    cancel: CancellationToken,
    state: JoinState,
    history: Vec<JoinState>,
    invite: Option<ValidatedInvite>,
}

impl JoinFlow {
    pub fn new(
        validator: InviteValidator,
        policy: JoinPolicy,
        tokens: Arc<dyn TokenService>,
        connector: Arc<dyn PeerConnector>,
    ) -> Self {
        Self {
            validator,
            policy,
            tokens,
            connector,
            cancel: CancellationToken::new(),
            state: JoinState::Idle,
            history: vec![JoinState::Idle],
            invite: None,
        }
    }

    pub fn state(&self) -> &JoinState {
        &self.state
    }

    /// Every state visited, starting with `Idle`.
    pub fn history(&self) -> &[JoinState] {
        &self.history
    }

    /// The invite once it has been validated.
    pub fn invite(&self) -> Option<&ValidatedInvite> {
        self.invite.as_ref()
    }

    /// A handle that cancels this flow from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drive the flow to a terminal state.
    ///
    /// `now` is the Unix ms used for expiry. Progress from the connector is
    /// forwarded to `progress` when given; reports that do not fit are
    /// dropped.
    pub async fn run(
        &mut self,
        request: JoinRequest,
        permissions: &mut PermissionService,
        now: i64,
        progress: Option<mpsc::Sender<JoinProgress>>,
    ) -> JoinState {
        if self.state != JoinState::Idle {
            warn!(state = self.state.name(), "join flow already used");
            return self.state.clone();
        }
        if self.cancel.is_cancelled() {
            return self.transition(JoinState::Cancelled);
        }

        // ─── parse ───────────────────────────────────────────────────────────
        self.transition(JoinState::Parsing);
        let parsed = match self.validator.parse(&request.link) {
            Ok(parsed) => parsed,
            Err(e) => return self.fail_invite(e),
        };
        self.transition(JoinState::Parsed);

        // ─── validate ────────────────────────────────────────────────────────
        self.transition(JoinState::Validating);
        let tokens = Arc::clone(&self.tokens);
        let resolved = match self.guard(self.validator.resolve(parsed, tokens.as_ref())).await {
            None => return self.transition(JoinState::Cancelled),
            Some(Ok(resolved)) => resolved,
            Some(Err(e)) => return self.fail_invite(e),
        };
        let validated = match self.validator.validate(resolved, now) {
            Ok(validated) => validated,
            Err(e) => return self.fail_invite(e),
        };
        if let Some(warning) = &validated.warning {
            warn!(entity = %validated.invite.target, ?warning, "joining with a signature warning");
            if self.policy.reject_unverified
                && matches!(warning, ValidationWarning::SignatureUnverified(_))
            {
                return self.transition(JoinState::Invalid {
                    reason: warning.message().to_string(),
                });
            }
        }
        self.transition(JoinState::Validated {
            warning: validated.warning.clone(),
        });
        let connect = ConnectRequest::for_invite(&validated, request.password.as_deref());
        let invite = validated.invite.clone();
        self.invite = Some(validated);

        // ─── join ────────────────────────────────────────────────────────────
        self.transition(JoinState::Joining);
        if invite.requires_password && connect.secret.is_none() {
            return self.transition(JoinState::Failed {
                reason: "This invite requires a password.".into(),
            });
        }

        let connector = Arc::clone(&self.connector);
        let timeout = self.policy.connect_timeout();
        let connected = self
            .guard(connect_relaying(
                connector.as_ref(),
                &connect,
                timeout,
                progress,
            ))
            .await;
        match connected {
            None => return self.transition(JoinState::Cancelled),
            Some(Err(_)) => {
                return self.transition(JoinState::Failed {
                    reason: format!("Timed out connecting after {}s.", timeout.as_secs()),
                })
            }
            Some(Ok(Err(e))) => {
                return self.transition(JoinState::Failed {
                    reason: e.to_string(),
                })
            }
            Some(Ok(Ok(()))) => {}
        }

        if let Some(token) = &invite.token {
            match self.guard(tokens.consume(token)).await {
                None => return self.transition(JoinState::Cancelled),
                Some(Err(e)) => {
                    return self.transition(JoinState::Failed {
                        reason: e.user_message().to_string(),
                    })
                }
                Some(Ok(())) => {}
            }
        }

        // No await past this point: the grant cannot race cancellation.
        let target = &invite.target;
        let membership = match target.entity_type {
            EntityType::Workspace => permissions
                .directory()
                .permission_of(&target.id)
                .filter(|level| *level >= invite.permission),
            _ => None,
        };
        // an existing member keeps their recorded level
        let level = membership.unwrap_or(invite.permission);
        let granted = permissions.grant_permission(
            target.entity_type,
            &target.id,
            level,
            target.entity_type,
            &target.id,
        );
        let outcome = if membership.is_some() {
            JoinOutcome::AlreadyMember {
                current: granted.level(),
            }
        } else {
            JoinOutcome::from(granted)
        };
        self.transition(JoinState::Joined { outcome })
    }

    async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }

    fn fail_invite(&mut self, error: InviteError) -> JoinState {
        let next = match error {
            InviteError::Expired { expiry } => JoinState::Expired { expiry },
            InviteError::TokenService(_) => JoinState::Failed {
                reason: error.user_message().to_string(),
            },
            _ => JoinState::Invalid {
                reason: error.user_message().to_string(),
            },
        };
        self.transition(next)
    }

    fn transition(&mut self, next: JoinState) -> JoinState {
        debug_assert!(
            self.state.allows(&next),
            "illegal join transition {} -> {}",
            self.state.name(),
            next.name()
        );
        info!(from = self.state.name(), to = next.name(), "join state");
        self.state = next.clone();
        self.history.push(next.clone());
        next
    }
}

/// Connect under `timeout`, relaying progress to `caller` without waiting
/// on it.
async fn connect_relaying(
    connector: &dyn PeerConnector,
    request: &ConnectRequest,
    timeout: Duration,
    caller: Option<mpsc::Sender<JoinProgress>>,
) -> Result<crate::error::Result<()>, Elapsed> {
    let (relay, mut relayed) = mpsc::channel(PROGRESS_BUFFER);
    let forward = |report: JoinProgress| {
        if let Some(caller) = &caller {
            let _ = caller.try_send(report);
        }
    };

    let mut connecting = std::pin::pin!(tokio::time::timeout(
        timeout,
        connector.connect(request, &relay)
    ));
    let result = loop {
        tokio::select! {
            result = &mut connecting => break result,
            Some(report) = relayed.recv() => forward(report),
        }
    };
    while let Ok(report) = relayed.try_recv() {
        forward(report);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::memory::LoopbackConnector;
    use weft_core::{EntityRef, Keypair};
    use weft_invite::{
        token_link, InviteBuilder, InviteConfig, InviteToken, MemoryTokenService,
        TokenInviteData,
    };
    use weft_perms::WorkspaceRecord;

    const NOW: i64 = 1_700_000_000_000;

    struct Harness {
        tokens: Arc<MemoryTokenService>,
        connector: Arc<LoopbackConnector>,
        policy: JoinPolicy,
        permissions: PermissionService,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_connector(LoopbackConnector::new())
        }

        fn with_connector(connector: LoopbackConnector) -> Self {
            Self {
                tokens: Arc::new(MemoryTokenService::new()),
                connector: Arc::new(connector),
                policy: JoinPolicy::default(),
                permissions: PermissionService::new(),
            }
        }

        fn flow(&self) -> JoinFlow {
            JoinFlow::new(
                InviteValidator::default(),
                self.policy.clone(),
                self.tokens.clone(),
                self.connector.clone(),
            )
        }

        async fn join(&mut self, link: &str) -> (JoinState, JoinFlow) {
            let mut flow = self.flow();
            let state = flow
                .run(JoinRequest::new(link), &mut self.permissions, NOW, None)
                .await;
            (state, flow)
        }
    }

    fn link(level: PermissionLevel) -> String {
        InviteBuilder::new(EntityRef::workspace("W"), level)
            .signed_by(&Keypair::from_seed(&[8u8; 32]))
            .direct_link(&InviteConfig::default())
            .unwrap()
    }

    fn assert_legal(history: &[JoinState]) {
        for pair in history.windows(2) {
            assert!(pair[0].allows(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[tokio::test]
    async fn test_happy_path_grants() {
        let mut h = Harness::new();
        let (state, flow) = h.join(&link(PermissionLevel::Editor)).await;

        assert_eq!(
            state,
            JoinState::Joined {
                outcome: JoinOutcome::Granted {
                    level: PermissionLevel::Editor
                }
            }
        );
        assert_legal(flow.history());
        assert_eq!(flow.history().len(), 7);
        assert_eq!(
            h.permissions
                .get_permission(EntityType::Workspace, &"W".into()),
            PermissionLevel::Editor
        );
        assert_eq!(h.connector.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_second_join_is_already_sufficient() {
        let mut h = Harness::new();
        h.join(&link(PermissionLevel::Editor)).await;
        let (state, _) = h.join(&link(PermissionLevel::Viewer)).await;
        assert_eq!(
            state,
            JoinState::Joined {
                outcome: JoinOutcome::AlreadySufficient {
                    current: PermissionLevel::Editor
                }
            }
        );
    }

    #[tokio::test]
    async fn test_existing_member_is_reported() {
        let mut h = Harness::new();
        h.permissions
            .update_workspaces(&[WorkspaceRecord::new("W", PermissionLevel::Owner)]);
        let before = h.permissions.generation();

        let (state, _) = h.join(&link(PermissionLevel::Editor)).await;
        assert!(matches!(
            state,
            JoinState::Joined {
                outcome: JoinOutcome::AlreadyMember { .. }
            }
        ));
        // the grant still ran
        assert!(h.permissions.generation() > before);
    }

    #[tokio::test]
    async fn test_garbage_is_invalid() {
        let mut h = Harness::new();
        let (state, flow) = h.join("not a link").await;
        assert!(matches!(state, JoinState::Invalid { .. }));
        assert_legal(flow.history());
        assert!(h.connector.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_never_connects() {
        let mut h = Harness::new();
        let expired = InviteBuilder::new(EntityRef::workspace("W"), PermissionLevel::Owner)
            .expires_at(NOW - 1)
            .signed_by(&Keypair::from_seed(&[8u8; 32]))
            .direct_link(&InviteConfig::default())
            .unwrap();

        let (state, flow) = h.join(&expired).await;
        assert_eq!(state, JoinState::Expired { expiry: Some(NOW - 1) });
        assert_legal(flow.history());
        assert!(h.connector.requests().await.is_empty());
        assert_eq!(h.permissions.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_tampered_link_warns_but_joins() {
        let mut h = Harness::new();
        let tampered = link(PermissionLevel::Viewer).replace("perm=v", "perm=o");
        let (state, flow) = h.join(&tampered).await;

        assert!(matches!(state, JoinState::Joined { .. }));
        assert!(flow.history().iter().any(|s| matches!(
            s,
            JoinState::Validated {
                warning: Some(ValidationWarning::SignatureUnverified(_))
            }
        )));
    }

    #[tokio::test]
    async fn test_policy_can_reject_unverified() {
        let mut h = Harness::new();
        h.policy.reject_unverified = true;
        let tampered = link(PermissionLevel::Viewer).replace("perm=v", "perm=o");
        let (state, flow) = h.join(&tampered).await;

        assert!(matches!(state, JoinState::Invalid { .. }));
        assert_legal(flow.history());
        assert_eq!(h.permissions.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_grants_nothing() {
        let mut h = Harness::with_connector(LoopbackConnector::failing("no peers"));
        let (state, flow) = h.join(&link(PermissionLevel::Editor)).await;
        assert!(matches!(state, JoinState::Failed { .. }));
        assert_legal(flow.history());
        assert_eq!(h.permissions.generation(), 0);
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let mut h =
            Harness::with_connector(LoopbackConnector::new().with_delay(Duration::from_secs(5)));
        h.policy.connect_timeout_secs = 0;
        let (state, _) = h.join(&link(PermissionLevel::Editor)).await;
        assert!(matches!(state, JoinState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_cancel_during_connect_mutates_nothing() {
        let mut h =
            Harness::with_connector(LoopbackConnector::new().with_delay(Duration::from_secs(5)));
        let mut flow = h.flow();
        let cancel = flow.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let state = flow
            .run(
                JoinRequest::new(link(PermissionLevel::Editor)),
                &mut h.permissions,
                NOW,
                None,
            )
            .await;
        assert_eq!(state, JoinState::Cancelled);
        assert_legal(flow.history());
        assert_eq!(h.permissions.cached_entries(), 0);
        assert_eq!(h.permissions.generation(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let mut h = Harness::new();
        let mut flow = h.flow();
        flow.cancel();
        let state = flow
            .run(
                JoinRequest::new(link(PermissionLevel::Editor)),
                &mut h.permissions,
                NOW,
                None,
            )
            .await;
        assert_eq!(state, JoinState::Cancelled);
        assert!(h.connector.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_token_is_consumed_once() {
        let mut h = Harness::new();
        let token = InviteToken::parse("tok-1").unwrap();
        h.tokens
            .issue(
                token.clone(),
                TokenInviteData {
                    entity_id: "W".into(),
                    entity_type: EntityType::Workspace,
                    permission: PermissionLevel::Editor,
                    expiry: Some(NOW + 1_000),
                    requires_password: false,
                },
            )
            .await;
        let link = token_link(&token, &InviteConfig::default());

        let (first, _) = h.join(&link).await;
        assert!(matches!(first, JoinState::Joined { .. }));
        assert!(h.tokens.is_used(&token).await);

        let (second, _) = h.join(&link).await;
        assert!(matches!(second, JoinState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let mut h = Harness::new();
        let (state, _) = h.join("weft://t/nope").await;
        assert!(matches!(state, JoinState::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_password_required() {
        let mut h = Harness::new();
        let token = InviteToken::parse("locked").unwrap();
        h.tokens
            .issue(
                token.clone(),
                TokenInviteData {
                    entity_id: "W".into(),
                    entity_type: EntityType::Workspace,
                    permission: PermissionLevel::Viewer,
                    expiry: None,
                    requires_password: true,
                },
            )
            .await;
        let link = token_link(&token, &InviteConfig::default());

        let (state, _) = h.join(&link).await;
        assert!(matches!(state, JoinState::Failed { .. }));
        assert!(!h.tokens.is_used(&token).await);

        let mut flow = h.flow();
        let state = flow
            .run(
                JoinRequest::new(&link).with_password("secret"),
                &mut h.permissions,
                NOW,
                None,
            )
            .await;
        assert!(matches!(state, JoinState::Joined { .. }));
    }

    #[tokio::test]
    async fn test_progress_is_forwarded() {
        let mut h = Harness::new();
        let (tx, mut rx) = mpsc::channel(8);
        let mut flow = h.flow();
        flow.run(
            JoinRequest::new(link(PermissionLevel::Viewer)),
            &mut h.permissions,
            NOW,
            Some(tx),
        )
        .await;

        let first = rx.recv().await.unwrap();
        assert_eq!((first.current, first.total), (1, 2));
    }

    #[tokio::test]
    async fn test_compressed_invite_granting_nothing_is_invalid() {
        let mut h = Harness::new();
        let payload =
            weft_invite::InvitePayload::new(EntityRef::workspace("W"), PermissionLevel::None);
        let link =
            weft_invite::codec::encode_compressed(&payload, &InviteConfig::default()).unwrap();

        let (state, _) = h.join(&link).await;
        assert!(matches!(state, JoinState::Invalid { .. }), "{state:?}");
        assert_eq!(h.permissions.cached_entries(), 0);
        assert!(h.connector.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_unread_progress_does_not_stall_joining() {
        let mut h = Harness::new();
        h.policy.connect_timeout_secs = 1;
        let (tx, mut rx) = mpsc::channel(1);
        let mut flow = h.flow();

        let state = flow
            .run(
                JoinRequest::new(link(PermissionLevel::Editor)),
                &mut h.permissions,
                NOW,
                Some(tx),
            )
            .await;

        assert!(matches!(state, JoinState::Joined { .. }), "{state:?}");
        // the first report fits, the rest are dropped
        assert_eq!(rx.recv().await.map(|p| p.current), Some(1));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_outcome_messages() {
        let sufficient = JoinOutcome::AlreadySufficient {
            current: PermissionLevel::Owner,
        };
        assert!(sufficient.message().contains("at this level or higher"));
        let member = JoinOutcome::AlreadyMember {
            current: PermissionLevel::Editor,
        };
        assert!(member.message().contains("already a member"));
    }
}
