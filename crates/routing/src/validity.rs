//! The validity engine: an ordered chain of named predicates evaluated with
//! early return. Each predicate either fixes the outcome or passes.

use std::fmt;

use {
    courier_common::types::{MessageKind, ProtocolVersion},
    courier_skills::{CommandId, GroupId},
    serde::Serialize,
};

use crate::context::SessionContext;

/// Which handler a valid message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Route {
    /// The matched command's handler.
    Command(CommandId),
    /// The tagged group's handler.
    Tag(GroupId),
    /// The generic handler.
    Fallback,
}

/// The predicate that fixed a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SelfMessage,
    LegacyWhitelist,
    AttachmentGate,
    AdminGate,
    ExperimentalOverride,
    MembershipFilter,
    CommandTrigger,
    TagTrigger,
    NoTrigger,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfMessage => write!(f, "message sent by the bot itself"),
            Self::LegacyWhitelist => write!(f, "legacy protocol content accepted"),
            Self::AttachmentGate => write!(f, "attachments enabled"),
            Self::AdminGate => write!(f, "admin-only command from a non-admin"),
            Self::ExperimentalOverride => write!(f, "experimental mode accepts everything"),
            Self::MembershipFilter => write!(f, "membership change added nobody"),
            Self::CommandTrigger => write!(f, "command trigger matched"),
            Self::TagTrigger => write!(f, "group tag matched"),
            Self::NoTrigger => write!(f, "no trigger matched"),
        }
    }
}

/// Outcome of evaluating a [`SessionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub valid: bool,
    /// Set exactly when `valid` is true.
    pub route: Option<Route>,
    pub rule: Rule,
}

impl Verdict {
    fn accept(rule: Rule, route: Route) -> Self {
        Self {
            valid: true,
            route: Some(route),
            rule,
        }
    }

    fn reject(rule: Rule) -> Self {
        Self {
            valid: false,
            route: None,
            rule,
        }
    }
}

/// What a single predicate decides when it fires.
enum Outcome {
    Accept(Route),
    Reject,
}

type Predicate = fn(&SessionContext) -> Option<Outcome>;

/// The chain, in precedence order.
const RULES: &[(Rule, Predicate)] = &[
    (Rule::SelfMessage, self_message),
    (Rule::LegacyWhitelist, legacy_whitelist),
    (Rule::AttachmentGate, attachment_gate),
    (Rule::AdminGate, admin_gate),
    (Rule::ExperimentalOverride, experimental_override),
    (Rule::MembershipFilter, membership_filter),
    (Rule::CommandTrigger, command_trigger),
    (Rule::TagTrigger, tag_trigger),
];

/// Evaluate the rule chain. Never fails: no match is an ordinary rejection.
pub fn evaluate(ctx: &SessionContext) -> Verdict {
    for (rule, predicate) in RULES {
        match predicate(ctx) {
            Some(Outcome::Accept(route)) => return Verdict::accept(*rule, route),
            Some(Outcome::Reject) => return Verdict::reject(*rule),
            None => {},
        }
    }
    Verdict::reject(Rule::NoTrigger)
}

/// The bot's own messages are dropped, except membership changes it made,
/// which must stay observable.
fn self_message(ctx: &SessionContext) -> Option<Outcome> {
    let sender = &ctx.envelope().sender;
    let identity = ctx.identity();
    let own_address = identity.is_own_address(sender.address.as_deref());
    let own_inbox = identity.is_own_inbox(sender.inbox_id.as_deref())
        && ctx.envelope().kind != MessageKind::GroupUpdate;
    (own_address || own_inbox).then_some(Outcome::Reject)
}

/// v2 never reaches skill or tag resolution.
fn legacy_whitelist(ctx: &SessionContext) -> Option<Outcome> {
    let envelope = ctx.envelope();
    let accepted = matches!(
        envelope.kind,
        MessageKind::Text | MessageKind::RemoteAttachment | MessageKind::Reply
    );
    (envelope.version == ProtocolVersion::V2 && accepted)
        .then_some(Outcome::Accept(Route::Fallback))
}

fn attachment_gate(ctx: &SessionContext) -> Option<Outcome> {
    (ctx.envelope().kind == MessageKind::RemoteAttachment && ctx.config().attachments)
        .then_some(Outcome::Accept(Route::Fallback))
}

fn admin_gate(ctx: &SessionContext) -> Option<Outcome> {
    let admin_only = ctx.command().is_some_and(|c| c.admin_only);
    (admin_only && !ctx.sender_is_admin()).then_some(Outcome::Reject)
}

fn experimental_override(ctx: &SessionContext) -> Option<Outcome> {
    ctx.config()
        .experimental
        .then_some(Outcome::Accept(Route::Fallback))
}

fn membership_filter(ctx: &SessionContext) -> Option<Outcome> {
    let envelope = ctx.envelope();
    let nobody_added = envelope.kind == MessageKind::GroupUpdate
        && ctx.config().member_change
        && envelope.added_members() == Some(0);
    nobody_added.then_some(Outcome::Reject)
}

fn command_trigger(ctx: &SessionContext) -> Option<Outcome> {
    ctx.command_match()
        .map(|m| Outcome::Accept(Route::Command(m.id)))
}

fn tag_trigger(ctx: &SessionContext) -> Option<Outcome> {
    ctx.tagged_group_id()
        .map(|id| Outcome::Accept(Route::Tag(id)))
}
