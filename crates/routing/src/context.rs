use std::{collections::HashSet, sync::Arc};

use {
    courier_common::types::{Envelope, MessageKind},
    courier_config::{BotIdentity, RunnerConfig},
    courier_skills::{
        Command, CommandMatch, GroupId, ParamValue, Params, SkillGroup, SkillTable, resolve_command,
        resolve_group,
    },
    serde::{Deserialize, Serialize},
};

use crate::validity::Route;

/// Admin sets of a group conversation, keyed by inbox id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupRoles {
    pub admins: HashSet<String>,
    pub super_admins: HashSet<String>,
}

impl GroupRoles {
    pub fn is_admin(&self, inbox_id: &str) -> bool {
        self.admins.contains(inbox_id) || self.super_admins.contains(inbox_id)
    }
}

/// Everything the validity rules and the handlers see for one message.
///
/// Built once per message, after normalization, and dropped after dispatch.
/// Trigger resolution happens at construction so the rules stay a pure
/// function of this value.
#[derive(Debug, Clone)]
pub struct SessionContext {
    envelope: Envelope,
    roles: Option<GroupRoles>,
    table: Arc<SkillTable>,
    config: RunnerConfig,
    identity: Arc<BotIdentity>,
    command: Option<CommandMatch>,
    group: Option<GroupId>,
}

impl SessionContext {
    pub fn new(
        envelope: Envelope,
        roles: Option<GroupRoles>,
        table: Arc<SkillTable>,
        config: RunnerConfig,
        identity: Arc<BotIdentity>,
    ) -> Self {
        let text = envelope.text();
        let command = text.and_then(|t| resolve_command(t, &table));
        // Tags are only looked for in plain text, never in replies.
        let group = match (envelope.kind, text) {
            (MessageKind::Text, Some(t)) => resolve_group(t, &table),
            _ => None,
        };

        Self {
            envelope,
            roles,
            table,
            config,
            identity,
            command,
            group,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn roles(&self) -> Option<&GroupRoles> {
        self.roles.as_ref()
    }

    pub fn table(&self) -> &SkillTable {
        &self.table
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    /// The trigger match, if the text resolved to a command.
    pub fn command_match(&self) -> Option<&CommandMatch> {
        self.command.as_ref()
    }

    pub fn command(&self) -> Option<&Command> {
        self.table.command(self.command.as_ref()?.id)
    }

    pub fn params(&self) -> Option<&Params> {
        self.command.as_ref().map(|m| &m.params)
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params()?.get(name)
    }

    /// The skill group whose tag appeared in the text.
    pub fn tagged_group(&self) -> Option<&SkillGroup> {
        self.table.group(self.group?)
    }

    pub(crate) fn tagged_group_id(&self) -> Option<GroupId> {
        self.group
    }

    /// Whether the sender's inbox id appears in the conversation's admin or
    /// super-admin sets. Unknown roles mean "not an admin".
    pub fn sender_is_admin(&self) -> bool {
        match (&self.roles, self.envelope.sender.inbox_id.as_deref()) {
            (Some(roles), Some(inbox_id)) => roles.is_admin(inbox_id),
            _ => false,
        }
    }

    /// Name of the handler a route points at. `None` means the generic
    /// handler.
    pub fn handler_name(&self, route: Route) -> Option<&str> {
        match route {
            Route::Command(id) => self.table.command(id)?.handler.as_deref(),
            Route::Tag(id) => self.table.group(id)?.tag_handler.as_deref(),
            Route::Fallback => None,
        }
    }
}
