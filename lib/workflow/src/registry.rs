//! Node type registry.
//!
//! A read-only catalog of the node types the validator knows about. The
//! registry is advisory: the engine may ship node types the catalog has not
//! caught up with, so a miss means "unknown", never "invalid".

use crate::node::NodeCategory;
use serde::Serialize;
use std::collections::BTreeMap;

/// Separator between a node type's package and its short name.
const QUALIFIED_PREFIX_SEPARATOR: char = '.';

/// Metadata describing a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeInfo {
    /// Registry key.
    pub id: &'static str,
    /// Category of the node type.
    pub category: NodeCategory,
    /// Name shown to users.
    pub display_name: &'static str,
    /// Short description.
    pub description: &'static str,
    /// Parameters the node cannot run without.
    pub required_parameters: &'static [&'static str],
    /// Parameters the node understands but does not require.
    pub optional_parameters: &'static [&'static str],
    /// Icon identifier.
    pub icon: &'static str,
}

impl NodeTypeInfo {
    /// Returns true for trigger-category types.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }
}

/// The node type catalog.
///
/// Construct once at startup and share by reference (or `Arc`); it is never
/// mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
    types: BTreeMap<&'static str, NodeTypeInfo>,
}

impl NodeTypeRegistry {
    /// Creates a registry from the given entries.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = NodeTypeInfo>) -> Self {
        Self {
            types: entries.into_iter().map(|info| (info.id, info)).collect(),
        }
    }

    /// Creates the registry of built-in node types.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_entries(builtin_entries())
    }

    /// Looks up a node type.
    ///
    /// Package-qualified identifiers (`n8n-nodes-base.httpRequest`) resolve
    /// to their short name.
    #[must_use]
    pub fn get(&self, type_id: &str) -> Option<&NodeTypeInfo> {
        self.types.get(type_id).or_else(|| {
            let (_, short) = type_id.rsplit_once(QUALIFIED_PREFIX_SEPARATOR)?;
            self.types.get(short)
        })
    }

    /// Returns the category of a node type, if known.
    #[must_use]
    pub fn category(&self, type_id: &str) -> Option<NodeCategory> {
        self.get(type_id).map(|info| info.category)
    }

    /// Returns the canonical short id of a node type, if known.
    #[must_use]
    pub fn canonical_id(&self, type_id: &str) -> Option<&'static str> {
        self.get(type_id).map(|info| info.id)
    }

    /// Iterates all entries sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &NodeTypeInfo> {
        self.types.values()
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
const fn entry(
    id: &'static str,
    category: NodeCategory,
    display_name: &'static str,
    description: &'static str,
    required_parameters: &'static [&'static str],
    optional_parameters: &'static [&'static str],
    icon: &'static str,
) -> NodeTypeInfo {
    NodeTypeInfo {
        id,
        category,
        display_name,
        description,
        required_parameters,
        optional_parameters,
        icon,
    }
}

fn builtin_entries() -> Vec<NodeTypeInfo> {
    use NodeCategory::*;

    vec![
        entry(
            "webhook",
            Trigger,
            "Webhook",
            "Starts the workflow when an HTTP request arrives",
            &[],
            &["path", "httpMethod", "responseMode"],
            "fa:bolt",
        ),
        entry(
            "scheduleTrigger",
            Trigger,
            "Schedule Trigger",
            "Starts the workflow on a schedule",
            &["rule"],
            &[],
            "fa:clock",
        ),
        entry(
            "cron",
            Trigger,
            "Cron",
            "Starts the workflow at fixed times (legacy)",
            &["triggerTimes"],
            &[],
            "fa:calendar",
        ),
        entry(
            "manualTrigger",
            Trigger,
            "Manual Trigger",
            "Starts the workflow when run by hand",
            &[],
            &[],
            "fa:mouse-pointer",
        ),
        entry(
            "emailReadImap",
            Trigger,
            "Email Trigger (IMAP)",
            "Starts the workflow when an email arrives",
            &[],
            &["mailbox", "postProcessAction"],
            "fa:inbox",
        ),
        entry(
            "httpRequest",
            Action,
            "HTTP Request",
            "Makes an HTTP request",
            &["url"],
            &["method", "authentication", "sendBody", "sendHeaders", "options"],
            "fa:globe",
        ),
        entry(
            "emailSend",
            Action,
            "Send Email",
            "Sends an email over SMTP",
            &["fromEmail", "toEmail"],
            &["subject", "text", "html"],
            "fa:envelope",
        ),
        entry(
            "slack",
            Action,
            "Slack",
            "Posts to Slack",
            &[],
            &["resource", "operation", "channel", "text"],
            "file:slack.svg",
        ),
        entry(
            "set",
            Transform,
            "Edit Fields",
            "Sets or renames item fields",
            &[],
            &["values", "assignments", "options"],
            "fa:pen",
        ),
        entry(
            "merge",
            Transform,
            "Merge",
            "Combines data from two inputs",
            &[],
            &["mode"],
            "fa:code-branch",
        ),
        entry(
            "if",
            Logic,
            "If",
            "Routes items by a condition",
            &["conditions"],
            &[],
            "fa:map-signs",
        ),
        entry(
            "switch",
            Logic,
            "Switch",
            "Routes items to one of several outputs",
            &[],
            &["rules", "mode"],
            "fa:random",
        ),
        entry(
            "wait",
            Logic,
            "Wait",
            "Pauses execution",
            &[],
            &["amount", "unit", "resume"],
            "fa:pause-circle",
        ),
        entry(
            "code",
            Code,
            "Code",
            "Runs custom JavaScript",
            &["jsCode"],
            &["mode", "language"],
            "fa:code",
        ),
        entry(
            "function",
            Code,
            "Function",
            "Runs custom JavaScript over all items (legacy)",
            &["functionCode"],
            &[],
            "fa:code",
        ),
        entry(
            "respondToWebhook",
            Output,
            "Respond to Webhook",
            "Returns data to the webhook caller",
            &[],
            &["respondWith", "responseBody", "options"],
            "fa:reply",
        ),
        entry(
            "noOp",
            Output,
            "No Operation",
            "Does nothing",
            &[],
            &[],
            "fa:arrow-right",
        ),
    ]
}
