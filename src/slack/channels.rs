//! Per-team channel planning, bulk creation and archival

use super::{Channel, SlackClient};
use crate::config::ChannelPlanConfig;
use crate::error::Result;

/// Purpose of a team channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// Management channel; also gets the extra management member
    Management,
    /// Day-to-day operations channel
    Operations,
}

/// A channel to create and the users to invite into it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedChannel {
    /// Requested channel name
    pub name: String,
    /// Channel purpose
    pub kind: ChannelKind,
    /// User IDs to invite after creation
    pub invitees: Vec<String>,
}

/// A channel that was created
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedChannel {
    /// The channel as Slack returned it
    pub channel: Channel,
    /// Invite error, if inviting the members failed
    pub invite_error: Option<String>,
}

/// Outcome of a bulk creation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreationSummary {
    /// Channels created, in plan order
    pub created: Vec<CreatedChannel>,
    /// `(requested name, error)` for channels that could not be created
    pub failed: Vec<(String, String)>,
}

/// Build the channel list: every management channel, then every operations channel
///
/// Names are `<prefix><team><suffix>` with the team lowercased and inner whitespace turned
/// into dashes.
pub fn plan_channels(config: &ChannelPlanConfig) -> Vec<PlannedChannel> {
    let management_members: Vec<String> = config
        .common_users
        .iter()
        .cloned()
        .chain(config.management_extra_user.iter().cloned())
        .collect();

    let name_for = |team: &str, suffix: &str| {
        let slug = team.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
        format!("{}{}{}", config.prefix, slug, suffix)
    };

    let management = config.teams.iter().map(|team| PlannedChannel {
        name: name_for(team, &config.management_suffix),
        kind: ChannelKind::Management,
        invitees: management_members.clone(),
    });
    let operations = config.teams.iter().map(|team| PlannedChannel {
        name: name_for(team, &config.operations_suffix),
        kind: ChannelKind::Operations,
        invitees: config.common_users.clone(),
    });

    management.chain(operations).collect()
}

/// Create each planned private channel and invite its members
///
/// Failures are logged and collected; the remaining channels are still processed.
pub async fn create_channels(client: &SlackClient, plan: &[PlannedChannel]) -> CreationSummary {
    tracing::info!(channels = plan.len(), "creating Slack channels");
    let mut summary = CreationSummary::default();

    for planned in plan {
        let channel = match client.create_channel(&planned.name, true).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(channel = %planned.name, error = %e, "failed to create channel");
                summary.failed.push((planned.name.clone(), e.to_string()));
                continue;
            }
        };
        tracing::info!(
            requested = %planned.name,
            created = %channel.name,
            id = %channel.id,
            "channel created"
        );

        let invite_error = match client.invite(&channel.id, &planned.invitees).await {
            Ok(()) => None,
            Err(e) => {
                // already_in_channel, cant_invite_self, ...
                tracing::warn!(channel = %channel.id, error = %e, "invite failed");
                Some(e.to_string())
            }
        };

        summary.created.push(CreatedChannel {
            channel,
            invite_error,
        });
    }

    tracing::info!(
        created = summary.created.len(),
        failed = summary.failed.len(),
        "finished creating channels"
    );
    summary
}

/// Find a non-archived private channel by name and archive it
///
/// Returns the archived channel, or `None` when no channel has that name.
pub async fn archive_by_name(client: &SlackClient, name: &str) -> Result<Option<Channel>> {
    let Some(channel) = client.find_channel_by_name(name, "private_channel").await? else {
        tracing::warn!(channel = name, "channel not found");
        return Ok(None);
    };

    client.archive(&channel.id).await?;
    tracing::info!(channel = name, id = %channel.id, "channel archived");
    Ok(Some(channel))
}
