//! Block Kit layout of the team report

use super::{TeamReport, TeamRow};
use crate::config::ReportConfig;
use crate::slack::Block;

/// Teams shown side by side in one section
const TEAMS_PER_SECTION: usize = 2;

fn team_field(row: &TeamRow) -> String {
    format!(
        "*{}*\n`{}` Items\n`{}` Incidents\n`{}` Special issues",
        row.team,
        row.items(),
        row.incidents,
        row.special
    )
}

/// Render `report` as Slack blocks
pub fn render(report: &TeamReport, config: &ReportConfig) -> Vec<Block> {
    let mut blocks = vec![Block::header(&config.title)];

    if let Some(link) = config.board_link.as_deref().filter(|l| !l.is_empty()) {
        blocks.push(Block::context(format!("<{link}|Open Jira>")));
    }

    blocks.push(Block::fields([
        format!("*Total upstream:* *{}*", report.total_upstream),
        format!("*Total downstream:* *{}*", report.total_downstream),
    ]));
    blocks.push(Block::Divider);

    let displayed: Vec<&TeamRow> = report.displayed().collect();
    for chunk in displayed.chunks(TEAMS_PER_SECTION) {
        blocks.push(Block::fields(chunk.iter().map(|row| team_field(row))));
    }

    let no_downstream = report.without_downstream();
    let no_special = report.without_special();
    if !no_downstream.is_empty() || !no_special.is_empty() {
        blocks.push(Block::Divider);
    }
    if !no_downstream.is_empty() {
        blocks.push(Block::text(format!(
            "*No downstream issues:*\n{}",
            no_downstream.join(", ")
        )));
    }
    if !no_special.is_empty() {
        blocks.push(Block::text(format!(
            "*No special issues:*\n{}",
            no_special.join(", ")
        )));
    }

    blocks
}
