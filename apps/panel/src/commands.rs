//! Line commands accepted by `panel attach` on stdin.

use std::fmt::Write as _;

use anyhow::{anyhow, bail, Context, Result};
use panel_core::{ordering::display_groups, Action, Model, SelectionChange};
use serde::de::DeserializeOwned;
use shared::domain::{BadgeColor, ItemId};

pub const HELP: &str = "\
commands:
  select                      toggle element picking on the page
  pick <id>                   toggle selection of one badge
  toggle <group|->            toggle selection of a group ('-' = ungrouped)
  all | none                  select every badge / clear the selection
  size <small|medium|large>
  color <css-color>
  shape <circle|square|rounded>
  position <top-left|top-right|bottom-left|bottom-right>
  group <name>                move the selection into a group (blank = ungrouped)
  move <id> <from> <to>       reorder a badge inside its group
  comment <id> [text]         set or clear a badge comment
  hover <id|none>
  delete                      delete the selected badges
  clear                       delete every badge on the page
  capture                     take a screenshot
  format <png|jpeg|webp> | area <viewport|full-page>
  quality <1-100> | scale <0.25-4>
  status | reconnect | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    Dispatch(Action),
    Status,
    Reconnect,
    Help,
    Quit,
}

/// `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<PanelCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    let action = match word.to_ascii_lowercase().as_str() {
        "status" => return Ok(Some(PanelCommand::Status)),
        "reconnect" => return Ok(Some(PanelCommand::Reconnect)),
        "help" | "?" => return Ok(Some(PanelCommand::Help)),
        "quit" | "exit" => return Ok(Some(PanelCommand::Quit)),
        "select" => Action::ToggleSelect,
        "pick" => Action::ItemSelectionChanged(SelectionChange::Item(parse_id(rest)?)),
        "toggle" => {
            let group = match rest {
                "" => bail!("toggle needs a group name or '-'"),
                "-" => None,
                group => Some(group.to_string()),
            };
            Action::ItemSelectionChanged(SelectionChange::Group(group))
        }
        "all" => Action::ItemSelectionChanged(SelectionChange::All(true)),
        "none" => Action::ItemSelectionChanged(SelectionChange::All(false)),
        "size" => Action::SetBadgeSize(parse_keyword(rest)?),
        "color" => {
            if rest.is_empty() {
                bail!("color needs a value");
            }
            Action::SetBadgeColor(BadgeColor(rest.to_string()))
        }
        "shape" => Action::SetBadgeShape(parse_keyword(rest)?),
        "position" => Action::SetBadgePosition(parse_keyword(rest)?),
        "group" => Action::SetGroup(rest.to_string()),
        "move" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            let [id, from, to] = parts.as_slice() else {
                bail!("usage: move <id> <from> <to>");
            };
            Action::ReorderItems {
                from_id: parse_id(id)?,
                from_index: from.parse().context("invalid from index")?,
                to_index: to.parse().context("invalid to index")?,
            }
        }
        "comment" => {
            let (id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            Action::SetComment {
                id: parse_id(id)?,
                comment: text.to_string(),
            }
        }
        "hover" => match rest {
            "" | "none" => Action::HoverItem(None),
            id => Action::HoverItem(Some(parse_id(id)?)),
        },
        "delete" => Action::BadgeDelete,
        "clear" => Action::BadgeClear,
        "capture" => Action::CaptureRequested,
        "format" => Action::SetCaptureFormat(parse_keyword(rest)?),
        "area" => Action::SetCaptureArea(parse_keyword(rest)?),
        "quality" => Action::SetCaptureQuality(rest.parse().context("quality must be a whole number")?),
        "scale" => Action::SetCaptureScale(rest.parse().context("scale must be a number")?),
        other => bail!("unknown command '{other}' (try 'help')"),
    };
    Ok(Some(PanelCommand::Dispatch(action)))
}

fn parse_id(raw: &str) -> Result<ItemId> {
    raw.trim()
        .parse()
        .map(ItemId)
        .with_context(|| format!("invalid badge id '{raw}'"))
}

/// Parses a snake_case enum keyword; dashes are accepted for underscores.
fn parse_keyword<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let keyword = raw.trim().to_ascii_lowercase().replace('-', "_");
    if keyword.is_empty() {
        return Err(anyhow!("missing value"));
    }
    serde_json::from_value(serde_json::Value::String(keyword))
        .map_err(|_| anyhow!("unknown value '{raw}'"))
}

/// Human readable dump of the panel, grouped the way the panel lists them.
pub fn describe(model: &Model) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "status: {}  page: {}  picking: {}",
        model.status.as_str(),
        model
            .page_key
            .as_ref()
            .map(|key| key.as_str())
            .unwrap_or("-"),
        if model.selection_enabled { "on" } else { "off" },
    );
    for group in display_groups(&model.items) {
        let _ = writeln!(out, "[{}]", group.group.unwrap_or("ungrouped"));
        for item in group.items {
            let mut flags = String::new();
            if model.is_selected(item.id) {
                flags.push('*');
            }
            if model.missing_ids.contains(&item.id) {
                flags.push('?');
            }
            let _ = write!(
                out,
                "  {:>3} #{} {}{}",
                item.label, item.id, item.anchor.selector, flags
            );
            if let Some(comment) = &item.comment {
                let _ = write!(out, "  // {comment}");
            }
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
