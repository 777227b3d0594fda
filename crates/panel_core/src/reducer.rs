//! Pure state transitions: `(Model, Action) -> (Model, Effects)`.
//!
//! The input model is never modified. A contract violation returns an error
//! and the caller keeps its current model.

use std::collections::HashSet;

use shared::domain::{
    normalize_group, CaptureSettings, PageKey, ScreenItem, TabId, CAPTURE_QUALITY_RANGE,
    CAPTURE_SCALE_RANGE,
};

use crate::{
    action::{Action, SelectionChange},
    effect::{Effect, Notice, PersistMode},
    error::ReduceError,
    model::{ConnectionStatus, Model},
    ordering::{apply_reorder, normalize_labels, stage_regroup},
};

pub type Transition = (Model, Vec<Effect>);

pub fn update(model: &Model, action: Action) -> Result<Transition, ReduceError> {
    let mut next = model.clone();

    let effects = match action {
        Action::Init => return Ok((Model::default(), Vec::new())),

        Action::Connected { tab_id, page_key } => {
            next.tab_id = Some(tab_id);
            next.page_key = Some(page_key);
            Vec::new()
        }

        Action::SetStatus(status) => {
            next.status = status;
            if status != ConnectionStatus::Connected {
                next.items.clear();
                next.missing_ids.clear();
            }
            Vec::new()
        }

        Action::RestoreState { items, defaults } => {
            next.items = items;
            next.defaults = defaults;
            next.missing_ids.clear();
            let present: HashSet<_> = next.items.iter().map(|item| item.id).collect();
            next.select_items.retain(|id| present.contains(id));
            vec![Effect::RenderContent(next.items.clone())]
        }

        Action::ToggleSelect => {
            next.selection_enabled = !next.selection_enabled;
            vec![Effect::ToggleSelectOnPage(next.selection_enabled)]
        }

        Action::SetBadgeSize(size) => {
            next.defaults.size = size;
            for item in selected_items_mut(&mut next) {
                item.size = size;
            }
            persist_and_render(&next)
        }

        Action::SetBadgeColor(color) => {
            next.defaults.color = color.clone();
            for item in selected_items_mut(&mut next) {
                item.color = color.clone();
            }
            persist_and_render(&next)
        }

        Action::SetBadgeShape(shape) => {
            next.defaults.shape = shape;
            for item in selected_items_mut(&mut next) {
                item.shape = shape;
            }
            persist_and_render(&next)
        }

        Action::SetBadgePosition(position) => {
            next.defaults.position = position;
            for item in selected_items_mut(&mut next) {
                item.position = position;
            }
            persist_and_render(&next)
        }

        Action::BadgeDelete => {
            // select_items keeps the deleted ids; callers reconcile it
            let selected = next.select_items.clone();
            next.items.retain(|item| !selected.contains(&item.id));
            next.missing_ids.retain(|id| !selected.contains(id));
            normalize_labels(&mut next.items);
            persist_and_render(&next)
        }

        Action::BadgeClear => {
            next.items.clear();
            next.select_items.clear();
            next.missing_ids.clear();
            match bound_page(&next) {
                Some(page_key) => vec![
                    Effect::Persist {
                        page_key,
                        items: Vec::new(),
                        defaults: next.defaults.clone(),
                        mode: PersistMode::ResetCounter,
                    },
                    Effect::ClearContent,
                ],
                None => Vec::new(),
            }
        }

        Action::ReorderItems {
            from_id,
            from_index,
            to_index,
        } => {
            apply_reorder(&mut next.items, from_id, from_index, to_index)?;
            normalize_labels(&mut next.items);
            persist_and_render(&next)
        }

        Action::SetGroup(group) => {
            let target = normalize_group(Some(&group));
            stage_regroup(&mut next.items, &next.select_items, target.as_deref());
            normalize_labels(&mut next.items);
            next.defaults.group = target;
            persist_and_render(&next)
        }

        Action::ItemSelectionChanged(change) => {
            apply_selection_change(&mut next, change);
            Vec::new()
        }

        Action::ItemsPicked(items) => {
            let mut added = 0;
            for mut item in items {
                if next.item(item.id).is_some() {
                    continue;
                }
                item.group = normalize_group(item.group.as_deref());
                let group_len = next
                    .items
                    .iter()
                    .filter(|existing| existing.group_key() == item.group_key())
                    .count();
                item.label = (group_len + 1) as f64;
                next.items.push(item);
                added += 1;
            }
            if added == 0 {
                Vec::new()
            } else {
                normalize_labels(&mut next.items);
                persist_and_render(&next)
            }
        }

        Action::SetComment { id, comment } => {
            match next.items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    let comment = comment.trim();
                    item.comment = (!comment.is_empty()).then(|| comment.to_string());
                    persist_and_render(&next)
                }
                None => Vec::new(),
            }
        }

        Action::MissingIdsReported(ids) => {
            next.missing_ids = ids
                .into_iter()
                .filter(|id| model.item(*id).is_some())
                .collect();
            Vec::new()
        }

        Action::HoverItem(id) => vec![Effect::HoverContent(id)],

        Action::CaptureRequested => match bound_tab(&next) {
            None => vec![Effect::Notify(Notice::error(
                "No page is connected; nothing to capture.",
            ))],
            Some(_) if next.capture.in_flight => Vec::new(),
            Some(tab_id) => {
                next.capture.in_flight = true;
                vec![Effect::Capture {
                    tab_id,
                    settings: next.capture.settings,
                }]
            }
        },

        Action::CaptureSucceeded { download_id } => {
            next.capture.in_flight = false;
            vec![Effect::Notify(Notice::info(format!(
                "Screenshot saved (download {download_id})."
            )))]
        }

        Action::CaptureFailed { error } => {
            next.capture.in_flight = false;
            vec![Effect::Notify(Notice::error(format!(
                "Screenshot failed: {error}"
            )))]
        }

        Action::SetCaptureFormat(format) => {
            next.capture.settings.format = format;
            Vec::new()
        }

        Action::SetCaptureArea(area) => {
            next.capture.settings.area = area;
            Vec::new()
        }

        Action::SetCaptureQuality(quality) => {
            let (min, max) = CAPTURE_QUALITY_RANGE;
            next.capture.settings.quality = quality.clamp(min, max);
            Vec::new()
        }

        Action::SetCaptureScale(scale) => {
            let (min, max) = CAPTURE_SCALE_RANGE;
            next.capture.settings.scale = if scale.is_finite() {
                scale.clamp(min, max)
            } else {
                CaptureSettings::default().scale
            };
            Vec::new()
        }

        Action::ToggleCapturePanel => {
            next.capture.settings.expanded = !next.capture.settings.expanded;
            Vec::new()
        }

        Action::PortDisconnected => {
            next.status = ConnectionStatus::Disconnected;
            next.selection_enabled = false;
            next.items.clear();
            next.missing_ids.clear();
            vec![Effect::ToggleSelectOnPage(false)]
        }
    };

    Ok((next, effects))
}

fn selected_items_mut(model: &mut Model) -> impl Iterator<Item = &mut ScreenItem> {
    let selected = &model.select_items;
    model
        .items
        .iter_mut()
        .filter(move |item| selected.contains(&item.id))
}

/// The page the model may write to. Items of a model that is not connected
/// were cleared on the way out and must never reach storage.
fn bound_page(model: &Model) -> Option<PageKey> {
    match model.status {
        ConnectionStatus::Connected => model.page_key.clone(),
        _ => None,
    }
}

fn bound_tab(model: &Model) -> Option<TabId> {
    match model.status {
        ConnectionStatus::Connected => model.tab_id,
        _ => None,
    }
}

fn persist_and_render(model: &Model) -> Vec<Effect> {
    match bound_page(model) {
        Some(page_key) => vec![
            Effect::Persist {
                page_key,
                items: model.items.clone(),
                defaults: model.defaults.clone(),
                mode: PersistMode::Merge,
            },
            Effect::RenderContent(model.items.clone()),
        ],
        None => Vec::new(),
    }
}

fn apply_selection_change(model: &mut Model, change: SelectionChange) {
    match change {
        SelectionChange::Item(id) => {
            if !model.select_items.remove(&id) {
                model.select_items.insert(id);
            }
        }
        SelectionChange::Group(group) => {
            let group = normalize_group(group.as_deref());
            let members: Vec<_> = model
                .items
                .iter()
                .filter(|item| item.group_key() == group.as_deref())
                .map(|item| item.id)
                .collect();
            let all_selected = members.iter().all(|id| model.select_items.contains(id));
            for id in members {
                if all_selected {
                    model.select_items.remove(&id);
                } else {
                    model.select_items.insert(id);
                }
            }
        }
        SelectionChange::All(true) => {
            model.select_items = model.items.iter().map(|item| item.id).collect();
        }
        SelectionChange::All(false) => model.select_items.clear(),
    }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
