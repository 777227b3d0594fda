//! Label maintenance for grouped, ordered badges.
//!
//! Labels are `f64` sort keys. Structural edits write fractional or
//! temporary labels and then [`normalize_labels`] compacts every group back
//! to `1..n`.

use std::collections::{BTreeMap, HashMap, HashSet};

use shared::domain::{normalize_group, ItemId, ScreenItem};

use crate::error::ReduceError;

/// Temporary labels for re-grouped items count down from here, above any
/// label a real group reaches.
pub const REGROUP_LABEL_BASE: f64 = 1.0e9;

pub fn relabel_sequential(items: &mut [ScreenItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.label = (index + 1) as f64;
    }
}

/// Groups items by trimmed group in first-seen order, sorts each group by
/// `(label, id)` and relabels it `1..n`. The collection is rebuilt group by
/// group.
pub fn normalize_labels(items: &mut Vec<ScreenItem>) {
    let mut order: Vec<Option<String>> = Vec::new();
    let mut groups: HashMap<Option<String>, Vec<ScreenItem>> = HashMap::new();
    for mut item in items.drain(..) {
        let key = item.group_key().map(str::to_string);
        item.group = key.clone();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(item);
    }

    for key in order {
        let mut members = groups.remove(&key).unwrap_or_default();
        members.sort_by(|a, b| a.label.total_cmp(&b.label).then(a.id.cmp(&b.id)));
        relabel_sequential(&mut members);
        items.extend(members);
    }
}

/// Moves one item inside its group by giving it a label that falls strictly
/// between its new neighbours. Leaves `items` untouched on error.
pub fn apply_reorder(
    items: &mut [ScreenItem],
    from_id: ItemId,
    from_index: usize,
    to_index: usize,
) -> Result<(), ReduceError> {
    let position = items
        .iter()
        .position(|item| item.id == from_id)
        .ok_or(ReduceError::ItemNotFound(from_id))?;

    let group = items[position].group_key().map(str::to_string);
    let group_len = items
        .iter()
        .filter(|item| item.group_key() == group.as_deref())
        .count();
    if to_index >= items.len() || to_index >= group_len {
        return Err(ReduceError::ReorderOutOfRange {
            to_index,
            collection_len: items.len(),
            group_len,
        });
    }

    items[position].label = if to_index < from_index {
        to_index as f64 + 0.1
    } else {
        to_index as f64 + 1.1
    };
    Ok(())
}

/// First phase of a re-group: selected items leaving their group get the
/// target group and strictly decreasing temporary labels, highest id first,
/// so they land after the destination's existing members once normalized.
pub fn stage_regroup(items: &mut [ScreenItem], selected: &HashSet<ItemId>, target: Option<&str>) {
    let target = normalize_group(target);
    let mut moving: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| selected.contains(&item.id) && item.group_key() != target.as_deref())
        .map(|(index, _)| index)
        .collect();
    moving.sort_by(|a, b| items[*b].id.cmp(&items[*a].id));

    for (offset, index) in moving.into_iter().enumerate() {
        let item = &mut items[index];
        item.label = REGROUP_LABEL_BASE - offset as f64;
        item.group = target.clone();
    }
}

/// One group as shown in the panel list.
#[derive(Debug, PartialEq)]
pub struct DisplayGroup<'a> {
    pub group: Option<&'a str>,
    pub items: Vec<&'a ScreenItem>,
}

/// Presentation order: ungrouped items first, then groups alphabetically,
/// items by `(label, id)` inside each group.
pub fn display_groups(items: &[ScreenItem]) -> Vec<DisplayGroup<'_>> {
    let mut groups: BTreeMap<Option<&str>, Vec<&ScreenItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.group_key()).or_default().push(item);
    }
    groups
        .into_iter()
        .map(|(group, mut members)| {
            members.sort_by(|a, b| a.label.total_cmp(&b.label).then(a.id.cmp(&b.id)));
            DisplayGroup {
                group,
                items: members,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/ordering_tests.rs"]
mod tests;
