//! Deterministic per-slot ordering of task instances.
//!
//! Within a slot, completed work sorts first (re-ranked by actual start
//! time, so drag history never reorders the past), then running, then idle.
//! Explicit order numbers decide ties; gaps of 100 leave room for midpoint
//! insertion, and a slot whose gap closes is renumbered before inserting.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::instance::{InstanceState, TaskInstance};
use crate::slot::{parse_hhmm, SlotKey};

/// Spacing between auto-assigned order numbers
pub const ORDER_STEP: i64 = 100;

/// Comparator for two instances within the same slot.
///
/// Priority: lifecycle state, then explicit order (a present order beats an
/// absent one), then start time for completed pairs, then scheduled time
/// with missing times last.
pub fn compare(a: &TaskInstance, b: &TaskInstance) -> Ordering {
    let by_state = a.state.rank().cmp(&b.state.rank());
    if by_state != Ordering::Equal {
        return by_state;
    }

    match (a.order, b.order) {
        (Some(left), Some(right)) => return left.cmp(&right),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }

    if a.state == InstanceState::Done && b.state == InstanceState::Done {
        return a.start_time.cmp(&b.start_time);
    }

    compare_scheduled(a.scheduled_time(), b.scheduled_time())
}

fn compare_scheduled(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a.and_then(parse_hhmm), b.and_then(parse_hhmm)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort a day's instances: slots in day order, `none` last, comparator
/// within each slot.
pub fn sort_instances(instances: &mut [TaskInstance]) {
    instances.sort_by(|a, b| a.slot.rank().cmp(&b.slot.rank()).then_with(|| compare(a, b)));
}

/// Assign order numbers, run whenever instances are (re)computed.
///
/// Done instances are always re-ranked by start time (rank × 100). Running
/// and idle instances keep any existing order; a running instance without
/// one is placed right after the done block, new idle instances continue
/// after the highest order already in the slot, in scheduled-time order.
pub fn assign_orders(instances: &mut [TaskInstance]) {
    let mut slots: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, instance) in instances.iter().enumerate() {
        slots.entry(instance.slot.rank()).or_default().push(index);
    }

    for indices in slots.values() {
        let mut done: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|i| instances[*i].state == InstanceState::Done)
            .collect();
        done.sort_by(|a, b| instances[*a].start_time.cmp(&instances[*b].start_time));
        for (rank, index) in done.iter().enumerate() {
            instances[*index].order = Some((rank as i64 + 1) * ORDER_STEP);
        }

        // Running without a saved order goes directly after the done block
        let mut next = done
            .iter()
            .filter_map(|i| instances[*i].order)
            .max()
            .unwrap_or(0);
        let unordered_running: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|i| {
                instances[*i].state == InstanceState::Running && instances[*i].order.is_none()
            })
            .collect();
        for index in unordered_running {
            next += ORDER_STEP;
            instances[index].order = Some(next);
        }

        // New idle continues after the slot's overall maximum
        let mut next = indices
            .iter()
            .filter_map(|i| instances[*i].order)
            .max()
            .unwrap_or(0);

        let mut unordered_idle: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|i| {
                instances[*i].state == InstanceState::Idle && instances[*i].order.is_none()
            })
            .collect();
        unordered_idle.sort_by(|a, b| {
            compare_scheduled(instances[*a].scheduled_time(), instances[*b].scheduled_time())
        });
        for index in unordered_idle {
            next += ORDER_STEP;
            instances[index].order = Some(next);
        }
    }
}

/// Order number for inserting an instance directly after `after_id` within
/// its slot: the midpoint of the neighboring orders, or last + 100 at the
/// end. When the gap cannot be bisected the whole slot is renumbered to
/// multiples of 100 first (mutating the given instances), then recomputed.
pub fn order_for_insert_after(
    instances: &mut [TaskInstance],
    slot: SlotKey,
    after_id: &str,
) -> Result<i64> {
    if try_midpoint(instances, slot, after_id)?.is_none() {
        renumber_slot(instances, slot);
    }
    try_midpoint(instances, slot, after_id)?
        .ok_or_else(|| Error::OperationFailed("slot renumbering did not open a gap".into()))
}

/// Midpoint after `after_id`, or None when the neighboring gap is too small
fn try_midpoint(
    instances: &mut [TaskInstance],
    slot: SlotKey,
    after_id: &str,
) -> Result<Option<i64>> {
    let mut slot_orders: Vec<(String, i64)> = instances
        .iter()
        .filter(|i| i.slot == slot)
        .filter_map(|i| {
            match (&i.instance_id, i.order) {
                (Some(id), Some(order)) => Some((id.clone(), order)),
                _ => None,
            }
        })
        .collect();
    slot_orders.sort_by_key(|(_, order)| *order);

    let position = slot_orders
        .iter()
        .position(|(id, _)| id == after_id)
        .ok_or_else(|| Error::InstanceNotFound(after_id.to_string()))?;

    let after = slot_orders[position].1;
    match slot_orders.get(position + 1) {
        None => Ok(Some(after + ORDER_STEP)),
        Some((_, next)) if next - after > 1 => Ok(Some(after + (next - after) / 2)),
        Some(_) => Ok(None),
    }
}

/// Renumber every ordered instance in a slot to multiples of 100,
/// preserving the current relative order.
pub fn renumber_slot(instances: &mut [TaskInstance], slot: SlotKey) {
    let mut indices: Vec<usize> = (0..instances.len())
        .filter(|i| instances[*i].slot == slot && instances[*i].order.is_some())
        .collect();
    indices.sort_by(|a, b| compare(&instances[*a], &instances[*b]));
    for (rank, index) in indices.iter().enumerate() {
        instances[*index].order = Some((rank as i64 + 1) * ORDER_STEP);
    }
}
