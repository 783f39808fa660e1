//! Attribute database
//!
//! Groupings are kept sorted by start handle in a flat vector, which keeps
//! the range queries simple `partition_point` walks. The database itself is
//! not aware of locking; callers share it behind `Arc<RwLock<Database>>` and
//! must not re-enter it from attribute handlers.
use super::attribute::{Attribute, AttributeGrouping};
use super::constants::*;
use super::error::AttErrorCode;
use super::pdu::Handle;
use crate::uuid::Uuid;
use log::debug;

/// One entry of a Read By Group Type result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupingInfo {
    pub start_handle: Handle,
    pub end_handle: Handle,
    pub decl_value: Vec<u8>,
}

/// One entry of a Read By Type result. `value` is `None` for an attribute
/// with a dynamic value; such an entry is always the only result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeResult {
    pub handle: Handle,
    pub value: Option<Vec<u8>>,
}

/// Attribute database covering a fixed handle range.
pub struct Database {
    range_start: Handle,
    range_end: Handle,
    groupings: Vec<AttributeGrouping>,
}

impl Database {
    pub fn new(range_start: Handle, range_end: Handle) -> Self {
        debug_assert!(range_start < range_end);
        debug_assert!(range_start >= ATT_HANDLE_MIN);

        Self {
            range_start,
            range_end,
            groupings: Vec::new(),
        }
    }

    /// Allocates handles for a new grouping that will span `attr_count + 1`
    /// handles (declaration included). The earliest gap that fits wins:
    /// start of the range, before the first grouping, after the last one,
    /// then the first interior gap. Returns `None` when the database has no
    /// room.
    ///
    /// The returned grouping is incomplete and inactive; populate it with
    /// [`AttributeGrouping::add_attribute`] and activate it when done.
    pub fn new_grouping(
        &mut self,
        group_type: Uuid,
        attr_count: usize,
        decl_value: &[u8],
    ) -> Option<&mut AttributeGrouping> {
        let (start_handle, insert_index) = if self.groupings.is_empty() {
            if ((self.range_end - self.range_start) as usize) < attr_count {
                return None;
            }
            (self.range_start, 0)
        } else if ((self.groupings[0].start_handle() - self.range_start) as usize) > attr_count {
            // Room at the head of the list.
            (self.range_start, 0)
        } else if ((self.range_end - self.groupings.last().unwrap().end_handle()) as usize)
            > attr_count
        {
            // Room at the tail end of the list.
            (
                self.groupings.last().unwrap().end_handle() + 1,
                self.groupings.len(),
            )
        } else {
            // Linearly search for a gap that fits the new grouping.
            let mut insert_at = None;
            for i in 1..self.groupings.len() {
                let gap = (self.groupings[i].start_handle()
                    - self.groupings[i - 1].end_handle()
                    - 1) as usize;
                if attr_count < gap {
                    insert_at = Some(i);
                    break;
                }
            }

            match insert_at {
                Some(i) => (self.groupings[i - 1].end_handle() + 1, i),
                None => {
                    debug!("att: attribute database is out of space");
                    return None;
                }
            }
        };

        self.groupings.insert(
            insert_index,
            AttributeGrouping::new(group_type, start_handle, attr_count, decl_value),
        );
        Some(&mut self.groupings[insert_index])
    }

    /// Removes the grouping that starts at exactly `start_handle`. Inactive
    /// and incomplete groupings can be removed too.
    pub fn remove_grouping(&mut self, start_handle: Handle) -> bool {
        let index = self
            .groupings
            .partition_point(|g| g.start_handle() < start_handle);

        if index == self.groupings.len() || self.groupings[index].start_handle() != start_handle {
            return false;
        }

        self.groupings.remove(index);
        true
    }

    /// Looks up the attribute at `handle` within an active and complete
    /// grouping.
    pub fn attribute(&self, handle: Handle) -> Option<&Attribute> {
        let index = self
            .groupings
            .partition_point(|g| g.start_handle() <= handle);
        if index == 0 {
            return None;
        }

        let grouping = &self.groupings[index - 1];
        if handle > grouping.end_handle() || !grouping.active() || !grouping.complete() {
            return None;
        }

        grouping.attributes().get((handle - grouping.start_handle()) as usize)
    }

    /// Handles the Find Information procedure: all attributes in the range,
    /// batched while the compact UUID width stays uniform and the payload
    /// budget lasts.
    pub fn find_information(
        &self,
        start_handle: Handle,
        end_handle: Handle,
        max_payload_size: u16,
    ) -> Result<Vec<(Handle, Uuid)>, AttErrorCode> {
        if start_handle == ATT_HANDLE_INVALID || start_handle > end_handle {
            return Err(AttErrorCode::InvalidHandle);
        }

        let mut results = Vec::new();
        let mut budget = max_payload_size as usize;
        let mut uuid_size = 0;
        let mut entry_size = 0;
        let mut done = false;

        // First grouping that overlaps the requested range.
        let first = self
            .groupings
            .partition_point(|g| g.end_handle() < start_handle);

        for grouping in &self.groupings[first..] {
            if done || grouping.start_handle() > end_handle {
                break;
            }
            if !grouping.active() || !grouping.complete() {
                continue;
            }

            let search_start = grouping.start_handle().max(start_handle);
            let search_end = grouping.end_handle().min(end_handle);
            let index = (search_start - grouping.start_handle()) as usize;
            let end_index = (search_end - grouping.start_handle()) as usize;

            for attr in &grouping.attributes()[index..=end_index] {
                let compact_size = attr.attribute_type().compact_size(false);

                if results.is_empty() {
                    // The compact size of the first attribute type fixes the
                    // entry format.
                    uuid_size = compact_size;
                    entry_size = (uuid_size + 2).min(budget);
                } else if compact_size != uuid_size || entry_size > budget {
                    done = true;
                    break;
                }

                results.push((attr.handle(), *attr.attribute_type()));
                budget -= entry_size;
            }
        }

        if results.is_empty() {
            return Err(AttErrorCode::AttributeNotFound);
        }
        Ok(results)
    }

    /// Handles the Read By Group Type procedure for groupings of
    /// `group_type` whose start falls inside the range. The first match
    /// fixes the uniform value size.
    pub fn read_by_group_type(
        &self,
        start_handle: Handle,
        end_handle: Handle,
        group_type: &Uuid,
        max_payload_size: u16,
    ) -> Result<Vec<GroupingInfo>, AttErrorCode> {
        if start_handle == ATT_HANDLE_INVALID || start_handle > end_handle {
            return Err(AttErrorCode::InvalidHandle);
        }

        let mut results: Vec<GroupingInfo> = Vec::new();
        let mut budget = max_payload_size as usize;
        let mut value_size = 0;
        let mut entry_size = 0;

        // The group type and value always come from the grouping's first
        // handle, so only groupings starting inside the range match.
        let first = self
            .groupings
            .partition_point(|g| g.start_handle() < start_handle);

        for grouping in &self.groupings[first..] {
            if grouping.start_handle() > end_handle {
                break;
            }
            if !grouping.active() || !grouping.complete() {
                continue;
            }
            if grouping.group_type() != group_type {
                continue;
            }

            if results.is_empty() {
                value_size = grouping.decl_value().len();
                entry_size = value_size
                    .min(ATT_MAX_READ_BY_GROUP_TYPE_VALUE_LENGTH)
                    .saturating_add(4)
                    .min(budget);
            } else if grouping.decl_value().len() != value_size || entry_size > budget {
                // A different value size or an exhausted budget ends the
                // batch; the client asks again from the next handle.
                break;
            }

            results.push(GroupingInfo {
                start_handle: grouping.start_handle(),
                end_handle: grouping.end_handle(),
                decl_value: grouping.decl_value().to_vec(),
            });
            budget -= entry_size;
        }

        if results.is_empty() {
            return Err(AttErrorCode::AttributeNotFound);
        }
        Ok(results)
    }

    /// Handles the Read By Type procedure. Security is checked before the
    /// value: a non-readable match produces `ReadNotPermitted` when it would
    /// be the first result and otherwise just ends the batch. An attribute
    /// with a dynamic value is only returned alone.
    pub fn read_by_type(
        &self,
        start_handle: Handle,
        end_handle: Handle,
        attribute_type: &Uuid,
        max_payload_size: u16,
    ) -> Result<Vec<AttributeResult>, AttErrorCode> {
        if start_handle == ATT_HANDLE_INVALID || start_handle > end_handle {
            return Err(AttErrorCode::InvalidHandle);
        }

        let mut results: Vec<AttributeResult> = Vec::new();
        let mut budget = max_payload_size as usize;
        let mut value_size = 0;
        let mut entry_size = 0;
        let mut done = false;

        let first = self
            .groupings
            .partition_point(|g| g.end_handle() < start_handle);

        for grouping in &self.groupings[first..] {
            if done || grouping.start_handle() > end_handle {
                break;
            }
            if !grouping.active() || !grouping.complete() {
                continue;
            }

            let search_start = grouping.start_handle().max(start_handle);
            let search_end = grouping.end_handle().min(end_handle);
            let index = (search_start - grouping.start_handle()) as usize;
            let end_index = (search_end - grouping.start_handle()) as usize;

            for attr in &grouping.attributes()[index..=end_index] {
                if attr.attribute_type() != attribute_type {
                    continue;
                }

                if !attr.read_reqs().allowed_without_security() {
                    if results.is_empty() {
                        return Err(AttErrorCode::ReadNotPermitted);
                    }
                    done = true;
                    break;
                }

                if results.is_empty() {
                    match attr.value() {
                        Some(value) => {
                            value_size = value.len();
                            entry_size = value_size
                                .min(ATT_MAX_READ_BY_TYPE_VALUE_LENGTH)
                                .saturating_add(2)
                                .min(budget);
                        }
                        None => {
                            // A dynamic first match is the sole result.
                            done = true;
                        }
                    }
                } else {
                    let fits = match attr.value() {
                        Some(value) => value.len() == value_size && entry_size <= budget,
                        None => false,
                    };
                    if !fits {
                        done = true;
                        break;
                    }
                }

                results.push(AttributeResult {
                    handle: attr.handle(),
                    value: attr.value().map(|v| v.to_vec()),
                });
                budget -= entry_size;
            }
        }

        if results.is_empty() {
            return Err(AttErrorCode::AttributeNotFound);
        }
        Ok(results)
    }
}
