use std::collections::HashMap;

use crate::conflict::{ConflictCategory, ConflictGroup, GroupDetail, GroupKey};
use crate::record::{InvoiceRecord, RecordSet};

/// Partition the records affected by `category` into decision units.
///
/// Groups come out in order of first appearance in the record set and keep
/// their members in file order, so the same input always yields the same
/// groups. Groups without a single affected record are dropped.
pub fn group_records(category: ConflictCategory, records: &RecordSet) -> Vec<ConflictGroup> {
    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut buckets: Vec<(GroupKey, Vec<&InvoiceRecord>)> = Vec::new();

    for record in records.iter() {
        let Some(key) = category.classify(record) else {
            continue;
        };
        match index.get(&key) {
            Some(&i) => buckets[i].1.push(record),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![record]));
            }
        }
    }

    buckets
        .into_iter()
        .filter_map(|(key, members)| {
            let representative = members.iter().copied().find(|r| category.affects(r))?;
            Some(ConflictGroup {
                detail: GroupDetail::describe(category, representative, &members),
                representative: representative.id,
                record_ids: members.iter().map(|r| r.id).collect(),
                key,
            })
        })
        .collect()
}
