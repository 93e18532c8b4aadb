use tracing::debug;

use crate::conflict::{Conflict, ConflictCategory, Detection};
use crate::group::group_records;
use crate::record::RecordSet;

/// First non-empty conflict category, in priority order, or `Ready`.
///
/// Pure: later categories are not looked at while an earlier one has groups.
pub fn detect_next_conflict(records: &RecordSet) -> Detection {
    for category in ConflictCategory::PRIORITY {
        let groups = group_records(category, records);
        if !groups.is_empty() {
            debug!(%category, groups = groups.len(), "conflict detected");
            return Detection::Conflict(Conflict { category, groups });
        }
    }
    debug!(records = records.len(), "no conflicts");
    Detection::Ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::*;
    use crate::record::{InvoiceRecord, RecordId};
    use proptest::prelude::*;

    #[test]
    fn earlier_category_hides_later_ones() {
        let mut a = complete(1, "B12345674");
        a.contact_email = Some("a@x.com; b@x.com".to_string());
        let mut b = complete(2, "B12345674");
        b.iban_mismatch = true;
        b.city = None;

        match detect_next_conflict(&set(vec![a, b])) {
            Detection::Conflict(c) => {
                assert_eq!(c.category, ConflictCategory::AmbiguousContact);
                assert_eq!(c.groups.len(), 1);
            }
            Detection::Ready => panic!("expected a conflict"),
        }
    }

    #[test]
    fn clean_set_is_ready() {
        let records = set(vec![complete(1, "B12345674"), complete(2, "12345678Z")]);
        assert!(detect_next_conflict(&records).is_ready());
        assert!(detect_next_conflict(&RecordSet::default()).is_ready());
    }

    #[test]
    fn records_without_provider_do_not_raise_missing_fields() {
        let mut r = InvoiceRecord::new(RecordId(1));
        r.amount_cents = 100;
        assert!(detect_next_conflict(&set(vec![r])).is_ready());
    }

    proptest! {
        #[test]
        fn detection_is_idempotent(records in arb_records()) {
            prop_assert_eq!(detect_next_conflict(&records), detect_next_conflict(&records));
        }

        #[test]
        fn every_grouped_record_belongs_to_exactly_one_group(records in arb_records()) {
            if let Detection::Conflict(c) = detect_next_conflict(&records) {
                let mut ids: Vec<_> = c.groups.iter().flat_map(|g| g.record_ids.clone()).collect();
                let total = ids.len();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), total);
            }
        }
    }
}
