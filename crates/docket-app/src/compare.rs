//! Docket-id overlap between two snapshots.

use std::collections::BTreeSet;

use crate::scrape::types::ResultRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdComparison {
    pub common: BTreeSet<String>,
    pub only_a: BTreeSet<String>,
    pub only_b: BTreeSet<String>,
}

/// Compares ids by their first whitespace-delimited token, so
/// `16-5909 *** CAPITAL CASE ***` and `16-5909` are the same case.
pub fn compare_ids(a: &[ResultRecord], b: &[ResultRecord]) -> IdComparison {
    let a = id_set(a);
    let b = id_set(b);
    IdComparison {
        common: a.intersection(&b).cloned().collect(),
        only_a: a.difference(&b).cloned().collect(),
        only_b: b.difference(&a).cloned().collect(),
    }
}

fn id_set(records: &[ResultRecord]) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|r| r.id.as_deref())
        .filter_map(|id| id.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ids(ids: &[Option<&str>]) -> Vec<ResultRecord> {
        ids.iter()
            .map(|id| ResultRecord {
                id: id.map(str::to_string),
                ..ResultRecord::default()
            })
            .collect()
    }

    #[test]
    fn partitions_by_first_token() {
        let a = with_ids(&[Some("16-5909 *** CAPITAL CASE ***"), Some("17-1"), None]);
        let b = with_ids(&[Some("16-5909"), Some("18-2"), Some("   ")]);
        let cmp = compare_ids(&a, &b);

        assert_eq!(cmp.common, BTreeSet::from(["16-5909".to_string()]));
        assert_eq!(cmp.only_a, BTreeSet::from(["17-1".to_string()]));
        assert_eq!(cmp.only_b, BTreeSet::from(["18-2".to_string()]));
    }
}
