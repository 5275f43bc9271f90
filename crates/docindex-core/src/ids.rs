//! Record id assignment
//!
//! Records ingested as one batch share a group id and are addressed as
//! `{group_id}_{position}`. Ingesting the same group again produces the same
//! ids, so the new batch overwrites the old one position by position.

/// Id of the record at `position` within `group_id`
pub fn record_id(group_id: &str, position: usize) -> String {
    format!("{group_id}_{position}")
}

/// Ids for a batch of `count` records
pub fn assign_ids(group_id: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| record_id(group_id, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_ids_format() {
        assert_eq!(assign_ids("doc42", 3), vec!["doc42_0", "doc42_1", "doc42_2"]);
    }

    #[test]
    fn test_assign_ids_is_deterministic() {
        assert_eq!(assign_ids("report.pdf", 12), assign_ids("report.pdf", 12));
    }

    #[test]
    fn test_assign_ids_empty_batch() {
        assert!(assign_ids("doc42", 0).is_empty());
    }

    #[test]
    fn test_group_id_with_underscores() {
        let ids = assign_ids("user_7_file", 2);
        assert_eq!(ids, vec!["user_7_file_0", "user_7_file_1"]);
    }
}
