//!
//! Version registry
//! ----------------
//! Pure accept/reject decision for a candidate `(xmlFormId, version)` pair
//! against the full history of definitions sharing that form id, including
//! soft-deleted rows. No I/O happens here; the storage layer evaluates the
//! decision while holding its write lock so two concurrent creations of the
//! same pair cannot both pass.

use crate::form::FormDefinition;

/// Outcome of a uniqueness check. A rejection names the conflicting fields
/// and their values, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance {
    Accept,
    Reject { fields: Vec<String>, values: Vec<String> },
}

/// Decide whether a candidate pair may be created given every existing
/// definition with the same `xmlFormId` (soft-deleted rows included).
///
/// A live definition with the identical pair rejects with `xmlFormId` alone.
/// A blank-version candidate additionally conflicts with any prior
/// blank-version definition even when that one was deleted, and that case
/// reports both `xmlFormId` and `version`. Blank values escape the storage
/// layer's unique constraint, so this branch is deliberate compensation at
/// the logic level; the asymmetry in the reported field sets is part of the
/// contract, not an oversight.
pub fn check(candidate_id: &str, candidate_version: &str, history: &[&FormDefinition]) -> Acceptance {
    let live_duplicate = history
        .iter()
        .any(|d| !d.is_deleted() && d.xml_form_id == candidate_id && d.version == candidate_version);
    if live_duplicate {
        return Acceptance::Reject {
            fields: vec!["xmlFormId".into()],
            values: vec![candidate_id.into()],
        };
    }

    if candidate_version.is_empty() {
        let blank_exists = history
            .iter()
            .any(|d| d.xml_form_id == candidate_id && d.version.is_empty());
        if blank_exists {
            return Acceptance::Reject {
                fields: vec!["xmlFormId".into(), "version".into()],
                values: vec![candidate_id.into(), String::new()],
            };
        }
    }

    Acceptance::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormState;
    use chrono::Utc;

    fn def(id: &str, version: &str, deleted: bool) -> FormDefinition {
        FormDefinition {
            id: 0,
            xml_form_id: id.into(),
            version: version.into(),
            name: id.into(),
            hash: String::new(),
            state: FormState::Open,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: if deleted { Some(Utc::now()) } else { None },
            xml: String::new(),
        }
    }

    #[test]
    fn fresh_pair_is_accepted() {
        let existing = def("simple", "1.0", false);
        assert_eq!(check("simple", "2.0", &[&existing]), Acceptance::Accept);
    }

    #[test]
    fn live_duplicate_rejects_with_form_id_only() {
        let existing = def("simple", "", false);
        assert_eq!(
            check("simple", "", &[&existing]),
            Acceptance::Reject {
                fields: vec!["xmlFormId".into()],
                values: vec!["simple".into()],
            }
        );
    }

    #[test]
    fn deleted_pair_is_reusable_when_version_is_set() {
        let existing = def("simple", "1.0", true);
        assert_eq!(check("simple", "1.0", &[&existing]), Acceptance::Accept);
    }

    #[test]
    fn deleted_blank_version_still_conflicts_and_names_both_fields() {
        let existing = def("simple", "", true);
        assert_eq!(
            check("simple", "", &[&existing]),
            Acceptance::Reject {
                fields: vec!["xmlFormId".into(), "version".into()],
                values: vec!["simple".into(), "".into()],
            }
        );
    }

    #[test]
    fn blank_candidate_ignores_nonblank_history() {
        let existing = def("simple", "1.0", true);
        assert_eq!(check("simple", "", &[&existing]), Acceptance::Accept);
    }
}
