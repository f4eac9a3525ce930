//! Human-readable account of a merge decision.
//!
//! Answers "why was this allowed/denied?" for a single `(route, domain,
//! action)`: which record decided, where it came from, and which records for
//! the same key were shadowed by it.

use serde::Serialize;

use crate::action::Action;
use crate::merge::{self, EffectivePermission, PermissionSource};
use crate::permissions::normalize_route;
use crate::subject::SubjectPermissions;

#[derive(Debug, Clone, Serialize)]
pub struct MergeExplanation {
    pub route: String,
    pub domain: String,
    pub action: Action,
    pub granted: bool,
    pub reason: String,
    /// The first record for the key, if any.
    pub decided_by: Option<EffectivePermission>,
    /// Later records for the same key, discarded by deduplication.
    pub shadowed: Vec<EffectivePermission>,
    /// Inactive groups that hold a record for the key.
    pub inactive_groups: Vec<String>,
}

pub fn explain(
    subject: Option<&SubjectPermissions>,
    route: &str,
    domain: &str,
    action: Action,
) -> MergeExplanation {
    let route = normalize_route(route);
    let mut explanation = MergeExplanation {
        route: route.clone(),
        domain: domain.to_string(),
        action,
        granted: false,
        reason: String::new(),
        decided_by: None,
        shadowed: Vec::new(),
        inactive_groups: Vec::new(),
    };

    let Some(subject) = subject else {
        explanation.reason = "subject not found; no permissions apply".to_string();
        return explanation;
    };

    if let Err(e) = merge::deduplicate(subject) {
        explanation.reason = format!("permissions could not be evaluated ({e}); denied");
        return explanation;
    }

    let mut candidates = merge::concatenate(subject)
        .into_iter()
        .filter(|(_, record)| record.matches(&route, domain))
        .map(|(source, record)| EffectivePermission {
            record: record.clone(),
            source: source.into_source(),
        });

    explanation.decided_by = candidates.next();
    explanation.shadowed = candidates.collect();
    explanation.inactive_groups = subject
        .groups
        .iter()
        .filter(|g| !g.active && g.permissions.iter().any(|p| p.matches(&route, domain)))
        .map(|g| g.name.clone())
        .collect();

    let key = format!("{route}@{domain}");
    let (granted, reason) = match &explanation.decided_by {
        None => (false, format!("no active source grants any permission for {key}")),
        Some(decided) if !decided.record.active => {
            (false, format!("{} for {key} is inactive", decided.source))
        }
        Some(decided) if !decided.record.actions.allows(action) => {
            (false, format!("{} for {key} does not set {action}", decided.source))
        }
        Some(decided) => (true, format!("{} for {key} sets {action}", decided.source)),
    };
    explanation.granted = granted;
    explanation.reason = reason;

    explanation
}

impl MergeExplanation {
    /// True when an individual record decided against a group that would have
    /// granted.
    pub fn is_personal_override(&self) -> bool {
        let decided_by_individual = matches!(
            self.decided_by.as_ref().map(|d| &d.source),
            Some(PermissionSource::Individual)
        );
        decided_by_individual
            && !self.granted
            && self.shadowed.iter().any(|s| s.record.permits(self.action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionFlags;
    use crate::permissions::PermissionRecord;
    use crate::subject::GroupGrant;

    fn perm(route: &str) -> PermissionRecord {
        PermissionRecord::new(route, "localhost")
    }

    #[test]
    fn explains_group_grant() {
        let subject = SubjectPermissions::new(
            vec![],
            vec![GroupGrant::new("Administradores", vec![perm("produtos").with_actions(ActionFlags::ALL)])],
        );
        let e = explain(Some(&subject), "Produtos", "localhost", Action::Read);
        assert!(e.granted);
        assert_eq!(e.route, "produtos");
        assert_eq!(
            e.decided_by.unwrap().source,
            PermissionSource::Group("Administradores".to_string())
        );
        assert!(e.reason.contains("group 'Administradores'"));
    }

    #[test]
    fn explains_personal_override() {
        let subject = SubjectPermissions::new(
            vec![perm("produtos").grant(Action::Create)],
            vec![GroupGrant::new("G", vec![perm("produtos").grant(Action::Read)])],
        );
        let e = explain(Some(&subject), "produtos", "localhost", Action::Read);
        assert!(!e.granted);
        assert_eq!(e.shadowed.len(), 1);
        assert!(e.is_personal_override());
        assert!(e.reason.contains("does not set canRead"));
    }

    #[test]
    fn reports_inactive_groups_holding_the_key() {
        let subject = SubjectPermissions::new(
            vec![],
            vec![GroupGrant::new("Off", vec![perm("logs").grant(Action::Read)]).with_active(false)],
        );
        let e = explain(Some(&subject), "logs", "localhost", Action::Read);
        assert!(!e.granted);
        assert!(e.decided_by.is_none());
        assert_eq!(e.inactive_groups, vec!["Off".to_string()]);
    }

    #[test]
    fn agrees_with_merge_engine() {
        let subject = SubjectPermissions::new(
            vec![perm("a").with_active(false).grant(Action::Read)],
            vec![
                GroupGrant::new("G1", vec![perm("a").grant(Action::Read), perm("b").grant(Action::Delete)]),
                GroupGrant::new("G2", vec![perm("b").grant(Action::Read)]),
            ],
        );
        for route in ["a", "b", "c"] {
            for action in Action::ALL {
                assert_eq!(
                    explain(Some(&subject), route, "localhost", action).granted,
                    merge::has_permission(Some(&subject), route, "localhost", action),
                    "route {route} action {action}"
                );
            }
        }
    }

    #[test]
    fn unknown_subject_is_denied() {
        let e = explain(None, "produtos", "localhost", Action::Read);
        assert!(!e.granted);
        assert!(e.reason.contains("subject not found"));
    }
}
