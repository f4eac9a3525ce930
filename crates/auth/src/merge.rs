//! Permission merge engine.
//!
//! Effective permissions are built by concatenating the subject's individual
//! records and then the records of each *active* group in membership order,
//! and deduplicating by `(route, domain)` with the first occurrence kept.
//! Later entries for the same key are discarded, never OR-ed or AND-ed in,
//! so an individual record is the only way to override what a group grants.
//!
//! The public `has_permission*` functions never fail: any error while
//! merging collapses to `false`.

use std::collections::HashSet;

use serde::Serialize;

use stockroom_core::UserId;

use crate::action::Action;
use crate::error::MergeError;
use crate::permissions::{PermissionRecord, normalize_route};
use crate::subject::{SubjectDirectory, SubjectPermissions};

/// Where an effective record came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "group", rename_all = "snake_case")]
pub enum PermissionSource {
    Individual,
    Group(String),
}

impl core::fmt::Display for PermissionSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PermissionSource::Individual => f.write_str("individual permission"),
            PermissionSource::Group(name) => write!(f, "group '{name}'"),
        }
    }
}

/// A record that survived deduplication, tagged with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermission {
    #[serde(flatten)]
    pub record: PermissionRecord,
    pub source: PermissionSource,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum SourceRef<'a> {
    Individual,
    Group(&'a str),
}

impl SourceRef<'_> {
    pub(crate) fn into_source(self) -> PermissionSource {
        match self {
            SourceRef::Individual => PermissionSource::Individual,
            SourceRef::Group(name) => PermissionSource::Group(name.to_string()),
        }
    }
}

/// Step 1: individual records, then records of active groups in order.
pub(crate) fn concatenate(subject: &SubjectPermissions) -> Vec<(SourceRef<'_>, &PermissionRecord)> {
    let individual = subject
        .individual
        .iter()
        .map(|record| (SourceRef::Individual, record));

    let grouped = subject
        .groups
        .iter()
        .filter(|group| group.active)
        .flat_map(|group| {
            group
                .permissions
                .iter()
                .map(move |record| (SourceRef::Group(group.name.as_str()), record))
        });

    individual.chain(grouped).collect()
}

fn check_record(source: SourceRef<'_>, record: &PermissionRecord) -> Result<(), MergeError> {
    record.validate().map_err(|e| MergeError::MalformedRecord {
        source_label: source.into_source().to_string(),
        detail: e.to_string(),
    })
}

/// Steps 1-2: concatenate, then keep the first record for each key.
pub(crate) fn deduplicate(
    subject: &SubjectPermissions,
) -> Result<Vec<(SourceRef<'_>, &PermissionRecord)>, MergeError> {
    let concatenated = concatenate(subject);
    let mut seen: HashSet<(&str, &str)> = HashSet::with_capacity(concatenated.len());
    let mut unique = Vec::with_capacity(concatenated.len());

    for (source, record) in concatenated {
        check_record(source, record)?;
        if seen.insert((record.route.as_str(), record.domain.as_str())) {
            unique.push((source, record));
        }
    }

    Ok(unique)
}

/// The subject's effective permission set, in merge order.
pub fn effective_permissions(subject: &SubjectPermissions) -> Result<Vec<EffectivePermission>, MergeError> {
    Ok(deduplicate(subject)?
        .into_iter()
        .map(|(source, record)| EffectivePermission {
            record: record.clone(),
            source: source.into_source(),
        })
        .collect())
}

/// The effective record deciding `(route, domain)`, if any.
pub fn effective_for(
    subject: &SubjectPermissions,
    route: &str,
    domain: &str,
) -> Result<Option<EffectivePermission>, MergeError> {
    let route = normalize_route(route);
    Ok(deduplicate(subject)?
        .into_iter()
        .find(|(_, record)| record.matches(&route, domain))
        .map(|(source, record)| EffectivePermission {
            record: record.clone(),
            source: source.into_source(),
        }))
}

/// Steps 1-5 with failures reported.
///
/// An absent subject has no permissions.
pub fn try_has_permission(
    subject: Option<&SubjectPermissions>,
    route: &str,
    domain: &str,
    action: Action,
) -> Result<bool, MergeError> {
    let Some(subject) = subject else {
        return Ok(false);
    };

    let route = normalize_route(route);
    let granted = deduplicate(subject)?
        .into_iter()
        .any(|(_, record)| record.matches(&route, domain) && record.permits(action));

    Ok(granted)
}

/// Fail-closed merge decision.
pub fn has_permission(
    subject: Option<&SubjectPermissions>,
    route: &str,
    domain: &str,
    action: Action,
) -> bool {
    match try_has_permission(subject, route, domain, action) {
        Ok(granted) => granted,
        Err(e) => {
            tracing::error!(error = %e, route, domain, action = %action, "permission merge failed; denying");
            false
        }
    }
}

/// Load the subject through `directory` and evaluate, reporting failures.
pub fn try_subject_has_permission<D>(
    directory: &D,
    subject: &UserId,
    route: &str,
    domain: &str,
    action: Action,
) -> Result<bool, MergeError>
where
    D: SubjectDirectory + ?Sized,
{
    let loaded = directory.load_subject(subject)?;
    try_has_permission(loaded.as_ref(), route, domain, action)
}

/// Load the subject through `directory` and evaluate; never fails.
pub fn subject_has_permission<D>(
    directory: &D,
    subject: &UserId,
    route: &str,
    domain: &str,
    action: Action,
) -> bool
where
    D: SubjectDirectory + ?Sized,
{
    match try_subject_has_permission(directory, subject, route, domain, action) {
        Ok(granted) => granted,
        Err(e) => {
            tracing::error!(error = %e, subject = %subject, route, domain, action = %action, "permission merge failed; denying");
            false
        }
    }
}

/// A group record annotated with the group it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPermission {
    #[serde(flatten)]
    pub record: PermissionRecord,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipSummary {
    pub name: String,
    pub active: bool,
}

/// Individual, inherited and effective permissions side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionBreakdown {
    pub groups: Vec<MembershipSummary>,
    pub individual: Vec<PermissionRecord>,
    /// Records of active groups only.
    pub inherited: Vec<GroupPermission>,
    pub effective: Vec<EffectivePermission>,
}

pub fn breakdown(subject: &SubjectPermissions) -> Result<PermissionBreakdown, MergeError> {
    let inherited = subject
        .groups
        .iter()
        .filter(|g| g.active)
        .flat_map(|g| {
            g.permissions.iter().map(|record| GroupPermission {
                record: record.clone(),
                group: g.name.clone(),
            })
        })
        .collect();

    Ok(PermissionBreakdown {
        groups: subject
            .groups
            .iter()
            .map(|g| MembershipSummary {
                name: g.name.clone(),
                active: g.active,
            })
            .collect(),
        individual: subject.individual.clone(),
        inherited,
        effective: effective_permissions(subject)?,
    })
}
