//! Per-resource field tables
//!
//! Each schema lists the fields kept from a raw payload, where to find them
//! (a dotted path), how to convert them, and whether they are required.
//! Raw fields not listed are dropped.

use crate::{RawRecord, ResourceType};
use serde_json::Value;

/// Conversion rule for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer, null when absent
    Int,
    /// Integer that defaults to 0; accepts strings like `"1000+"`
    Count,
    /// Integer when numeric, text otherwise (project ids may be paths)
    Ident,
    /// Floating point, null when absent
    Float,
    /// Text; scalars are stringified
    Text,
    /// Boolean, defaults to false
    Bool,
    /// Timestamp, null when absent or unparseable
    Timestamp,
    /// Calendar date, null when absent or unparseable
    Date,
    /// List of scalars, defaults to empty
    TextList,
    /// List of objects reduced to one sub-field, defaults to empty
    PluckList(&'static str),
}

/// One field of a resource schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Normalized field name
    pub name: &'static str,
    /// Dotted path into the raw payload
    pub path: &'static str,
    /// Conversion rule
    pub kind: FieldKind,
    /// Whether a null value rejects the record
    pub required: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        path: name,
        kind,
        required: false,
    }
}

const fn nested(name: &'static str, path: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        path,
        kind,
        required: false,
    }
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        path: name,
        kind,
        required: true,
    }
}

use FieldKind::*;

/// User accounts
pub const USERS_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("username", Text),
    field("name", Text),
    field("email", Text),
    field("state", Text),
    field("is_admin", Bool),
    field("bot", Bool),
    field("external", Bool),
    field("created_at", Timestamp),
    field("last_activity_on", Date),
    field("last_sign_in_at", Timestamp),
    field("web_url", Text),
];

/// Groups
pub const GROUPS_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("name", Text),
    field("full_path", Text),
    field("description", Text),
    field("visibility", Text),
    field("parent_id", Int),
    field("created_at", Timestamp),
    field("web_url", Text),
];

/// Projects
pub const PROJECTS_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("name", Text),
    field("description", Text),
    field("path_with_namespace", Text),
    nested("namespace", "namespace.name", Text),
    field("visibility", Text),
    field("default_branch", Text),
    field("archived", Bool),
    field("created_at", Timestamp),
    field("last_activity_at", Timestamp),
    field("star_count", Count),
    field("forks_count", Count),
    field("open_issues_count", Count),
    field("topics", TextList),
    field("web_url", Text),
];

/// Commits
pub const COMMITS_SCHEMA: &[FieldSpec] = &[
    required("id", Text),
    field("short_id", Text),
    field("project_id", Ident),
    field("title", Text),
    field("message", Text),
    field("author_name", Text),
    field("author_email", Text),
    field("created_at", Timestamp),
    field("committed_date", Timestamp),
    nested("additions", "stats.additions", Count),
    nested("deletions", "stats.deletions", Count),
    field("web_url", Text),
];

/// Branches, keyed by project and name
pub const BRANCHES_SCHEMA: &[FieldSpec] = &[
    required("project_id", Ident),
    required("name", Text),
    nested("commit_id", "commit.id", Text),
    nested("committed_at", "commit.committed_date", Timestamp),
    field("merged", Bool),
    field("protected", Bool),
    field("default", Bool),
    field("web_url", Text),
];

/// Issues
pub const ISSUES_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("iid", Int),
    field("project_id", Ident),
    field("title", Text),
    field("state", Text),
    nested("author", "author.username", Text),
    nested("assignees", "assignees", PluckList("username")),
    field("labels", TextList),
    field("confidential", Bool),
    field("created_at", Timestamp),
    field("updated_at", Timestamp),
    field("closed_at", Timestamp),
    field("due_date", Date),
    field("web_url", Text),
];

/// Merge requests
pub const MERGE_REQUESTS_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("iid", Int),
    field("project_id", Ident),
    field("title", Text),
    field("state", Text),
    nested("author", "author.username", Text),
    field("source_branch", Text),
    field("target_branch", Text),
    field("user_notes_count", Count),
    field("changes_count", Count),
    field("created_at", Timestamp),
    field("updated_at", Timestamp),
    field("merged_at", Timestamp),
    field("closed_at", Timestamp),
    field("web_url", Text),
];

/// CI pipelines
pub const PIPELINES_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("project_id", Ident),
    field("status", Text),
    field("ref", Text),
    field("sha", Text),
    field("source", Text),
    nested("user", "user.username", Text),
    field("duration", Float),
    field("created_at", Timestamp),
    field("updated_at", Timestamp),
    field("started_at", Timestamp),
    field("finished_at", Timestamp),
    field("web_url", Text),
];

/// Project members, keyed by project and user id
pub const PROJECT_MEMBERS_SCHEMA: &[FieldSpec] = &[
    required("project_id", Ident),
    required("id", Int),
    field("username", Text),
    field("name", Text),
    field("state", Text),
    field("access_level", Int),
    field("expires_at", Date),
    field("created_at", Timestamp),
    field("web_url", Text),
];

/// Activity events
pub const EVENTS_SCHEMA: &[FieldSpec] = &[
    required("id", Int),
    field("project_id", Ident),
    field("action_name", Text),
    field("target_type", Text),
    field("target_id", Int),
    field("target_title", Text),
    field("author_id", Int),
    nested("author", "author.username", Text),
    nested("push_ref", "push_data.ref", Text),
    nested("push_commit_count", "push_data.commit_count", Count),
    field("created_at", Timestamp),
];

/// Field table for a resource
pub fn schema_for(resource: ResourceType) -> &'static [FieldSpec] {
    match resource {
        ResourceType::Users => USERS_SCHEMA,
        ResourceType::Groups => GROUPS_SCHEMA,
        ResourceType::Projects => PROJECTS_SCHEMA,
        ResourceType::Commits => COMMITS_SCHEMA,
        ResourceType::Branches => BRANCHES_SCHEMA,
        ResourceType::Issues => ISSUES_SCHEMA,
        ResourceType::MergeRequests => MERGE_REQUESTS_SCHEMA,
        ResourceType::Pipelines => PIPELINES_SCHEMA,
        ResourceType::ProjectMembers => PROJECT_MEMBERS_SCHEMA,
        ResourceType::Events => EVENTS_SCHEMA,
    }
}

/// Field names of a resource in schema order
pub fn field_names(resource: ResourceType) -> impl Iterator<Item = &'static str> {
    schema_for(resource).iter().map(|spec| spec.name)
}

/// Follow a dotted path through nested objects
///
/// Explicit JSON nulls read as absent.
pub fn lookup_path<'a>(raw: &'a RawRecord, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = raw.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}
