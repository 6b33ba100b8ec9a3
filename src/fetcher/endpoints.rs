//! Resource endpoint catalog
//!
//! Each [`ResourceType`] has one const [`ResourceEndpoint`] describing its URL
//! templates and how incremental filters reach the server. Templates use
//! `{project_id}`, `{user_id}` and `{id}` placeholders.

use crate::fetcher::{FetcherError, FetcherResult};
use crate::ResourceType;

/// Whether a resource is listed globally, per project, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectScope {
    /// Only a global list exists
    Global,
    /// Listing requires a project id
    Project,
    /// Global list, or per project when an id is given
    Either,
}

/// How an `updated_after`-style bound is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incremental {
    /// Sent to the server as query parameters
    Server {
        /// Lower-bound parameter name
        after: &'static str,
        /// Upper-bound parameter name, when the endpoint has one
        before: Option<&'static str>,
    },
    /// Sent to the server as exclusive `YYYY-MM-DD` dates
    ServerDate {
        /// Lower-bound parameter name (strictly after)
        after: &'static str,
        /// Upper-bound parameter name (strictly before)
        before: &'static str,
    },
    /// The server cannot filter; compare this (dotted) raw field locally
    Client {
        /// Dotted path of the timestamp field in the raw payload
        field: &'static str,
    },
}

/// URL templates and filter support for one resource type
#[derive(Debug, Clone, Copy)]
pub struct ResourceEndpoint {
    /// Resource this entry describes
    pub resource: ResourceType,
    /// Listing scope
    pub scope: ProjectScope,
    /// Global list path
    pub global_list: Option<&'static str>,
    /// Project-scoped list path
    pub project_list: Option<&'static str>,
    /// Global item path
    pub global_item: Option<&'static str>,
    /// Project-scoped item path
    pub project_item: Option<&'static str>,
    /// Per-user list path
    pub user_list: Option<&'static str>,
    /// Incremental filter support
    pub incremental: Incremental,
    /// Server parameters bounding the creation date, when supported
    pub created_params: Option<(&'static str, &'static str)>,
    /// Query parameters always sent with list requests
    pub default_params: &'static [(&'static str, &'static str)],
}

/// Users: `/users`
pub const USERS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Users,
    scope: ProjectScope::Global,
    global_list: Some("/users"),
    project_list: None,
    global_item: Some("/users/{id}"),
    project_item: None,
    user_list: None,
    incremental: Incremental::Server {
        after: "created_after",
        before: Some("created_before"),
    },
    created_params: Some(("created_after", "created_before")),
    default_params: &[],
};

/// Groups: `/groups` or `/users/{user_id}/groups`; no server-side date filter
pub const GROUPS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Groups,
    scope: ProjectScope::Global,
    global_list: Some("/groups"),
    project_list: None,
    global_item: Some("/groups/{id}"),
    project_item: None,
    user_list: Some("/users/{user_id}/groups"),
    incremental: Incremental::Client { field: "created_at" },
    created_params: None,
    default_params: &[],
};

/// Projects: `/projects` or `/users/{user_id}/projects`
pub const PROJECTS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Projects,
    scope: ProjectScope::Global,
    global_list: Some("/projects"),
    project_list: None,
    global_item: Some("/projects/{id}"),
    project_item: None,
    user_list: Some("/users/{user_id}/projects"),
    incremental: Incremental::Server {
        after: "last_activity_after",
        before: Some("last_activity_before"),
    },
    created_params: None,
    default_params: &[],
};

/// Commits: `/projects/{project_id}/repository/commits`, with line stats
pub const COMMITS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Commits,
    scope: ProjectScope::Project,
    global_list: None,
    project_list: Some("/projects/{project_id}/repository/commits"),
    global_item: None,
    project_item: Some("/projects/{project_id}/repository/commits/{id}"),
    user_list: None,
    incremental: Incremental::Server {
        after: "since",
        before: Some("until"),
    },
    created_params: None,
    default_params: &[("with_stats", "true")],
};

/// Branches: `/projects/{project_id}/repository/branches`
pub const BRANCHES_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Branches,
    scope: ProjectScope::Project,
    global_list: None,
    project_list: Some("/projects/{project_id}/repository/branches"),
    global_item: None,
    project_item: Some("/projects/{project_id}/repository/branches/{id}"),
    user_list: None,
    incremental: Incremental::Client {
        field: "commit.committed_date",
    },
    created_params: None,
    default_params: &[],
};

/// Issues: `/issues` or `/projects/{project_id}/issues`
pub const ISSUES_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Issues,
    scope: ProjectScope::Either,
    global_list: Some("/issues"),
    project_list: Some("/projects/{project_id}/issues"),
    global_item: Some("/issues/{id}"),
    project_item: Some("/projects/{project_id}/issues/{id}"),
    user_list: None,
    incremental: Incremental::Server {
        after: "updated_after",
        before: Some("updated_before"),
    },
    created_params: Some(("created_after", "created_before")),
    default_params: &[("scope", "all")],
};

/// Merge requests: `/merge_requests` or `/projects/{project_id}/merge_requests`
pub const MERGE_REQUESTS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::MergeRequests,
    scope: ProjectScope::Either,
    global_list: Some("/merge_requests"),
    project_list: Some("/projects/{project_id}/merge_requests"),
    global_item: None,
    project_item: Some("/projects/{project_id}/merge_requests/{id}"),
    user_list: None,
    incremental: Incremental::Server {
        after: "updated_after",
        before: Some("updated_before"),
    },
    created_params: Some(("created_after", "created_before")),
    default_params: &[("scope", "all")],
};

/// Pipelines: `/projects/{project_id}/pipelines`
pub const PIPELINES_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Pipelines,
    scope: ProjectScope::Project,
    global_list: None,
    project_list: Some("/projects/{project_id}/pipelines"),
    global_item: None,
    project_item: Some("/projects/{project_id}/pipelines/{id}"),
    user_list: None,
    incremental: Incremental::Server {
        after: "updated_after",
        before: Some("updated_before"),
    },
    created_params: None,
    default_params: &[],
};

/// Project members: `/projects/{project_id}/members/all`
pub const PROJECT_MEMBERS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::ProjectMembers,
    scope: ProjectScope::Project,
    global_list: None,
    project_list: Some("/projects/{project_id}/members/all"),
    global_item: None,
    project_item: Some("/projects/{project_id}/members/all/{id}"),
    user_list: None,
    incremental: Incremental::Client { field: "created_at" },
    created_params: None,
    default_params: &[],
};

/// Events: `/events`, per project, or per user; no item endpoint
pub const EVENTS_ENDPOINT: ResourceEndpoint = ResourceEndpoint {
    resource: ResourceType::Events,
    scope: ProjectScope::Either,
    global_list: Some("/events"),
    project_list: Some("/projects/{project_id}/events"),
    global_item: None,
    project_item: None,
    user_list: Some("/users/{user_id}/events"),
    incremental: Incremental::ServerDate {
        after: "after",
        before: "before",
    },
    created_params: None,
    default_params: &[],
};

impl ResourceType {
    /// Endpoint catalog entry
    pub fn endpoint(&self) -> &'static ResourceEndpoint {
        match self {
            ResourceType::Users => &USERS_ENDPOINT,
            ResourceType::Groups => &GROUPS_ENDPOINT,
            ResourceType::Projects => &PROJECTS_ENDPOINT,
            ResourceType::Commits => &COMMITS_ENDPOINT,
            ResourceType::Branches => &BRANCHES_ENDPOINT,
            ResourceType::Issues => &ISSUES_ENDPOINT,
            ResourceType::MergeRequests => &MERGE_REQUESTS_ENDPOINT,
            ResourceType::Pipelines => &PIPELINES_ENDPOINT,
            ResourceType::ProjectMembers => &PROJECT_MEMBERS_ENDPOINT,
            ResourceType::Events => &EVENTS_ENDPOINT,
        }
    }

    /// Whether listing needs a project id
    pub fn requires_project(&self) -> bool {
        self.endpoint().scope == ProjectScope::Project
    }
}

impl ResourceEndpoint {
    /// List path for an optional project
    ///
    /// Global-only resources ignore the project id.
    pub fn list_path(&self, project_id: Option<&str>) -> FetcherResult<String> {
        match (project_id, self.project_list, self.global_list) {
            (Some(pid), Some(template), _) => Ok(fill(template, pid, None)),
            (_, _, Some(global)) => Ok(global.to_string()),
            (None, Some(_), None) => Err(self.missing_project()),
            (_, None, None) => Err(FetcherError::Configuration(format!(
                "{} has no list endpoint",
                self.resource
            ))),
        }
    }

    /// List path scoped to one user (`/users/{user_id}/...`)
    pub fn user_list_path(&self, user_id: &str) -> FetcherResult<String> {
        if user_id.trim().is_empty() {
            return Err(FetcherError::Configuration(format!(
                "{} user listing requires a user id",
                self.resource
            )));
        }
        self.user_list
            .map(|template| template.replace("{user_id}", &encode_path_segment(user_id)))
            .ok_or_else(|| {
                FetcherError::Configuration(format!("{} cannot be listed per user", self.resource))
            })
    }

    /// Item path for an id and optional project
    pub fn item_path(&self, id: &str, project_id: Option<&str>) -> FetcherResult<String> {
        if id.trim().is_empty() {
            return Err(FetcherError::Configuration(format!(
                "{} lookup requires an id",
                self.resource
            )));
        }
        match (project_id, self.project_item, self.global_item) {
            (Some(pid), Some(template), _) => Ok(fill(template, pid, Some(id))),
            (_, _, Some(template)) => Ok(fill(template, "", Some(id))),
            (None, Some(_), None) => Err(self.missing_project()),
            (_, None, None) => Err(FetcherError::Configuration(format!(
                "{} has no item endpoint",
                self.resource
            ))),
        }
    }

    fn missing_project(&self) -> FetcherError {
        FetcherError::Configuration(format!("{} requires a project id", self.resource))
    }
}

fn fill(template: &str, project_id: &str, id: Option<&str>) -> String {
    let path = template.replace("{project_id}", &encode_path_segment(project_id));
    match id {
        Some(id) => path.replace("{id}", &encode_path_segment(id)),
        None => path,
    }
}

/// Percent-encode one path segment (`group/project` becomes `group%2Fproject`)
pub fn encode_path_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
