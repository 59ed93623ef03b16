//! Role types for workspace and project membership.
//!
//! The two hierarchies are separate types so a workspace role can never be
//! accepted where a project role is expected.

use std::str::FromStr;

/// Role within a workspace. Ordered Owner > Leader > Member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkspaceRole {
    Owner,
    Leader,
    Member,
}

/// Role within a project. Ordered Lead > Leader > Member > Viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProjectRole {
    Lead,
    Leader,
    Member,
    Viewer,
}

/// Error type for parsing a role from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError(pub String);

impl std::fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid role: {}", self.0)
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for WorkspaceRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(WorkspaceRole::Owner),
            "leader" => Ok(WorkspaceRole::Leader),
            "member" => Ok(WorkspaceRole::Member),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl WorkspaceRole {
    pub const ALL: [WorkspaceRole; 3] = [
        WorkspaceRole::Owner,
        WorkspaceRole::Leader,
        WorkspaceRole::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Leader => "leader",
            WorkspaceRole::Member => "member",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            WorkspaceRole::Owner => 2,
            WorkspaceRole::Leader => 1,
            WorkspaceRole::Member => 0,
        }
    }

    /// Check if this role has at least the privileges of another role
    pub fn includes(&self, other: &WorkspaceRole) -> bool {
        self.rank() >= other.rank()
    }

    /// Owners and leaders hold blanket authority over every project in the workspace.
    pub fn leads_projects(&self) -> bool {
        matches!(self, WorkspaceRole::Owner | WorkspaceRole::Leader)
    }
}

impl FromStr for ProjectRole {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(ProjectRole::Lead),
            "leader" => Ok(ProjectRole::Leader),
            "member" => Ok(ProjectRole::Member),
            "viewer" => Ok(ProjectRole::Viewer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 4] = [
        ProjectRole::Lead,
        ProjectRole::Leader,
        ProjectRole::Member,
        ProjectRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Lead => "lead",
            ProjectRole::Leader => "leader",
            ProjectRole::Member => "member",
            ProjectRole::Viewer => "viewer",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ProjectRole::Lead => 3,
            ProjectRole::Leader => 2,
            ProjectRole::Member => 1,
            ProjectRole::Viewer => 0,
        }
    }

    /// Check if this role has at least the privileges of another role
    pub fn includes(&self, other: &ProjectRole) -> bool {
        self.rank() >= other.rank()
    }

    /// The stronger of two roles.
    pub fn max(self, other: ProjectRole) -> ProjectRole {
        if self.includes(&other) {
            self
        } else {
            other
        }
    }
}
