//! Roles and the static permission table

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "superadmin")]
    SuperAdmin,
    Admin,
    Hr,
    Manager,
    Employee,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Hr,
        Role::Manager,
        Role::Employee,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    /// Role for the numeric access label stored on the user row.
    ///
    /// Unknown labels get the least privileged role.
    pub fn from_access_label(label: i16) -> Self {
        match label {
            1 => Role::SuperAdmin,
            2 => Role::Admin,
            3 => Role::Hr,
            4 => Role::Manager,
            _ => Role::Employee,
        }
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        permission.allowed_roles().contains(&self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseError {
                kind: "role",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Employees,
    Payroll,
    Attendance,
    Leave,
    Reports,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Process,
    Approve,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Employees => "employees",
            Resource::Payroll => "payroll",
            Resource::Attendance => "attendance",
            Resource::Leave => "leave",
            Resource::Reports => "reports",
            Resource::Settings => "settings",
        }
    }

    const ALL: [Resource; 7] = [
        Resource::Users,
        Resource::Employees,
        Resource::Payroll,
        Resource::Attendance,
        Resource::Leave,
        Resource::Reports,
        Resource::Settings,
    ];
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Process => "process",
            Action::Approve => "approve",
        }
    }

    const ALL: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Process,
        Action::Approve,
    ];
}

/// An action on a resource, written `resource:action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub resource: Resource,
    pub action: Action,
}

use Role::{Admin, Employee, Hr, Manager, SuperAdmin};

const EVERYONE: &[Role] = &[SuperAdmin, Admin, Hr, Manager, Employee];
const MANAGERS: &[Role] = &[SuperAdmin, Admin, Hr, Manager];
const HR: &[Role] = &[SuperAdmin, Admin, Hr];
const ADMINS: &[Role] = &[SuperAdmin, Admin];
const NOBODY: &[Role] = &[];

impl Permission {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }

    /// Roles granted this permission
    pub fn allowed_roles(self) -> &'static [Role] {
        use Action::*;
        use Resource::*;

        match (self.resource, self.action) {
            (Users, Create) => HR,
            (Users, Read) => MANAGERS,
            (Users, Update) => HR,
            (Users, Delete) => ADMINS,

            (Employees, Create) => HR,
            (Employees, Read) => EVERYONE,
            (Employees, Update) => MANAGERS,
            (Employees, Delete) => ADMINS,

            (Payroll, Create) => HR,
            (Payroll, Read) => MANAGERS,
            (Payroll, Update) => HR,
            (Payroll, Delete) => ADMINS,
            (Payroll, Process) => HR,

            (Attendance, Create) => EVERYONE,
            (Attendance, Read) => EVERYONE,
            (Attendance, Update) => MANAGERS,
            (Attendance, Delete) => HR,

            (Leave, Create) => EVERYONE,
            (Leave, Read) => EVERYONE,
            (Leave, Update) => MANAGERS,
            (Leave, Delete) => HR,
            (Leave, Approve) => MANAGERS,

            (Reports, Create) => MANAGERS,
            (Reports, Read) => EVERYONE,
            (Reports, Update) => MANAGERS,
            (Reports, Delete) => ADMINS,

            (Settings, Create) => ADMINS,
            (Settings, Read) => HR,
            (Settings, Update) => ADMINS,
            (Settings, Delete) => ADMINS,

            (Users | Employees | Attendance | Reports | Settings, Process)
            | (Users | Employees | Payroll | Attendance | Reports | Settings, Approve)
            | (Leave, Process) => NOBODY,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.action.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError {
            kind: "permission",
            value: s.to_string(),
        };
        let (resource, action) = s.split_once(':').ok_or_else(err)?;
        let resource = Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == resource)
            .ok_or_else(err)?;
        let action = Action::ALL
            .into_iter()
            .find(|a| a.as_str() == action)
            .ok_or_else(err)?;
        Ok(Permission::new(resource, action))
    }
}
