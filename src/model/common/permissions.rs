use serde::{Deserialize, Serialize};

/// A single administrative capability.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Permission {
    ViewDashboard,
    CreateElections,
    ManageElections,
    ManageVoters,
    FinalizeResults,
    ViewReports,
    ManageAdmins,
}

impl Permission {
    /// Human-readable name, used in authorization failure messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ViewDashboard => "view dashboard",
            Self::CreateElections => "create elections",
            Self::ManageElections => "manage elections",
            Self::ManageVoters => "manage voters",
            Self::FinalizeResults => "finalize results",
            Self::ViewReports => "view reports",
            Self::ManageAdmins => "manage admins",
        }
    }
}

/// The fixed-shape permission record attached to every admin.
///
/// These are checked by the service layer on every mutating call; any check in
/// the frontend is a convenience, not a security boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Permissions {
    pub can_view_dashboard: bool,
    pub can_create_elections: bool,
    pub can_manage_elections: bool,
    pub can_manage_voters: bool,
    pub can_finalize_results: bool,
    pub can_view_reports: bool,
    pub can_manage_admins: bool,
}

impl Permissions {
    /// The default permission set for a freshly provisioned admin:
    /// read-only access.
    pub fn read_only() -> Self {
        Self {
            can_view_dashboard: true,
            can_view_reports: true,
            ..Self::none()
        }
    }

    /// Every capability granted; used for the bootstrap admin.
    pub fn all() -> Self {
        Self {
            can_view_dashboard: true,
            can_create_elections: true,
            can_manage_elections: true,
            can_manage_voters: true,
            can_finalize_results: true,
            can_view_reports: true,
            can_manage_admins: true,
        }
    }

    /// No capabilities at all.
    pub fn none() -> Self {
        Self {
            can_view_dashboard: false,
            can_create_elections: false,
            can_manage_elections: false,
            can_manage_voters: false,
            can_finalize_results: false,
            can_view_reports: false,
            can_manage_admins: false,
        }
    }

    /// Does this record grant the given capability?
    pub fn permits(&self, permission: Permission) -> bool {
        match permission {
            Permission::ViewDashboard => self.can_view_dashboard,
            Permission::CreateElections => self.can_create_elections,
            Permission::ManageElections => self.can_manage_elections,
            Permission::ManageVoters => self.can_manage_voters,
            Permission::FinalizeResults => self.can_finalize_results,
            Permission::ViewReports => self.can_view_reports,
            Permission::ManageAdmins => self.can_manage_admins,
        }
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::read_only()
    }
}
