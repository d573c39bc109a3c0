use clap::ValueEnum;

use self::Department as D;
use self::Permission as P;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Role {
    Admin,
    Manager,
    SalesRep,
    WarehouseClerk,
    ProductionPlanner,
    Accountant,
    HrOfficer,
    Viewer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewRecords,
    CreateRecords,
    EditRecords,
    DeleteRecords,
    ExportData,
    ViewReports,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Department {
    Sales,
    Purchasing,
    Warehouse,
    Production,
    Finance,
    HumanResources,
    Administration,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ViewRecords,
        Permission::CreateRecords,
        Permission::EditRecords,
        Permission::DeleteRecords,
        Permission::ExportData,
        Permission::ViewReports,
        Permission::ManageUsers,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl Department {
    pub const ALL: [Department; 7] = [
        Department::Sales,
        Department::Purchasing,
        Department::Warehouse,
        Department::Production,
        Department::Finance,
        Department::HumanResources,
        Department::Administration,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Department::Sales => "Sales",
            Department::Purchasing => "Purchasing",
            Department::Warehouse => "Warehouse",
            Department::Production => "Production",
            Department::Finance => "Finance",
            Department::HumanResources => "Human Resources",
            Department::Administration => "Administration",
        }
    }
}

/// Constant bit set over a small closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepartmentSet(u16);

impl PermissionSet {
    const fn of(perms: &[Permission]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < perms.len() {
            bits |= perms[i].bit();
            i += 1;
        }
        PermissionSet(bits)
    }

    pub const fn contains(self, perm: Permission) -> bool {
        self.0 & perm.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl DepartmentSet {
    const fn of(deps: &[Department]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < deps.len() {
            bits |= deps[i].bit();
            i += 1;
        }
        DepartmentSet(bits)
    }

    pub const fn contains(self, dep: Department) -> bool {
        self.0 & dep.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Department> {
        Department::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

const ALL_PERMISSIONS: PermissionSet = PermissionSet::of(&Permission::ALL);
const ALL_DEPARTMENTS: DepartmentSet = DepartmentSet::of(&Department::ALL);
const READ_ONLY: PermissionSet = PermissionSet::of(&[P::ViewRecords]);
const CONTRIBUTOR: PermissionSet =
    PermissionSet::of(&[P::ViewRecords, P::CreateRecords, P::EditRecords]);

impl Role {
    pub const fn permissions(self) -> PermissionSet {
        match self {
            Role::Admin => ALL_PERMISSIONS,
            Role::Manager => PermissionSet::of(&[
                P::ViewRecords,
                P::CreateRecords,
                P::EditRecords,
                P::DeleteRecords,
                P::ExportData,
                P::ViewReports,
            ]),
            Role::SalesRep => CONTRIBUTOR,
            Role::WarehouseClerk => PermissionSet::of(&[P::ViewRecords, P::EditRecords]),
            Role::ProductionPlanner => CONTRIBUTOR,
            Role::Accountant => PermissionSet::of(&[
                P::ViewRecords,
                P::CreateRecords,
                P::EditRecords,
                P::ExportData,
                P::ViewReports,
            ]),
            Role::HrOfficer => PermissionSet::of(&[
                P::ViewRecords,
                P::CreateRecords,
                P::EditRecords,
                P::DeleteRecords,
            ]),
            Role::Viewer => READ_ONLY,
        }
    }

    pub const fn departments(self) -> DepartmentSet {
        match self {
            Role::Admin => ALL_DEPARTMENTS,
            Role::Manager => DepartmentSet::of(&[
                D::Sales,
                D::Purchasing,
                D::Warehouse,
                D::Production,
                D::Finance,
                D::HumanResources,
            ]),
            Role::SalesRep => DepartmentSet::of(&[D::Sales]),
            Role::WarehouseClerk => DepartmentSet::of(&[D::Warehouse, D::Purchasing]),
            Role::ProductionPlanner => DepartmentSet::of(&[D::Production, D::Warehouse]),
            Role::Accountant => DepartmentSet::of(&[D::Finance, D::Sales, D::Purchasing]),
            Role::HrOfficer => DepartmentSet::of(&[D::HumanResources]),
            Role::Viewer => DepartmentSet::of(&[D::Sales, D::Warehouse]),
        }
    }

    pub const fn has_permission(self, perm: Permission) -> bool {
        self.permissions().contains(perm)
    }

    pub const fn can_access_department(self, dep: Department) -> bool {
        self.departments().contains(dep)
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Manager => "Manager",
            Role::SalesRep => "Sales Representative",
            Role::WarehouseClerk => "Warehouse Clerk",
            Role::ProductionPlanner => "Production Planner",
            Role::Accountant => "Accountant",
            Role::HrOfficer => "HR Officer",
            Role::Viewer => "Viewer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_everything() {
        for p in Permission::ALL {
            assert!(Role::Admin.has_permission(p));
        }
        for d in Department::ALL {
            assert!(Role::Admin.can_access_department(d));
        }
    }

    #[test]
    fn viewer_is_read_only() {
        let perms: Vec<Permission> = Role::Viewer.permissions().iter().collect();
        assert_eq!(perms, vec![Permission::ViewRecords]);
        assert!(!Role::Viewer.has_permission(Permission::ExportData));
    }

    #[test]
    fn department_scoping() {
        assert!(Role::SalesRep.can_access_department(Department::Sales));
        assert!(!Role::SalesRep.can_access_department(Department::Finance));
        assert!(!Role::Manager.can_access_department(Department::Administration));
        let hr: Vec<Department> = Role::HrOfficer.departments().iter().collect();
        assert_eq!(hr, vec![Department::HumanResources]);
    }

    #[test]
    fn only_admin_manages_users() {
        let roles = [
            Role::Admin,
            Role::Manager,
            Role::SalesRep,
            Role::WarehouseClerk,
            Role::ProductionPlanner,
            Role::Accountant,
            Role::HrOfficer,
            Role::Viewer,
        ];
        let managers: Vec<Role> = roles
            .into_iter()
            .filter(|r| r.has_permission(Permission::ManageUsers))
            .collect();
        assert_eq!(managers, vec![Role::Admin]);
    }

    #[test]
    fn every_role_can_view() {
        for role in Role::value_variants() {
            assert!(role.has_permission(Permission::ViewRecords), "{role:?}");
            assert!(role.departments().iter().next().is_some(), "{role:?}");
        }
    }
}
