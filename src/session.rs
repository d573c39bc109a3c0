use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::access::{Department, Permission, Role};
use crate::domain::DeskError;
use crate::repository::Entity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        User {
            name: name.into(),
            role,
        }
    }
}

/// The signed-in user for the lifetime of the application shell.
///
/// There are no credentials involved. Access checks here only decide what
/// the shell offers and are not a security boundary.
#[derive(Debug)]
pub struct Session {
    user: User,
    started_at: DateTime<Local>,
    active: bool,
}

impl Session {
    pub fn start(user: User) -> Self {
        info!("Session started for {} as {}", user.name, user.role.label());
        debug!(
            "Permissions {:?}, departments {}",
            user.role.permissions().iter().collect::<Vec<_>>(),
            user.role
                .departments()
                .iter()
                .map(Department::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Session {
            user,
            started_at: Local::now(),
            active: true,
        }
    }

    pub fn end(&mut self) {
        if self.active {
            self.active = false;
            let minutes = (Local::now() - self.started_at).num_minutes();
            info!("Session of {} ended after {minutes} min", self.user.name);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn can(&self, perm: Permission) -> bool {
        self.is_active() && self.user.role.has_permission(perm)
    }

    /// Whether the page for `entity` is offered to this user.
    pub fn can_open(&self, entity: Entity) -> bool {
        self.can(Permission::ViewRecords)
            && self.user.role.can_access_department(entity.department())
    }

    /// Entities this session can open, in menu order.
    pub fn pages(&self) -> Vec<Entity> {
        Entity::ALL
            .into_iter()
            .filter(|e| self.can_open(*e))
            .collect()
    }

    pub fn require(&self, perm: Permission) -> Result<(), DeskError> {
        if self.can(perm) {
            Ok(())
        } else {
            warn!("{} ({:?}) lacks {:?}", self.user.name, self.user.role, perm);
            Err(DeskError::Forbidden(format!("{perm:?}")))
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle() {
        let mut session = Session::start(User::new("ada", Role::Manager));
        assert!(session.is_active());
        assert!(session.can(Permission::ExportData));
        session.end();
        assert!(!session.is_active());
        assert!(!session.can(Permission::ViewRecords));
        session.end();
        assert!(!session.is_active());
    }

    #[test]
    fn pages_follow_departments() {
        let session = Session::start(User::new("sam", Role::SalesRep));
        assert_eq!(session.pages(), vec![Entity::Customers, Entity::SalesOrders]);
        assert!(!session.can_open(Entity::Invoices));
    }

    #[test]
    fn require_reports_forbidden() {
        let session = Session::start(User::new("vic", Role::Viewer));
        assert!(session.require(Permission::ViewRecords).is_ok());
        assert!(matches!(
            session.require(Permission::DeleteRecords),
            Err(DeskError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_sees_every_page() {
        let session = Session::start(User::new("root", Role::Admin));
        assert_eq!(session.pages(), Entity::ALL.to_vec());
    }
}
