use crate::types::{Feature, Operation, Resource, Role};

pub const ANY_ROLE: &[Role] = &[Role::Owner, Role::Admin, Role::Member, Role::Partner];
pub const STAFF: &[Role] = &[Role::Owner, Role::Admin, Role::Member];
pub const ADMINS: &[Role] = &[Role::Owner, Role::Admin];

/// What an operation demands of the caller. Checked in field order:
/// role, then feature, then limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub roles: &'static [Role],
    pub feature: Option<Feature>,
    pub limit: Option<Resource>,
}

impl Requirement {
    pub const fn roles(roles: &'static [Role]) -> Self {
        Self {
            roles,
            feature: None,
            limit: None,
        }
    }

    pub const fn feature(mut self, feature: Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    pub const fn limit(mut self, resource: Resource) -> Self {
        self.limit = Some(resource);
        self
    }

    pub fn allows_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Per-entity requirements, one per operation
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub list: Requirement,
    pub read: Requirement,
    pub create: Requirement,
    pub update: Requirement,
    pub delete: Requirement,
}

impl Policy {
    pub fn for_operation(&self, operation: Operation) -> &Requirement {
        match operation {
            Operation::List => &self.list,
            Operation::Read => &self.read,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }
}
