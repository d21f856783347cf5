//! Authorization policy: one place that decides whether a caller may perform
//! an action on a resource.
//!
//! `401` means the caller is unknown, `403` means the caller is known but not
//! allowed. Handlers never compare roles themselves.

use crate::{error::AppError, middleware::auth::AuthUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Products and categories.
    Catalog,
    Cart { owner_id: i64 },
    Order { owner_id: i64 },
    /// Every order in the shop, across users.
    OrderLedger,
    Payment { order_owner_id: i64 },
    UserProfile { user_id: i64 },
    UserRole,
    UserDirectory,
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden(&'static str),
}

enum Rule {
    Public,
    OwnerOrAdmin(i64),
    AdminOnly,
}

fn rule_for(action: Action, resource: Resource) -> Rule {
    use Action::*;
    use Resource::*;

    match (action, resource) {
        (Read, Catalog) => Rule::Public,
        (_, Catalog) => Rule::AdminOnly,

        (Delete, Cart { .. }) => Rule::AdminOnly,
        (_, Cart { owner_id }) => Rule::OwnerOrAdmin(owner_id),

        (Create | Read, Order { owner_id }) => Rule::OwnerOrAdmin(owner_id),
        (Update | Delete, Order { .. }) => Rule::AdminOnly,
        (_, OrderLedger) => Rule::AdminOnly,

        (Create | Read, Payment { order_owner_id }) => Rule::OwnerOrAdmin(order_owner_id),
        (Update | Delete, Payment { .. }) => Rule::AdminOnly,

        (Read | Update, UserProfile { user_id }) => Rule::OwnerOrAdmin(user_id),
        (Create | Delete, UserProfile { .. }) => Rule::AdminOnly,

        (_, UserRole) | (_, UserDirectory) | (_, Dashboard) => Rule::AdminOnly,
    }
}

fn denial_message(resource: Resource) -> &'static str {
    match resource {
        Resource::Cart { .. } => "Access denied: you can only access your own cart.",
        Resource::Order { .. } => "Access denied: you can only access your own orders.",
        Resource::Payment { .. } => "Access denied: you can only access payments for your own orders.",
        Resource::UserProfile { .. } => "Access denied: you can only access your own profile.",
        _ => "Access denied: insufficient privileges.",
    }
}

pub fn authorize(identity: Option<&AuthUser>, action: Action, resource: Resource) -> Decision {
    let rule = rule_for(action, resource);
    if let Rule::Public = rule {
        return Decision::Allow;
    }

    let Some(user) = identity else {
        return Decision::Unauthenticated;
    };

    if user.is_admin() {
        return Decision::Allow;
    }

    match rule {
        Rule::OwnerOrAdmin(owner_id) if owner_id == user.user_id => Decision::Allow,
        Rule::OwnerOrAdmin(_) => Decision::Forbidden(denial_message(resource)),
        Rule::AdminOnly => Decision::Forbidden("Access denied: insufficient privileges."),
        Rule::Public => Decision::Allow,
    }
}

/// [`authorize`] for an authenticated caller, as a `Result` for `?` at the call site.
pub fn enforce(user: &AuthUser, action: Action, resource: Resource) -> Result<(), AppError> {
    match authorize(Some(user), action, resource) {
        Decision::Allow => Ok(()),
        Decision::Unauthenticated => Err(AppError::Unauthenticated(
            "Authentication required.".into(),
        )),
        Decision::Forbidden(reason) => {
            tracing::info!(
                user_id = user.user_id,
                role = %user.role,
                ?action,
                ?resource,
                "authorization denied"
            );
            Err(AppError::Forbidden(reason.into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(id: i64) -> AuthUser {
        AuthUser {
            user_id: id,
            email: format!("user{id}@x.com"),
            role: Role::User,
        }
    }

    fn admin(id: i64) -> AuthUser {
        AuthUser {
            user_id: id,
            email: "admin@x.com".into(),
            role: Role::Admin,
        }
    }

    #[test]
    fn catalog_reads_are_public() {
        assert_eq!(authorize(None, Action::Read, Resource::Catalog), Decision::Allow);
    }

    #[test]
    fn catalog_mutations_need_a_token_then_admin() {
        assert_eq!(
            authorize(None, Action::Create, Resource::Catalog),
            Decision::Unauthenticated
        );
        assert!(matches!(
            authorize(Some(&user(1)), Action::Create, Resource::Catalog),
            Decision::Forbidden(_)
        ));
        assert_eq!(
            authorize(Some(&admin(2)), Action::Delete, Resource::Catalog),
            Decision::Allow
        );
    }

    #[test]
    fn owner_or_admin_rules() {
        let cart = Resource::Cart { owner_id: 1 };
        assert_eq!(authorize(Some(&user(1)), Action::Read, cart), Decision::Allow);
        assert!(matches!(
            authorize(Some(&user(2)), Action::Read, cart),
            Decision::Forbidden(_)
        ));
        assert_eq!(authorize(Some(&admin(9)), Action::Update, cart), Decision::Allow);

        let order = Resource::Order { owner_id: 3 };
        assert_eq!(authorize(Some(&user(3)), Action::Create, order), Decision::Allow);
        assert!(matches!(
            authorize(Some(&user(4)), Action::Read, order),
            Decision::Forbidden(_)
        ));

        let payment = Resource::Payment { order_owner_id: 5 };
        assert_eq!(authorize(Some(&user(5)), Action::Read, payment), Decision::Allow);
        assert!(matches!(
            authorize(Some(&user(6)), Action::Create, payment),
            Decision::Forbidden(_)
        ));
    }

    #[test]
    fn owners_cannot_perform_admin_only_actions_on_their_own_resources() {
        assert!(matches!(
            authorize(Some(&user(1)), Action::Delete, Resource::Cart { owner_id: 1 }),
            Decision::Forbidden(_)
        ));
        assert!(matches!(
            authorize(Some(&user(1)), Action::Delete, Resource::Order { owner_id: 1 }),
            Decision::Forbidden(_)
        ));
        assert!(matches!(
            authorize(Some(&user(1)), Action::Delete, Resource::UserProfile { user_id: 1 }),
            Decision::Forbidden(_)
        ));
    }

    #[test]
    fn admin_only_resources() {
        for resource in [
            Resource::UserRole,
            Resource::UserDirectory,
            Resource::Dashboard,
            Resource::OrderLedger,
        ] {
            assert!(matches!(
                authorize(Some(&user(1)), Action::Read, resource),
                Decision::Forbidden(_)
            ));
            assert_eq!(authorize(Some(&admin(1)), Action::Read, resource), Decision::Allow);
            assert_eq!(authorize(None, Action::Read, resource), Decision::Unauthenticated);
        }
    }

    #[test]
    fn enforce_maps_denial_to_forbidden() {
        let err = enforce(&user(1), Action::Create, Resource::Catalog).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(enforce(&admin(1), Action::Create, Resource::Catalog).is_ok());
    }
}
