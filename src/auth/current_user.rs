//! The logged in user as seen by request handlers, and role checks.

use crate::{
    Error,
    auth::{Role, Token, User, UserID},
    database_id::{DatabaseId, EstablishmentId, MemberId},
};

/// The user behind an authenticated request.
///
/// The auth middleware inserts this into the request extensions, so handlers
/// can take `Extension(current_user): Extension<CurrentUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    /// The credential ID.
    pub user_id: UserID,
    /// The kind of record the credential belongs to.
    pub role: Role,
    /// The admin, establishment or member record ID.
    pub link_id: DatabaseId,
}

impl CurrentUser {
    /// Fail with [Error::Forbidden] unless the user is an administrator.
    pub fn require_admin(&self) -> Result<(), Error> {
        match self.role {
            Role::Admin => Ok(()),
            _ => Err(Error::Forbidden),
        }
    }

    /// Fail with [Error::Forbidden] unless the user has one of `roles`.
    pub fn require_any(&self, roles: &[Role]) -> Result<(), Error> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// The establishment the user logs in as.
    pub fn establishment_id(&self) -> Result<EstablishmentId, Error> {
        match self.role {
            Role::Establishment => Ok(self.link_id),
            _ => Err(Error::Forbidden),
        }
    }

    /// The member the user logs in as.
    pub fn member_id(&self) -> Result<MemberId, Error> {
        match self.role {
            Role::Member => Ok(self.link_id),
            _ => Err(Error::Forbidden),
        }
    }
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: user.role,
            link_id: user.link_id,
        }
    }
}

impl From<Token> for CurrentUser {
    fn from(token: Token) -> Self {
        Self {
            user_id: token.user_id,
            role: token.role,
            link_id: token.link_id,
        }
    }
}
