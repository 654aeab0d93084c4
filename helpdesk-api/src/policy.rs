//! Authorization rules.
//!
//! Handlers ask [`authorize`] whether a user may act under a [`Rule`] instead
//! of repeating role checks. Ticket visibility is the one resource rule: a
//! requester sees only the tickets they created, staff see every ticket.

use crate::error::{ApiError, ApiResult};
use crate::models::{Role, Ticket, User};

/// What a handler needs to be true about the requesting user.
#[derive(Debug, Clone, Copy)]
pub enum Rule<'a> {
    /// The user holds one of these roles.
    AnyRole(&'a [Role]),
    /// The user may see (and so comment on or attach to) this ticket.
    ViewTicket(&'a Ticket),
}

impl Rule<'static> {
    pub const STAFF: Rule<'static> = Rule::AnyRole(&Role::STAFF);
}

/// Which tickets a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    CreatedBy(i32),
}

pub fn ticket_scope(user: &User) -> TicketScope {
    if user.role.is_staff() {
        TicketScope::All
    } else {
        TicketScope::CreatedBy(user.id)
    }
}

pub fn can_view_ticket(user: &User, ticket: &Ticket) -> bool {
    match ticket_scope(user) {
        TicketScope::All => true,
        TicketScope::CreatedBy(id) => ticket.created_by == id,
    }
}

/// Fails with 403 when `user` does not satisfy `rule`.
pub fn authorize(user: &User, rule: Rule<'_>) -> ApiResult<()> {
    let allowed = match rule {
        Rule::AnyRole(roles) => roles.contains(&user.role),
        Rule::ViewTicket(ticket) => can_view_ticket(user, ticket),
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(match rule {
            Rule::AnyRole(_) => "Your role does not allow this action",
            Rule::ViewTicket(_) => "You do not have access to this ticket",
        }))
    }
}

/// Fails with 401 without a user and with 403 when the user's role is not
/// in `allowed`.
pub fn require_role<'u>(user: Option<&'u User>, allowed: &[Role]) -> ApiResult<&'u User> {
    let user = user.ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
    authorize(user, Rule::AnyRole(allowed))?;
    Ok(user)
}

/// Resolves a looked-up ticket against the user: 404 when it does not exist,
/// 403 when it exists but is hidden from the user.
pub fn ensure_ticket_access(user: &User, ticket: Option<Ticket>) -> ApiResult<Ticket> {
    let ticket = ticket.ok_or_else(|| ApiError::not_found("Ticket not found"))?;
    authorize(user, Rule::ViewTicket(&ticket))?;
    Ok(ticket)
}
