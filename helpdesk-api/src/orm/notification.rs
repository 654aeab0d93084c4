//! Notification rows and the fan-out rule deciding who receives them.
//!
//! When a requester acts on a ticket every admin and the ticket's assigned
//! technician are notified. When staff act, the ticket's creator is, even
//! when the creator is the acting staff member. Nobody receives the same
//! event twice. Recipients are computed from the current database state on
//! every event.

use chrono::Utc;
use diesel::prelude::*;

use crate::models::{
    NewNotification, Notification, NotificationType, NotificationView, Role, Ticket, TicketStatus,
    User,
};
use crate::orm::last_insert_rowid;
use crate::orm::user::user_ids_with_role;
use crate::schema::{notifications, tickets};

pub const LIST_LIMIT: i64 = 50;
pub const UNREAD_LIMIT: i64 = 10;

/// Users who should hear about `actor`'s action on `ticket`.
pub fn interested_parties(
    conn: &mut SqliteConnection,
    ticket: &Ticket,
    actor: &User,
) -> QueryResult<Vec<i32>> {
    let mut recipients = if actor.role.is_staff() {
        vec![ticket.created_by]
    } else {
        let mut ids = user_ids_with_role(conn, Role::Admin)?;
        ids.extend(ticket.assigned_to);
        ids
    };
    recipients.sort_unstable();
    recipients.dedup();
    Ok(recipients)
}

pub fn insert_notification(
    conn: &mut SqliteConnection,
    user_id: i32,
    ticket_id: i32,
    kind: NotificationType,
    message: &str,
) -> QueryResult<Notification> {
    diesel::insert_into(notifications::table)
        .values(&NewNotification {
            user_id,
            ticket_id,
            notification_type: kind,
            message: message.to_string(),
            is_read: false,
            created_at: Utc::now().naive_utc(),
        })
        .execute(conn)?;
    let id = last_insert_rowid(conn)?;
    notifications::table
        .find(id)
        .select(Notification::as_select())
        .first(conn)
}

/// Inserts one notification per interested party, plus one for each id in
/// `also_notify` that is not already a recipient.
pub fn notify_interested_parties(
    conn: &mut SqliteConnection,
    ticket: &Ticket,
    actor: &User,
    kind: NotificationType,
    message: &str,
    also_notify: &[i32],
) -> QueryResult<Vec<Notification>> {
    let mut recipients = interested_parties(conn, ticket, actor)?;
    for id in also_notify {
        if !recipients.contains(id) {
            recipients.push(*id);
        }
    }

    recipients
        .into_iter()
        .map(|user_id| insert_notification(conn, user_id, ticket.id, kind, message))
        .collect()
}

fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: i32,
    unread_only: bool,
    limit: i64,
) -> QueryResult<Vec<NotificationView>> {
    let mut query = notifications::table
        .inner_join(tickets::table)
        .select((
            Notification::as_select(),
            tickets::requester_name,
            tickets::status,
        ))
        .filter(notifications::user_id.eq(user_id))
        .into_boxed();
    if unread_only {
        query = query.filter(notifications::is_read.eq(false));
    }

    let rows: Vec<(Notification, String, TicketStatus)> = query
        .order((notifications::created_at.desc(), notifications::id.desc()))
        .limit(limit)
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(notification, requester_name, status)| NotificationView {
            notification,
            requester_name,
            status,
        })
        .collect())
}

/// The user's latest notifications, newest first.
pub fn list_notifications(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Vec<NotificationView>> {
    list_for_user(conn, user_id, false, LIST_LIMIT)
}

/// The user's latest unread notifications, newest first.
pub fn list_unread_notifications(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> QueryResult<Vec<NotificationView>> {
    list_for_user(conn, user_id, true, UNREAD_LIMIT)
}

/// Marks a notification read if `user_id` owns it. Returns false when the
/// notification does not exist or belongs to someone else.
pub fn mark_read(conn: &mut SqliteConnection, notification_id: i32, user_id: i32) -> QueryResult<bool> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user_id)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)?;
    Ok(updated == 1)
}
