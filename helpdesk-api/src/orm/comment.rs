use chrono::Utc;
use diesel::prelude::*;

use crate::models::{
    Comment, CommentView, NewComment, Notification, NotificationType, Role, Ticket, User,
};
use crate::orm::last_insert_rowid;
use crate::orm::notification::notify_interested_parties;
use crate::orm::ticket::touch_ticket;
use crate::schema::{comments, users};

/// Appends a comment, bumps the ticket's `updated_at` and notifies
/// interested parties, all in one transaction. `content` must already be
/// trimmed and non-empty.
pub fn add_comment(
    conn: &mut SqliteConnection,
    ticket: &Ticket,
    author: &User,
    content: &str,
) -> QueryResult<(Comment, Vec<Notification>)> {
    conn.transaction(|conn| {
        diesel::insert_into(comments::table)
            .values(&NewComment {
                ticket_id: ticket.id,
                user_id: author.id,
                content: content.to_string(),
                created_at: Utc::now().naive_utc(),
            })
            .execute(conn)?;
        let comment_id = last_insert_rowid(conn)?;
        touch_ticket(conn, ticket.id)?;

        let message = if author.role.is_staff() {
            format!("New comment from the support team on ticket #{}", ticket.id)
        } else {
            format!("New comment from the requester on ticket #{}", ticket.id)
        };
        let notifications = notify_interested_parties(
            conn,
            ticket,
            author,
            NotificationType::Comentario,
            &message,
            &[],
        )?;

        let comment = comments::table
            .find(comment_id)
            .select(Comment::as_select())
            .first(conn)?;
        Ok((comment, notifications))
    })
}

/// Comments on a ticket with their authors, oldest first.
pub fn list_comments(conn: &mut SqliteConnection, ticket_id: i32) -> QueryResult<Vec<CommentView>> {
    let rows: Vec<(Comment, String, Role)> = comments::table
        .inner_join(users::table)
        .filter(comments::ticket_id.eq(ticket_id))
        .order((comments::created_at.asc(), comments::id.asc()))
        .select((Comment::as_select(), users::name, users::role))
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(comment, user_name, user_role)| CommentView {
            comment,
            user_name,
            user_role,
        })
        .collect())
}
