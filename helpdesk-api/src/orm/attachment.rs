use diesel::prelude::*;

use crate::models::{
    Attachment, AttachmentView, NewAttachment, Notification, NotificationType, Ticket, User,
};
use crate::orm::last_insert_rowid;
use crate::orm::notification::notify_interested_parties;
use crate::orm::ticket::touch_ticket;
use crate::schema::{attachments, users};

/// Records an already stored file against a ticket, bumps the ticket's
/// `updated_at` and notifies interested parties in one transaction.
pub fn add_attachment(
    conn: &mut SqliteConnection,
    ticket: &Ticket,
    uploader: &User,
    new_attachment: NewAttachment,
) -> QueryResult<(Attachment, Vec<Notification>)> {
    conn.transaction(|conn| {
        diesel::insert_into(attachments::table)
            .values(&new_attachment)
            .execute(conn)?;
        let attachment_id = last_insert_rowid(conn)?;
        touch_ticket(conn, ticket.id)?;

        let message = format!(
            "{} attached {} to ticket #{}",
            uploader.name, new_attachment.original_filename, ticket.id
        );
        let notifications = notify_interested_parties(
            conn,
            ticket,
            uploader,
            NotificationType::Anexo,
            &message,
            &[],
        )?;

        let attachment = attachments::table
            .find(attachment_id)
            .select(Attachment::as_select())
            .first(conn)?;
        Ok((attachment, notifications))
    })
}

/// Attachments of a ticket with their uploaders, oldest first.
pub fn list_attachments(
    conn: &mut SqliteConnection,
    ticket_id: i32,
) -> QueryResult<Vec<AttachmentView>> {
    let rows: Vec<(Attachment, String)> = attachments::table
        .inner_join(users::table)
        .filter(attachments::ticket_id.eq(ticket_id))
        .order((attachments::created_at.asc(), attachments::id.asc()))
        .select((Attachment::as_select(), users::name))
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(attachment, uploaded_by_name)| AttachmentView {
            attachment,
            uploaded_by_name,
        })
        .collect())
}

/// An attachment, provided it belongs to `ticket_id`.
pub fn get_attachment(
    conn: &mut SqliteConnection,
    ticket_id: i32,
    attachment_id: i32,
) -> QueryResult<Option<Attachment>> {
    attachments::table
        .filter(attachments::id.eq(attachment_id))
        .filter(attachments::ticket_id.eq(ticket_id))
        .select(Attachment::as_select())
        .first(conn)
        .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::orm::testing::{
        assign_test_ticket, insert_test_ticket, insert_test_user, setup_test_db,
    };
    use chrono::Utc;

    fn photo(ticket_id: i32, uploaded_by: i32) -> NewAttachment {
        NewAttachment {
            ticket_id,
            filename: "0b6f-photo.jpg".to_string(),
            original_filename: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size: 2048,
            uploaded_by,
            created_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn requester_upload_notifies_admins_and_assignee() {
        let mut conn = setup_test_db();
        let admin = insert_test_user(&mut conn, "boss@example.com", "pw", Role::Admin);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let ticket = insert_test_ticket(&mut conn, requester.id);
        let ticket = assign_test_ticket(&mut conn, ticket.id, tech.id);

        let (attachment, notifications) =
            add_attachment(&mut conn, &ticket, &requester, photo(ticket.id, requester.id)).unwrap();
        assert_eq!(attachment.original_filename, "photo.jpg");
        assert_eq!(attachment.size, 2048);

        let mut recipients: Vec<i32> = notifications.iter().map(|n| n.user_id).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![admin.id, tech.id]);
        assert!(notifications.iter().all(|n| n.notification_type == NotificationType::Anexo));
    }

    #[test]
    fn attachments_are_scoped_to_their_ticket() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let first = insert_test_ticket(&mut conn, requester.id);
        let second = insert_test_ticket(&mut conn, requester.id);

        let (attachment, _) =
            add_attachment(&mut conn, &first, &requester, photo(first.id, requester.id)).unwrap();

        assert!(get_attachment(&mut conn, first.id, attachment.id).unwrap().is_some());
        assert!(get_attachment(&mut conn, second.id, attachment.id).unwrap().is_none());

        let listed = list_attachments(&mut conn, first.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].uploaded_by_name, "req");
        assert!(list_attachments(&mut conn, second.id).unwrap().is_empty());
    }
}
