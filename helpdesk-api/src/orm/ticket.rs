//! Ticket persistence.
//!
//! Every mutation that touches more than one row (ticket plus history plus
//! notifications) runs in a single transaction, so a failure part way through
//! leaves nothing behind.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable};

use crate::models::{
    NewStatusHistory, NewTicket, Notification, NotificationType, StatusHistory, StatusHistoryView,
    Ticket, TicketChanges, TicketDetails, TicketStatus, Transition, User, transition,
};
use crate::orm::last_insert_rowid;
use crate::orm::notification::notify_interested_parties;
use crate::orm::user::get_user;
use crate::policy::TicketScope;
use crate::schema::{status_history, tickets, users};

const DETAILS_SELECT: &str = "\
    SELECT t.*, u.name AS unit_name, s.name AS sector_name, \
           tech.name AS assigned_to_name, creator.name AS creator_name \
    FROM tickets t \
    JOIN units u ON u.id = t.unit_id \
    JOIN sectors s ON s.id = t.sector_id \
    JOIN users creator ON creator.id = t.created_by \
    LEFT JOIN users tech ON tech.id = t.assigned_to";

/// Validated fields of a ticket being opened.
#[derive(Debug, Clone)]
pub struct TicketInput {
    pub requester_name: String,
    pub unit_id: i32,
    pub sector_id: i32,
    pub exact_location: String,
    pub points_quantity: i32,
    pub responsible_user: String,
    pub observations: Option<String>,
}

/// A staff update. `assigned_to: Some(None)` clears the assignment.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<Option<i32>>,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    /// Nothing was requested that differs from the stored ticket.
    NoChange,
    Updated {
        ticket: Ticket,
        notifications: Vec<Notification>,
    },
}

pub fn get_ticket(conn: &mut SqliteConnection, ticket_id: i32) -> QueryResult<Option<Ticket>> {
    tickets::table
        .find(ticket_id)
        .select(Ticket::as_select())
        .first(conn)
        .optional()
}

pub fn get_ticket_details(
    conn: &mut SqliteConnection,
    ticket_id: i32,
) -> QueryResult<Option<TicketDetails>> {
    diesel::sql_query(format!("{DETAILS_SELECT} WHERE t.id = ?"))
        .bind::<Integer, _>(ticket_id)
        .get_result::<TicketDetails>(conn)
        .optional()
}

/// Tickets visible under `scope`, newest first. `limit` of `None` returns all.
pub fn list_ticket_details(
    conn: &mut SqliteConnection,
    scope: TicketScope,
    limit: Option<i64>,
) -> QueryResult<Vec<TicketDetails>> {
    let created_by = match scope {
        TicketScope::All => None,
        TicketScope::CreatedBy(user_id) => Some(user_id),
    };
    diesel::sql_query(format!(
        "{DETAILS_SELECT} WHERE (? IS NULL OR t.created_by = ?) \
         ORDER BY t.created_at DESC, t.id DESC LIMIT ?"
    ))
    .bind::<Nullable<Integer>, _>(created_by)
    .bind::<Nullable<Integer>, _>(created_by)
    .bind::<BigInt, _>(limit.unwrap_or(-1))
    .load::<TicketDetails>(conn)
}

fn insert_history(
    conn: &mut SqliteConnection,
    ticket_id: i32,
    old_status: Option<TicketStatus>,
    new_status: TicketStatus,
    changed_by: i32,
) -> QueryResult<usize> {
    diesel::insert_into(status_history::table)
        .values(&NewStatusHistory {
            ticket_id,
            old_status,
            new_status,
            changed_by,
            created_at: Utc::now().naive_utc(),
        })
        .execute(conn)
}

/// Opens a ticket in `aberto`, records the opening in the status history and
/// notifies interested parties.
pub fn create_ticket(
    conn: &mut SqliteConnection,
    input: TicketInput,
    creator: &User,
) -> QueryResult<(Ticket, Vec<Notification>)> {
    conn.transaction(|conn| {
        let now = Utc::now().naive_utc();
        let new_ticket = NewTicket {
            requester_name: input.requester_name,
            unit_id: input.unit_id,
            sector_id: input.sector_id,
            exact_location: input.exact_location,
            points_quantity: input.points_quantity,
            responsible_user: input.responsible_user,
            observations: input.observations,
            status: TicketStatus::Aberto,
            created_by: creator.id,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(tickets::table)
            .values(&new_ticket)
            .execute(conn)?;
        let ticket_id = last_insert_rowid(conn)?;

        insert_history(conn, ticket_id, None, TicketStatus::Aberto, creator.id)?;

        let ticket = tickets::table
            .find(ticket_id)
            .select(Ticket::as_select())
            .first(conn)?;
        let message = format!(
            "New ticket #{} opened by {}",
            ticket.id, ticket.requester_name
        );
        let notifications = notify_interested_parties(
            conn,
            &ticket,
            creator,
            NotificationType::NovoTicket,
            &message,
            &[],
        )?;
        Ok((ticket, notifications))
    })
}

/// Applies a staff update.
///
/// A status change goes through [`transition`]; only an actual change writes
/// a history row and a `mudanca_status` notification. A provided assignment is
/// always written and notifies with `atribuicao` when it differs from the
/// stored one, reaching the newly assigned technician as well.
pub fn update_ticket(
    conn: &mut SqliteConnection,
    ticket_id: i32,
    update: TicketUpdate,
    actor: &User,
) -> QueryResult<UpdateOutcome> {
    conn.transaction(|conn| {
        let current = tickets::table
            .find(ticket_id)
            .select(Ticket::as_select())
            .first(conn)?;
        let now = Utc::now().naive_utc();

        let status_change = match update.status.map(|s| transition(current.status, s)) {
            Some(Transition::Changed {
                from,
                to,
                stamps_completion,
            }) => Some((from, to, stamps_completion)),
            Some(Transition::Unchanged) | None => None,
        };

        if status_change.is_none() && update.assigned_to.is_none() {
            return Ok(UpdateOutcome::NoChange);
        }

        let mut changes = TicketChanges {
            assigned_to: update.assigned_to,
            updated_at: Some(now),
            ..Default::default()
        };
        if let Some((_, to, stamps_completion)) = status_change {
            changes.status = Some(to);
            if stamps_completion {
                changes.completed_at = Some(Some(now));
            }
        }

        diesel::update(tickets::table.find(ticket_id))
            .set(&changes)
            .execute(conn)?;
        let ticket = tickets::table
            .find(ticket_id)
            .select(Ticket::as_select())
            .first(conn)?;

        let mut notifications = Vec::new();

        if let Some((from, to, _)) = status_change {
            insert_history(conn, ticket_id, Some(from), to, actor.id)?;
            let message = format!("Ticket #{ticket_id} status changed from {from} to {to}");
            notifications.extend(notify_interested_parties(
                conn,
                &ticket,
                actor,
                NotificationType::MudancaStatus,
                &message,
                &[],
            )?);
        }

        if let Some(assignee) = update.assigned_to.filter(|a| *a != current.assigned_to) {
            let message = match assignee {
                Some(user_id) => {
                    let name = get_user(conn, user_id)?
                        .map(|u| u.name)
                        .unwrap_or_else(|| format!("user #{user_id}"));
                    format!("Ticket #{ticket_id} assigned to {name}")
                }
                None => format!("Ticket #{ticket_id} is no longer assigned"),
            };
            let extra: Vec<i32> = assignee.into_iter().collect();
            notifications.extend(notify_interested_parties(
                conn,
                &ticket,
                actor,
                NotificationType::Atribuicao,
                &message,
                &extra,
            )?);
        }

        Ok(UpdateOutcome::Updated {
            ticket,
            notifications,
        })
    })
}

/// Bumps `updated_at` after a child row was added.
pub fn touch_ticket(conn: &mut SqliteConnection, ticket_id: i32) -> QueryResult<usize> {
    diesel::update(tickets::table.find(ticket_id))
        .set(tickets::updated_at.eq(Utc::now().naive_utc()))
        .execute(conn)
}

/// Status history of a ticket, oldest first.
pub fn list_history(
    conn: &mut SqliteConnection,
    ticket_id: i32,
) -> QueryResult<Vec<StatusHistoryView>> {
    let rows: Vec<(StatusHistory, String)> = status_history::table
        .inner_join(users::table)
        .filter(status_history::ticket_id.eq(ticket_id))
        .order((status_history::created_at.asc(), status_history::id.asc()))
        .select((StatusHistory::as_select(), users::name))
        .load(conn)?;
    Ok(rows
        .into_iter()
        .map(|(entry, changed_by_name)| StatusHistoryView {
            entry,
            changed_by_name,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::orm::testing::{insert_test_ticket, insert_test_user, setup_test_db};
    use crate::schema::notifications;

    #[test]
    fn opening_records_initial_history() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let admin = insert_test_user(&mut conn, "boss@example.com", "pw", Role::Admin);
        let ticket = insert_test_ticket(&mut conn, requester.id);

        assert_eq!(ticket.status, TicketStatus::Aberto);
        assert!(ticket.completed_at.is_none());

        let history = list_history(&mut conn, ticket.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].entry.old_status, None);
        assert_eq!(history[0].entry.new_status, TicketStatus::Aberto);
        assert_eq!(history[0].changed_by_name, "req");

        let for_admin: Vec<Notification> = notifications::table
            .filter(notifications::user_id.eq(admin.id))
            .select(Notification::as_select())
            .load(&mut conn)
            .unwrap();
        assert_eq!(for_admin.len(), 1);
        assert_eq!(for_admin[0].notification_type, NotificationType::NovoTicket);
    }

    #[test]
    fn status_change_writes_one_history_row_and_stamps_completion() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let ticket = insert_test_ticket(&mut conn, requester.id);

        let outcome = update_ticket(
            &mut conn,
            ticket.id,
            TicketUpdate {
                status: Some(TicketStatus::Concluido),
                assigned_to: None,
            },
            &tech,
        )
        .unwrap();

        let UpdateOutcome::Updated {
            ticket: updated,
            notifications,
        } = outcome
        else {
            panic!("expected an update");
        };
        assert_eq!(updated.status, TicketStatus::Concluido);
        assert!(updated.completed_at.is_some());
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, requester.id);
        assert_eq!(notifications[0].notification_type, NotificationType::MudancaStatus);

        let history = list_history(&mut conn, ticket.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].entry.old_status, Some(TicketStatus::Aberto));
        assert_eq!(history[1].entry.new_status, TicketStatus::Concluido);
        assert_eq!(history[1].entry.changed_by, tech.id);
    }

    #[test]
    fn reopening_keeps_completion_stamp() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let ticket = insert_test_ticket(&mut conn, requester.id);

        for status in [TicketStatus::Concluido, TicketStatus::EmAndamento] {
            update_ticket(
                &mut conn,
                ticket.id,
                TicketUpdate {
                    status: Some(status),
                    assigned_to: None,
                },
                &tech,
            )
            .unwrap();
        }

        let stored = get_ticket(&mut conn, ticket.id).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::EmAndamento);
        assert!(stored.completed_at.is_some());
        assert_eq!(list_history(&mut conn, ticket.id).unwrap().len(), 3);
    }

    #[test]
    fn identical_status_alone_is_no_change() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let ticket = insert_test_ticket(&mut conn, requester.id);

        let outcome = update_ticket(
            &mut conn,
            ticket.id,
            TicketUpdate {
                status: Some(TicketStatus::Aberto),
                assigned_to: None,
            },
            &tech,
        )
        .unwrap();
        assert!(matches!(outcome, UpdateOutcome::NoChange));
        assert!(matches!(
            update_ticket(&mut conn, ticket.id, TicketUpdate::default(), &tech).unwrap(),
            UpdateOutcome::NoChange
        ));
        assert_eq!(list_history(&mut conn, ticket.id).unwrap().len(), 1);
    }

    #[test]
    fn assignment_notifies_creator_and_new_assignee() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let admin = insert_test_user(&mut conn, "boss@example.com", "pw", Role::Admin);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let ticket = insert_test_ticket(&mut conn, requester.id);

        let outcome = update_ticket(
            &mut conn,
            ticket.id,
            TicketUpdate {
                status: None,
                assigned_to: Some(Some(tech.id)),
            },
            &admin,
        )
        .unwrap();
        let UpdateOutcome::Updated {
            ticket: updated,
            notifications,
        } = outcome
        else {
            panic!("expected an update");
        };
        assert_eq!(updated.assigned_to, Some(tech.id));
        let mut recipients: Vec<i32> = notifications.iter().map(|n| n.user_id).collect();
        recipients.sort_unstable();
        assert_eq!(recipients, vec![requester.id, tech.id]);
        assert!(notifications.iter().all(|n| n.notification_type == NotificationType::Atribuicao));
        assert_eq!(list_history(&mut conn, ticket.id).unwrap().len(), 1);

        let details = get_ticket_details(&mut conn, ticket.id).unwrap().unwrap();
        assert_eq!(details.assigned_to_name.as_deref(), Some("tech"));
        assert_eq!(details.creator_name, "req");
    }

    #[test]
    fn scoped_listing_only_returns_own_tickets() {
        let mut conn = setup_test_db();
        let a = insert_test_user(&mut conn, "a@example.com", "pw", Role::Solicitante);
        let b = insert_test_user(&mut conn, "b@example.com", "pw", Role::Solicitante);
        let first = insert_test_ticket(&mut conn, a.id);
        insert_test_ticket(&mut conn, b.id);
        let third = insert_test_ticket(&mut conn, a.id);

        let mine = list_ticket_details(&mut conn, TicketScope::CreatedBy(a.id), None).unwrap();
        let ids: Vec<i32> = mine.iter().map(|t| t.ticket.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);

        let all = list_ticket_details(&mut conn, TicketScope::All, None).unwrap();
        assert_eq!(all.len(), 3);
        let latest = list_ticket_details(&mut conn, TicketScope::All, Some(2)).unwrap();
        assert_eq!(latest.len(), 2);
    }
}
