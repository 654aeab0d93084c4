//! Ticket endpoints: listing, opening, detail and staff updates.

use rocket::serde::json::Json;
use rocket::{Route, State, get, patch, post};
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use super::SuccessResponse;
use crate::error::{ApiError, ApiResult, parse_id};
use crate::logged_json::LoggedJson;
use crate::models::{
    AttachmentView, CommentView, StatusHistoryView, TicketDetails, TicketStatus,
};
use crate::notifier::Notifier;
use crate::orm::DbConn;
use crate::orm::attachment::list_attachments;
use crate::orm::comment::list_comments;
use crate::orm::ticket::{
    TicketInput, TicketUpdate, UpdateOutcome, create_ticket, get_ticket, get_ticket_details,
    list_history, list_ticket_details, update_ticket,
};
use crate::orm::unit::get_sector;
use crate::orm::user::get_user;
use crate::policy::ticket_scope;
use crate::session_guards::{AuthenticatedUser, StaffUser};

const MISSING_FIELDS: &str = "All required fields must be filled in";

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct TicketList {
    pub tickets: Vec<TicketDetails>,
}

/// Body of `POST /api/tickets`. Every field is optional at the parsing
/// stage so a missing one is reported as 400 by [`CreateTicketRequest::validate`].
#[derive(Deserialize, Serialize, Debug, TS)]
#[ts(export)]
pub struct CreateTicketRequest {
    pub requester_name: Option<String>,
    pub unit_id: Option<i32>,
    pub sector_id: Option<i32>,
    pub exact_location: Option<String>,
    pub points_quantity: Option<i32>,
    pub responsible_user: Option<String>,
    pub observations: Option<String>,
}

fn required_text(value: &Option<String>) -> ApiResult<String> {
    match value.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(ApiError::bad_request(MISSING_FIELDS)),
    }
}

fn required_positive(value: Option<i32>) -> ApiResult<i32> {
    match value {
        Some(n) if n > 0 => Ok(n),
        _ => Err(ApiError::bad_request(MISSING_FIELDS)),
    }
}

impl CreateTicketRequest {
    pub fn validate(&self) -> ApiResult<TicketInput> {
        Ok(TicketInput {
            requester_name: required_text(&self.requester_name)?,
            unit_id: required_positive(self.unit_id)?,
            sector_id: required_positive(self.sector_id)?,
            exact_location: required_text(&self.exact_location)?,
            points_quantity: required_positive(self.points_quantity)?,
            responsible_user: required_text(&self.responsible_user)?,
            observations: self
                .observations
                .as_deref()
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string),
        })
    }
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct CreateTicketResponse {
    pub success: bool,
    pub message: String,
    pub ticket_id: i32,
}

#[derive(Serialize, Debug, TS)]
#[ts(export)]
pub struct TicketView {
    pub ticket: TicketDetails,
    pub comments: Vec<CommentView>,
    pub attachments: Vec<AttachmentView>,
    pub history: Vec<StatusHistoryView>,
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `PATCH /api/tickets/<id>`. `"assigned_to": null` unassigns.
#[derive(Deserialize, Serialize, Debug, TS)]
#[ts(export)]
pub struct UpdateTicketRequest {
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub assigned_to: Option<Option<i32>>,
}

/// List tickets.
///
/// - **URL:** `/api/tickets`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// Requesters get the tickets they opened; admins and technicians get every
/// ticket. Newest first, with unit, sector, assignee and creator names.
#[get("/tickets")]
pub async fn list(db: DbConn, auth_user: AuthenticatedUser) -> ApiResult<Json<TicketList>> {
    let scope = ticket_scope(&auth_user.user);
    let tickets = db
        .run(move |conn| list_ticket_details(conn, scope, None))
        .await?;
    Ok(Json(TicketList { tickets }))
}

/// Open a ticket.
///
/// - **URL:** `/api/tickets`
/// - **Method:** `POST`
/// - **Authentication:** Required (any role)
///
/// ```json
/// {
///   "requester_name": "Maria Souza",
///   "unit_id": 1,
///   "sector_id": 2,
///   "exact_location": "Sala 12",
///   "points_quantity": 3,
///   "responsible_user": "João",
///   "observations": "Tomada solta"
/// }
/// ```
///
/// The ticket starts in `aberto`. Missing or blank fields, non-positive
/// numbers and a sector outside the chosen unit are rejected with 400 and
/// nothing is stored.
#[post("/tickets", data = "<request>")]
pub async fn create(
    db: DbConn,
    notifier: &State<Notifier>,
    auth_user: AuthenticatedUser,
    request: LoggedJson<CreateTicketRequest>,
) -> ApiResult<Json<CreateTicketResponse>> {
    let input = request.validate()?;
    let creator = auth_user.user;

    let (ticket, notifications) = db
        .run(move |conn| -> ApiResult<_> {
            match get_sector(conn, input.sector_id)? {
                Some(sector) if sector.unit_id == input.unit_id => {}
                _ => {
                    return Err(ApiError::bad_request(
                        "Sector does not belong to the selected unit",
                    ));
                }
            }
            Ok(create_ticket(conn, input, &creator)?)
        })
        .await?;

    info!("Ticket {} opened by user {}", ticket.id, ticket.created_by);
    notifier.dispatch_all(&db, &notifications).await;

    Ok(Json(CreateTicketResponse {
        success: true,
        message: "Ticket created".to_string(),
        ticket_id: ticket.id,
    }))
}

/// Ticket detail.
///
/// - **URL:** `/api/tickets/<id>`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// Returns the ticket with its comments, attachments and status history,
/// each oldest first. 400 for a non-numeric id, 404 for an unknown ticket,
/// 403 for a requester asking for someone else's ticket.
#[get("/tickets/<id>")]
pub async fn detail(db: DbConn, auth_user: AuthenticatedUser, id: &str) -> ApiResult<Json<TicketView>> {
    let ticket_id = parse_id(id, "ticket")?;
    super::visible_ticket(&db, &auth_user.user, ticket_id).await?;

    let view = db
        .run(move |conn| -> ApiResult<TicketView> {
            let ticket = get_ticket_details(conn, ticket_id)?
                .ok_or_else(|| ApiError::not_found("Ticket not found"))?;
            Ok(TicketView {
                ticket,
                comments: list_comments(conn, ticket_id)?,
                attachments: list_attachments(conn, ticket_id)?,
                history: list_history(conn, ticket_id)?,
            })
        })
        .await?;
    Ok(Json(view))
}

/// Update status and/or assignment.
///
/// - **URL:** `/api/tickets/<id>`
/// - **Method:** `PATCH`
/// - **Authentication:** Admin or technician
///
/// ```json
/// { "status": "em_andamento", "assigned_to": 4 }
/// ```
///
/// A status different from the stored one is recorded in the history;
/// moving into `concluido` stamps `completed_at`. A provided `assigned_to`
/// (a staff user id, or `null`) is always written. A body that changes
/// nothing is a 400.
#[patch("/tickets/<id>", data = "<request>")]
pub async fn update(
    db: DbConn,
    notifier: &State<Notifier>,
    staff: StaffUser,
    id: &str,
    request: LoggedJson<UpdateTicketRequest>,
) -> ApiResult<Json<SuccessResponse>> {
    let ticket_id = parse_id(id, "ticket")?;
    let request = request.into_inner();
    let update = TicketUpdate {
        status: request
            .status
            .as_deref()
            .map(str::parse::<TicketStatus>)
            .transpose()?,
        assigned_to: request.assigned_to,
    };
    let actor = staff.user;

    let outcome = db
        .run(move |conn| -> ApiResult<UpdateOutcome> {
            if get_ticket(conn, ticket_id)?.is_none() {
                return Err(ApiError::not_found("Ticket not found"));
            }
            if let Some(Some(assignee_id)) = update.assigned_to {
                match get_user(conn, assignee_id)? {
                    Some(assignee) if assignee.role.is_staff() => {}
                    _ => {
                        return Err(ApiError::bad_request(
                            "Tickets can only be assigned to technicians or administrators",
                        ));
                    }
                }
            }
            Ok(update_ticket(conn, ticket_id, update, &actor)?)
        })
        .await?;

    match outcome {
        UpdateOutcome::NoChange => Err(ApiError::bad_request("No updates provided")),
        UpdateOutcome::Updated {
            ticket,
            notifications,
        } => {
            info!("Ticket {} updated, status {}", ticket.id, ticket.status);
            notifier.dispatch_all(&db, &notifications).await;
            Ok(Json(SuccessResponse::new("Ticket updated")))
        }
    }
}

pub fn routes() -> Vec<Route> {
    routes![list, create, detail, update]
}
