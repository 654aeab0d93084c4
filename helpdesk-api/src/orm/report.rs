//! Aggregate queries behind the reports and dashboard endpoints.
//!
//! Every report accepts an optional creation-date range. Bounds are bound as
//! nullable parameters so one statement serves filtered and unfiltered calls.
//! Resolution time is `completed_at - created_at` in days, averaged over
//! completed tickets only.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text, Timestamp};
use serde::Serialize;
use ts_rs::TS;

use crate::models::{ParseEnumError, TicketDetails};
use crate::orm::ticket::list_ticket_details;
use crate::policy::TicketScope;

const DATE_FILTER: &str = "(? IS NULL OR t.created_at >= ?) AND (? IS NULL OR t.created_at <= ?)";

const RESOLUTION_DAYS: &str = "AVG(CASE WHEN t.status = 'concluido' AND t.completed_at IS NOT NULL \
     THEN JULIANDAY(t.completed_at) - JULIANDAY(t.created_at) END)";

const DASHBOARD_RECENT: i64 = 5;
const DASHBOARD_TOP_UNITS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReportType {
    #[default]
    Summary,
    ByUnit,
    BySector,
    ByTechnician,
    Monthly,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Summary => "summary",
            ReportType::ByUnit => "by_unit",
            ReportType::BySector => "by_sector",
            ReportType::ByTechnician => "by_technician",
            ReportType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summary" => Ok(ReportType::Summary),
            "by_unit" => Ok(ReportType::ByUnit),
            "by_sector" => Ok(ReportType::BySector),
            "by_technician" => Ok(ReportType::ByTechnician),
            "monthly" => Ok(ReportType::Monthly),
            other => Err(ParseEnumError::new("report type", other)),
        }
    }
}

/// Inclusive bounds on `created_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    /// Accepts `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (a `T` separator works
    /// too). A date-only end bound covers that whole day.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, String> {
        let start = start
            .map(|raw| parse_bound(raw, NaiveTime::MIN).ok_or_else(|| format!("Invalid start_date '{raw}'")))
            .transpose()?;
        let end_of_day = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap_or(NaiveTime::MIN);
        let end = end
            .map(|raw| parse_bound(raw, end_of_day).ok_or_else(|| format!("Invalid end_date '{raw}'")))
            .transpose()?;
        Ok(DateRange { start, end })
    }
}

fn parse_bound(raw: &str, time_for_date: NaiveTime) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(time_for_date))
        })
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct StatusCounts {
    #[diesel(sql_type = BigInt)]
    pub total_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub open_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub in_progress_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub waiting_material_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub completed_tickets: i64,
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SummaryRow {
    #[diesel(embed)]
    #[serde(flatten)]
    pub counts: StatusCounts,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_resolution_days: Option<f64>,
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct UnitRow {
    #[diesel(sql_type = Text)]
    pub unit_name: String,
    #[diesel(sql_type = BigInt)]
    pub total_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub completed_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub pending_tickets: i64,
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SectorRow {
    #[diesel(sql_type = Text)]
    pub sector_name: String,
    #[diesel(sql_type = Text)]
    pub unit_name: String,
    #[diesel(sql_type = BigInt)]
    pub total_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub completed_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub pending_tickets: i64,
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct TechnicianRow {
    #[diesel(sql_type = Text)]
    pub technician_name: String,
    #[diesel(sql_type = BigInt)]
    pub total_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub completed_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub pending_tickets: i64,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_resolution_days: Option<f64>,
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct MonthlyRow {
    /// `YYYY-MM`
    #[diesel(sql_type = Text)]
    pub month: String,
    #[diesel(sql_type = BigInt)]
    pub total_tickets: i64,
    #[diesel(sql_type = BigInt)]
    pub completed_tickets: i64,
    #[diesel(sql_type = Nullable<Double>)]
    pub avg_resolution_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum ReportData {
    Summary(Vec<SummaryRow>),
    ByUnit(Vec<UnitRow>),
    BySector(Vec<SectorRow>),
    ByTechnician(Vec<TechnicianRow>),
    Monthly(Vec<MonthlyRow>),
}

#[derive(QueryableByName, Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct UnitTicketCount {
    #[diesel(sql_type = Text)]
    pub unit_name: String,
    #[diesel(sql_type = BigInt)]
    pub ticket_count: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct DashboardStats {
    pub stats: StatusCounts,
    pub recent_tickets: Vec<TicketDetails>,
    pub unit_stats: Vec<UnitTicketCount>,
}

fn status_counts_select() -> String {
    "COUNT(*) AS total_tickets, \
     COALESCE(SUM(t.status = 'aberto'), 0) AS open_tickets, \
     COALESCE(SUM(t.status = 'em_andamento'), 0) AS in_progress_tickets, \
     COALESCE(SUM(t.status = 'aguardando_material'), 0) AS waiting_material_tickets, \
     COALESCE(SUM(t.status = 'concluido'), 0) AS completed_tickets"
        .to_string()
}

const COMPLETED_PENDING: &str = "COALESCE(SUM(t.status = 'concluido'), 0) AS completed_tickets, \
     COALESCE(SUM(t.status != 'concluido'), 0) AS pending_tickets";

fn load_filtered<T>(conn: &mut SqliteConnection, sql: String, range: DateRange) -> QueryResult<Vec<T>>
where
    T: QueryableByName<diesel::sqlite::Sqlite> + 'static,
{
    diesel::sql_query(sql)
        .bind::<Nullable<Timestamp>, _>(range.start)
        .bind::<Nullable<Timestamp>, _>(range.start)
        .bind::<Nullable<Timestamp>, _>(range.end)
        .bind::<Nullable<Timestamp>, _>(range.end)
        .load::<T>(conn)
}

/// Runs one report over the tickets created within `range`.
pub fn run_report(
    conn: &mut SqliteConnection,
    report_type: ReportType,
    range: DateRange,
) -> QueryResult<ReportData> {
    let data = match report_type {
        ReportType::Summary => ReportData::Summary(load_filtered(
            conn,
            format!(
                "SELECT {}, {RESOLUTION_DAYS} AS avg_resolution_days \
                 FROM tickets t WHERE {DATE_FILTER}",
                status_counts_select()
            ),
            range,
        )?),
        ReportType::ByUnit => ReportData::ByUnit(load_filtered(
            conn,
            format!(
                "SELECT u.name AS unit_name, COUNT(*) AS total_tickets, {COMPLETED_PENDING} \
                 FROM tickets t JOIN units u ON u.id = t.unit_id \
                 WHERE {DATE_FILTER} \
                 GROUP BY t.unit_id ORDER BY total_tickets DESC, u.name"
            ),
            range,
        )?),
        ReportType::BySector => ReportData::BySector(load_filtered(
            conn,
            format!(
                "SELECT s.name AS sector_name, u.name AS unit_name, COUNT(*) AS total_tickets, \
                 {COMPLETED_PENDING} \
                 FROM tickets t \
                 JOIN sectors s ON s.id = t.sector_id \
                 JOIN units u ON u.id = t.unit_id \
                 WHERE {DATE_FILTER} \
                 GROUP BY t.sector_id ORDER BY total_tickets DESC, u.name, s.name"
            ),
            range,
        )?),
        ReportType::ByTechnician => ReportData::ByTechnician(load_filtered(
            conn,
            format!(
                "SELECT u.name AS technician_name, COUNT(*) AS total_tickets, \
                 {COMPLETED_PENDING}, {RESOLUTION_DAYS} AS avg_resolution_days \
                 FROM tickets t JOIN users u ON u.id = t.assigned_to \
                 WHERE t.assigned_to IS NOT NULL AND {DATE_FILTER} \
                 GROUP BY t.assigned_to ORDER BY total_tickets DESC, u.name"
            ),
            range,
        )?),
        ReportType::Monthly => ReportData::Monthly(load_filtered(
            conn,
            format!(
                "SELECT strftime('%Y-%m', t.created_at) AS month, COUNT(*) AS total_tickets, \
                 COALESCE(SUM(t.status = 'concluido'), 0) AS completed_tickets, \
                 {RESOLUTION_DAYS} AS avg_resolution_days \
                 FROM tickets t WHERE {DATE_FILTER} \
                 GROUP BY month ORDER BY month DESC"
            ),
            range,
        )?),
    };
    Ok(data)
}

/// Status counts over all tickets, the newest tickets and the busiest units.
pub fn dashboard_stats(conn: &mut SqliteConnection) -> QueryResult<DashboardStats> {
    let stats = diesel::sql_query(format!(
        "SELECT {} FROM tickets t",
        status_counts_select()
    ))
    .get_result::<StatusCounts>(conn)?;

    let recent_tickets = list_ticket_details(conn, TicketScope::All, Some(DASHBOARD_RECENT))?;

    let unit_stats = diesel::sql_query(
        "SELECT u.name AS unit_name, COUNT(*) AS ticket_count \
         FROM tickets t JOIN units u ON u.id = t.unit_id \
         GROUP BY t.unit_id ORDER BY ticket_count DESC, u.name LIMIT ?",
    )
    .bind::<BigInt, _>(DASHBOARD_TOP_UNITS)
    .load::<UnitTicketCount>(conn)?;

    Ok(DashboardStats {
        stats,
        recent_tickets,
        unit_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, TicketStatus};
    use crate::orm::testing::{
        assign_test_ticket, insert_test_ticket, insert_test_user, setup_test_db,
    };
    use crate::orm::ticket::{TicketUpdate, update_ticket};

    fn complete(conn: &mut SqliteConnection, ticket_id: i32, actor: &crate::models::User) {
        update_ticket(
            conn,
            ticket_id,
            TicketUpdate {
                status: Some(TicketStatus::Concluido),
                assigned_to: None,
            },
            actor,
        )
        .unwrap();
    }

    #[test]
    fn summary_of_empty_database_is_all_zero() {
        let mut conn = setup_test_db();
        let ReportData::Summary(rows) =
            run_report(&mut conn, ReportType::Summary, DateRange::default()).unwrap()
        else {
            panic!("expected summary rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].counts.total_tickets, 0);
        assert_eq!(rows[0].counts.completed_tickets, 0);
        assert!(rows[0].avg_resolution_days.is_none());
    }

    #[test]
    fn summary_counts_statuses_and_resolution_time() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let done = insert_test_ticket(&mut conn, requester.id);
        insert_test_ticket(&mut conn, requester.id);
        complete(&mut conn, done.id, &tech);

        let ReportData::Summary(rows) =
            run_report(&mut conn, ReportType::Summary, DateRange::default()).unwrap()
        else {
            panic!("expected summary rows");
        };
        let row = &rows[0];
        assert_eq!(row.counts.total_tickets, 2);
        assert_eq!(row.counts.open_tickets, 1);
        assert_eq!(row.counts.completed_tickets, 1);
        let days = row.avg_resolution_days.unwrap();
        assert!((0.0..1.0).contains(&days));
    }

    #[test]
    fn date_range_excludes_tickets_outside_it() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        insert_test_ticket(&mut conn, requester.id);

        let past = DateRange::parse(Some("2000-01-01"), Some("2000-12-31")).unwrap();
        let ReportData::ByUnit(rows) = run_report(&mut conn, ReportType::ByUnit, past).unwrap()
        else {
            panic!("expected unit rows");
        };
        assert!(rows.is_empty());

        let open_ended = DateRange::parse(Some("2000-01-01"), None).unwrap();
        let ReportData::ByUnit(rows) =
            run_report(&mut conn, ReportType::ByUnit, open_ended).unwrap()
        else {
            panic!("expected unit rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].unit_name, "Unidade Central");
        assert_eq!(rows[0].pending_tickets, 1);
    }

    #[test]
    fn technician_report_only_counts_assigned_tickets() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        let tech = insert_test_user(&mut conn, "tech@example.com", "pw", Role::Tecnico);
        let first = insert_test_ticket(&mut conn, requester.id);
        insert_test_ticket(&mut conn, requester.id);
        assign_test_ticket(&mut conn, first.id, tech.id);
        complete(&mut conn, first.id, &tech);

        let ReportData::ByTechnician(rows) =
            run_report(&mut conn, ReportType::ByTechnician, DateRange::default()).unwrap()
        else {
            panic!("expected technician rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].technician_name, "tech");
        assert_eq!(rows[0].total_tickets, 1);
        assert_eq!(rows[0].completed_tickets, 1);
        assert_eq!(rows[0].pending_tickets, 0);
    }

    #[test]
    fn monthly_and_sector_reports_group_rows() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        insert_test_ticket(&mut conn, requester.id);
        insert_test_ticket(&mut conn, requester.id);

        let ReportData::Monthly(months) =
            run_report(&mut conn, ReportType::Monthly, DateRange::default()).unwrap()
        else {
            panic!("expected monthly rows");
        };
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].total_tickets, 2);
        assert_eq!(months[0].month.len(), 7);

        let ReportData::BySector(sectors) =
            run_report(&mut conn, ReportType::BySector, DateRange::default()).unwrap()
        else {
            panic!("expected sector rows");
        };
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors[0].sector_name, "Manutenção");
    }

    #[test]
    fn dashboard_limits_recent_tickets() {
        let mut conn = setup_test_db();
        let requester = insert_test_user(&mut conn, "req@example.com", "pw", Role::Solicitante);
        for _ in 0..7 {
            insert_test_ticket(&mut conn, requester.id);
        }

        let dashboard = dashboard_stats(&mut conn).unwrap();
        assert_eq!(dashboard.stats.total_tickets, 7);
        assert_eq!(dashboard.stats.open_tickets, 7);
        assert_eq!(dashboard.recent_tickets.len(), 5);
        assert_eq!(dashboard.unit_stats.len(), 1);
        assert_eq!(dashboard.unit_stats[0].ticket_count, 7);
    }

    #[test]
    fn date_only_end_covers_the_whole_day() {
        let range = DateRange::parse(Some("2025-03-01"), Some("2025-03-31")).unwrap();
        assert_eq!(range.start.unwrap().to_string(), "2025-03-01 00:00:00");
        assert_eq!(range.end.unwrap().to_string(), "2025-03-31 23:59:59.999999");
        assert!(DateRange::parse(Some("yesterday"), None).is_err());
    }

    #[test]
    fn report_types_parse_wire_names() {
        assert_eq!("by_technician".parse::<ReportType>(), Ok(ReportType::ByTechnician));
        assert!("weekly".parse::<ReportType>().is_err());
    }
}
