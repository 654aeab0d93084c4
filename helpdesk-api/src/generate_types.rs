//! Writes TypeScript definitions for the API types.
//!
//! Output goes to `HELPDESK_TS_OUTPUT_DIR` when set, otherwise to
//! `../ts-bindings`. Stale `.ts` files are removed first so renamed types do
//! not linger.

#[cfg(test)]
mod tests {
    use std::{env, path::Path};

    use ts_rs::TS;

    #[test]
    fn generate_typescript_types() {
        let output_dir_str =
            env::var("HELPDESK_TS_OUTPUT_DIR").unwrap_or_else(|_| "../ts-bindings".to_string());
        let output_dir = Path::new(&output_dir_str);

        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir).expect("Failed to create output directory");
        }
        for entry in std::fs::read_dir(output_dir).expect("Failed to read output directory") {
            let path = entry.expect("Failed to read directory entry").path();
            if path.extension().and_then(|s| s.to_str()) == Some("ts") {
                std::fs::remove_file(&path)
                    .unwrap_or_else(|e| panic!("Failed to remove {:?}: {}", path, e));
            }
        }

        unsafe {
            env::set_var("TS_RS_EXPORT_DIR", output_dir);
        }

        use crate::api::{
            SuccessResponse,
            attachment::{AttachmentCreated, AttachmentList},
            auth::{AuthStatus, LoginRequest, LoginResponse},
            comment::{CommentCreated, CommentList, CommentRequest},
            notification::{MarkReadRequest, NotificationList},
            report::ReportResponse,
            status::ServiceStatus,
            technician::TechnicianList,
            ticket::{
                CreateTicketRequest, CreateTicketResponse, TicketList, TicketView,
                UpdateTicketRequest,
            },
            unit::{SectorList, UnitList},
        };
        use crate::models::*;
        use crate::orm::report::{DashboardStats, ReportData, ReportType};

        Role::export_all().expect("Failed to export Role type");
        PublicUser::export_all().expect("Failed to export PublicUser type");
        Technician::export_all().expect("Failed to export Technician type");
        Unit::export_all().expect("Failed to export Unit type");
        Sector::export_all().expect("Failed to export Sector type");
        TicketStatus::export_all().expect("Failed to export TicketStatus type");
        Ticket::export_all().expect("Failed to export Ticket type");
        TicketDetails::export_all().expect("Failed to export TicketDetails type");
        CommentView::export_all().expect("Failed to export CommentView type");
        AttachmentView::export_all().expect("Failed to export AttachmentView type");
        StatusHistoryView::export_all().expect("Failed to export StatusHistoryView type");
        NotificationType::export_all().expect("Failed to export NotificationType type");
        NotificationView::export_all().expect("Failed to export NotificationView type");

        SuccessResponse::export_all().expect("Failed to export SuccessResponse type");
        LoginRequest::export_all().expect("Failed to export LoginRequest type");
        LoginResponse::export_all().expect("Failed to export LoginResponse type");
        AuthStatus::export_all().expect("Failed to export AuthStatus type");
        TicketList::export_all().expect("Failed to export TicketList type");
        TicketView::export_all().expect("Failed to export TicketView type");
        CreateTicketRequest::export_all().expect("Failed to export CreateTicketRequest type");
        CreateTicketResponse::export_all().expect("Failed to export CreateTicketResponse type");
        UpdateTicketRequest::export_all().expect("Failed to export UpdateTicketRequest type");
        CommentRequest::export_all().expect("Failed to export CommentRequest type");
        CommentCreated::export_all().expect("Failed to export CommentCreated type");
        CommentList::export_all().expect("Failed to export CommentList type");
        AttachmentCreated::export_all().expect("Failed to export AttachmentCreated type");
        AttachmentList::export_all().expect("Failed to export AttachmentList type");
        UnitList::export_all().expect("Failed to export UnitList type");
        SectorList::export_all().expect("Failed to export SectorList type");
        TechnicianList::export_all().expect("Failed to export TechnicianList type");
        NotificationList::export_all().expect("Failed to export NotificationList type");
        MarkReadRequest::export_all().expect("Failed to export MarkReadRequest type");
        ReportType::export_all().expect("Failed to export ReportType type");
        ReportData::export_all().expect("Failed to export ReportData type");
        ReportResponse::export_all().expect("Failed to export ReportResponse type");
        DashboardStats::export_all().expect("Failed to export DashboardStats type");
        ServiceStatus::export_all().expect("Failed to export ServiceStatus type");

        println!("TypeScript types generated in {:?}", output_dir);
    }
}
