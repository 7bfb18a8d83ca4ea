use crate::api::attendance::{ScanAction, ScanRequest, ScanResponse};
use crate::api::calendar::{CreateHoliday, MonthWorkingDays, SetWorkingDays, YearQuery};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::payroll::{
    GeneratePayslip, PaginatedPayslipResponse, PayrollQuery, PayslipPreview, PreviewQuery,
};
use crate::api::shifts::{ShiftDetail, ShiftFilter, ShiftListResponse, UpdateShiftTimes};
use crate::api::sites::{CreateSite, SiteQuery};
use crate::api::users::{CreateUser, CreatedUser};
use crate::api::workers::{CreateWorker, WorkerListResponse, WorkerQuery};
use crate::model::calendar::{PublicHoliday, WorkingDays};
use crate::model::leave_request::LeaveRequest;
use crate::model::payslip::PayslipRecord;
use crate::model::shift::{Break, Shift};
use crate::model::site::Site;
use crate::model::worker::Worker;
use crate::rules::geo::GeoPoint;
use crate::rules::hours::ShiftHours;
use crate::rules::leave::{LeaveStatus, LeaveType};
use crate::rules::payslip::{PayBasis, PayslipBreakdown, Residency};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Worksite HRM API",
        version = "1.0.0",
        description = r#"
## Worksite attendance, leave and payroll

Back end for a construction / facilities workforce that clocks in by
scanning a QR code posted at each work site.

### Key Features
- **Attendance (EVT)**
  - QR + GPS geofenced clock-in / clock-out, breaks, hour classification
- **Leave Management**
  - Annual, medical and unpaid leave with balances and approval flow
- **Payroll**
  - Monthly payslips with OT cap, Sun/PH pay, CPF, SINDA and SDL
- **Administration**
  - Workers, sites and QR tokens, public holidays, working days

### Security
Endpoints under `/api` require a **JWT Bearer** access token.
Roles: **admin**, **supervisor**, **worker**.

### Response Format
- JSON bodies; money and hours are decimal strings
- Errors are `{"message": "..."}`
- Pagination on list endpoints
"#,
    ),
    paths(
        crate::api::attendance::scan,
        crate::api::attendance::start_break,
        crate::api::attendance::end_break,
        crate::api::attendance::my_shifts,
        crate::api::attendance::open_shift,

        crate::api::shifts::list_shifts,
        crate::api::shifts::get_shift,
        crate::api::shifts::update_shift,
        crate::api::shifts::delete_shift,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::my_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::users::create_user,

        crate::api::workers::create_worker,
        crate::api::workers::list_workers,
        crate::api::workers::get_worker,
        crate::api::workers::update_worker,
        crate::api::workers::delete_worker,

        crate::api::sites::create_site,
        crate::api::sites::list_sites,
        crate::api::sites::get_site,
        crate::api::sites::update_site,
        crate::api::sites::rotate_token,
        crate::api::sites::delete_site,

        crate::api::calendar::list_holidays,
        crate::api::calendar::add_holiday,
        crate::api::calendar::delete_holiday,
        crate::api::calendar::list_working_days,
        crate::api::calendar::set_working_days,

        crate::api::payroll::preview_payslip,
        crate::api::payroll::generate_payslip,
        crate::api::payroll::list_payslips,
        crate::api::payroll::get_payslip,
        crate::api::payroll::my_payslips
    ),
    components(
        schemas(
            ScanRequest,
            ScanAction,
            ScanResponse,
            GeoPoint,
            ShiftHours,
            Shift,
            Break,
            ShiftFilter,
            ShiftDetail,
            ShiftListResponse,
            UpdateShiftTimes,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            CreateLeave,
            LeaveFilter,
            LeaveListResponse,
            Residency,
            PayBasis,
            CreateUser,
            CreatedUser,
            Worker,
            CreateWorker,
            WorkerQuery,
            WorkerListResponse,
            Site,
            CreateSite,
            SiteQuery,
            PublicHoliday,
            WorkingDays,
            CreateHoliday,
            SetWorkingDays,
            YearQuery,
            MonthWorkingDays,
            PayslipBreakdown,
            PayslipPreview,
            PayslipRecord,
            PreviewQuery,
            GeneratePayslip,
            PayrollQuery,
            PaginatedPayslipResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "QR scan clock-in/out and breaks"),
        (name = "Shifts", description = "Shift review and corrections"),
        (name = "Leave", description = "Leave requests and approvals"),
        (name = "Users", description = "Logins and roles"),
        (name = "Workers", description = "Worker profiles"),
        (name = "Sites", description = "Work sites, geofences and QR tokens"),
        (name = "Calendar", description = "Public holidays and working days"),
        (name = "Payroll", description = "Monthly payslips"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
