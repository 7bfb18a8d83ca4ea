pub mod calendar;
pub mod leave_request;
pub mod payslip;
pub mod role;
pub mod shift;
pub mod site;
pub mod worker;
