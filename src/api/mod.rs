pub mod attendance;
pub mod calendar;
pub mod leave_request;
pub mod payroll;
pub mod shifts;
pub mod sites;
pub mod users;
pub mod workers;
