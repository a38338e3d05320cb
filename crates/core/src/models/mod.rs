//! Data models for the hostel core

mod calendar_year;
mod hostel;
mod money;
mod payment;
mod resident;
mod room;

pub use calendar_year::*;
pub use hostel::*;
pub use money::*;
pub use payment::*;
pub use resident::*;
pub use room::*;
