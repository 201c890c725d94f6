//! Turning matched establishment rows into CRM contact records.

mod municipalities;
mod record;

pub use self::municipalities::{DEFAULT_MUNICIPALITIES, Municipalities};
pub use self::record::{CONTACT_HEADER, ContactRecord, ContactTransformer, REQUIRED_COLUMNS};
