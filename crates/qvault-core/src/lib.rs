pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use error::{QvaultError, QvaultResult};
pub use session::{Session, TransportSecurity};
pub use types::{BatchMode, Profile, RecordKind, SelectedItem, Selection, TransferRecord};
