//! Equipment records and their files.
//!
//! Record mutations commit first; physical deletion of the files they
//! released runs afterwards as a detached best-effort task.

mod error;
mod service;
mod types;

pub use error::EquipmentError;
pub use service::{EquipmentRepository, EquipmentService};
pub use types::{CreateEquipmentInput, Equipment, FileRecord, NewFileRecord, UploadFileInput};
