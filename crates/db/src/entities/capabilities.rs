//! Capabilities shared by several entities.
//!
//! Each entity opts in explicitly by implementing the trait.

use sea_orm::entity::prelude::*;

/// Something with a one-way unread to read transition.
pub trait Readable {
    /// When the record was read, if ever.
    fn read_at(&self) -> Option<DateTimeWithTimeZone>;

    /// Whether the record has been read.
    fn is_read(&self) -> bool {
        self.read_at().is_some()
    }

    /// Whether the record is still unread.
    fn is_unread(&self) -> bool {
        self.read_at().is_none()
    }
}

/// An entity with a status column that can be counted by value.
pub trait Statusable: EntityTrait {
    /// Status value type.
    type Status: Into<Value> + Copy + Send + Sync + 'static;

    /// The status column.
    fn status_column() -> Self::Column;
}

impl Statusable for super::request::Entity {
    type Status = super::request::RequestStatus;

    fn status_column() -> Self::Column {
        super::request::Column::Status
    }
}

impl Statusable for super::offer::Entity {
    type Status = super::offer::OfferStatus;

    fn status_column() -> Self::Column {
        super::offer::Column::Status
    }
}

impl Statusable for super::report::Entity {
    type Status = super::report::ReportStatus;

    fn status_column() -> Self::Column {
        super::report::Column::Status
    }
}
