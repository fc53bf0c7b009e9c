//! Role-membership rules.
//!
//! Roles are per patient: the coordinator who created it and the carers on
//! its roster. These checks are pure so handlers can load membership once
//! and decide without touching the database again.

use uuid::Uuid;

use super::ApiError;

/// Who may act on a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientAccess {
    pub coordinator_id: Uuid,
    pub carer_ids: Vec<Uuid>,
}

impl PatientAccess {
    #[must_use]
    pub fn is_coordinator(&self, user_id: Uuid) -> bool {
        self.coordinator_id == user_id
    }

    #[must_use]
    pub fn is_carer(&self, user_id: Uuid) -> bool {
        self.carer_ids.contains(&user_id)
    }

    /// Reading a patient or its shifts: coordinator or any rostered carer.
    ///
    /// # Errors
    /// [`ApiError::NotAuthorized`] for anyone else.
    pub fn require_read(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.is_coordinator(user_id) || self.is_carer(user_id) {
            Ok(())
        } else {
            Err(ApiError::NotAuthorized)
        }
    }

    /// Edits, deletion, roster changes, and scheduling.
    ///
    /// # Errors
    /// [`ApiError::NotAuthorized`] unless `user_id` is the coordinator.
    pub fn require_coordinator(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.is_coordinator(user_id) {
            Ok(())
        } else {
            Err(ApiError::NotAuthorized)
        }
    }
}

/// Who may act on a single shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftAccess {
    pub coordinator_id: Uuid,
    pub carer_id: Uuid,
}

impl ShiftAccess {
    /// # Errors
    /// [`ApiError::NotAuthorized`] unless `user_id` coordinates the shift's patient.
    pub fn require_coordinator(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.coordinator_id == user_id {
            Ok(())
        } else {
            Err(ApiError::NotAuthorized)
        }
    }

    /// Notes and incident reports come from the assigned carer only.
    ///
    /// # Errors
    /// [`ApiError::NotAuthorized`] for anyone else, the coordinator included.
    pub fn require_assigned_carer(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.carer_id == user_id {
            Ok(())
        } else {
            Err(ApiError::NotAuthorized)
        }
    }
}
