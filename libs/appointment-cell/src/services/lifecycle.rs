// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentStatus, RejectionReason};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that an update moving `current_status` to `new_status` is allowed.
    /// Pending may stay Pending; a Completed or Cancelled record takes no updates at all.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), RejectionReason> {
        if current_status.is_terminal() {
            warn!("Update attempted on {} appointment", current_status);
            return Err(RejectionReason::TerminalStatusImmutable);
        }

        if current_status == new_status {
            return Ok(());
        }

        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(RejectionReason::TerminalStatusImmutable);
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Pending => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_pending_transitions() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_status_transition(Pending, Completed).is_ok());
        assert!(lifecycle.validate_status_transition(Pending, Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(Pending, Pending).is_ok());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let lifecycle = AppointmentLifecycleService::new();
        for terminal in [Completed, Cancelled] {
            for target in [Pending, Completed, Cancelled] {
                assert_eq!(
                    lifecycle.validate_status_transition(terminal, target),
                    Err(RejectionReason::TerminalStatusImmutable)
                );
            }
        }
    }
}
