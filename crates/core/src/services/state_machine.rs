//! Legal status transitions of requests and offers.
//!
//! Services never assign a status directly: they ask the event for the next
//! status given the current one, and surface the returned error unchanged.
//! A caller that lost a race sees the same error as one that arrived late.

use sawab_common::{AppError, AppResult};
use sawab_db::entities::{offer::OfferStatus, request::RequestStatus};

/// Events that move a request through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// An offer on an open request was accepted.
    AcceptOffer,
    /// The helper signals the work is done.
    MarkPending,
    /// The asker confirms completion.
    Complete,
    /// Staff complete the request, resolving a dispute if there is one.
    AdminComplete,
    /// The scheduler completes a request the asker never confirmed.
    AutoComplete,
    /// Asker or helper contest a pending completion.
    OpenDispute,
    /// The asker withdraws the request.
    Cancel,
    /// Staff withdraw the request.
    AdminCancel,
}

impl RequestEvent {
    /// Statuses the event may fire from.
    #[must_use]
    pub const fn allowed_from(self) -> &'static [RequestStatus] {
        use RequestStatus as S;
        match self {
            Self::AcceptOffer => &[S::Open],
            Self::MarkPending => &[S::InProgress],
            Self::Complete => &[S::InProgress, S::PendingCompletion],
            Self::AdminComplete => &[S::InProgress, S::PendingCompletion, S::Disputed],
            Self::AutoComplete | Self::OpenDispute => &[S::PendingCompletion],
            Self::Cancel => &[S::Open, S::InProgress, S::PendingCompletion],
            Self::AdminCancel => &[S::Open, S::InProgress, S::PendingCompletion, S::Disputed],
        }
    }

    /// Status reached when the event fires.
    #[must_use]
    pub const fn target(self) -> RequestStatus {
        match self {
            Self::AcceptOffer => RequestStatus::InProgress,
            Self::MarkPending => RequestStatus::PendingCompletion,
            Self::Complete | Self::AdminComplete | Self::AutoComplete => RequestStatus::Completed,
            Self::OpenDispute => RequestStatus::Disputed,
            Self::Cancel | Self::AdminCancel => RequestStatus::Cancelled,
        }
    }

    const fn rejection(self) -> &'static str {
        match self {
            Self::AcceptOffer => "Request is not open",
            Self::MarkPending => "Request is not in progress",
            Self::Complete | Self::AdminComplete | Self::AutoComplete => {
                "Request is already completed or cancelled"
            }
            Self::OpenDispute => "Request is not awaiting completion confirmation",
            Self::Cancel | Self::AdminCancel => "Request cannot be cancelled",
        }
    }

    /// Whether the event may fire from `from`.
    #[must_use]
    pub fn permits(self, from: RequestStatus) -> bool {
        self.allowed_from().contains(&from)
    }

    /// Next status, or the guard failure as [`AppError::InvalidState`].
    pub fn apply(self, from: RequestStatus) -> AppResult<RequestStatus> {
        if self.permits(from) {
            Ok(self.target())
        } else {
            Err(AppError::InvalidState(self.rejection().to_string()))
        }
    }
}

/// Transitions of an offer. Both end in a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferTransition {
    Accept,
    Reject,
}

impl OfferTransition {
    /// Status reached by the transition.
    #[must_use]
    pub const fn target(self) -> OfferStatus {
        match self {
            Self::Accept => OfferStatus::Accepted,
            Self::Reject => OfferStatus::Rejected,
        }
    }

    /// Next status; only pending offers move.
    pub fn apply(self, from: OfferStatus) -> AppResult<OfferStatus> {
        match from {
            OfferStatus::Pending => Ok(self.target()),
            OfferStatus::Accepted | OfferStatus::Rejected => Err(AppError::InvalidState(
                "Offer is no longer pending".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sawab_db::entities::request::RequestStatus as S;

    const ALL: [RequestStatus; 6] = [
        S::Open,
        S::InProgress,
        S::PendingCompletion,
        S::Disputed,
        S::Completed,
        S::Cancelled,
    ];

    #[test]
    fn test_happy_path() {
        let mut status = S::Open;
        for event in [
            RequestEvent::AcceptOffer,
            RequestEvent::MarkPending,
            RequestEvent::Complete,
        ] {
            status = event.apply(status).unwrap();
        }
        assert_eq!(status, S::Completed);
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        let events = [
            RequestEvent::AcceptOffer,
            RequestEvent::MarkPending,
            RequestEvent::Complete,
            RequestEvent::AdminComplete,
            RequestEvent::AutoComplete,
            RequestEvent::OpenDispute,
            RequestEvent::Cancel,
            RequestEvent::AdminCancel,
        ];
        for from in ALL.iter().copied().filter(|s| s.is_terminal()) {
            for event in events {
                assert!(event.apply(from).is_err(), "{event:?} from {from:?}");
            }
        }
    }

    #[test]
    fn test_dispute_only_resolved_by_staff() {
        assert!(!RequestEvent::Complete.permits(S::Disputed));
        assert!(!RequestEvent::AutoComplete.permits(S::Disputed));
        assert!(!RequestEvent::Cancel.permits(S::Disputed));
        assert_eq!(
            RequestEvent::AdminComplete.apply(S::Disputed).unwrap(),
            S::Completed
        );
        assert_eq!(
            RequestEvent::AdminCancel.apply(S::Disputed).unwrap(),
            S::Cancelled
        );
    }

    #[test]
    fn test_auto_complete_requires_pending_completion() {
        for from in ALL {
            assert_eq!(
                RequestEvent::AutoComplete.permits(from),
                from == S::PendingCompletion
            );
        }
    }

    #[test]
    fn test_accept_on_non_open_request_message() {
        let err = RequestEvent::AcceptOffer.apply(S::InProgress).unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(err.to_string(), "Request is not open");
    }

    #[test]
    fn test_offer_transitions() {
        assert_eq!(
            OfferTransition::Accept.apply(OfferStatus::Pending).unwrap(),
            OfferStatus::Accepted
        );
        assert_eq!(
            OfferTransition::Reject.apply(OfferStatus::Pending).unwrap(),
            OfferStatus::Rejected
        );
        assert!(OfferTransition::Accept.apply(OfferStatus::Rejected).is_err());
        assert!(OfferTransition::Reject.apply(OfferStatus::Accepted).is_err());
    }
}
