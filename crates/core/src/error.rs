use thiserror::Error;

use crate::models::ConversationState;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("cannot {action} while in state {state}")]
    InvalidTransition {
        state: ConversationState,
        action: &'static str,
    },
    #[error("a search must return at least one offer")]
    NoOffers,
    #[error("option {requested} does not exist, {available} options are available")]
    OfferOutOfRange { requested: usize, available: usize },
}
