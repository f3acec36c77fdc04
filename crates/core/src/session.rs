use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{ConversationState, FlightOffer, SearchParams};

/// Per-conversation state. Fields are private so the only way to reach
/// `AwaitingPassengerDetails` is through [`SessionContext::select_offer`],
/// which always leaves a selection behind.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: Uuid,
    state: ConversationState,
    offers: Vec<FlightOffer>,
    selected: Option<FlightOffer>,
    last_search: Option<SearchParams>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: ConversationState::Idle,
            offers: Vec::new(),
            selected: None,
            last_search: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn offers(&self) -> &[FlightOffer] {
        &self.offers
    }

    pub fn selected(&self) -> Option<&FlightOffer> {
        self.selected.as_ref()
    }

    pub fn last_search(&self) -> Option<&SearchParams> {
        self.last_search.as_ref()
    }

    /// IDLE -> SEARCH_DONE. Replaces whatever a previous search cached.
    pub fn record_search(
        &mut self,
        params: SearchParams,
        offers: Vec<FlightOffer>,
    ) -> Result<(), CoreError> {
        if self.state != ConversationState::Idle {
            return Err(CoreError::InvalidTransition {
                state: self.state,
                action: "record a search",
            });
        }
        if offers.is_empty() {
            return Err(CoreError::NoOffers);
        }

        self.offers = offers;
        self.selected = None;
        self.last_search = Some(params);
        self.state = ConversationState::SearchDone;
        Ok(())
    }

    /// SEARCH_DONE -> AWAITING_PASSENGER_DETAILS. The index refers to the
    /// cached list as displayed, not to price order.
    pub fn select_offer(&mut self, index: usize) -> Result<&FlightOffer, CoreError> {
        if self.state != ConversationState::SearchDone {
            return Err(CoreError::InvalidTransition {
                state: self.state,
                action: "select an offer",
            });
        }
        let offer = self
            .offers
            .get(index)
            .cloned()
            .ok_or(CoreError::OfferOutOfRange {
                requested: index + 1,
                available: self.offers.len(),
            })?;

        self.state = ConversationState::AwaitingPassengerDetails;
        Ok(&*self.selected.insert(offer))
    }

    /// SEARCH_DONE -> IDLE, dropping the cached offers.
    pub fn decline(&mut self) -> Result<(), CoreError> {
        if self.state != ConversationState::SearchDone {
            return Err(CoreError::InvalidTransition {
                state: self.state,
                action: "decline offers",
            });
        }
        self.reset();
        Ok(())
    }

    /// AWAITING_PASSENGER_DETAILS -> IDLE once a booking attempt is over,
    /// whether it succeeded or not.
    pub fn finish_booking(&mut self) -> Result<(), CoreError> {
        if self.state != ConversationState::AwaitingPassengerDetails {
            return Err(CoreError::InvalidTransition {
                state: self.state,
                action: "finish a booking",
            });
        }
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.state = ConversationState::Idle;
        self.offers.clear();
        self.selected = None;
    }
}
