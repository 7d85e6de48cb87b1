//! Decide whether an inbound message is actionable and which handler gets it.
//!
//! Rule precedence (first rule that fires fixes the outcome):
//! 1. Self-message suppression
//! 2. Legacy (v2) content whitelist
//! 3. Attachment gate
//! 4. Admin gate
//! 5. Experimental override
//! 6. Membership-change filter
//! 7. Command trigger
//! 8. Tag trigger
//! 9. Otherwise rejected

pub mod context;
pub mod validity;

pub use {
    context::{GroupRoles, SessionContext},
    validity::{Route, Rule, Verdict, evaluate},
};
