//! External service integrations.

pub mod bitrix_client {
    pub use crate::bitrix_client::*;
}

pub mod lead_store {
    pub use crate::lead_store::*;
}
