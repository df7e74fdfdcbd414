// Models module - Database entity representations

pub mod account;
pub mod event;
pub mod event_account;
pub mod event_service;
pub mod refresh_token;
pub mod scan;
pub mod service;
pub mod veteran;

pub use account::{Account, Role};
pub use event::Event;
pub use event_account::EventAccount;
pub use event_service::EventService;
pub use refresh_token::RefreshToken;
pub use scan::Scan;
pub use service::Service;
pub use veteran::{VerificationMethod, Veteran};
