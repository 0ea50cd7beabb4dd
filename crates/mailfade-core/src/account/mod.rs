//! Account management: model types and storage.

mod model;
mod repository;

pub use model::{Account, AccountId};
pub use repository::AccountRepository;
