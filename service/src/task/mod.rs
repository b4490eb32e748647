//! Background [`Task`]s definitions.

mod background;
pub mod expire_offers;

pub use common::Handler as Task;

pub use self::{
    background::{Background, TaskFailed},
    expire_offers::ExpireOffers,
};
