//! [`Notifier`]-related implementations.

#[cfg(any(test, feature = "memory"))]
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use common::operations::Dispatch;
use derive_more::Display;
use tracerr::Traced;
use tracing as log;

use crate::domain::Notification;

/// Notification delivery operation.
pub use common::Handler as Notifier;

/// [`Notifier`] error.
#[derive(Clone, Debug, Display, derive_more::Error)]
pub enum Error {
    /// [`Notification`] was not delivered.
    #[display("`Notification` delivery failed: {_0}")]
    Delivery(#[error(not(source))] String),
}

/// [`Notifier`] recording every [`Notification`] into the log.
///
/// Used until a mail transport is wired in.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Notifier<Dispatch<Notification>> for Log {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Dispatch(notification): Dispatch<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        let offer = match &notification {
            Notification::CalculationResult { offer, .. } => {
                offer.as_ref().map(|o| o.number.to_string())
            }
            Notification::OfferConfirmed { offer, .. }
            | Notification::AdminNotification { offer, .. } => {
                Some(offer.number.to_string())
            }
        };
        log::info!(
            kind = notification.kind(),
            recipient = %notification.recipient(),
            offer = offer.as_deref().unwrap_or("-"),
            "`Notification` dispatched",
        );
        Ok(())
    }
}

/// [`Notifier`] keeping every [`Notification`] in memory.
#[cfg(any(test, feature = "memory"))]
#[derive(Clone, Debug, Default)]
pub struct Memory {
    /// Delivered [`Notification`]s.
    sent: Arc<Mutex<Vec<Notification>>>,

    /// Indicator whether deliveries should fail.
    failing: Arc<AtomicBool>,
}

#[cfg(any(test, feature = "memory"))]
impl Memory {
    /// Returns all the [`Notification`]s delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes all further deliveries fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "memory"))]
impl Notifier<Dispatch<Notification>> for Memory {
    type Ok = ();
    type Err = Traced<Error>;

    async fn execute(
        &self,
        Dispatch(notification): Dispatch<Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(tracerr::new!(Error::Delivery(format!(
                "`{}` is unreachable",
                notification.recipient(),
            ))));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}
