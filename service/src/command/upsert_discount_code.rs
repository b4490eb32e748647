//! [`Command`] for creating or updating a [`DiscountCode`].

use common::{
    operations::{Commit, Transact, Transacted, Update},
    Percent,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{customer, discount_code, DiscountCode},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating or updating a [`DiscountCode`].
#[derive(Clone, Debug)]
pub struct UpsertDiscountCode {
    /// Code customers enter, normalized to uppercase.
    pub code: String,

    /// Human-readable label.
    pub label: Option<String>,

    /// Discount in percent, within `1..=100`.
    pub percent: Decimal,

    /// Indicator whether the code may be applied.
    pub is_active: bool,
}

impl<Db, Ntf> Command<UpsertDiscountCode> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Update<DiscountCode>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = DiscountCode;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpsertDiscountCode,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpsertDiscountCode {
            code,
            label,
            percent,
            is_active,
        } = cmd;

        let code = discount_code::Code::new(&code)
            .ok_or(E::InvalidCode(code))
            .map_err(tracerr::wrap!())?;
        let percent = Percent::new(percent)
            .filter(|p| DiscountCode::is_valid_percent(*p))
            .ok_or(E::InvalidPercent(percent))
            .map_err(tracerr::wrap!())?;
        let discount_code = DiscountCode {
            code,
            label: customer::non_blank(label),
            percent,
            is_active,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Update(discount_code.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache()
            .discount_codes
            .invalidate(&discount_code.code)
            .await;

        Ok(discount_code)
    }
}

/// Error of [`UpsertDiscountCode`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Code has an invalid format.
    #[display("Invalid discount code: {_0}")]
    InvalidCode(#[error(not(source))] String),

    /// Percent is out of the `1..=100` range.
    #[display("Invalid discount percent: {_0}")]
    InvalidPercent(#[error(not(source))] Decimal),
}

#[cfg(test)]
mod spec {
    use common::Money;
    use rust_decimal::Decimal;

    use crate::{
        command::{
            spec::{reference, service},
            update_offer_package::spec::offer,
            ApplyOfferDiscount,
        },
        domain::{discount_code, DiscountCode},
        Command as _,
    };

    use super::{ExecutionError, UpsertDiscountCode};

    fn upsert(code: &str, percent: i64, is_active: bool) -> UpsertDiscountCode {
        UpsertDiscountCode {
            code: code.into(),
            label: Some(" Sommeraktion ".into()),
            percent: Decimal::from(percent),
            is_active,
        }
    }

    #[tokio::test]
    async fn activates_code_for_offers() {
        let (svc, _, _) = service(reference());
        let offer = offer(&svc).await;
        let code = discount_code::Code::new("OLD20").unwrap();
        let cached = svc
            .cached::<Option<DiscountCode>, _>(code.clone())
            .await
            .unwrap();
        assert!(!cached.unwrap().is_active);

        let saved = svc.execute(upsert("old20", 20, true)).await.unwrap();
        assert_eq!(saved.code, code);
        assert_eq!(saved.label.as_deref(), Some("Sommeraktion"));

        let discounted = svc
            .execute(ApplyOfferDiscount {
                view_token: offer.view_token,
                code: Some("OLD20".into()),
            })
            .await
            .unwrap();
        assert_eq!(discounted.totals.net, Some(Money::eur(800)));
    }

    #[tokio::test]
    async fn rejects_invalid_code() {
        let (svc, db, _) = service(reference());

        for (cmd, percent) in [
            (upsert("SUMMER", 0, true), true),
            (upsert("SUMMER", 101, true), true),
            (upsert("mit leerzeichen", 10, true), false),
            (upsert("", 10, true), false),
        ] {
            let err = svc.execute(cmd).await.unwrap_err();
            if percent {
                assert!(matches!(
                    err.as_ref(),
                    ExecutionError::InvalidPercent(_),
                ));
            } else {
                assert!(matches!(err.as_ref(), ExecutionError::InvalidCode(_)));
            }
        }
        assert_eq!(db.snapshot().discount_codes.len(), 2);
    }
}
