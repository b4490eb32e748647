//! [`Command`] for deleting a [`DiscountCode`].

use common::operations::{By, Commit, Delete, Select, Transact, Transacted};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{discount_code, DiscountCode},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for deleting a [`DiscountCode`].
///
/// [`Offer`]s the code is already applied to keep their discount.
///
/// [`Offer`]: crate::domain::Offer
#[derive(Clone, Debug)]
pub struct DeleteDiscountCode {
    /// Code of the [`DiscountCode`] to delete.
    pub code: String,
}

impl<Db, Ntf> Command<DeleteDiscountCode> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Select<By<Option<DiscountCode>, discount_code::Code>>,
            Ok = Option<DiscountCode>,
            Err = Traced<database::Error>,
        > + Database<
            Delete<By<DiscountCode, discount_code::Code>>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = DiscountCode;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: DeleteDiscountCode,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let code = discount_code::Code::new(&cmd.code)
            .ok_or_else(|| E::DiscountCodeNotExists(cmd.code.clone()))
            .map_err(tracerr::wrap!())?;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let existing = tx
            .execute(Select(By::<Option<DiscountCode>, _>::new(code.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::DiscountCodeNotExists(cmd.code))
            .map_err(tracerr::wrap!())?;

        tx.execute(Delete(By::<DiscountCode, _>::new(code.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache().discount_codes.invalidate(&code).await;

        Ok(existing)
    }
}

/// Error of [`DeleteDiscountCode`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`DiscountCode`] with the provided code does not exist.
    #[display("`DiscountCode({_0})` does not exist")]
    DiscountCodeNotExists(#[error(not(source))] String),
}

#[cfg(test)]
mod spec {
    use common::Money;

    use crate::{
        command::{
            apply_offer_discount,
            spec::{reference, service},
            update_offer_package::spec::offer,
            ApplyOfferDiscount,
        },
        Command as _,
    };

    use super::{DeleteDiscountCode, ExecutionError};

    #[tokio::test]
    async fn deleted_code_is_no_longer_applicable() {
        let (svc, db, _) = service(reference());
        let offer = offer(&svc).await;
        let discounted = svc
            .execute(ApplyOfferDiscount {
                view_token: offer.view_token.clone(),
                code: Some("SAVE10".into()),
            })
            .await
            .unwrap();

        let deleted = svc
            .execute(DeleteDiscountCode {
                code: "save10".into(),
            })
            .await
            .unwrap();
        assert_eq!(deleted.code.to_string(), "SAVE10");
        assert_eq!(db.snapshot().discount_codes.len(), 1);
        assert_eq!(
            db.snapshot().offers[&offer.id].totals.net,
            discounted.totals.net,
        );
        assert_eq!(discounted.totals.net, Some(Money::eur(900)));

        let err = svc
            .execute(ApplyOfferDiscount {
                view_token: offer.view_token,
                code: Some("SAVE10".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            apply_offer_discount::ExecutionError::InvalidDiscountCode(_),
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_code() {
        let (svc, _, _) = service(reference());

        for code in ["MISSING", "kein code"] {
            let err = svc
                .execute(DeleteDiscountCode { code: code.into() })
                .await
                .unwrap_err();
            assert!(matches!(
                err.as_ref(),
                ExecutionError::DiscountCodeNotExists(c) if c == code,
            ));
        }
    }
}
