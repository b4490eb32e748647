//! [`Command`] for creating or updating a [`FormulaSet`].

use common::operations::{Commit, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::FormulaSet,
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating or updating a [`FormulaSet`] of a renovation
/// score.
#[derive(Clone, Debug)]
pub struct UpsertFormulaSet(pub FormulaSet);

impl<Db, Ntf> Command<UpsertFormulaSet> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Update<FormulaSet>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = FormulaSet;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        UpsertFormulaSet(formula): UpsertFormulaSet,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Update(formula.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        self.cache().formulas.invalidate(&formula.score).await;

        Ok(formula)
    }
}

/// Error of [`UpsertFormulaSet`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use rust_decimal::Decimal;

    use crate::{
        command::{
            calculate_rnd::spec::calibrated,
            spec::{reference, service},
        },
        domain::{calculation::estimate, FormulaSet},
        Command as _,
    };

    use super::UpsertFormulaSet;

    #[tokio::test]
    async fn next_calculation_uses_new_coefficients() {
        let (svc, _, _) = service(reference());
        let before = svc.execute(calibrated()).await.unwrap().calculation;
        assert_eq!(before.rnd_years, Decimal::new(2875, 2));

        let formula = estimate::spec::calibrated_formula();
        drop(
            svc.execute(UpsertFormulaSet(FormulaSet {
                a: None,
                ..formula.clone()
            }))
            .await
            .unwrap(),
        );

        let cached = svc
            .cached::<Option<FormulaSet>, _>(formula.score)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.a, None);

        // Straight line once a coefficient is missing.
        let after = svc.execute(calibrated()).await.unwrap();
        assert_eq!(after.calculation.rnd_years, Decimal::from(5));
        assert!(after.calculation.trace.formula.is_some_and(|f| f.a.is_none()));
        assert!(after.offer.is_none());
    }
}
