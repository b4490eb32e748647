//! [`Command`] for creating or updating a [`PropertyType`].

use common::operations::{Commit, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{customer, PropertyType},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating or updating a [`PropertyType`].
#[derive(Clone, Debug)]
pub struct UpsertPropertyType(pub PropertyType);

impl<Db, Ntf> Command<UpsertPropertyType> for Service<Db, Ntf>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<Update<PropertyType>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = PropertyType;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        UpsertPropertyType(mut property_type): UpsertPropertyType,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        property_type.label = customer::non_blank(Some(property_type.label))
            .ok_or(E::EmptyLabel)
            .map_err(tracerr::wrap!())?;
        property_type.notes = customer::non_blank(property_type.notes);
        // Zero total useful life means none configured.
        property_type.gnd = property_type.gnd.filter(|g| *g > 0);

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Update(property_type.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let cache = self.cache();
        cache.property_types.invalidate(&property_type.key).await;
        cache.property_type_list.clear().await;

        Ok(property_type)
    }
}

/// Error of [`UpsertPropertyType`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`PropertyType`] label is blank.
    #[display("`PropertyType` label is empty")]
    EmptyLabel,
}

#[cfg(test)]
mod spec {
    use common::Money;

    use crate::{
        command::spec::{reference, service},
        domain::{property_type, PropertyType},
        Command as _,
    };

    use super::{ExecutionError, UpsertPropertyType};

    fn key(k: &str) -> property_type::Key {
        property_type::Key::new(k).unwrap()
    }

    #[tokio::test]
    async fn refreshes_cached_lookups() {
        let (svc, db, _) = service(reference());
        let before = svc
            .cached::<Option<PropertyType>, _>(key("einfamilienhaus"))
            .await
            .unwrap()
            .unwrap();
        let listed = svc.cached::<Vec<PropertyType>, _>(()).await.unwrap();
        assert_eq!(listed.len(), 3);

        let saved = svc
            .execute(UpsertPropertyType(PropertyType {
                label: " Einfamilienhaus (freistehend) ".into(),
                price_standard: Some(Money::eur(1200)),
                ..before
            }))
            .await
            .unwrap();
        drop(
            svc.execute(UpsertPropertyType(PropertyType {
                key: key("ferienhaus"),
                label: "Ferienhaus".into(),
                gnd: Some(0),
                price_standard: None,
                request_only: true,
                notes: None,
            }))
            .await
            .unwrap(),
        );

        let after = svc
            .cached::<Option<PropertyType>, _>(key("einfamilienhaus"))
            .await
            .unwrap();
        assert_eq!(after.as_ref(), Some(&saved));
        assert_eq!(saved.label, "Einfamilienhaus (freistehend)");
        let listed = svc.cached::<Vec<PropertyType>, _>(()).await.unwrap();
        assert_eq!(listed.len(), 4);
        assert_eq!(db.snapshot().property_types[&key("ferienhaus")].gnd, None);
    }

    #[tokio::test]
    async fn rejects_blank_label() {
        let (svc, db, _) = service(reference());

        let err = svc
            .execute(UpsertPropertyType(PropertyType {
                key: key("ferienhaus"),
                label: "  ".into(),
                gnd: Some(60),
                price_standard: None,
                request_only: true,
                notes: None,
            }))
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::EmptyLabel));
        assert_eq!(db.snapshot().property_types.len(), 3);
    }
}
