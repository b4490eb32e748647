//! [`Query`] collection of cached reference data.

use common::operations::By;

use crate::domain::{
    calculation::Score, discount_code, pricing, property_type, renovation,
    DiscountCode, FormulaSet, PropertyType,
};
#[cfg(doc)]
use crate::Query;

use super::CachedQuery;

/// Queries a [`PropertyType`] by its [`property_type::Key`].
pub type PropertyTypeByKey =
    CachedQuery<By<Option<PropertyType>, property_type::Key>>;

/// Queries all the [`PropertyType`]s.
pub type PropertyTypes = CachedQuery<By<Vec<PropertyType>, ()>>;

/// Queries all the [`renovation::Category`]s.
pub type RenovationCategories = CachedQuery<By<Vec<renovation::Category>, ()>>;

/// Queries the [`renovation::ExtentWeights`].
pub type ExtentWeights = CachedQuery<By<renovation::ExtentWeights, ()>>;

/// Queries a [`FormulaSet`] by its [`Score`].
pub type FormulaByScore = CachedQuery<By<Option<FormulaSet>, Score>>;

/// Queries a [`pricing::Entry`] by its [`pricing::Key`].
pub type PricingEntryByKey =
    CachedQuery<By<Option<pricing::Entry>, pricing::Key>>;

/// Queries [`pricing::Entry`]s, optionally of a single [`pricing::Category`].
pub type PricingEntries =
    CachedQuery<By<Vec<pricing::Entry>, Option<pricing::Category>>>;

/// Queries a [`DiscountCode`] by its [`discount_code::Code`].
pub type DiscountCodeByCode =
    CachedQuery<By<Option<DiscountCode>, discount_code::Code>>;

#[cfg(test)]
mod spec {
    use std::collections::BTreeMap;

    use common::{operations::Update, Money};

    use crate::{
        domain::{property_type, PropertyType},
        infra::{database::memory::State, notifier, Database as _, Memory},
        Config, Query as _, Service,
    };

    use super::{PropertyTypeByKey, PropertyTypes};

    fn property_type(price: i64) -> PropertyType {
        PropertyType {
            key: property_type::Key::new("einfamilienhaus").unwrap(),
            label: "Einfamilienhaus".into(),
            gnd: Some(80),
            price_standard: Some(Money::eur(price)),
            request_only: false,
            notes: None,
        }
    }

    #[tokio::test]
    async fn serves_cached_until_invalidated() {
        let pt = property_type(1449);
        let db = Memory::new(State {
            property_types: BTreeMap::from([(pt.key.clone(), pt.clone())]),
            ..State::default()
        });
        let svc = Service::without_tasks(
            Config::default(),
            db.clone(),
            notifier::Memory::default(),
        );

        let found = svc
            .execute(PropertyTypeByKey::by(pt.key.clone()))
            .await
            .unwrap();
        assert_eq!(found, Some(pt.clone()));

        // Written behind the cache's back.
        db.execute(Update(property_type(1599))).await.unwrap();
        let stale = svc
            .execute(PropertyTypeByKey::by(pt.key.clone()))
            .await
            .unwrap();
        assert_eq!(stale.unwrap().price_standard, Some(Money::eur(1449)));

        svc.cache().property_types.invalidate(&pt.key).await;
        let fresh = svc
            .execute(PropertyTypeByKey::by(pt.key.clone()))
            .await
            .unwrap();
        assert_eq!(fresh.unwrap().price_standard, Some(Money::eur(1599)));

        let all = svc.execute(PropertyTypes::by(())).await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
