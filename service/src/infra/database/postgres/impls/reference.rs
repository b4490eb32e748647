//! Reference data [`Database`] implementations.

use common::operations::{By, Delete, Select, Update};
use itertools::Itertools as _;
use rust_decimal::Decimal;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        calculation::Score, discount_code, pricing, property_type,
        renovation, DiscountCode, FormulaSet, PropertyType,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Decodes a [`PropertyType`] from the provided [`Row`].
fn property_type(row: &Row) -> PropertyType {
    PropertyType {
        key: row.get("key"),
        label: row.get("label"),
        gnd: row
            .get::<_, Option<i32>>("gnd")
            .and_then(|g| u16::try_from(g).ok()),
        price_standard: row.get("price_standard"),
        request_only: row.get("request_only"),
        notes: row.get("notes"),
    }
}

impl<C> Database<Select<By<Option<PropertyType>, property_type::Key>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<PropertyType>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<PropertyType>, property_type::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();

        const SQL: &str = "\
            SELECT key, label, gnd, price_standard, request_only, notes \
            FROM property_types \
            WHERE key = $1::TEXT";
        Ok(self
            .query_opt(SQL, &[&key])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(property_type))
    }
}

impl<C> Database<Select<By<Vec<PropertyType>, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<PropertyType>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Vec<PropertyType>, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT key, label, gnd, price_standard, request_only, notes \
            FROM property_types \
            ORDER BY key";
        Ok(self
            .query(SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(property_type)
            .collect())
    }
}

impl<C> Database<Update<PropertyType>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(pt): Update<PropertyType>,
    ) -> Result<Self::Ok, Self::Err> {
        let PropertyType {
            key,
            label,
            gnd,
            price_standard,
            request_only,
            notes,
        } = pt;
        let gnd = gnd.map(i32::from);

        const SQL: &str = "\
            INSERT INTO property_types (\
                key, label, gnd, price_standard, request_only, notes\
            ) \
            VALUES (\
                $1::TEXT, $2::TEXT, $3::INT4, \
                $4::INT8, $5::BOOLEAN, $6::TEXT\
            ) \
            ON CONFLICT (key) DO UPDATE \
            SET label = EXCLUDED.label, \
                gnd = EXCLUDED.gnd, \
                price_standard = EXCLUDED.price_standard, \
                request_only = EXCLUDED.request_only, \
                notes = EXCLUDED.notes";
        self.exec(
            SQL,
            &[&key, &label, &gnd, &price_standard, &request_only, &notes],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<renovation::Category>, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<renovation::Category>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Vec<renovation::Category>, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const FACTORS_SQL: &str = "\
            SELECT category_key, time_window, factor \
            FROM renovation_time_factors";
        let mut factors = self
            .query(FACTORS_SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let key: renovation::Key = row.get("category_key");
                let window: renovation::TimeWindow = row.get("time_window");
                let factor: Decimal = row.get("factor");
                (key, (window, factor))
            })
            .into_group_map();

        const SQL: &str = "\
            SELECT key, label, max_points, sort_order \
            FROM renovation_categories \
            ORDER BY sort_order, key";
        Ok(self
            .query(SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| {
                let key: renovation::Key = row.get("key");
                renovation::Category {
                    time_factors: factors
                        .remove(&key)
                        .unwrap_or_default()
                        .into_iter()
                        .collect(),
                    key,
                    label: row.get("label"),
                    max_points: row.get("max_points"),
                    sort_order: row.get("sort_order"),
                }
            })
            .collect())
    }
}

impl<C> Database<Select<By<renovation::ExtentWeights, ()>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = renovation::ExtentWeights;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<renovation::ExtentWeights, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            SELECT extent, weight \
            FROM extent_weights";
        Ok(self
            .query(SQL, &[])
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .filter_map(|row| {
                let extent = u8::try_from(row.get::<_, i16>("extent"))
                    .ok()
                    .and_then(renovation::Extent::new)?;
                Some((extent, row.get("weight")))
            })
            .collect())
    }
}

impl<C> Database<Select<By<Option<FormulaSet>, Score>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<FormulaSet>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<FormulaSet>, Score>>,
    ) -> Result<Self::Ok, Self::Err> {
        let score = by.into_inner();

        const SQL: &str = "\
            SELECT score, a, b, c, age_threshold, min_relative_age \
            FROM formula_sets \
            WHERE score = $1::NUMERIC";
        Ok(self
            .query_opt(SQL, &[&score])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| FormulaSet {
                score: row.get("score"),
                a: row.get("a"),
                b: row.get("b"),
                c: row.get("c"),
                age_threshold: row
                    .get::<_, Option<i32>>("age_threshold")
                    .and_then(|t| u16::try_from(t).ok()),
                min_relative_age: row.get("min_relative_age"),
            }))
    }
}

impl<C> Database<Update<FormulaSet>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(formula): Update<FormulaSet>,
    ) -> Result<Self::Ok, Self::Err> {
        let FormulaSet {
            score,
            a,
            b,
            c,
            age_threshold,
            min_relative_age,
        } = formula;
        let age_threshold = age_threshold.map(i32::from);

        const SQL: &str = "\
            INSERT INTO formula_sets (\
                score, a, b, c, age_threshold, min_relative_age\
            ) \
            VALUES (\
                $1::NUMERIC, $2::NUMERIC, $3::NUMERIC, $4::NUMERIC, \
                $5::INT4, $6::NUMERIC\
            ) \
            ON CONFLICT (score) DO UPDATE \
            SET a = EXCLUDED.a, \
                b = EXCLUDED.b, \
                c = EXCLUDED.c, \
                age_threshold = EXCLUDED.age_threshold, \
                min_relative_age = EXCLUDED.min_relative_age";
        self.exec(
            SQL,
            &[&score, &a, &b, &c, &age_threshold, &min_relative_age],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

/// Decodes a [`pricing::Entry`] from the provided [`Row`].
fn pricing_entry(row: &Row) -> pricing::Entry {
    pricing::Entry {
        key: row.get("key"),
        label: row.get("label"),
        category: row.get("category"),
        sort_order: row.get("sort_order"),
        price: row.get("price"),
    }
}

impl<C> Database<Select<By<Option<pricing::Entry>, pricing::Key>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<pricing::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<pricing::Entry>, pricing::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();

        const SQL: &str = "\
            SELECT key, label, category, sort_order, price \
            FROM pricing_entries \
            WHERE key = $1::TEXT";
        Ok(self
            .query_opt(SQL, &[&key])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(pricing_entry))
    }
}

impl<C> Database<Select<By<Vec<pricing::Entry>, Option<pricing::Category>>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<pricing::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<pricing::Entry>, Option<pricing::Category>>>,
    ) -> Result<Self::Ok, Self::Err> {
        let category = by.into_inner();

        const SQL: &str = "\
            SELECT key, label, category, sort_order, price \
            FROM pricing_entries \
            WHERE $1::TEXT IS NULL OR category = $1::TEXT \
            ORDER BY sort_order, key";
        Ok(self
            .query(SQL, &[&category])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(pricing_entry)
            .collect())
    }
}

impl<C> Database<Update<pricing::Entry>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(entry): Update<pricing::Entry>,
    ) -> Result<Self::Ok, Self::Err> {
        let pricing::Entry {
            key,
            label,
            category,
            sort_order,
            price,
        } = entry;

        const SQL: &str = "\
            INSERT INTO pricing_entries (\
                key, label, category, sort_order, price\
            ) \
            VALUES ($1::TEXT, $2::TEXT, $3::TEXT, $4::INT4, $5::INT8) \
            ON CONFLICT (key) DO UPDATE \
            SET label = EXCLUDED.label, \
                category = EXCLUDED.category, \
                sort_order = EXCLUDED.sort_order, \
                price = EXCLUDED.price";
        self.exec(SQL, &[&key, &label, &category, &sort_order, &price])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<Option<DiscountCode>, discount_code::Code>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<DiscountCode>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<DiscountCode>, discount_code::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();

        const SQL: &str = "\
            SELECT code, label, percent, is_active \
            FROM discount_codes \
            WHERE code = $1::TEXT";
        Ok(self
            .query_opt(SQL, &[&code])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| DiscountCode {
                code: row.get("code"),
                label: row.get("label"),
                percent: row.get("percent"),
                is_active: row.get("is_active"),
            }))
    }
}

impl<C> Database<Update<DiscountCode>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(dc): Update<DiscountCode>,
    ) -> Result<Self::Ok, Self::Err> {
        let DiscountCode {
            code,
            label,
            percent,
            is_active,
        } = dc;

        const SQL: &str = "\
            INSERT INTO discount_codes (code, label, percent, is_active) \
            VALUES ($1::TEXT, $2::TEXT, $3::NUMERIC, $4::BOOLEAN) \
            ON CONFLICT (code) DO UPDATE \
            SET label = EXCLUDED.label, \
                percent = EXCLUDED.percent, \
                is_active = EXCLUDED.is_active";
        self.exec(SQL, &[&code, &label, &percent, &is_active])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<DiscountCode, discount_code::Code>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<DiscountCode, discount_code::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();

        const SQL: &str = "\
            DELETE FROM discount_codes \
            WHERE code = $1::TEXT";
        self.exec(SQL, &[&code])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
