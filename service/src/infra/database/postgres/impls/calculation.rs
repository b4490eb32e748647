//! [`Calculation`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        calculation::{self, Interval},
        Calculation,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `calculations` table, in the order [`calculation()`]
/// expects them.
const COLUMNS: &str = "\
    id, public_ref, property_type_key, gnd, \
    construction_year, acquisition_year, tax_year, determination_year, \
    age, score, score_details, inputs, trace, \
    rnd_years, rnd_min, rnd_max, afa_percent, recommendation, \
    created_at";

/// Decodes a [`Calculation`] from the provided [`Row`].
fn calculation(row: &Row) -> Calculation {
    let years = |col: &str| {
        row.get::<_, Option<i32>>(col)
            .and_then(|y| u16::try_from(y).ok())
    };
    let interval = years("rnd_min")
        .zip(years("rnd_max"))
        .map(|(min, max)| Interval { min, max });

    Calculation {
        id: row.get("id"),
        public_ref: row.get("public_ref"),
        property_type_key: row.get("property_type_key"),
        gnd: years("gnd").unwrap_or_default(),
        construction_year: row.get("construction_year"),
        acquisition_year: row.get("acquisition_year"),
        tax_year: row.get("tax_year"),
        determination_year: row.get("determination_year"),
        age: years("age").unwrap_or_default(),
        score: row.get("score"),
        score_details: row.get::<_, Json<_>>("score_details").0,
        inputs: row.get::<_, Json<_>>("inputs").0,
        trace: row.get::<_, Json<_>>("trace").0,
        rnd_years: row.get("rnd_years"),
        interval,
        afa_percent: row.get("afa_percent"),
        recommendation: row.get("recommendation"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Calculation>, calculation::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Calculation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Calculation>, calculation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        let sql = format!("SELECT {COLUMNS} FROM calculations WHERE id = $1::UUID");
        Ok(self
            .query_opt(sql.as_str(), &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(calculation))
    }
}

impl<C> Database<Select<By<Option<Calculation>, calculation::PublicRef>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Calculation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Calculation>, calculation::PublicRef>>,
    ) -> Result<Self::Ok, Self::Err> {
        let public_ref = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} FROM calculations WHERE public_ref = $1::TEXT",
        );
        Ok(self
            .query_opt(sql.as_str(), &[&public_ref])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(calculation))
    }
}

impl<C> Database<Insert<Calculation>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(calc): Insert<Calculation>,
    ) -> Result<Self::Ok, Self::Err> {
        let Calculation {
            id,
            public_ref,
            property_type_key,
            gnd,
            construction_year,
            acquisition_year,
            tax_year,
            determination_year,
            age,
            score,
            score_details,
            inputs,
            trace,
            rnd_years,
            interval,
            afa_percent,
            recommendation,
            created_at,
        } = calc;
        let (gnd, age) = (i32::from(gnd), i32::from(age));
        let rnd_min = interval.map(|i| i32::from(i.min));
        let rnd_max = interval.map(|i| i32::from(i.max));

        const SQL: &str = "\
            INSERT INTO calculations (\
                id, public_ref, property_type_key, gnd, \
                construction_year, acquisition_year, \
                tax_year, determination_year, \
                age, score, score_details, inputs, trace, \
                rnd_years, rnd_min, rnd_max, afa_percent, recommendation, \
                created_at\
            ) \
            VALUES (\
                $1::UUID, $2::TEXT, $3::TEXT, $4::INT4, \
                $5::INT4, $6::INT4, \
                $7::INT4, $8::INT4, \
                $9::INT4, $10::NUMERIC, $11::JSONB, $12::JSONB, $13::JSONB, \
                $14::NUMERIC, $15::INT4, $16::INT4, $17::NUMERIC, $18::INT2, \
                $19::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &public_ref,
                &property_type_key,
                &gnd,
                &construction_year,
                &acquisition_year,
                &tax_year,
                &determination_year,
                &age,
                &score,
                &Json(&score_details),
                &Json(&inputs),
                &Json(&trace),
                &rnd_years,
                &rnd_min,
                &rnd_max,
                &afa_percent,
                &recommendation,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
