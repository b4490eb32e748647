//! [`Offer`]-related [`Database`] implementations.

use common::operations::{By, Lock, Select, Update};
use postgres_types::{Json, ToSql};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        calculation,
        offer::{self, Totals},
        Offer,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns of the `offers` table, in the order [`offer()`] expects them.
const COLUMNS: &str = "\
    id, number_year, number_seq, calculation_id, customer_id, view_token, \
    status, price_on_request, base_price, package, discount, vat_percent, \
    line_items, net_total, discount_amount, vat_amount, gross_total, \
    calculation_snapshot, input_snapshot, notes, \
    created_at, updated_at, sent_at, accepted_at, rejected_at, expires_at";

/// Decodes an [`Offer`] from the provided [`Row`].
fn offer(row: &Row) -> Offer {
    let number = offer::Number::new(
        row.get("number_year"),
        u32::try_from(row.get::<_, i64>("number_seq")).unwrap_or_default(),
    );
    Offer {
        id: row.get("id"),
        number,
        calculation_id: row.get("calculation_id"),
        customer_id: row.get("customer_id"),
        view_token: row.get("view_token"),
        status: row.get("status"),
        price_on_request: row.get("price_on_request"),
        base_price: row.get("base_price"),
        package: row.get::<_, Option<Json<_>>>("package").map(|j| j.0),
        discount: row.get::<_, Option<Json<_>>>("discount").map(|j| j.0),
        vat_percent: row.get("vat_percent"),
        line_items: row.get::<_, Json<_>>("line_items").0,
        totals: Totals {
            net: row.get("net_total"),
            discount: row.get("discount_amount"),
            vat: row.get("vat_amount"),
            gross: row.get("gross_total"),
        },
        calculation_snapshot: row.get::<_, Json<_>>("calculation_snapshot").0,
        input_snapshot: row.get::<_, Json<_>>("input_snapshot").0,
        notes: row.get("notes"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        sent_at: row.get("sent_at"),
        accepted_at: row.get("accepted_at"),
        rejected_at: row.get("rejected_at"),
        expires_at: row.get("expires_at"),
    }
}

/// Selects a single [`Offer`] matching the provided `condition`.
async fn select_one<C: Connection>(
    db: &Postgres<C>,
    condition: &str,
    param: &(dyn ToSql + Sync),
) -> Result<Option<Offer>, Traced<database::Error>> {
    let sql = format!("SELECT {COLUMNS} FROM offers WHERE {condition}");
    Ok(db
        .query_opt(sql.as_str(), &[param])
        .await
        .map_err(tracerr::wrap!())?
        .as_ref()
        .map(offer))
}

impl<C> Database<Select<By<Option<Offer>, offer::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Offer>, offer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        select_one(self, "id = $1::UUID", &id)
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<Offer>, offer::ViewToken>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Offer>, offer::ViewToken>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        select_one(self, "view_token = $1::TEXT", &token)
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<Offer>, calculation::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Offer>, calculation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let calculation_id = by.into_inner();
        select_one(self, "calculation_id = $1::UUID", &calculation_id)
            .await
            .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Option<offer::Number>, calculation::Year>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<offer::Number>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<offer::Number>, calculation::Year>>,
    ) -> Result<Self::Ok, Self::Err> {
        let year = by.into_inner();

        const SQL: &str = "\
            SELECT MAX(number_seq) AS seq \
            FROM offers \
            WHERE number_year = $1::INT4";
        Ok(self
            .query_opt(SQL, &[&year])
            .await
            .map_err(tracerr::wrap!())?
            .and_then(|row| row.get::<_, Option<i64>>("seq"))
            .and_then(|seq| u32::try_from(seq).ok())
            .map(|seq| offer::Number::new(year, seq)))
    }
}

impl<C> Database<Update<Offer>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(offer): Update<Offer>,
    ) -> Result<Self::Ok, Self::Err> {
        let Offer {
            id,
            number,
            calculation_id,
            customer_id,
            view_token,
            status,
            price_on_request,
            base_price,
            package,
            discount,
            vat_percent,
            line_items,
            totals,
            calculation_snapshot,
            input_snapshot,
            notes,
            created_at,
            updated_at,
            sent_at,
            accepted_at,
            rejected_at,
            expires_at,
        } = offer;
        let (number_year, number_seq) = (number.year(), i64::from(number.seq()));

        const SQL: &str = "\
            INSERT INTO offers (\
                id, number, number_year, number_seq, \
                calculation_id, customer_id, view_token, \
                status, price_on_request, base_price, \
                package, discount, vat_percent, line_items, \
                net_total, discount_amount, vat_amount, gross_total, \
                calculation_snapshot, input_snapshot, notes, \
                created_at, updated_at, \
                sent_at, accepted_at, rejected_at, expires_at\
            ) \
            VALUES (\
                $1::UUID, $2::TEXT, $3::INT4, $4::INT8, \
                $5::UUID, $6::UUID, $7::TEXT, \
                $8::INT2, $9::BOOLEAN, $10::INT8, \
                $11::JSONB, $12::JSONB, $13::NUMERIC, $14::JSONB, \
                $15::INT8, $16::INT8, $17::INT8, $18::INT8, \
                $19::JSONB, $20::JSONB, $21::TEXT, \
                $22::TIMESTAMPTZ, $23::TIMESTAMPTZ, \
                $24::TIMESTAMPTZ, $25::TIMESTAMPTZ, \
                $26::TIMESTAMPTZ, $27::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET customer_id = EXCLUDED.customer_id, \
                status = EXCLUDED.status, \
                price_on_request = EXCLUDED.price_on_request, \
                base_price = EXCLUDED.base_price, \
                package = EXCLUDED.package, \
                discount = EXCLUDED.discount, \
                vat_percent = EXCLUDED.vat_percent, \
                line_items = EXCLUDED.line_items, \
                net_total = EXCLUDED.net_total, \
                discount_amount = EXCLUDED.discount_amount, \
                vat_amount = EXCLUDED.vat_amount, \
                gross_total = EXCLUDED.gross_total, \
                calculation_snapshot = EXCLUDED.calculation_snapshot, \
                input_snapshot = EXCLUDED.input_snapshot, \
                notes = EXCLUDED.notes, \
                updated_at = EXCLUDED.updated_at, \
                sent_at = EXCLUDED.sent_at, \
                accepted_at = EXCLUDED.accepted_at, \
                rejected_at = EXCLUDED.rejected_at, \
                expires_at = EXCLUDED.expires_at";
        self.exec(
            SQL,
            &[
                &id,
                &number.to_string(),
                &number_year,
                &number_seq,
                &calculation_id,
                &customer_id,
                &view_token,
                &status,
                &price_on_request,
                &base_price,
                &package.as_ref().map(Json),
                &discount.as_ref().map(Json),
                &vat_percent,
                &Json(&line_items),
                &totals.net,
                &totals.discount,
                &totals.vat,
                &totals.gross,
                &Json(&calculation_snapshot),
                &Json(&input_snapshot),
                &notes,
                &created_at,
                &updated_at,
                &sent_at,
                &accepted_at,
                &rejected_at,
                &expires_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<By<offer::Status, offer::ExpirationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<offer::Status, offer::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        let (expired, open) = (
            offer::Status::Expired,
            [offer::Status::Draft, offer::Status::Sent],
        );

        const SQL: &str = "\
            UPDATE offers \
            SET status = $1::INT2, \
                updated_at = $2::TIMESTAMPTZ \
            WHERE expires_at <= $2::TIMESTAMPTZ \
              AND accepted_at IS NULL \
              AND status IN ($3::INT2, $4::INT2)";
        self.exec(SQL, &[&expired, &deadline, &open[0], &open[1]])
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Implements a [`Lock`] backed by an `INSERT` into the provided lock table.
macro_rules! impl_lock {
    ($($w:ty => $b:ty: $table:literal($column:literal, $cast:literal)),* $(,)?) => {$(
        impl<C> Database<Lock<By<$w, $b>>> for Postgres<C>
        where
            C: Connection,
        {
            type Ok = ();
            type Err = Traced<database::Error>;

            async fn execute(
                &self,
                Lock(by): Lock<By<$w, $b>>,
            ) -> Result<Self::Ok, Self::Err> {
                let key: $b = by.into_inner();

                const SQL: &str = concat!(
                    "INSERT INTO ", $table, " (", $column, ") ",
                    "VALUES ($1::", $cast, ") ",
                    "ON CONFLICT (", $column, ") DO UPDATE ",
                    "SET ", $column, " = EXCLUDED.", $column,
                );
                self.exec(SQL, &[&key])
                    .await
                    .map_err(tracerr::wrap!())
                    .map(drop)
            }
        }
    )*};
}

impl_lock! {
    Offer => offer::Id: "offers_lock"("id", "UUID"),
    Offer => calculation::Id:
        "offer_calculations_lock"("calculation_id", "UUID"),
    offer::Number => calculation::Year: "offer_numbers_lock"("year", "INT4"),
}
