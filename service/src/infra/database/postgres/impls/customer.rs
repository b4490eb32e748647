//! [`Customer`]-related [`Database`] implementations.

use common::operations::{By, Lock, Select, Update};
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{customer, Customer},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Decodes a [`Customer`] from the provided [`Row`].
fn customer(row: &Row) -> Customer {
    Customer {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        phone: row.get("phone"),
        billing: row.get::<_, Json<_>>("billing").0,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl<C> Database<Select<By<Option<Customer>, customer::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Customer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Customer>, customer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();

        const SQL: &str = "\
            SELECT id, email, name, phone, billing, created_at, updated_at \
            FROM customers \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(customer))
    }
}

impl<C> Database<Select<By<Option<Customer>, customer::Email>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Customer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Customer>, customer::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();

        const SQL: &str = "\
            SELECT id, email, name, phone, billing, created_at, updated_at \
            FROM customers \
            WHERE email = $1::TEXT";
        Ok(self
            .query_opt(SQL, &[&email])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(customer))
    }
}

impl<C> Database<Update<Customer>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(customer): Update<Customer>,
    ) -> Result<Self::Ok, Self::Err> {
        let Customer {
            id,
            email,
            name,
            phone,
            billing,
            created_at,
            updated_at,
        } = customer;

        const SQL: &str = "\
            INSERT INTO customers (\
                id, email, name, phone, billing, created_at, updated_at\
            ) \
            VALUES (\
                $1::UUID, $2::TEXT, $3::TEXT, $4::TEXT, $5::JSONB, \
                $6::TIMESTAMPTZ, $7::TIMESTAMPTZ\
            ) \
            ON CONFLICT (id) DO UPDATE \
            SET email = EXCLUDED.email, \
                name = EXCLUDED.name, \
                phone = EXCLUDED.phone, \
                billing = EXCLUDED.billing, \
                updated_at = EXCLUDED.updated_at";
        self.exec(
            SQL,
            &[
                &id,
                &email,
                &name,
                &phone,
                &Json(&billing),
                &created_at,
                &updated_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Customer, customer::Email>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Customer, customer::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();

        // `DO UPDATE` locks the row even if it exists already.
        const SQL: &str = "\
            INSERT INTO customers_lock (email) \
            VALUES ($1::TEXT) \
            ON CONFLICT (email) DO UPDATE \
            SET email = EXCLUDED.email";
        self.exec(SQL, &[&email])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
