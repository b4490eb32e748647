//! In-memory [`Database`] implementation.
//!
//! Transactions are serializable: only one of them runs at a time, working
//! on its own copy of the [`State`] that replaces the shared one on
//! [`Commit`]. Dropping an uncommitted transaction discards its copy.

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use common::operations::{
    By, Commit, Delete, Insert, Lock, Select, Transact, Update,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        calculation::{self, Score},
        customer, discount_code, offer, pricing, property_type, renovation,
        Calculation, Customer, DiscountCode, FormulaSet, Offer, PropertyType,
    },
    infra::{database, Database},
};

/// Contents of a [`Memory`] database.
#[derive(Clone, Debug, Default)]
pub struct State {
    /// [`PropertyType`]s by their keys.
    pub property_types: BTreeMap<property_type::Key, PropertyType>,

    /// [`renovation::Category`]s.
    pub categories: Vec<renovation::Category>,

    /// [`renovation::ExtentWeights`] table.
    pub extent_weights: renovation::ExtentWeights,

    /// [`FormulaSet`]s by their [`Score`]s.
    pub formulas: HashMap<Score, FormulaSet>,

    /// Pricing catalogue [`pricing::Entry`]s by their keys.
    pub pricing: BTreeMap<pricing::Key, pricing::Entry>,

    /// [`DiscountCode`]s by their codes.
    pub discount_codes: BTreeMap<discount_code::Code, DiscountCode>,

    /// [`Calculation`]s by their IDs.
    pub calculations: HashMap<calculation::Id, Calculation>,

    /// [`Customer`]s by their IDs.
    pub customers: HashMap<customer::Id, Customer>,

    /// [`Offer`]s by their IDs.
    pub offers: HashMap<offer::Id, Offer>,
}

/// In-memory [`Database`] client.
#[derive(Clone, Debug)]
pub struct Memory<T = NonTx>(T);

impl Memory {
    /// Creates a new [`Memory`] database holding the provided [`State`].
    #[must_use]
    pub fn new(state: State) -> Self {
        Self(NonTx(Arc::new(Shared {
            gate: Arc::new(AsyncMutex::new(())),
            state: RwLock::new(state),
        })))
    }

    /// Returns a copy of the committed [`State`].
    #[must_use]
    pub fn snapshot(&self) -> State {
        self.0
             .0
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(State::default())
    }
}

/// [`State`] shared between all the clients of a [`Memory`] database.
#[derive(Debug)]
struct Shared {
    /// Gate serializing writers.
    gate: Arc<AsyncMutex<()>>,

    /// Committed [`State`].
    state: RwLock<State>,
}

/// Non-transactional [`Memory`] client.
#[derive(Clone, Debug)]
pub struct NonTx(Arc<Shared>);

/// Transactional [`Memory`] client.
#[derive(Clone, Debug)]
pub struct Tx(Arc<TxInner>);

/// Inner representation of a [`Tx`] client.
#[derive(Debug)]
struct TxInner {
    /// [`Shared`] state the transaction was started upon.
    shared: Arc<Shared>,

    /// Guard of the writers gate, held until committed or dropped.
    guard: Mutex<Option<OwnedMutexGuard<()>>>,

    /// Working copy of the [`State`].
    work: Mutex<State>,
}

/// Access to a [`State`] of a [`Memory`] client.
pub trait Access {
    /// Reads the [`State`] with the provided function.
    fn read<R>(&self, f: impl FnOnce(&State) -> R) -> impl Future<Output = R>;

    /// Modifies the [`State`] with the provided function.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> impl Future<Output = R>;
}

impl Access for NonTx {
    async fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.0.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    async fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let _gate = self.0.gate.lock().await;
        f(&mut self.0.state.write().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Access for Tx {
    async fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.0.work.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.0.work.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<C: Access> Memory<C> {
    /// Reads the [`State`] with the provided function.
    async fn read<R>(
        &self,
        f: impl FnOnce(&State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(self.0.read(f).await)
    }

    /// Modifies the [`State`] with the provided function.
    async fn write<R>(
        &self,
        f: impl FnOnce(&mut State) -> R,
    ) -> Result<R, Traced<database::Error>> {
        Ok(self.0.write(f).await)
    }
}

impl Database<Transact> for Memory<NonTx> {
    type Ok = Memory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        let shared = Arc::clone(&self.0 .0);
        let guard = Arc::clone(&shared.gate).lock_owned().await;
        let work = shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(Memory(Tx(Arc::new(TxInner {
            shared,
            guard: Mutex::new(Some(guard)),
            work: Mutex::new(work),
        }))))
    }
}

impl Database<Transact> for Memory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for Memory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        let inner = &self.0 .0;
        let Some(guard) = inner
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            // Already committed.
            return Ok(());
        };

        let work = inner.work.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .shared
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clone_from(&work);
        drop(work);
        drop(guard);
        Ok(())
    }
}

/// Implements [`Lock`]s as no-ops, since [`Tx`]s are serialized anyway.
macro_rules! impl_noop_lock {
    ($($w:ty => $b:ty),* $(,)?) => {$(
        impl<C: Access> Database<Lock<By<$w, $b>>> for Memory<C> {
            type Ok = ();
            type Err = Traced<database::Error>;

            async fn execute(
                &self,
                _: Lock<By<$w, $b>>,
            ) -> Result<Self::Ok, Self::Err> {
                Ok(())
            }
        }
    )*};
}

impl_noop_lock! {
    Offer => offer::Id,
    Offer => calculation::Id,
    offer::Number => calculation::Year,
    Customer => customer::Email,
}

impl<C: Access> Database<Select<By<Option<PropertyType>, property_type::Key>>>
    for Memory<C>
{
    type Ok = Option<PropertyType>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<PropertyType>, property_type::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        self.read(|s| s.property_types.get(&key).cloned()).await
    }
}

impl<C: Access> Database<Select<By<Vec<PropertyType>, ()>>> for Memory<C> {
    type Ok = Vec<PropertyType>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Vec<PropertyType>, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.read(|s| s.property_types.values().cloned().collect())
            .await
    }
}

impl<C: Access> Database<Update<PropertyType>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(pt): Update<PropertyType>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.property_types.insert(pt.key.clone(), pt)))
            .await
    }
}

impl<C: Access> Database<Select<By<Vec<renovation::Category>, ()>>>
    for Memory<C>
{
    type Ok = Vec<renovation::Category>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<Vec<renovation::Category>, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.read(|s| {
            let mut categories = s.categories.clone();
            categories.sort_by(|a, b| {
                a.sort_order.cmp(&b.sort_order).then(a.key.cmp(&b.key))
            });
            categories
        })
        .await
    }
}

impl<C: Access> Database<Select<By<renovation::ExtentWeights, ()>>>
    for Memory<C>
{
    type Ok = renovation::ExtentWeights;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        _: Select<By<renovation::ExtentWeights, ()>>,
    ) -> Result<Self::Ok, Self::Err> {
        self.read(|s| s.extent_weights.clone()).await
    }
}

impl<C: Access> Database<Select<By<Option<FormulaSet>, Score>>> for Memory<C> {
    type Ok = Option<FormulaSet>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<FormulaSet>, Score>>,
    ) -> Result<Self::Ok, Self::Err> {
        let score = by.into_inner();
        self.read(|s| s.formulas.get(&score).cloned()).await
    }
}

impl<C: Access> Database<Update<FormulaSet>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(formula): Update<FormulaSet>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.formulas.insert(formula.score, formula)))
            .await
    }
}

impl<C: Access> Database<Select<By<Option<pricing::Entry>, pricing::Key>>>
    for Memory<C>
{
    type Ok = Option<pricing::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<pricing::Entry>, pricing::Key>>,
    ) -> Result<Self::Ok, Self::Err> {
        let key = by.into_inner();
        self.read(|s| s.pricing.get(&key).cloned()).await
    }
}

impl<C: Access>
    Database<Select<By<Vec<pricing::Entry>, Option<pricing::Category>>>>
    for Memory<C>
{
    type Ok = Vec<pricing::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<pricing::Entry>, Option<pricing::Category>>>,
    ) -> Result<Self::Ok, Self::Err> {
        let category = by.into_inner();
        self.read(|s| {
            let mut entries = s
                .pricing
                .values()
                .filter(|e| category.as_ref().map_or(true, |c| e.category == *c))
                .cloned()
                .collect::<Vec<_>>();
            entries.sort_by(|a, b| {
                a.sort_order.cmp(&b.sort_order).then(a.key.cmp(&b.key))
            });
            entries
        })
        .await
    }
}

impl<C: Access> Database<Update<pricing::Entry>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(entry): Update<pricing::Entry>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.pricing.insert(entry.key.clone(), entry)))
            .await
    }
}

impl<C: Access>
    Database<Select<By<Option<DiscountCode>, discount_code::Code>>>
    for Memory<C>
{
    type Ok = Option<DiscountCode>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<DiscountCode>, discount_code::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        self.read(|s| s.discount_codes.get(&code).cloned()).await
    }
}

impl<C: Access> Database<Update<DiscountCode>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(code): Update<DiscountCode>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.discount_codes.insert(code.code.clone(), code)))
            .await
    }
}

impl<C: Access> Database<Delete<By<DiscountCode, discount_code::Code>>>
    for Memory<C>
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<DiscountCode, discount_code::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        self.write(|s| drop(s.discount_codes.remove(&code))).await
    }
}

impl<C: Access> Database<Insert<Calculation>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(calc): Insert<Calculation>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.calculations.insert(calc.id, calc)))
            .await
    }
}

impl<C: Access> Database<Select<By<Option<Calculation>, calculation::Id>>>
    for Memory<C>
{
    type Ok = Option<Calculation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Calculation>, calculation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.calculations.get(&id).cloned()).await
    }
}

impl<C: Access>
    Database<Select<By<Option<Calculation>, calculation::PublicRef>>>
    for Memory<C>
{
    type Ok = Option<Calculation>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Calculation>, calculation::PublicRef>>,
    ) -> Result<Self::Ok, Self::Err> {
        let public_ref = by.into_inner();
        self.read(|s| {
            s.calculations
                .values()
                .find(|c| c.public_ref == public_ref)
                .cloned()
        })
        .await
    }
}

impl<C: Access> Database<Select<By<Option<Customer>, customer::Id>>>
    for Memory<C>
{
    type Ok = Option<Customer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Customer>, customer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.customers.get(&id).cloned()).await
    }
}

impl<C: Access> Database<Select<By<Option<Customer>, customer::Email>>>
    for Memory<C>
{
    type Ok = Option<Customer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Customer>, customer::Email>>,
    ) -> Result<Self::Ok, Self::Err> {
        let email = by.into_inner();
        self.read(|s| {
            s.customers.values().find(|c| c.email == email).cloned()
        })
        .await
    }
}

impl<C: Access> Database<Update<Customer>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(customer): Update<Customer>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.customers.insert(customer.id, customer)))
            .await
    }
}

impl<C: Access> Database<Select<By<Option<Offer>, offer::Id>>> for Memory<C> {
    type Ok = Option<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Offer>, offer::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        self.read(|s| s.offers.get(&id).cloned()).await
    }
}

impl<C: Access> Database<Select<By<Option<Offer>, offer::ViewToken>>>
    for Memory<C>
{
    type Ok = Option<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Offer>, offer::ViewToken>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token = by.into_inner();
        self.read(|s| {
            s.offers.values().find(|o| o.view_token == token).cloned()
        })
        .await
    }
}

impl<C: Access> Database<Select<By<Option<Offer>, calculation::Id>>>
    for Memory<C>
{
    type Ok = Option<Offer>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Offer>, calculation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let calc_id = by.into_inner();
        self.read(|s| {
            s.offers
                .values()
                .find(|o| o.calculation_id == calc_id)
                .cloned()
        })
        .await
    }
}

impl<C: Access>
    Database<Select<By<Option<offer::Number>, calculation::Year>>>
    for Memory<C>
{
    type Ok = Option<offer::Number>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<offer::Number>, calculation::Year>>,
    ) -> Result<Self::Ok, Self::Err> {
        let year = by.into_inner();
        self.read(|s| {
            s.offers
                .values()
                .map(|o| o.number)
                .filter(|n| n.year() == year)
                .max()
        })
        .await
    }
}

impl<C: Access> Database<Update<Offer>> for Memory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(offer): Update<Offer>,
    ) -> Result<Self::Ok, Self::Err> {
        self.write(|s| drop(s.offers.insert(offer.id, offer))).await
    }
}

impl<C: Access>
    Database<Update<By<offer::Status, offer::ExpirationDateTime>>>
    for Memory<C>
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(by): Update<By<offer::Status, offer::ExpirationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        self.write(|s| {
            let mut expired = 0;
            for offer in s.offers.values_mut() {
                let due = offer.expires_at.is_some_and(|at| at <= deadline);
                if due && offer.is_modifiable() {
                    offer.status = offer::Status::Expired;
                    offer.updated_at = deadline.coerce();
                    expired += 1;
                }
            }
            expired
        })
        .await
    }
}
