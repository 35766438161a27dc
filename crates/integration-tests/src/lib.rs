//! Integration tests for the MiBooks cart session.
//!
//! # Running Tests
//!
//! ```bash
//! # Session tests against the in-process fake service
//! cargo test -p mibooks-integration-tests
//!
//! # Live tests against a Magento instance
//! MAGENTO_GRAPHQL_URL=https://magento.test/graphql \
//!   cargo test -p mibooks-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_session` - Session behaviour against [`FakeCartService`]
//! - `cart_persistence` - Identifier survival across restarts
//! - `magento_live` - Live Magento round trips (ignored by default)
//!
//! [`FakeCartService`] keeps carts in memory and mimics the remote service:
//! it assigns line IDs, prices lines from a small catalog, and merges
//! same-SKU lines according to a configurable [`MergePolicy`]. Failures
//! can be injected per operation, and a `get-cart` response can be held
//! back to reorder responses.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mibooks_core::{CartId, CurrencyCode, LineItemId, Money, Quantity, Sku};
use mibooks_storefront::cart::{
    CartLineItem, CartService, CartSession, CartSnapshot, CustomerCart, MemoryIdentifierStore,
    MergedLineItem, ProductRef, ServiceError,
};
use tokio::sync::oneshot;

/// SKU of a $19.99 book in the fake catalog.
pub const FICTION_SKU: &str = "book-fiction-001";
/// SKU of a $12.50 book in the fake catalog.
pub const POETRY_SKU: &str = "book-poetry-002";
/// SKU of a $7.25 zine in the fake catalog.
pub const ZINE_SKU: &str = "zine-007";

/// How the fake service treats adding a SKU that is already in the cart.
///
/// Which behaviour a real service has is its own business; tests that
/// depend on it run under both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Increase the quantity of the existing line.
    MergeSameSku,
    /// Always create a new line.
    SeparateLines,
}

/// Operations failures can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    CreateCart,
    GetCart,
    AddItem,
    UpdateItem,
    RemoveItem,
    MergeCarts,
    GetCustomerCart,
}

/// Handle on a `get-cart` response that is held back.
///
/// `reached` fires once the held call has read the cart; the response is
/// returned only after `release` is sent (or dropped).
#[derive(Debug)]
pub struct HeldFetch {
    pub reached: oneshot::Receiver<()>,
    pub release: oneshot::Sender<()>,
}

struct Gate {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

#[derive(Debug, Clone)]
struct FakeLine {
    id: i32,
    sku: Sku,
    quantity: u32,
}

#[derive(Default)]
struct FakeState {
    carts: HashMap<CartId, Vec<FakeLine>>,
    next_cart: u32,
    next_line: i32,
    failures: HashMap<FakeOp, VecDeque<ServiceError>>,
    out_of_stock: HashSet<Sku>,
    customer_cart: Option<CartId>,
    held: VecDeque<Gate>,
}

/// In-memory stand-in for the remote cart service.
pub struct FakeCartService {
    policy: MergePolicy,
    catalog: HashMap<Sku, (String, i64)>,
    create_delay: Duration,
    state: Mutex<FakeState>,
    create_calls: AtomicUsize,
    get_cart_calls: AtomicUsize,
    merge_calls: AtomicUsize,
}

impl FakeCartService {
    /// A fake with the default catalog.
    #[must_use]
    pub fn new(policy: MergePolicy) -> Self {
        let catalog = [
            (FICTION_SKU, "Fiction Vol. 1", 1999),
            (POETRY_SKU, "Poetry Vol. 2", 1250),
            (ZINE_SKU, "Zine No. 7", 725),
        ]
        .into_iter()
        .filter_map(|(sku, name, cents)| Some((Sku::parse(sku).ok()?, (name.to_string(), cents))))
        .collect();

        Self {
            policy,
            catalog,
            create_delay: Duration::ZERO,
            state: Mutex::new(FakeState {
                next_line: 1,
                ..FakeState::default()
            }),
            create_calls: AtomicUsize::new(0),
            get_cart_calls: AtomicUsize::new(0),
            merge_calls: AtomicUsize::new(0),
        }
    }

    /// Make `create-cart` take `delay`, so concurrent callers overlap.
    #[must_use]
    pub const fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // =========================================================================
    // Server-side setup
    // =========================================================================

    /// Create a cart directly on the "server".
    pub fn seed_cart(&self, lines: &[(&str, u32)]) -> CartId {
        let mut state = self.state();
        let cart_id = Self::next_cart_id(&mut state);
        let mut cart = Vec::new();
        for (sku, quantity) in lines {
            if let Ok(sku) = Sku::parse(sku) {
                let id = state.next_line;
                state.next_line += 1;
                cart.push(FakeLine {
                    id,
                    sku,
                    quantity: *quantity,
                });
            }
        }
        state.carts.insert(cart_id.clone(), cart);
        cart_id
    }

    /// Register `cart_id` as the signed-in customer's cart.
    pub fn set_customer_cart(&self, cart_id: &CartId) {
        self.state().customer_cart = Some(cart_id.clone());
    }

    /// Reject adds of `sku` as out of stock.
    pub fn set_out_of_stock(&self, sku: &str) {
        if let Ok(sku) = Sku::parse(sku) {
            self.state().out_of_stock.insert(sku);
        }
    }

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: FakeOp, error: ServiceError) {
        self.state()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Hold back the response of the next `get-cart` call.
    pub fn hold_next_get_cart(&self) -> HeldFetch {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.state().held.push_back(Gate {
            reached: reached_tx,
            release: release_rx,
        });
        HeldFetch {
            reached: reached_rx,
            release: release_tx,
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// What `get-cart` would report for `cart_id` right now.
    pub fn server_snapshot(&self, cart_id: &CartId) -> Option<CartSnapshot> {
        let state = self.state();
        state.carts.get(cart_id).map(|lines| self.snapshot_of(lines))
    }

    /// Whether the server still has `cart_id`.
    pub fn has_cart(&self, cart_id: &CartId) -> bool {
        self.state().carts.contains_key(cart_id)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn get_cart_calls(&self) -> usize {
        self.get_cart_calls.load(Ordering::SeqCst)
    }

    pub fn merge_calls(&self) -> usize {
        self.merge_calls.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    #[allow(clippy::expect_used)]
    fn next_cart_id(state: &mut FakeState) -> CartId {
        state.next_cart += 1;
        CartId::parse(&format!("fake-cart-{}", state.next_cart))
            .expect("generated cart ids are never blank")
    }

    fn take_failure(&self, op: FakeOp) -> Result<(), ServiceError> {
        self.state()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .map_or(Ok(()), Err)
    }

    fn snapshot_of(&self, lines: &[FakeLine]) -> CartSnapshot {
        let mut total_cents = 0;
        let items = lines
            .iter()
            .filter_map(|line| {
                let (name, cents) = self.catalog.get(&line.sku)?;
                let quantity = Quantity::new(i64::from(line.quantity)).ok()?;
                let line_cents = cents * i64::from(line.quantity);
                total_cents += line_cents;
                Some(CartLineItem {
                    id: LineItemId::new(line.id),
                    product: ProductRef {
                        sku: line.sku.clone(),
                        name: name.clone(),
                        image: None,
                    },
                    quantity,
                    unit_price: Money::from_cents(*cents, CurrencyCode::USD),
                    line_total: Money::from_cents(line_cents, CurrencyCode::USD),
                })
            })
            .collect();

        CartSnapshot {
            items,
            grand_total: Money::from_cents(total_cents, CurrencyCode::USD),
        }
    }

    fn merge_line(&self, lines: &mut Vec<FakeLine>, next_line: &mut i32, sku: &Sku, quantity: u32) {
        if self.policy == MergePolicy::MergeSameSku
            && let Some(line) = lines.iter_mut().find(|line| &line.sku == sku)
        {
            line.quantity += quantity;
            return;
        }
        lines.push(FakeLine {
            id: *next_line,
            sku: sku.clone(),
            quantity,
        });
        *next_line += 1;
    }
}

fn not_found(cart_id: &CartId) -> ServiceError {
    ServiceError::NotFound(format!("Could not find a cart with ID \"{cart_id}\""))
}

#[async_trait]
impl CartService for FakeCartService {
    async fn create_cart(&self) -> Result<CartId, ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        self.take_failure(FakeOp::CreateCart)?;

        let mut state = self.state();
        let cart_id = Self::next_cart_id(&mut state);
        state.carts.insert(cart_id.clone(), Vec::new());
        Ok(cart_id)
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<CartSnapshot, ServiceError> {
        self.get_cart_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(FakeOp::GetCart)?;

        // Read first, then wait: a held response carries the state as of the call
        let (snapshot, gate) = {
            let mut state = self.state();
            let snapshot = state
                .carts
                .get(cart_id)
                .map(|lines| self.snapshot_of(lines))
                .ok_or_else(|| not_found(cart_id))?;
            (snapshot, state.held.pop_front())
        };

        if let Some(gate) = gate {
            let _ = gate.reached.send(());
            let _ = gate.release.await;
        }
        Ok(snapshot)
    }

    async fn add_item(
        &self,
        cart_id: &CartId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<(), ServiceError> {
        self.take_failure(FakeOp::AddItem)?;

        let mut state = self.state();
        if state.out_of_stock.contains(sku) || !self.catalog.contains_key(sku) {
            return Err(ServiceError::Rejected(format!(
                "Could not add the product with SKU {sku} to the shopping cart"
            )));
        }

        let FakeState {
            carts, next_line, ..
        } = &mut *state;
        let lines = carts.get_mut(cart_id).ok_or_else(|| not_found(cart_id))?;
        self.merge_line(lines, next_line, sku, quantity.get());
        Ok(())
    }

    async fn update_item_quantity(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
        quantity: Quantity,
    ) -> Result<(), ServiceError> {
        self.take_failure(FakeOp::UpdateItem)?;

        let mut state = self.state();
        let lines = state
            .carts
            .get_mut(cart_id)
            .ok_or_else(|| not_found(cart_id))?;
        let line = lines
            .iter_mut()
            .find(|line| line.id == line_item_id.as_i32())
            .ok_or_else(|| ServiceError::NotFound(format!("cart item {line_item_id}")))?;
        line.quantity = quantity.get();
        Ok(())
    }

    async fn remove_item(
        &self,
        cart_id: &CartId,
        line_item_id: LineItemId,
    ) -> Result<(), ServiceError> {
        self.take_failure(FakeOp::RemoveItem)?;

        let mut state = self.state();
        let lines = state
            .carts
            .get_mut(cart_id)
            .ok_or_else(|| not_found(cart_id))?;
        let before = lines.len();
        lines.retain(|line| line.id != line_item_id.as_i32());
        if lines.len() == before {
            return Err(ServiceError::NotFound(format!(
                "The cart doesn't contain the item {line_item_id}"
            )));
        }
        Ok(())
    }

    async fn merge_carts(
        &self,
        source: &CartId,
        destination: &CartId,
    ) -> Result<Vec<MergedLineItem>, ServiceError> {
        self.merge_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure(FakeOp::MergeCarts)?;

        let mut state = self.state();
        if !state.carts.contains_key(destination) {
            return Err(not_found(destination));
        }
        let moved = state.carts.remove(source).ok_or_else(|| not_found(source))?;

        let FakeState {
            carts, next_line, ..
        } = &mut *state;
        let lines = carts
            .get_mut(destination)
            .ok_or_else(|| not_found(destination))?;
        for line in moved {
            self.merge_line(lines, next_line, &line.sku, line.quantity);
        }

        Ok(lines
            .iter()
            .filter_map(|line| {
                Some(MergedLineItem {
                    id: LineItemId::new(line.id),
                    quantity: Quantity::new(i64::from(line.quantity)).ok()?,
                })
            })
            .collect())
    }

    async fn get_customer_cart(&self) -> Result<CustomerCart, ServiceError> {
        self.take_failure(FakeOp::GetCustomerCart)?;

        let state = self.state();
        let cart_id = state
            .customer_cart
            .clone()
            .ok_or_else(|| ServiceError::Unauthorized("customer token required".to_string()))?;
        let snapshot = state
            .carts
            .get(&cart_id)
            .map(|lines| self.snapshot_of(lines))
            .ok_or_else(|| not_found(&cart_id))?;
        Ok(CustomerCart {
            id: cart_id,
            snapshot,
        })
    }
}

/// Parse a SKU from the fake catalog.
///
/// # Panics
///
/// Panics if `sku` is not a valid SKU.
#[must_use]
#[allow(clippy::expect_used)]
pub fn sku(sku: &str) -> Sku {
    Sku::parse(sku).expect("valid test SKU")
}

/// Shorthand for a quantity in tests.
///
/// # Panics
///
/// Panics if `count` is out of range.
#[must_use]
#[allow(clippy::expect_used)]
pub fn qty(count: i64) -> Quantity {
    Quantity::new(count).expect("valid test quantity")
}

/// A session over `service` and `store`.
#[must_use]
pub fn new_session(
    service: &Arc<FakeCartService>,
    store: &Arc<MemoryIdentifierStore>,
) -> CartSession {
    CartSession::new(service.clone(), store.clone())
}
