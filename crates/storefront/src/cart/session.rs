//! Cart session manager.
//!
//! [`CartSession`] mediates between consumers and the remote cart service:
//!
//! - resolves the cart identifier once (store lookup, else create-cart) and
//!   shares that resolution between concurrent callers
//! - serializes mutations per session and re-fetches the full cart after each
//! - commits fetched snapshots by ticket, so a slow response issued earlier
//!   never overwrites one issued later
//!
//! Lock order is `serial` before `cart_id`; initialization takes only `cart_id`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use mibooks_core::{CartId, LineItemId, Quantity, QuantityError, Sku};
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument};

use super::snapshot::CartSnapshot;
use super::store::{CART_ID_KEY, IdentifierStore};
use super::{CartService, ServiceError};
use crate::error::{CartError, Result};

/// Lifecycle state of a [`CartSession`].
///
/// Failures are not a resting state: the failing call returns the error and
/// the session is back in `Ready` (or `Uninitialized`) afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No cart identifier resolved yet.
    Uninitialized,
    /// Identifier lookup or create-cart in flight.
    Initializing,
    /// Identifier resolved, nothing pending.
    Ready,
    /// A mutating operation is in flight.
    Mutating,
}

/// Committed session state, as published to subscribers.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Active cart identifier.
    pub cart_id: Option<CartId>,
    /// Last committed snapshot.
    pub snapshot: CartSnapshot,
    /// When `snapshot` was committed.
    pub synced_at: Option<DateTime<Utc>>,
    ticket: u64,
}

/// Client-side cart session.
///
/// Cheap to clone; all clones share one session. Construct one per
/// storefront session and hand clones to consumers.
#[derive(Clone)]
pub struct CartSession {
    inner: Arc<CartSessionInner>,
}

struct CartSessionInner {
    service: Arc<dyn CartService>,
    store: Arc<dyn IdentifierStore>,
    /// Resolved identifier. Held for the whole of initialization and merges.
    cart_id: Mutex<Option<CartId>>,
    /// Serializes remote mutations (FIFO).
    serial: Mutex<()>,
    /// Last ticket handed out.
    tickets: AtomicU64,
    in_flight: AtomicUsize,
    initializing: AtomicBool,
    view: watch::Sender<SessionView>,
}

enum Mutation<'a> {
    Add { sku: &'a Sku, quantity: Quantity },
    SetQuantity { line_item_id: LineItemId, quantity: Quantity },
    Remove { line_item_id: LineItemId },
}

/// Keeps the in-flight counter raised for as long as it lives.
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Initializing<'a>(&'a AtomicBool);

impl<'a> Initializing<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Initializing<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CartSession {
    /// Create a session. Nothing is resolved until [`CartSession::ensure_cart`]
    /// (or [`CartSession::initialize`]) runs.
    #[must_use]
    pub fn new(service: Arc<dyn CartService>, store: Arc<dyn IdentifierStore>) -> Self {
        let (view, _) = watch::channel(SessionView {
            cart_id: None,
            snapshot: CartSnapshot::default(),
            synced_at: None,
            ticket: 0,
        });

        Self {
            inner: Arc::new(CartSessionInner {
                service,
                store,
                cart_id: Mutex::new(None),
                serial: Mutex::new(()),
                tickets: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                initializing: AtomicBool::new(false),
                view,
            }),
        }
    }

    // =========================================================================
    // Read accessors (never block)
    // =========================================================================

    /// The last committed snapshot. Empty until the first fetch completes.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.view.borrow().snapshot.clone()
    }

    /// The active cart identifier, if resolved.
    #[must_use]
    pub fn cart_id(&self) -> Option<CartId> {
        self.inner.view.borrow().cart_id.clone()
    }

    /// When the current snapshot was committed.
    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.inner.view.borrow().synced_at
    }

    /// Whether a mutating operation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.inner.initializing.load(Ordering::SeqCst) {
            SessionState::Initializing
        } else if self.inner.view.borrow().cart_id.is_none() {
            SessionState::Uninitialized
        } else if self.is_loading() {
            SessionState::Mutating
        } else {
            SessionState::Ready
        }
    }

    /// Subscribe to committed changes (identifier and snapshot).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    // =========================================================================
    // Identifier lifecycle
    // =========================================================================

    /// Return the active cart identifier, creating a cart if none exists.
    ///
    /// Concurrent callers share a single resolution: at most one create-cart
    /// call is made.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Initialization`] if create-cart fails and
    /// [`CartError::Storage`] if the identifier cannot be read or persisted.
    /// Nothing is adopted on failure; the next call retries.
    #[instrument(skip(self))]
    pub async fn ensure_cart(&self) -> Result<CartId> {
        let mut slot = self.inner.cart_id.lock().await;
        if let Some(cart_id) = slot.as_ref() {
            return Ok(cart_id.clone());
        }

        let cart_id = {
            let _initializing = Initializing::enter(&self.inner.initializing);
            self.resolve_cart_id().await?
        };

        *slot = Some(cart_id.clone());
        self.publish_cart_id(&cart_id);
        debug!(cart_id = %cart_id, "Cart identifier resolved");
        Ok(cart_id)
    }

    /// Resolve the identifier and load the cart.
    ///
    /// # Errors
    ///
    /// Returns any error from [`CartSession::ensure_cart`], or
    /// [`CartError::Refresh`] if the first fetch fails.
    pub async fn initialize(&self) -> Result<CartSnapshot> {
        self.ensure_cart().await?;
        self.refresh().await
    }

    async fn resolve_cart_id(&self) -> Result<CartId> {
        if let Some(cart_id) = self.stored_cart_id().await? {
            debug!(cart_id = %cart_id, "Using stored cart identifier");
            return Ok(cart_id);
        }

        let cart_id = self
            .inner
            .service
            .create_cart()
            .await
            .map_err(CartError::Initialization)?;
        self.inner.store.set(CART_ID_KEY, cart_id.as_str()).await?;
        debug!(cart_id = %cart_id, "Created cart");
        Ok(cart_id)
    }

    async fn stored_cart_id(&self) -> Result<Option<CartId>> {
        let Some(stored) = self.inner.store.get(CART_ID_KEY).await? else {
            return Ok(None);
        };
        match CartId::parse(&stored) {
            Ok(cart_id) => Ok(Some(cart_id)),
            Err(e) => {
                debug!(error = %e, "Ignoring unusable stored cart identifier");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `sku`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoCart`] if no identifier is resolved,
    /// [`CartError::Mutation`] if the service rejects the change (the
    /// snapshot is left untouched), or [`CartError::Refresh`] if the change
    /// was applied but the follow-up fetch failed.
    #[instrument(skip_all, fields(sku = %sku, quantity = %quantity))]
    pub async fn add_item(&self, sku: Sku, quantity: Quantity) -> Result<()> {
        self.mutate(Mutation::Add {
            sku: &sku,
            quantity,
        })
        .await
    }

    /// Set the quantity of a line item, then refresh.
    ///
    /// # Errors
    ///
    /// Same as [`CartSession::add_item`].
    #[instrument(skip_all, fields(line_item_id = %line_item_id, quantity = %quantity))]
    pub async fn update_item_quantity(
        &self,
        line_item_id: LineItemId,
        quantity: Quantity,
    ) -> Result<()> {
        self.mutate(Mutation::SetQuantity {
            line_item_id,
            quantity,
        })
        .await
    }

    /// Remove a line item, then refresh.
    ///
    /// Removing a line the service no longer has succeeds.
    ///
    /// # Errors
    ///
    /// Same as [`CartSession::add_item`].
    #[instrument(skip_all, fields(line_item_id = %line_item_id))]
    pub async fn remove_item(&self, line_item_id: LineItemId) -> Result<()> {
        self.mutate(Mutation::Remove { line_item_id }).await
    }

    /// Set a line item to a raw requested count.
    ///
    /// Counts of 1 or more update the line; counts of 0 or below remove it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if the count exceeds
    /// [`Quantity::MAX`], otherwise the errors of the routed operation.
    pub async fn set_item_quantity(&self, line_item_id: LineItemId, requested: i64) -> Result<()> {
        match Quantity::new(requested) {
            Ok(quantity) => self.update_item_quantity(line_item_id, quantity).await,
            Err(QuantityError::NotPositive(_)) => self.remove_item(line_item_id).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn mutate(&self, mutation: Mutation<'_>) -> Result<()> {
        let _busy = Busy::enter(&self.inner.in_flight);

        let (cart_id, ticket) = {
            let _serial = self.inner.serial.lock().await;
            let cart_id = self.resolved_cart_id().await?;
            self.apply(&cart_id, mutation)
                .await
                .map_err(CartError::Mutation)?;
            (cart_id, self.issue_ticket())
        };

        self.fetch_and_commit(&cart_id, ticket).await
    }

    async fn apply(
        &self,
        cart_id: &CartId,
        mutation: Mutation<'_>,
    ) -> std::result::Result<(), ServiceError> {
        let service = &self.inner.service;
        match mutation {
            Mutation::Add { sku, quantity } => service.add_item(cart_id, sku, quantity).await,
            Mutation::SetQuantity {
                line_item_id,
                quantity,
            } => {
                service
                    .update_item_quantity(cart_id, line_item_id, quantity)
                    .await
            }
            Mutation::Remove { line_item_id } => {
                match service.remove_item(cart_id, line_item_id).await {
                    Err(ServiceError::NotFound(reason)) => {
                        debug!(%reason, "Line item already absent");
                        Ok(())
                    }
                    other => other,
                }
            }
        }
    }

    async fn resolved_cart_id(&self) -> Result<CartId> {
        self.inner
            .cart_id
            .lock()
            .await
            .clone()
            .ok_or(CartError::NoCart)
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Merge `source` into `destination` and make `destination` the active cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Merge`] if the service fails; the active
    /// identifier is then unchanged. Returns [`CartError::Storage`] if the
    /// merge succeeded but `destination` could not be persisted; the session
    /// already uses `destination` in that case and its snapshot has been
    /// refreshed.
    #[instrument(skip_all, fields(source = %source, destination = %destination))]
    pub async fn merge_carts(&self, source: &CartId, destination: &CartId) -> Result<CartId> {
        let _busy = Busy::enter(&self.inner.in_flight);

        let (ticket, persisted) = {
            let _serial = self.inner.serial.lock().await;
            let mut slot = self.inner.cart_id.lock().await;
            self.merge_remote(source, destination).await?;
            let persisted = self.adopt(&mut slot, destination).await;
            (self.issue_ticket(), persisted)
        };

        let refreshed = self.fetch_and_commit(destination, ticket).await;
        persisted?;
        refreshed?;
        Ok(destination.clone())
    }

    /// Switch to the signed-in customer's cart.
    ///
    /// An anonymous cart (active, or found in the store) that differs from
    /// the customer's cart is merged into it. Otherwise the customer's cart
    /// is adopted as is. Either way its identifier becomes active and is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Merge`] if the customer cart lookup or the merge
    /// fails, and [`CartError::Storage`] if the store cannot be used. A
    /// failed write of the customer's identifier is reported only after the
    /// session has switched to that cart and refreshed its snapshot.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<CartId> {
        let _busy = Busy::enter(&self.inner.in_flight);

        let (customer_id, ticket, fetched, persisted) = {
            let _serial = self.inner.serial.lock().await;
            let customer = self
                .inner
                .service
                .get_customer_cart()
                .await
                .map_err(CartError::Merge)?;

            let mut slot = self.inner.cart_id.lock().await;
            let anonymous = match slot.clone() {
                Some(cart_id) => Some(cart_id),
                None => self.stored_cart_id().await?,
            };

            let fetched = match anonymous {
                Some(anonymous) if anonymous != customer.id => {
                    self.merge_remote(&anonymous, &customer.id).await?;
                    None
                }
                _ => Some(customer.snapshot),
            };
            let persisted = self.adopt(&mut slot, &customer.id).await;
            (customer.id, self.issue_ticket(), fetched, persisted)
        };

        let refreshed = match fetched {
            Some(snapshot) => {
                self.commit(ticket, snapshot);
                Ok(())
            }
            None => self.fetch_and_commit(&customer_id, ticket).await,
        };
        persisted?;
        refreshed?;
        Ok(customer_id)
    }

    async fn merge_remote(&self, source: &CartId, destination: &CartId) -> Result<()> {
        let merged = self
            .inner
            .service
            .merge_carts(source, destination)
            .await
            .map_err(CartError::Merge)?;
        debug!(lines = merged.len(), "Carts merged");
        Ok(())
    }

    /// Make `cart_id` active, then persist it. The session keeps using
    /// `cart_id` even when the write fails.
    async fn adopt(&self, slot: &mut Option<CartId>, cart_id: &CartId) -> Result<()> {
        *slot = Some(cart_id.clone());
        self.publish_cart_id(cart_id);
        self.inner.store.set(CART_ID_KEY, cart_id.as_str()).await?;
        Ok(())
    }

    // =========================================================================
    // Snapshot commits
    // =========================================================================

    /// Re-fetch the cart and commit it.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NoCart`] if no identifier is resolved and
    /// [`CartError::Refresh`] if the fetch fails.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CartSnapshot> {
        let cart_id = self.resolved_cart_id().await?;
        let ticket = self.issue_ticket();
        self.fetch_and_commit(&cart_id, ticket).await?;
        Ok(self.snapshot())
    }

    fn issue_ticket(&self) -> u64 {
        self.inner.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn fetch_and_commit(&self, cart_id: &CartId, ticket: u64) -> Result<()> {
        let snapshot = self
            .inner
            .service
            .get_cart(cart_id)
            .await
            .map_err(CartError::Refresh)?;
        self.commit(ticket, snapshot);
        Ok(())
    }

    /// Commit `snapshot` unless a later-issued fetch already has.
    fn commit(&self, ticket: u64, snapshot: CartSnapshot) -> bool {
        self.inner.view.send_if_modified(|view| {
            if ticket <= view.ticket {
                debug!(ticket, committed = view.ticket, "Discarding stale cart snapshot");
                return false;
            }
            view.ticket = ticket;
            view.snapshot = snapshot;
            view.synced_at = Some(Utc::now());
            true
        })
    }

    fn publish_cart_id(&self, cart_id: &CartId) {
        self.inner.view.send_if_modified(|view| {
            if view.cart_id.as_ref() == Some(cart_id) {
                return false;
            }
            view.cart_id = Some(cart_id.clone());
            true
        });
    }
}

impl std::fmt::Debug for CartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession")
            .field("cart_id", &self.cart_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
