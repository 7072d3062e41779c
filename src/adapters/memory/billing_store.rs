//! In-memory billing store implementing every record port.
//!
//! Counts reads and writes so tests can assert that a request touched no
//! persistence at all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::billing::{CoursePurchase, Payment, Subscription};
use crate::domain::foundation::{
    CourseId, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{
    CourseCatalog, CoursePurchaseRepository, CourseSummary, PaymentRepository,
    SubscriptionRepository, UserAccessRepository, UserContact,
};

/// The user columns this service reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: Option<String>,
    pub email: String,
    pub access_expires_at: Option<Timestamp>,
    pub allowed_courses: Option<Vec<CourseId>>,
}

impl UserRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
            access_expires_at: None,
            allowed_courses: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_allowed_courses(mut self, courses: Vec<CourseId>) -> Self {
        self.allowed_courses = Some(courses);
        self
    }

    pub fn with_access_expires_at(mut self, expires_at: Timestamp) -> Self {
        self.access_expires_at = Some(expires_at);
        self
    }
}

/// In-memory implementation of the billing record ports.
///
/// Records are keyed by their id. Lookups by other keys scan.
#[derive(Default)]
pub struct InMemoryBillingStore {
    payments: RwLock<HashMap<String, Payment>>,
    subscriptions: RwLock<HashMap<String, Subscription>>,
    course_purchases: RwLock<HashMap<String, CoursePurchase>>,
    users: RwLock<HashMap<String, UserRecord>>,
    courses: RwLock<HashMap<String, CourseSummary>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Seeding ===

    pub fn insert_payment(&self, payment: Payment) {
        write_lock(&self.payments).insert(payment.id.to_string(), payment);
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        write_lock(&self.subscriptions).insert(subscription.id.to_string(), subscription);
    }

    pub fn insert_course_purchase(&self, purchase: CoursePurchase) {
        write_lock(&self.course_purchases).insert(purchase.id.to_string(), purchase);
    }

    pub fn insert_user(&self, user_id: &UserId, user: UserRecord) {
        write_lock(&self.users).insert(user_id.to_string(), user);
    }

    pub fn insert_course(&self, course_id: &CourseId, summary: CourseSummary) {
        write_lock(&self.courses).insert(course_id.to_string(), summary);
    }

    /// Makes every port call fail with a database error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    // === Inspection ===

    pub fn payment(&self, id: &str) -> Option<Payment> {
        read_lock(&self.payments).get(id).cloned()
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        read_lock(&self.subscriptions).get(id).cloned()
    }

    pub fn subscriptions_for_user(&self, user_id: &str) -> Vec<Subscription> {
        read_lock(&self.subscriptions)
            .values()
            .filter(|s| s.user_id.as_str() == user_id)
            .cloned()
            .collect()
    }

    pub fn course_purchase(&self, id: &str) -> Option<CoursePurchase> {
        read_lock(&self.course_purchases).get(id).cloned()
    }

    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        read_lock(&self.users).get(user_id).cloned()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Total number of port calls served, successful or not.
    pub fn persistence_calls(&self) -> usize {
        self.read_count() + self.write_count()
    }

    fn record_read(&self) -> Result<(), DomainError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }

    fn record_write(&self) -> Result<(), DomainError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::database("in-memory store unavailable"));
        }
        Ok(())
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl PaymentRepository for InMemoryBillingStore {
    async fn find_by_provider_id(&self, provider_id: &str) -> Result<Option<Payment>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.payments)
            .values()
            .find(|p| p.korvex_payment_id == provider_id)
            .cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Payment>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.payments)
            .values()
            .find(|p| p.korvex_identifier.as_deref() == Some(identifier))
            .cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<(), DomainError> {
        self.record_write()?;
        let mut payments = write_lock(&self.payments);
        match payments.get_mut(payment.id.as_str()) {
            Some(stored) => {
                *stored = payment.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::PaymentNotFound,
                format!("Payment {} not found", payment.id),
            )),
        }
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryBillingStore {
    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.subscriptions).get(id.as_str()).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Option<Subscription>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.subscriptions)
            .values()
            .find(|s| &s.user_id == user_id)
            .cloned())
    }

    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        self.record_write()?;
        let mut subscriptions = write_lock(&self.subscriptions);
        if subscriptions
            .values()
            .any(|s| s.user_id == subscription.user_id)
        {
            return Err(DomainError::new(
                ErrorCode::Conflict,
                format!("User {} already has a subscription", subscription.user_id),
            ));
        }
        subscriptions.insert(subscription.id.to_string(), subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        self.record_write()?;
        let mut subscriptions = write_lock(&self.subscriptions);
        match subscriptions.get_mut(subscription.id.as_str()) {
            Some(stored) => {
                *stored = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", subscription.id),
            )),
        }
    }
}

#[async_trait]
impl CoursePurchaseRepository for InMemoryBillingStore {
    async fn find_by_provider_id(
        &self,
        provider_id: &str,
    ) -> Result<Option<CoursePurchase>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.course_purchases)
            .values()
            .find(|p| p.korvex_payment_id == provider_id)
            .cloned())
    }

    async fn update(&self, purchase: &CoursePurchase) -> Result<(), DomainError> {
        self.record_write()?;
        let mut purchases = write_lock(&self.course_purchases);
        match purchases.get_mut(purchase.id.as_str()) {
            Some(stored) => {
                *stored = purchase.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::CoursePurchaseNotFound,
                format!("Course purchase {} not found", purchase.id),
            )),
        }
    }
}

#[async_trait]
impl UserAccessRepository for InMemoryBillingStore {
    async fn grant_subscription_access(
        &self,
        user_id: &UserId,
        expires_at: Timestamp,
    ) -> Result<(), DomainError> {
        self.record_write()?;
        let mut users = write_lock(&self.users);
        match users.get_mut(user_id.as_str()) {
            Some(user) => {
                user.access_expires_at = Some(expires_at);
                user.allowed_courses = None;
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::UserNotFound,
                format!("User {} not found", user_id),
            )),
        }
    }

    async fn find_contact(&self, user_id: &UserId) -> Result<Option<UserContact>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.users).get(user_id.as_str()).map(|u| UserContact {
            name: u.name.clone(),
            email: u.email.clone(),
        }))
    }
}

#[async_trait]
impl CourseCatalog for InMemoryBillingStore {
    async fn find_summary(&self, course_id: &CourseId) -> Result<Option<CourseSummary>, DomainError> {
        self.record_read()?;
        Ok(read_lock(&self.courses).get(course_id.as_str()).cloned())
    }
}
