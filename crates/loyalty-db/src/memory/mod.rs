//! In-memory store
//!
//! Implements every repository trait over one mutex-guarded state, so each
//! call is a single critical section. Used by service tests, the HTTP
//! integration tests, and local runs without a database.

mod ledger;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::instrument;

use loyalty_core::entities::{
    Event, EventUpdate, NewEvent, NewPromotion, NewUser, Promotion, PromotionUpdate, Transaction,
    User, UserSummary, UserUpdate,
};
use loyalty_core::error::DomainError;
use loyalty_core::traits::{
    EventQuery, EventRepository, PromotionQuery, PromotionRepository, RepoResult, UserQuery,
    UserRepository,
};
use loyalty_core::value_objects::{EventId, PromotionId, Role, TransactionId, UserId, Utorid};

#[derive(Debug, Clone, Default)]
struct State {
    users: BTreeMap<UserId, User>,
    password_hashes: HashMap<UserId, String>,
    promotions: BTreeMap<PromotionId, Promotion>,
    usages: HashSet<(UserId, PromotionId)>,
    events: BTreeMap<EventId, Event>,
    transactions: BTreeMap<TransactionId, Transaction>,
    last_id: i64,
}

impl State {
    /// Ids are drawn from one sequence; uniqueness per table is all callers rely on
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn user_by_utorid(&self, utorid: &Utorid) -> Option<&User> {
        self.users.values().find(|u| &u.utorid == utorid)
    }

    fn user_mut(&mut self, id: UserId) -> RepoResult<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))
    }

    fn summary(&self, user_id: UserId) -> RepoResult<UserSummary> {
        self.users
            .get(&user_id)
            .map(|u| UserSummary {
                id: u.id,
                utorid: u.utorid.clone(),
                name: u.name.clone(),
            })
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))
    }

    fn event_mut(&mut self, id: EventId) -> RepoResult<&mut Event> {
        self.events.get_mut(&id).ok_or(DomainError::EventNotFound(id))
    }

    fn check_user_unique(&self, id: Option<UserId>, utorid: &Utorid, email: &str) -> RepoResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != id) {
            if &user.utorid == utorid {
                return Err(DomainError::UtoridAlreadyExists);
            }
            if user.email.eq_ignore_ascii_case(email) {
                return Err(DomainError::EmailAlreadyExists);
            }
        }
        Ok(())
    }
}

fn page<T>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .skip(usize::try_from(offset).unwrap_or(0))
        .take(usize::try_from(limit).unwrap_or(0))
        .collect()
}

fn count<T>(items: impl Iterator<Item = T>) -> i64 {
    i64::try_from(items.count()).unwrap_or(i64::MAX)
}

/// In-memory implementation of all four repositories
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a verified account with the given role. Registration never
    /// grants staff roles, so tests and local runs bootstrap staff here.
    pub fn seed_user(&self, utorid: &str, name: &str, role: Role) -> RepoResult<User> {
        let utorid =
            Utorid::new(utorid).map_err(|e| DomainError::ValidationError(e.to_string()))?;
        let email = format!("{utorid}@mail.utoronto.ca");

        let mut state = self.state.lock();
        state.check_user_unique(None, &utorid, &email)?;
        let id = UserId::new(state.next_id());
        let user = User {
            id,
            utorid,
            name: name.to_string(),
            email,
            birthday: None,
            role,
            points: 0,
            verified: true,
            suspicious: false,
            reset_token: None,
            reset_expires_at: None,
            created_at: Utc::now(),
            last_login: None,
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    /// Snapshot of every ledger row, oldest first
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().transactions.values().cloned().collect()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn find_by_utorid(&self, utorid: &Utorid) -> RepoResult<Option<User>> {
        Ok(self.state.lock().user_by_utorid(utorid).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn search_utorids(&self, needle: &str) -> RepoResult<Vec<Utorid>> {
        let needle = needle.to_lowercase();
        let mut found: Vec<Utorid> = self
            .state
            .lock()
            .users
            .values()
            .filter(|u| {
                u.utorid.as_str().to_lowercase().contains(&needle)
                    || u.name.to_lowercase().contains(&needle)
            })
            .map(|u| u.utorid.clone())
            .collect();
        found.sort();
        Ok(found)
    }

    async fn list(&self, query: &UserQuery) -> RepoResult<Vec<User>> {
        let state = self.state.lock();
        let matching = state.users.values().filter(|u| query.matches(u));
        Ok(page(matching.cloned(), query.limit, query.offset))
    }

    async fn count(&self, query: &UserQuery) -> RepoResult<i64> {
        let state = self.state.lock();
        Ok(count(state.users.values().filter(|u| query.matches(u))))
    }

    async fn find_by_reset_token(&self, token: &str) -> RepoResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .users
            .values()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    #[instrument(skip(self, user), fields(utorid = %user.utorid))]
    async fn create(&self, user: &NewUser) -> RepoResult<User> {
        let mut state = self.state.lock();
        state.check_user_unique(None, &user.utorid, &user.email)?;
        let id = UserId::new(state.next_id());
        let created = User {
            id,
            utorid: user.utorid.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            birthday: None,
            role: Role::Regular,
            points: 0,
            verified: false,
            suspicious: false,
            reset_token: Some(user.reset_token.clone()),
            reset_expires_at: Some(user.reset_expires_at),
            created_at: Utc::now(),
            last_login: None,
        };
        state.users.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: UserId, update: &UserUpdate) -> RepoResult<User> {
        let mut state = self.state.lock();
        let mut user = state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::UserNotFound(id.to_string()))?;
        update.apply_to(&mut user);
        state.check_user_unique(Some(id), &user.utorid, &user.email)?;
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut state = self.state.lock();
        let user = state.user_mut(id)?;
        user.reset_token = Some(token.to_string());
        user.reset_expires_at = Some(expires_at);
        Ok(())
    }

    async fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>> {
        Ok(self.state.lock().password_hashes.get(&id).cloned())
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let mut state = self.state.lock();
        state.user_mut(id)?;
        state.password_hashes.insert(id, password_hash.to_string());
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut state = self.state.lock();
        let user = state.user_mut(id)?;
        if user.reset_token.as_deref() != Some(token) || user.reset_expired_at(now) {
            return Err(DomainError::ResetTokenExpired);
        }
        user.reset_expires_at = Some(now);
        state.password_hashes.insert(id, password_hash.to_string());
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> RepoResult<()> {
        self.state.lock().user_mut(id)?.last_login = Some(at);
        Ok(())
    }
}

#[async_trait]
impl PromotionRepository for MemoryStore {
    async fn find_by_id(&self, id: PromotionId) -> RepoResult<Option<Promotion>> {
        Ok(self.state.lock().promotions.get(&id).cloned())
    }

    async fn list(&self, query: &PromotionQuery) -> RepoResult<Vec<Promotion>> {
        let state = self.state.lock();
        let mut matching: Vec<&Promotion> =
            state.promotions.values().filter(|p| query.matches(p)).collect();
        matching.sort_by_key(|p| (p.end_time, p.id));
        Ok(page(matching.into_iter().cloned(), query.limit, query.offset))
    }

    async fn count(&self, query: &PromotionQuery) -> RepoResult<i64> {
        let state = self.state.lock();
        Ok(count(state.promotions.values().filter(|p| query.matches(p))))
    }

    async fn list_available(&self, now: DateTime<Utc>) -> RepoResult<Vec<Promotion>> {
        Ok(self
            .state
            .lock()
            .promotions
            .values()
            .filter(|p| p.is_available_at(now))
            .cloned()
            .collect())
    }

    async fn used_promotion_ids(&self, user_id: UserId) -> RepoResult<Vec<PromotionId>> {
        let state = self.state.lock();
        let mut ids: Vec<PromotionId> = state
            .usages
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn has_usage(&self, user_id: UserId, promotion_id: PromotionId) -> RepoResult<bool> {
        Ok(self.state.lock().usages.contains(&(user_id, promotion_id)))
    }

    async fn record_usage(&self, user_id: UserId, promotion_id: PromotionId) -> RepoResult<()> {
        let mut state = self.state.lock();
        if !state.users.contains_key(&user_id) {
            return Err(DomainError::UserNotFound(user_id.to_string()));
        }
        if !state.promotions.contains_key(&promotion_id) {
            return Err(DomainError::PromotionNotFound(promotion_id));
        }
        if !state.usages.insert((user_id, promotion_id)) {
            return Err(DomainError::PromotionAlreadyUsed(promotion_id));
        }
        Ok(())
    }

    async fn create(&self, promotion: &NewPromotion) -> RepoResult<Promotion> {
        let mut state = self.state.lock();
        let id = PromotionId::new(state.next_id());
        let created = Promotion {
            id,
            name: promotion.name.clone(),
            description: promotion.description.clone(),
            kind: promotion.kind,
            start_time: promotion.start_time,
            end_time: promotion.end_time,
            min_spending: promotion.min_spending,
            rate: promotion.rate,
            points: promotion.points,
        };
        state.promotions.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: PromotionId, update: &PromotionUpdate) -> RepoResult<Promotion> {
        let mut state = self.state.lock();
        let promotion = state
            .promotions
            .get_mut(&id)
            .ok_or(DomainError::PromotionNotFound(id))?;
        let mut patched = promotion.clone();
        update.apply_to(&mut patched);
        if patched.end_time <= patched.start_time {
            return Err(DomainError::InvalidTimeRange);
        }
        *promotion = patched.clone();
        Ok(patched)
    }

    async fn delete(&self, id: PromotionId) -> RepoResult<()> {
        let mut state = self.state.lock();
        state
            .promotions
            .remove(&id)
            .ok_or(DomainError::PromotionNotFound(id))?;
        state.usages.retain(|(_, p)| *p != id);
        for tx in state.transactions.values_mut() {
            tx.promotion_ids.retain(|p| *p != id);
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn find_by_id(&self, id: EventId) -> RepoResult<Option<Event>> {
        Ok(self.state.lock().events.get(&id).cloned())
    }

    async fn list(&self, query: &EventQuery) -> RepoResult<Vec<Event>> {
        let state = self.state.lock();
        let mut matching: Vec<&Event> =
            state.events.values().filter(|e| query.matches(e)).collect();
        matching.sort_by_key(|e| (e.start_time, e.id));
        Ok(page(matching.into_iter().cloned(), query.limit, query.offset))
    }

    async fn count(&self, query: &EventQuery) -> RepoResult<i64> {
        let state = self.state.lock();
        Ok(count(state.events.values().filter(|e| query.matches(e))))
    }

    async fn create(&self, event: &NewEvent) -> RepoResult<Event> {
        let mut state = self.state.lock();
        let id = EventId::new(state.next_id());
        let created = Event {
            id,
            name: event.name.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            capacity: event.capacity,
            points_remain: event.points,
            points_awarded: 0,
            published: false,
            organizers: Vec::new(),
            guests: Vec::new(),
            created_at: Utc::now(),
        };
        state.events.insert(id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: EventId, update: &EventUpdate) -> RepoResult<Event> {
        let mut state = self.state.lock();
        let event = state.event_mut(id)?;
        if update.points_total.is_some_and(|t| t < event.points_awarded) {
            return Err(DomainError::PointsBelowAwarded(event.points_awarded));
        }
        let mut patched = event.clone();
        update.apply_to(&mut patched);
        if patched.end_time <= patched.start_time {
            return Err(DomainError::InvalidTimeRange);
        }
        if patched
            .capacity
            .is_some_and(|c| usize::try_from(c).unwrap_or(0) < patched.num_guests())
        {
            return Err(DomainError::CapacityBelowGuests(patched.num_guests()));
        }
        *event = patched.clone();
        Ok(patched)
    }

    async fn delete(&self, id: EventId) -> RepoResult<()> {
        self.state
            .lock()
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::EventNotFound(id))
    }

    async fn add_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let mut state = self.state.lock();
        let summary = state.summary(user_id)?;
        let event = state.event_mut(id)?;
        if event.is_organizer(user_id) {
            return Err(DomainError::AlreadyOrganizer);
        }
        event.organizers.push(summary);
        event.organizers.sort_by(|a, b| a.utorid.cmp(&b.utorid));
        Ok(())
    }

    async fn remove_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let mut state = self.state.lock();
        let event = state.event_mut(id)?;
        let before = event.organizers.len();
        event.organizers.retain(|o| o.id != user_id);
        if event.organizers.len() == before {
            return Err(DomainError::OrganizerNotFound);
        }
        Ok(())
    }

    async fn add_guest(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let mut state = self.state.lock();
        let summary = state.summary(user_id)?;
        let event = state.event_mut(id)?;
        if event.is_guest(user_id) {
            return Err(DomainError::AlreadyGuest);
        }
        if event.is_full() {
            return Err(DomainError::EventFull);
        }
        event.guests.push(summary);
        event.guests.sort_by(|a, b| a.utorid.cmp(&b.utorid));
        Ok(())
    }

    async fn remove_guest(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let mut state = self.state.lock();
        let event = state.event_mut(id)?;
        let before = event.guests.len();
        event.guests.retain(|g| g.id != user_id);
        if event.guests.len() == before {
            return Err(DomainError::GuestNotFound);
        }
        Ok(())
    }

    async fn list_guests(&self, id: EventId) -> RepoResult<Vec<UserSummary>> {
        let state = self.state.lock();
        state
            .events
            .get(&id)
            .map(|e| e.guests.clone())
            .ok_or(DomainError::EventNotFound(id))
    }

    async fn is_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<bool> {
        let state = self.state.lock();
        state
            .events
            .get(&id)
            .map(|e| e.is_organizer(user_id))
            .ok_or(DomainError::EventNotFound(id))
    }
}
