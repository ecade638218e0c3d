//! PostgreSQL implementation of EventRepository

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use loyalty_core::entities::{Event, EventUpdate, NewEvent, UserSummary};
use loyalty_core::error::DomainError;
use loyalty_core::traits::{EventQuery, EventRepository, RepoResult};
use loyalty_core::value_objects::{EventId, UserId};

use crate::mappers::{event_with_rosters, split_rosters};
use crate::models::{EventModel, RosterModel};

use super::error::{map_db_error, map_unique_violation};

const EVENT_COLUMNS: &str = "e.id, e.name, e.description, e.location, e.start_time, e.end_time, \
                             e.capacity, e.points_remain, e.points_awarded, e.published, e.created_at";

const GUEST_COUNT: &str = "(SELECT COUNT(*) FROM event_guests g WHERE g.event_id = e.id)";

type Rosters = HashMap<i64, Vec<UserSummary>>;

/// PostgreSQL implementation of EventRepository
#[derive(Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    /// Create a new PgEventRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &EventQuery) {
        builder.push(" WHERE TRUE");
        if let Some(name) = &query.name {
            builder.push(" AND e.name ILIKE ").push_bind(format!("%{name}%"));
        }
        if let Some(location) = &query.location {
            builder
                .push(" AND e.location ILIKE ")
                .push_bind(format!("%{location}%"));
        }
        if let Some(started) = query.started {
            builder
                .push(if started { " AND e.start_time <= " } else { " AND e.start_time > " })
                .push_bind(query.now);
        }
        if let Some(ended) = query.ended {
            builder
                .push(if ended { " AND e.end_time <= " } else { " AND e.end_time > " })
                .push_bind(query.now);
        }
        if let Some(published) = query.published {
            builder.push(" AND e.published = ").push_bind(published);
        }
        if !query.show_full {
            builder.push(format!(
                " AND (e.capacity IS NULL OR {GUEST_COUNT} < e.capacity)"
            ));
        }
    }

    /// Organizer and guest rosters for a set of events
    async fn load_rosters(
        conn: &mut PgConnection,
        event_ids: &[i64],
    ) -> RepoResult<(Rosters, Rosters)> {
        let organizers = sqlx::query_as::<_, RosterModel>(
            r#"
            SELECT r.event_id, u.id, u.utorid, u.name
            FROM event_organizers r JOIN users u ON u.id = r.user_id
            WHERE r.event_id = ANY($1)
            ORDER BY u.utorid
            "#,
        )
        .bind(event_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        let guests = sqlx::query_as::<_, RosterModel>(
            r#"
            SELECT r.event_id, u.id, u.utorid, u.name
            FROM event_guests r JOIN users u ON u.id = r.user_id
            WHERE r.event_id = ANY($1)
            ORDER BY u.utorid
            "#,
        )
        .bind(event_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        Ok((split_rosters(organizers), split_rosters(guests)))
    }

    fn assemble(models: Vec<EventModel>, mut organizers: Rosters, mut guests: Rosters) -> Vec<Event> {
        models
            .into_iter()
            .map(|m| {
                let id = m.id;
                event_with_rosters(
                    m,
                    organizers.remove(&id).unwrap_or_default(),
                    guests.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }

    async fn fetch_locked(conn: &mut PgConnection, id: EventId) -> RepoResult<Event> {
        let model = sqlx::query_as::<_, EventModel>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1 FOR UPDATE"
        ))
        .bind(id.into_inner())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?
        .ok_or(DomainError::EventNotFound(id))?;

        let (organizers, guests) = Self::load_rosters(conn, &[model.id]).await?;
        Self::assemble(vec![model], organizers, guests)
            .pop()
            .ok_or(DomainError::EventNotFound(id))
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: EventId) -> RepoResult<Option<Event>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;

        let Some(model) = sqlx::query_as::<_, EventModel>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_db_error)?
        else {
            return Ok(None);
        };

        let (organizers, guests) = Self::load_rosters(&mut *conn, &[model.id]).await?;
        Ok(Self::assemble(vec![model], organizers, guests).pop())
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &EventQuery) -> RepoResult<Vec<Event>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events e"));
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY e.start_time, e.id LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let models = builder
            .build_query_as::<EventModel>()
            .fetch_all(&mut *conn)
            .await
            .map_err(map_db_error)?;

        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let (organizers, guests) = Self::load_rosters(&mut *conn, &ids).await?;
        Ok(Self::assemble(models, organizers, guests))
    }

    #[instrument(skip(self))]
    async fn count(&self, query: &EventQuery) -> RepoResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events e");
        Self::push_filters(&mut builder, query);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self, event), fields(name = %event.name))]
    async fn create(&self, event: &NewEvent) -> RepoResult<Event> {
        let model = sqlx::query_as::<_, EventModel>(&format!(
            r#"
            INSERT INTO events AS e
                (name, description, location, start_time, end_time, capacity, points_remain)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.capacity)
        .bind(event.points)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(event_with_rosters(model, Vec::new(), Vec::new()))
    }

    #[instrument(skip(self))]
    async fn update(&self, id: EventId, update: &EventUpdate) -> RepoResult<Event> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let mut event = Self::fetch_locked(&mut *tx, id).await?;
        if update.points_total.is_some_and(|t| t < event.points_awarded) {
            return Err(DomainError::PointsBelowAwarded(event.points_awarded));
        }
        update.apply_to(&mut event);
        if event.end_time <= event.start_time {
            return Err(DomainError::InvalidTimeRange);
        }
        if event
            .capacity
            .is_some_and(|c| usize::try_from(c).unwrap_or(0) < event.num_guests())
        {
            return Err(DomainError::CapacityBelowGuests(event.num_guests()));
        }

        sqlx::query(
            r#"
            UPDATE events
            SET name = $2, description = $3, location = $4, start_time = $5, end_time = $6,
                capacity = $7, points_remain = $8, published = $9
            WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(&event.name)
        .bind(&event.description)
        .bind(&event.location)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.capacity)
        .bind(event.points_remain)
        .bind(event.published)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(event)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: EventId) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EventNotFound(id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        sqlx::query("INSERT INTO event_organizers (event_id, user_id) VALUES ($1, $2)")
            .bind(id.into_inner())
            .bind(user_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, || DomainError::AlreadyOrganizer))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let result =
            sqlx::query("DELETE FROM event_organizers WHERE event_id = $1 AND user_id = $2")
                .bind(id.into_inner())
                .bind(user_id.into_inner())
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::OrganizerNotFound);
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_guest(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Row lock on the event serializes concurrent joins against capacity
        let capacity = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT capacity FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or(DomainError::EventNotFound(id))?;

        if let Some(capacity) = capacity {
            let guests = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM event_guests WHERE event_id = $1",
            )
            .bind(id.into_inner())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_db_error)?;

            if guests >= i64::from(capacity) {
                return Err(DomainError::EventFull);
            }
        }

        sqlx::query("INSERT INTO event_guests (event_id, user_id) VALUES ($1, $2)")
            .bind(id.into_inner())
            .bind(user_id.into_inner())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, || DomainError::AlreadyGuest))?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_guest(&self, id: EventId, user_id: UserId) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM event_guests WHERE event_id = $1 AND user_id = $2")
            .bind(id.into_inner())
            .bind(user_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::GuestNotFound);
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_guests(&self, id: EventId) -> RepoResult<Vec<UserSummary>> {
        let mut conn = self.pool.acquire().await.map_err(map_db_error)?;
        let (_, mut guests) = Self::load_rosters(&mut *conn, &[id.into_inner()]).await?;
        Ok(guests.remove(&id.into_inner()).unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn is_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM event_organizers WHERE event_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(id.into_inner())
        .bind(user_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
