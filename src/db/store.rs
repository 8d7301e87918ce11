// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (identities, lookup by id / email / username / provider)
//! - Habits and their check-in markers
//! - Journal entries
//! - Newsletter subscribers
//! - Sessions (server-side OAuth logins)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{AuthProvider, Habit, HabitCheckIn, JournalEntry, Session, Subscriber, User};
use firestore::errors::FirestoreError;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct Store {
    client: Option<firestore::FirestoreDb>,
}

impl Store {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by document id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by (lowercased) email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    /// Find a user by (lowercased) username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let username = username.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("username").eq(username.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    /// Find a user by OAuth provider linkage.
    pub async fn find_user_by_provider(
        &self,
        provider: AuthProvider,
        external_auth_id: &str,
    ) -> Result<Option<User>, AppError> {
        let external_auth_id = external_auth_id.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_all([
                    q.field("authProvider").eq(provider),
                    q.field("externalAuthId").eq(external_auth_id.clone()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    /// Find the user holding an email verification token.
    pub async fn find_user_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<User>, AppError> {
        let token = token.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("emailVerificationToken").eq(token.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Habit Operations ────────────────────────────────────────

    /// Get a habit by document id.
    pub async fn get_habit(&self, habit_id: &str) -> Result<Option<Habit>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::HABITS)
            .obj()
            .one(habit_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all habits owned by a user.
    pub async fn habits_for_owner(&self, owner_id: &str) -> Result<Vec<Habit>, AppError> {
        let owner_id = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::HABITS)
            .filter(move |q| q.for_all([q.field("ownerId").eq(owner_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a habit.
    pub async fn upsert_habit(&self, habit: &Habit) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::HABITS)
            .document_id(&habit.id)
            .object(habit)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Persist several habits concurrently (lazy daily-flag resets).
    ///
    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    pub async fn batch_upsert_habits(&self, habits: &[Habit]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(habits.to_vec())
            .map(|habit| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::HABITS)
                    .document_id(&habit.id)
                    .object(&habit)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    /// Delete a habit document.
    pub async fn delete_habit(&self, habit_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::HABITS)
            .document_id(habit_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Check-in Marker Operations ──────────────────────────────

    /// Create a check-in marker with create-only semantics.
    ///
    /// Returns `Ok(true)` when the marker was newly created and
    /// `Ok(false)` when a marker for the same (habit, day) already
    /// exists. The store rejects the duplicate, which is what makes two
    /// concurrent same-day check-ins resolve to exactly one winner.
    pub async fn insert_check_in(&self, record: &HabitCheckIn) -> Result<bool, AppError> {
        let result: Result<(), FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::HABIT_CHECKINS)
            .document_id(&record.id)
            .object(record)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Remove a check-in marker (compensation when the habit write fails).
    pub async fn delete_check_in(&self, marker_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::HABIT_CHECKINS)
            .document_id(marker_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete all check-in markers for a habit (when the habit goes away).
    ///
    /// Returns the number of markers removed.
    pub async fn delete_check_ins_for_habit(&self, habit_id: &str) -> Result<usize, AppError> {
        let habit_id_owned = habit_id.to_string();
        let markers: Vec<HabitCheckIn> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::HABIT_CHECKINS)
            .filter(move |q| q.for_all([q.field("habitId").eq(habit_id_owned.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count = markers.len();
        self.batch_delete_check_ins(&markers).await?;
        tracing::debug!(habit_id, count, "Deleted check-in markers");

        Ok(count)
    }

    /// Batch delete marker documents using transactions.
    async fn batch_delete_check_ins(&self, markers: &[HabitCheckIn]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in markers.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for marker in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collections::HABIT_CHECKINS)
                    .document_id(&marker.id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── Journal Operations ──────────────────────────────────────

    /// Get a journal entry by document id.
    pub async fn get_journal_entry(&self, entry_id: &str) -> Result<Option<JournalEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::JOURNAL_ENTRIES)
            .obj()
            .one(entry_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user's journal entries, newest first.
    pub async fn journal_for_owner(&self, owner_id: &str) -> Result<Vec<JournalEntry>, AppError> {
        let owner_id = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::JOURNAL_ENTRIES)
            .filter(move |q| q.for_all([q.field("ownerId").eq(owner_id.clone())]))
            .order_by([("date", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a journal entry.
    pub async fn upsert_journal_entry(&self, entry: &JournalEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::JOURNAL_ENTRIES)
            .document_id(&entry.id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a journal entry document.
    pub async fn delete_journal_entry(&self, entry_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::JOURNAL_ENTRIES)
            .document_id(entry_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Newsletter Operations ───────────────────────────────────

    /// Find a subscriber by (lowercased) email.
    pub async fn find_subscriber_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Subscriber>, AppError> {
        let email = email.to_string();
        let subscribers: Vec<Subscriber> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NEWSLETTER_SUBSCRIBERS)
            .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(subscribers.into_iter().next())
    }

    /// All subscribers, for broadcasts.
    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::NEWSLETTER_SUBSCRIBERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a subscriber.
    pub async fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::NEWSLETTER_SUBSCRIBERS)
            .document_id(&subscriber.id)
            .object(subscriber)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a session.
    pub async fn upsert_session(&self, session: &Session) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&session.id)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a session (logout).
    pub async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::SESSIONS)
            .document_id(session_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
