use crate::error::{StorageError, StorageResult};
use crate::models::{Attendance, Member, NewAttendance, NewMember};
use biogate_core::SettingsMap;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::future::Future;
use tracing::debug;
use uuid::Uuid;

/// Data access used by the gate: members, their check-ins, and the
/// key/value settings that carry the terminal configuration.
///
/// Methods return `Send` futures so services generic over the repository
/// can run on spawned tasks.
pub trait MembershipRepository: Send + Sync {
    /// Every member, ordered by name.
    fn list_members(&self) -> impl Future<Output = StorageResult<Vec<Member>>> + Send;

    /// Insert a member and return the stored row.
    fn create_member(&self, member: &NewMember)
    -> impl Future<Output = StorageResult<Member>> + Send;

    /// Record a check-in. Missing check-in time means now; missing
    /// `marked_via` means manual.
    fn create_attendance(
        &self,
        record: &NewAttendance,
    ) -> impl Future<Output = StorageResult<Attendance>> + Send;

    /// All check-ins, most recent activity first.
    fn list_attendance(&self) -> impl Future<Output = StorageResult<Vec<Attendance>>> + Send;

    /// All settings. Values that parse as JSON come back as that JSON value,
    /// anything else as a string.
    fn get_settings(&self) -> impl Future<Output = StorageResult<SettingsMap>> + Send;

    /// Upsert the given settings and return the full, updated map.
    fn update_settings(
        &self,
        settings: &SettingsMap,
    ) -> impl Future<Output = StorageResult<SettingsMap>> + Send;

    /// Associate a terminal device user id with a member.
    fn link_biometric(
        &self,
        member_id: &str,
        device_user_id: &str,
    ) -> impl Future<Output = StorageResult<Member>> + Send;
}

/// SQLite implementation of [`MembershipRepository`]
#[derive(Debug, Clone)]
pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_member(&self, id: &str) -> StorageResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name, email, phone, plan_name,
                   start_date, expiry_date, status, payment_status,
                   biometric_id, created_at
            FROM members
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }
}

impl MembershipRepository for SqliteMembershipRepository {
    async fn list_members(&self) -> StorageResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT id, name, email, phone, plan_name,
                   start_date, expiry_date, status, payment_status,
                   biometric_id, created_at
            FROM members
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn create_member(&self, member: &NewMember) -> StorageResult<Member> {
        if member.name.trim().is_empty() {
            return Err(StorageError::Validation(
                "Member name must not be empty".to_string(),
            ));
        }
        let biometric_id = member
            .biometric_id
            .as_deref()
            .map(canonical_device_user_id)
            .transpose()?;

        let stored = Member {
            id: Uuid::new_v4().to_string(),
            name: member.name.clone(),
            email: member.email.clone(),
            phone: member.phone.clone(),
            plan_name: member.plan_name.clone(),
            start_date: member.start_date,
            expiry_date: member.expiry_date,
            status: member.status.clone(),
            payment_status: member.payment_status.clone(),
            biometric_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO members (
                id, name, email, phone, plan_name,
                start_date, expiry_date, status, payment_status,
                biometric_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.name)
        .bind(&stored.email)
        .bind(&stored.phone)
        .bind(&stored.plan_name)
        .bind(stored.start_date)
        .bind(stored.expiry_date)
        .bind(&stored.status)
        .bind(&stored.payment_status)
        .bind(&stored.biometric_id)
        .bind(stored.created_at)
        .execute(&self.pool)
        .await?;

        debug!(member_id = %stored.id, name = %stored.name, "Member created");
        Ok(stored)
    }

    async fn create_attendance(&self, record: &NewAttendance) -> StorageResult<Attendance> {
        let attendance = Attendance {
            id: Uuid::new_v4().to_string(),
            member_id: record.member_id.clone(),
            check_in_time: record.check_in_time.unwrap_or_else(Utc::now),
            check_out_time: record.check_out_time,
            latitude: record.latitude,
            longitude: record.longitude,
            marked_via: record.marked_via_or_default().to_string(),
        };

        sqlx::query(
            r#"
            INSERT INTO attendance (
                id, member_id, check_in_time, check_out_time,
                latitude, longitude, marked_via
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attendance.id)
        .bind(&attendance.member_id)
        .bind(attendance.check_in_time)
        .bind(attendance.check_out_time)
        .bind(attendance.latitude)
        .bind(attendance.longitude)
        .bind(&attendance.marked_via)
        .execute(&self.pool)
        .await?;

        debug!(
            attendance_id = %attendance.id,
            member_id = %attendance.member_id,
            marked_via = %attendance.marked_via,
            "Attendance recorded"
        );
        Ok(attendance)
    }

    async fn list_attendance(&self) -> StorageResult<Vec<Attendance>> {
        let rows = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT id, member_id, check_in_time, check_out_time,
                   latitude, longitude, marked_via
            FROM attendance
            ORDER BY COALESCE(check_out_time, check_in_time) DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_settings(&self) -> StorageResult<SettingsMap> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(key, raw)| (key, decode_setting(raw)))
            .collect())
    }

    async fn update_settings(&self, settings: &SettingsMap) -> StorageResult<SettingsMap> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in settings {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(encode_setting(value))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = settings.len(), "Settings updated");

        self.get_settings().await
    }

    async fn link_biometric(&self, member_id: &str, device_user_id: &str) -> StorageResult<Member> {
        let device_user_id = canonical_device_user_id(device_user_id)?;

        let owner: Option<(String,)> =
            sqlx::query_as("SELECT id FROM members WHERE biometric_id = ? AND id != ?")
                .bind(&device_user_id)
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;

        if let Some((other,)) = owner {
            return Err(StorageError::Validation(format!(
                "Device user {} is already linked to member {}",
                device_user_id, other
            )));
        }

        let result = sqlx::query("UPDATE members SET biometric_id = ? WHERE id = ?")
            .bind(&device_user_id)
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("Member", "id", member_id));
        }

        debug!(member_id, device_user_id = %device_user_id, "Biometric id linked");

        self.find_member(member_id)
            .await?
            .ok_or_else(|| StorageError::not_found("Member", "id", member_id))
    }
}

/// Device user ids are 16-bit on the wire; store them as plain decimal so
/// they compare equal to the text of a scanned id.
fn canonical_device_user_id(raw: &str) -> StorageResult<String> {
    raw.trim()
        .parse::<u16>()
        .map(|id| id.to_string())
        .map_err(|_| {
            StorageError::Validation(format!(
                "Device user id must be a number between 0 and 65535, got {:?}",
                raw
            ))
        })
}

fn encode_setting(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_setting(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
