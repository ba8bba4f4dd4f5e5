use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use crate::geo::{GeoPoint, GeofenceConfig};
use crate::model::EmployeeId;
use crate::model::attendance::{AttendanceRecord, EmployeeOverview};
use crate::model::device::{DeviceRegistration, DeviceState, RegistrationStatus};
use crate::policy::{CheckInEvent, CheckOutEvent};
use crate::registration::{self, ReRegistrationMode};
use crate::store::{AttendanceStore, DeviceStore, GeofenceStore, StoreError, StoreResult};

/// MySQL error class for integrity constraint violations (duplicate key).
const INTEGRITY_VIOLATION: &str = "23000";

/// The single geofence row.
const GEOFENCE_ROW_ID: u8 = 1;

#[derive(FromRow)]
struct OverviewRow {
    employee_id: u64,
    device_fingerprint: Option<String>,
    approved: Option<bool>,
    last_check_in: Option<DateTime<Utc>>,
}

impl From<OverviewRow> for EmployeeOverview {
    fn from(row: OverviewRow) -> Self {
        EmployeeOverview {
            employee_id: row.employee_id,
            device_fingerprint: row.device_fingerprint,
            device_approved: row.approved.unwrap_or(false),
            last_check_in: row.last_check_in,
        }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    employee_id: u64,
    date: NaiveDate,
    check_in: Option<DateTime<Utc>>,
    check_in_lat: Option<f64>,
    check_in_lon: Option<f64>,
    check_in_photo_ref: Option<String>,
    check_out: Option<DateTime<Utc>>,
    check_out_lat: Option<f64>,
    check_out_lon: Option<f64>,
}

fn point(lat: Option<f64>, lon: Option<f64>) -> Option<GeoPoint> {
    match (lat, lon) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        _ => None,
    }
}

impl From<AttendanceRow> for AttendanceRecord {
    fn from(row: AttendanceRow) -> Self {
        AttendanceRecord {
            employee_id: row.employee_id,
            date: row.date,
            check_in_time: row.check_in,
            check_in_location: point(row.check_in_lat, row.check_in_lon),
            check_in_photo_ref: row.check_in_photo_ref,
            check_out_time: row.check_out,
            check_out_location: point(row.check_out_lat, row.check_out_lon),
        }
    }
}

#[derive(FromRow)]
struct RegistrationRow {
    id: String,
    employee_id: u64,
    device_fingerprint: String,
    requested_at: DateTime<Utc>,
    status: String,
}

impl TryFrom<RegistrationRow> for DeviceRegistration {
    type Error = StoreError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let status = RegistrationStatus::from_str(&row.status)
            .map_err(|_| StoreError::Corrupt(format!("registration status '{}'", row.status)))?;

        Ok(DeviceRegistration {
            id: row.id,
            employee_id: row.employee_id,
            device_fingerprint: row.device_fingerprint,
            requested_at: row.requested_at,
            status,
        })
    }
}

#[derive(FromRow)]
struct DeviceRow {
    device_fingerprint: Option<String>,
    approved: bool,
}

#[derive(FromRow)]
struct GeofenceRow {
    latitude: f64,
    longitude: f64,
    radius_meters: f64,
}

const REGISTRATION_COLUMNS: &str = "id, employee_id, device_fingerprint, requested_at, status";

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn pending_for(
        tx: &mut Transaction<'_, MySql>,
        employee_id: EmployeeId,
    ) -> StoreResult<Vec<DeviceRegistration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM device_registrations \
             WHERE employee_id = ? AND status = 'pending' FOR UPDATE"
        );
        sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(employee_id)
            .fetch_all(&mut **tx)
            .await?
            .into_iter()
            .map(DeviceRegistration::try_from)
            .collect()
    }

    async fn pending_by_id(
        tx: &mut Transaction<'_, MySql>,
        registration_id: &str,
    ) -> StoreResult<DeviceRegistration> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM device_registrations \
             WHERE id = ? AND status = 'pending' FOR UPDATE"
        );
        sqlx::query_as::<_, RegistrationRow>(&sql)
            .bind(registration_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("registration {registration_id}")))?
            .try_into()
    }

    async fn withdraw(tx: &mut Transaction<'_, MySql>, ids: &[String]) -> StoreResult<()> {
        for id in ids {
            sqlx::query("DELETE FROM device_registrations WHERE id = ? AND status = 'pending'")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn write_device(
        tx: &mut Transaction<'_, MySql>,
        employee_id: EmployeeId,
        device: &DeviceState,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO employee_devices (employee_id, device_fingerprint, approved)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE
                device_fingerprint = VALUES(device_fingerprint),
                approved = VALUES(approved)
            "#,
        )
        .bind(employee_id)
        .bind(device.device_fingerprint.as_deref())
        .bind(device.approved)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn find_attendance(
        &self,
        employee_id: EmployeeId,
        date: NaiveDate,
    ) -> StoreResult<Option<AttendanceRecord>> {
        let row = sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT employee_id, date, check_in, check_in_lat, check_in_lon, check_in_photo_ref,
                   check_out, check_out_lat, check_out_lon
            FROM attendance
            WHERE employee_id = ? AND date = ?
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AttendanceRecord::from))
    }

    async fn insert_check_in(&self, date: NaiveDate, event: &CheckInEvent) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, date, check_in, check_in_lat, check_in_lon, check_in_photo_ref)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.employee_id)
        .bind(date)
        .bind(event.timestamp)
        .bind(event.location.latitude)
        .bind(event.location.longitude)
        .bind(event.photo_ref.as_deref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(INTEGRITY_VIOLATION) =>
            {
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record_check_out(
        &self,
        date: NaiveDate,
        event: &CheckOutEvent,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?, check_out_lat = ?, check_out_lon = ?
            WHERE employee_id = ?
            AND date = ?
            AND check_in IS NOT NULL
            AND check_out IS NULL
            "#,
        )
        .bind(event.timestamp)
        .bind(event.location.latitude)
        .bind(event.location.longitude)
        .bind(event.employee_id)
        .bind(date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn attendance_overview(&self) -> StoreResult<Vec<EmployeeOverview>> {
        let rows = sqlx::query_as::<_, OverviewRow>(
            r#"
            SELECT ids.employee_id, d.device_fingerprint, d.approved,
                   MAX(a.check_in) AS last_check_in
            FROM (
                SELECT employee_id FROM employee_devices
                UNION
                SELECT employee_id FROM attendance
            ) ids
            LEFT JOIN employee_devices d ON d.employee_id = ids.employee_id
            LEFT JOIN attendance a ON a.employee_id = ids.employee_id
            GROUP BY ids.employee_id, d.device_fingerprint, d.approved
            ORDER BY ids.employee_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeOverview::from).collect())
    }
}

#[async_trait]
impl DeviceStore for MySqlStore {
    async fn device_state(&self, employee_id: EmployeeId) -> StoreResult<DeviceState> {
        let row = sqlx::query_as::<_, DeviceRow>(
            "SELECT device_fingerprint, approved FROM employee_devices WHERE employee_id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| DeviceState {
                device_fingerprint: r.device_fingerprint,
                approved: r.approved,
            })
            .unwrap_or_default())
    }

    async fn request_registration(
        &self,
        employee_id: EmployeeId,
        device_fingerprint: String,
        mode: ReRegistrationMode,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceRegistration> {
        let mut tx = self.pool.begin().await?;

        let pending = Self::pending_for(&mut tx, employee_id).await?;
        let t = registration::request(employee_id, device_fingerprint, &pending, mode, now);

        Self::withdraw(&mut tx, &t.withdraw).await?;
        sqlx::query(
            r#"
            INSERT INTO device_registrations (id, employee_id, device_fingerprint, requested_at, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&t.registration.id)
        .bind(t.registration.employee_id)
        .bind(&t.registration.device_fingerprint)
        .bind(t.registration.requested_at)
        .bind(t.registration.status.as_ref())
        .execute(&mut *tx)
        .await?;
        Self::write_device(&mut tx, employee_id, &t.device).await?;

        tx.commit().await?;
        Ok(t.registration)
    }

    async fn pending_registrations(&self) -> StoreResult<Vec<DeviceRegistration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM device_registrations \
             WHERE status = 'pending' ORDER BY requested_at DESC"
        );
        sqlx::query_as::<_, RegistrationRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(DeviceRegistration::try_from)
            .collect()
    }

    async fn approve_registration(
        &self,
        registration_id: &str,
        mode: ReRegistrationMode,
    ) -> StoreResult<DeviceRegistration> {
        let mut tx = self.pool.begin().await?;

        let reg = Self::pending_by_id(&mut tx, registration_id).await?;
        let pending = Self::pending_for(&mut tx, reg.employee_id).await?;
        let t = registration::approve(&reg, &pending, mode);

        Self::withdraw(&mut tx, &t.withdraw).await?;
        sqlx::query("UPDATE device_registrations SET status = ? WHERE id = ?")
            .bind(t.registration.status.as_ref())
            .bind(&t.registration.id)
            .execute(&mut *tx)
            .await?;
        Self::write_device(&mut tx, reg.employee_id, &t.device).await?;

        tx.commit().await?;
        Ok(t.registration)
    }

    async fn reject_registration(
        &self,
        registration_id: &str,
    ) -> StoreResult<DeviceRegistration> {
        let mut tx = self.pool.begin().await?;

        let reg = Self::pending_by_id(&mut tx, registration_id).await?;
        let current = sqlx::query_as::<_, DeviceRow>(
            "SELECT device_fingerprint, approved FROM employee_devices WHERE employee_id = ? FOR UPDATE",
        )
        .bind(reg.employee_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|r| DeviceState {
            device_fingerprint: r.device_fingerprint,
            approved: r.approved,
        })
        .unwrap_or_default();

        let t = registration::reject(&reg, &current);

        Self::withdraw(&mut tx, std::slice::from_ref(&reg.id)).await?;
        if let Some(device) = &t.device {
            Self::write_device(&mut tx, reg.employee_id, device).await?;
        }

        tx.commit().await?;
        Ok(t.registration)
    }
}

#[async_trait]
impl GeofenceStore for MySqlStore {
    async fn load_geofence(&self) -> StoreResult<Option<GeofenceConfig>> {
        let row = sqlx::query_as::<_, GeofenceRow>(
            "SELECT latitude, longitude, radius_meters FROM geofence_config WHERE id = ?",
        )
        .bind(GEOFENCE_ROW_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            GeoPoint::new(r.latitude, r.longitude)
                .and_then(|center| GeofenceConfig::new(center, r.radius_meters))
                .map_err(|e| StoreError::Corrupt(format!("geofence config: {e}")))
        })
        .transpose()
    }

    async fn save_geofence(&self, config: &GeofenceConfig) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO geofence_config (id, latitude, longitude, radius_meters)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                latitude = VALUES(latitude),
                longitude = VALUES(longitude),
                radius_meters = VALUES(radius_meters)
            "#,
        )
        .bind(GEOFENCE_ROW_ID)
        .bind(config.center.latitude)
        .bind(config.center.longitude)
        .bind(config.radius_meters)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
