use super::IAppointmentRepo;
use chrono::{DateTime, Utc};
use partner_sync_domain::{Appointment, Attendee, PartnerLink, PartnerObjectType, ID};
use sqlx::{types::Json, types::Uuid, FromRow, PgPool};

pub struct PostgresAppointmentRepo {
    pool: PgPool,
}

impl PostgresAppointmentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AppointmentRaw {
    appointment_uid: Uuid,
    partner_type: String,
    partner_id: String,
    title: String,
    comment: Option<String>,
    location: Option<String>,
    modality: Option<String>,
    date: DateTime<Utc>,
    duration: i64,
    attendees: Json<Vec<Attendee>>,
    advisor_present: bool,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl TryFrom<AppointmentRaw> for Appointment {
    type Error = anyhow::Error;

    fn try_from(raw: AppointmentRaw) -> anyhow::Result<Self> {
        let object_type = raw
            .partner_type
            .parse::<PartnerObjectType>()
            .map_err(|_| anyhow::anyhow!("Unknown partner type: {}", raw.partner_type))?;
        Ok(Self {
            id: raw.appointment_uid.into(),
            partner: PartnerLink {
                object_type,
                object_id: raw.partner_id,
            },
            title: raw.title,
            comment: raw.comment,
            location: raw.location,
            modality: raw.modality,
            date: raw.date,
            duration: raw.duration,
            attendees: raw.attendees.0,
            advisor_present: raw.advisor_present,
            created: raw.created,
            updated: raw.updated,
        })
    }
}

#[async_trait::async_trait]
impl IAppointmentRepo for PostgresAppointmentRepo {
    async fn insert(&self, appointment: &Appointment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO appointments
            (appointment_uid, partner_type, partner_id, title, comment, location, modality, date, duration, attendees, advisor_present, created, updated)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(appointment.id.inner_ref())
        .bind(appointment.partner.object_type.as_str())
        .bind(&appointment.partner.object_id)
        .bind(&appointment.title)
        .bind(&appointment.comment)
        .bind(&appointment.location)
        .bind(&appointment.modality)
        .bind(appointment.date)
        .bind(appointment.duration)
        .bind(Json(&appointment.attendees))
        .bind(appointment.advisor_present)
        .bind(appointment.created)
        .bind(appointment.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, appointment: &Appointment) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE appointments SET
                title = $2,
                comment = $3,
                location = $4,
                modality = $5,
                date = $6,
                duration = $7,
                attendees = $8,
                advisor_present = $9,
                updated = $10
            WHERE appointment_uid = $1
            "#,
        )
        .bind(appointment.id.inner_ref())
        .bind(&appointment.title)
        .bind(&appointment.comment)
        .bind(&appointment.location)
        .bind(&appointment.modality)
        .bind(appointment.date)
        .bind(appointment.duration)
        .bind(Json(&appointment.attendees))
        .bind(appointment.advisor_present)
        .bind(appointment.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, appointment_id: &ID) -> anyhow::Result<Option<Appointment>> {
        sqlx::query_as::<_, AppointmentRaw>(
            r#"
            SELECT * FROM appointments AS a
            WHERE a.appointment_uid = $1
            "#,
        )
        .bind(appointment_id.inner_ref())
        .fetch_optional(&self.pool)
        .await?
        .map(Appointment::try_from)
        .transpose()
    }

    async fn find_by_partner(
        &self,
        object_type: PartnerObjectType,
        object_id: &str,
    ) -> anyhow::Result<Option<Appointment>> {
        sqlx::query_as::<_, AppointmentRaw>(
            r#"
            SELECT * FROM appointments AS a
            WHERE a.partner_type = $1 AND a.partner_id = $2
            "#,
        )
        .bind(object_type.as_str())
        .bind(object_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Appointment::try_from)
        .transpose()
    }

    async fn delete(&self, appointment_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM appointments AS a
            WHERE a.appointment_uid = $1
            "#,
        )
        .bind(appointment_id.inner_ref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
