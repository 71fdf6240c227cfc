mod inmemory;
mod postgres;

pub use inmemory::InMemoryAppointmentRepo;
use partner_sync_domain::{Appointment, PartnerObjectType, ID};
pub use postgres::PostgresAppointmentRepo;

#[async_trait::async_trait]
pub trait IAppointmentRepo: Send + Sync {
    /// Fails when an appointment already mirrors the same partner object
    async fn insert(&self, appointment: &Appointment) -> anyhow::Result<()>;
    async fn save(&self, appointment: &Appointment) -> anyhow::Result<()>;
    async fn find(&self, appointment_id: &ID) -> anyhow::Result<Option<Appointment>>;
    async fn find_by_partner(
        &self,
        object_type: PartnerObjectType,
        object_id: &str,
    ) -> anyhow::Result<Option<Appointment>>;
    /// Deleting an unknown appointment is a no-op
    async fn delete(&self, appointment_id: &ID) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use partner_sync_domain::{appointment_status, Beneficiary, PartnerAppointment};

    fn appointment(partner_id: &str) -> Appointment {
        let detail = PartnerAppointment {
            id: partner_id.into(),
            beneficiary_partner_id: "123456".into(),
            starts_at: "2030-01-10 10:00:00".into(),
            ends_at: None,
            title: "Entretien".into(),
            comment: None,
            location: None,
            modality: None,
            status: appointment_status::PLANNED.into(),
        };
        Appointment::from_partner(
            &detail,
            &Beneficiary::new("123456"),
            &chrono_tz::Europe::Paris,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_update_and_delete() {
        let repo = InMemoryAppointmentRepo::new();
        let mut appointment = appointment("42");

        // Insert
        assert!(repo.insert(&appointment).await.is_ok());

        // Find
        let res = repo
            .find_by_partner(PartnerObjectType::Appointment, "42")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(res, appointment);
        assert!(repo
            .find_by_partner(PartnerObjectType::Session, "42")
            .await
            .unwrap()
            .is_none());

        // Save
        appointment.title = "Atelier CV".into();
        assert!(repo.save(&appointment).await.is_ok());
        let res = repo.find(&appointment.id).await.unwrap().unwrap();
        assert_eq!(res.title, "Atelier CV");

        // Delete twice
        assert!(repo.delete(&appointment.id).await.is_ok());
        assert!(repo.delete(&appointment.id).await.is_ok());
        assert!(repo.find(&appointment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_a_second_appointment_for_the_same_partner_object() {
        let repo = InMemoryAppointmentRepo::new();
        assert!(repo.insert(&appointment("42")).await.is_ok());
        assert!(repo.insert(&appointment("42")).await.is_err());
        assert!(repo.insert(&appointment("43")).await.is_ok());
    }
}
