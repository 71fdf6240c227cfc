use super::IAppointmentRepo;
use crate::repos::shared::inmemory_repo::*;
use partner_sync_domain::{Appointment, PartnerObjectType, ID};

pub struct InMemoryAppointmentRepo {
    appointments: std::sync::Mutex<Vec<Appointment>>,
}

impl InMemoryAppointmentRepo {
    pub fn new() -> Self {
        Self {
            appointments: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IAppointmentRepo for InMemoryAppointmentRepo {
    async fn insert(&self, appointment: &Appointment) -> anyhow::Result<()> {
        let mut appointments = lock(&self.appointments);
        if appointments.iter().any(|a| a.partner == appointment.partner) {
            anyhow::bail!(
                "An appointment already exists for partner object {:?}",
                appointment.partner
            );
        }
        appointments.push(appointment.clone());
        Ok(())
    }

    async fn save(&self, appointment: &Appointment) -> anyhow::Result<()> {
        save(appointment, &self.appointments);
        Ok(())
    }

    async fn find(&self, appointment_id: &ID) -> anyhow::Result<Option<Appointment>> {
        Ok(find(appointment_id, &self.appointments))
    }

    async fn find_by_partner(
        &self,
        object_type: PartnerObjectType,
        object_id: &str,
    ) -> anyhow::Result<Option<Appointment>> {
        Ok(find_by(&self.appointments, |a| {
            a.partner.object_type == object_type && a.partner.object_id == object_id
        })
        .into_iter()
        .next())
    }

    async fn delete(&self, appointment_id: &ID) -> anyhow::Result<()> {
        delete(appointment_id, &self.appointments);
        Ok(())
    }
}
