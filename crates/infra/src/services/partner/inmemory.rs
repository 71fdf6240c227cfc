use super::{IPartnerDetailSource, IPartnerEventSource, PartnerError, PartnerLookup};
use partner_sync_domain::{PartnerAppointment, PartnerEvent, PartnerSessionInstance};
use std::collections::{HashMap, HashSet};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Partner fake: events stay pending until they are acknowledged
pub struct InMemoryPartner {
    page_size: usize,
    pending: Mutex<Vec<PartnerEvent>>,
    acknowledged: Mutex<Vec<String>>,
    failing_acks: Mutex<HashSet<String>>,
    appointments: Mutex<HashMap<(String, String), PartnerAppointment>>,
    session_instances: Mutex<HashMap<(String, String), PartnerSessionInstance>>,
    list_calls: AtomicUsize,
}

impl InMemoryPartner {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            pending: Mutex::new(Vec::new()),
            acknowledged: Mutex::new(Vec::new()),
            failing_acks: Mutex::new(HashSet::new()),
            appointments: Mutex::new(HashMap::new()),
            session_instances: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn push_event(&self, event: PartnerEvent) {
        lock(&self.pending).push(event);
    }

    pub fn put_appointment(&self, appointment: PartnerAppointment) {
        lock(&self.appointments).insert(
            (
                appointment.beneficiary_partner_id.clone(),
                appointment.id.clone(),
            ),
            appointment,
        );
    }

    pub fn remove_appointment(&self, beneficiary_partner_id: &str, object_id: &str) {
        lock(&self.appointments)
            .remove(&(beneficiary_partner_id.to_string(), object_id.to_string()));
    }

    pub fn put_session_instance(&self, instance: PartnerSessionInstance) {
        lock(&self.session_instances).insert(
            (instance.beneficiary_partner_id.clone(), instance.id.clone()),
            instance,
        );
    }

    pub fn remove_session_instance(&self, beneficiary_partner_id: &str, object_id: &str) {
        lock(&self.session_instances)
            .remove(&(beneficiary_partner_id.to_string(), object_id.to_string()));
    }

    /// Acknowledging this event will fail
    pub fn fail_ack_for(&self, event_id: &str) {
        lock(&self.failing_acks).insert(event_id.to_string());
    }

    pub fn acknowledged(&self) -> Vec<String> {
        lock(&self.acknowledged).clone()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryPartner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IPartnerEventSource for InMemoryPartner {
    async fn list_pending_events(&self) -> Result<Vec<PartnerEvent>, PartnerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.pending)
            .iter()
            .take(self.page_size)
            .cloned()
            .collect())
    }

    async fn acknowledge(&self, event: &PartnerEvent) -> Result<(), PartnerError> {
        if lock(&self.failing_acks).contains(&event.id) {
            return Err(PartnerError::UnexpectedStatus {
                status: 500,
                body: format!("Could not acknowledge event {}", event.id),
            });
        }
        lock(&self.pending).retain(|pending| pending.id != event.id);
        lock(&self.acknowledged).push(event.id.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl IPartnerDetailSource for InMemoryPartner {
    async fn get_appointment_detail(
        &self,
        beneficiary_partner_id: &str,
        object_id: &str,
    ) -> Result<PartnerLookup<PartnerAppointment>, PartnerError> {
        Ok(lock(&self.appointments)
            .get(&(beneficiary_partner_id.to_string(), object_id.to_string()))
            .cloned()
            .into())
    }

    async fn get_session_instance_detail(
        &self,
        object_id: &str,
        beneficiary_partner_id: &str,
    ) -> Result<PartnerLookup<PartnerSessionInstance>, PartnerError> {
        Ok(lock(&self.session_instances)
            .get(&(beneficiary_partner_id.to_string(), object_id.to_string()))
            .cloned()
            .into())
    }
}
