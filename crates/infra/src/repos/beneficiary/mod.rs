mod inmemory;
mod postgres;

pub use inmemory::InMemoryBeneficiaryRepo;
use partner_sync_domain::Beneficiary;
pub use postgres::PostgresBeneficiaryRepo;

#[async_trait::async_trait]
pub trait IBeneficiaryRepo: Send + Sync {
    async fn insert(&self, beneficiary: &Beneficiary) -> anyhow::Result<()>;
    async fn find_by_partner_id(&self, partner_id: &str) -> anyhow::Result<Option<Beneficiary>>;
}
