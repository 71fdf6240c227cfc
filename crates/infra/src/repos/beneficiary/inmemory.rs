use super::IBeneficiaryRepo;
use crate::repos::shared::inmemory_repo::*;
use partner_sync_domain::Beneficiary;

pub struct InMemoryBeneficiaryRepo {
    beneficiaries: std::sync::Mutex<Vec<Beneficiary>>,
}

impl InMemoryBeneficiaryRepo {
    pub fn new() -> Self {
        Self {
            beneficiaries: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IBeneficiaryRepo for InMemoryBeneficiaryRepo {
    async fn insert(&self, beneficiary: &Beneficiary) -> anyhow::Result<()> {
        insert(beneficiary, &self.beneficiaries);
        Ok(())
    }

    async fn find_by_partner_id(&self, partner_id: &str) -> anyhow::Result<Option<Beneficiary>> {
        Ok(find_by(&self.beneficiaries, |b| b.partner_id == partner_id)
            .into_iter()
            .next())
    }
}
