use super::IBeneficiaryRepo;
use chrono_tz::Tz;
use partner_sync_domain::Beneficiary;
use sqlx::{types::Uuid, FromRow, PgPool};

pub struct PostgresBeneficiaryRepo {
    pool: PgPool,
}

impl PostgresBeneficiaryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BeneficiaryRaw {
    beneficiary_uid: Uuid,
    partner_id: String,
    first_name: String,
    last_name: String,
    timezone: Option<String>,
}

impl From<BeneficiaryRaw> for Beneficiary {
    fn from(raw: BeneficiaryRaw) -> Self {
        Self {
            id: raw.beneficiary_uid.into(),
            partner_id: raw.partner_id,
            first_name: raw.first_name,
            last_name: raw.last_name,
            timezone: raw.timezone.and_then(|tz| tz.parse::<Tz>().ok()),
        }
    }
}

#[async_trait::async_trait]
impl IBeneficiaryRepo for PostgresBeneficiaryRepo {
    async fn insert(&self, beneficiary: &Beneficiary) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO beneficiaries
            (beneficiary_uid, partner_id, first_name, last_name, timezone)
            VALUES($1, $2, $3, $4, $5)
            "#,
        )
        .bind(beneficiary.id.inner_ref())
        .bind(&beneficiary.partner_id)
        .bind(&beneficiary.first_name)
        .bind(&beneficiary.last_name)
        .bind(beneficiary.timezone.map(|tz| tz.name().to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_partner_id(&self, partner_id: &str) -> anyhow::Result<Option<Beneficiary>> {
        let beneficiary = sqlx::query_as::<_, BeneficiaryRaw>(
            r#"
            SELECT * FROM beneficiaries AS b
            WHERE b.partner_id = $1
            "#,
        )
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(beneficiary.map(|b| b.into()))
    }
}
