use chrono::{Duration, Utc};
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Deterministic demo catalog used by `remedi seed` and the end-to-end tests.
const SEED_MEDICINES: &[SeedMedicine] = &[
    SeedMedicine {
        id: "med-paracetamol",
        name: "Paracetamol",
        unit_price: "2.50",
        stock: 50,
        requires_prescription: false,
        default_dosage_per_day: 3,
    },
    SeedMedicine {
        id: "med-ibuprofen",
        name: "Ibuprofen",
        unit_price: "3.20",
        stock: 11,
        requires_prescription: false,
        default_dosage_per_day: 2,
    },
    SeedMedicine {
        id: "med-amoxicillin",
        name: "Amoxicillin",
        unit_price: "8.75",
        stock: 30,
        requires_prescription: true,
        default_dosage_per_day: 3,
    },
    SeedMedicine {
        id: "med-atorvastatin",
        name: "Atorvastatin",
        unit_price: "12.00",
        stock: 25,
        requires_prescription: true,
        default_dosage_per_day: 1,
    },
    SeedMedicine {
        id: "med-cetirizine",
        name: "Cetirizine",
        unit_price: "1.80",
        stock: 0,
        requires_prescription: false,
        default_dosage_per_day: 1,
    },
];

const SEED_USER_ID: &str = "user-demo-001";

#[derive(Debug, Clone, Copy)]
struct SeedMedicine {
    id: &'static str,
    name: &'static str,
    unit_price: &'static str,
    stock: i64,
    requires_prescription: bool,
    default_dosage_per_day: i64,
}

#[derive(Debug)]
pub struct SeedResult {
    pub medicines: usize,
    pub users: usize,
    pub prescriptions: usize,
}

/// Load the demo dataset. Idempotent: rows are upserted by their fixed ids.
///
/// The dataset covers the interesting catalog shapes: an over-the-counter
/// medicine with deep stock, one sitting just above the low-stock threshold,
/// a prescription medicine the demo user holds a valid prescription for, one
/// whose prescription has lapsed, and one that is out of stock.
pub async fn seed_demo_dataset(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    for medicine in SEED_MEDICINES {
        tx.execute(
            sqlx::query(
                r#"
                INSERT INTO medicine
                    (id, name, unit_price, stock, requires_prescription,
                     default_dosage_per_day, low_stock_notified)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    unit_price = excluded.unit_price,
                    stock = excluded.stock,
                    requires_prescription = excluded.requires_prescription,
                    default_dosage_per_day = excluded.default_dosage_per_day
                "#,
            )
            .bind(medicine.id)
            .bind(medicine.name)
            .bind(medicine.unit_price)
            .bind(medicine.stock)
            .bind(medicine.requires_prescription)
            .bind(medicine.default_dosage_per_day),
        )
        .await?;
    }

    tx.execute(
        sqlx::query(
            r#"
            INSERT INTO user_account (id, name, email, phone, preferred_language)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone,
                preferred_language = excluded.preferred_language
            "#,
        )
        .bind(SEED_USER_ID)
        .bind("Asha Demo")
        .bind("asha@example.com")
        .bind("+1-555-0100")
        .bind("English"),
    )
    .await?;

    let prescriptions = [
        ("rx-demo-amoxicillin", "med-amoxicillin", now + Duration::days(90)),
        ("rx-demo-atorvastatin", "med-atorvastatin", now - Duration::days(30)),
    ];
    for (id, medicine_id, valid_till) in &prescriptions {
        tx.execute(
            sqlx::query(
                r#"
                INSERT INTO prescription
                    (id, user_id, medicine_id, prescribed_by, valid_till, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET valid_till = excluded.valid_till
                "#,
            )
            .bind(id)
            .bind(SEED_USER_ID)
            .bind(medicine_id)
            .bind("Dr. Mehta")
            .bind(valid_till.to_rfc3339())
            .bind(now.to_rfc3339()),
        )
        .await?;
    }

    tx.commit().await?;

    Ok(SeedResult { medicines: SEED_MEDICINES.len(), users: 1, prescriptions: prescriptions.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seed_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");

        let first = seed_demo_dataset(&pool).await.expect("first seed");
        let second = seed_demo_dataset(&pool).await.expect("second seed");
        assert_eq!(first.medicines, second.medicines);

        let medicine_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM medicine")
            .fetch_one(&pool)
            .await
            .expect("count medicines");
        assert_eq!(medicine_count, SEED_MEDICINES.len() as i64);

        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM user_account")
            .fetch_one(&pool)
            .await
            .expect("count users");
        assert_eq!(user_count, 1);
    }

    #[tokio::test]
    async fn seed_covers_prescription_shapes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");
        migrations::run_pending(&pool).await.expect("run migrations");
        seed_demo_dataset(&pool).await.expect("seed");

        let now = Utc::now().to_rfc3339();
        let valid: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM prescription WHERE user_id = ?1 AND valid_till > ?2",
        )
        .bind(SEED_USER_ID)
        .bind(&now)
        .fetch_one(&pool)
        .await
        .expect("count valid prescriptions");
        assert_eq!(valid, 1);

        let lapsed: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM prescription WHERE user_id = ?1 AND valid_till <= ?2",
        )
        .bind(SEED_USER_ID)
        .bind(&now)
        .fetch_one(&pool)
        .await
        .expect("count lapsed prescriptions");
        assert_eq!(lapsed, 1);
    }
}
