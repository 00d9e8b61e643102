use sqlx::{sqlite::SqliteRow, Row};

use remedi_core::domain::medicine::MedicineId;
use remedi_core::domain::order::{Order, OrderId, OrderItem, OrderStatus};
use remedi_core::domain::user::UserId;

use super::{parse_decimal, parse_timestamp, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT medicine_id, medicine_name, quantity, dosage_per_day, unit_price
             FROM order_item
             WHERE order_id = ?
             ORDER BY id ASC",
        )
        .bind(&order_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(item_from_row).collect()
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<Order, RepositoryError> {
        let mut order = order_from_row(row)?;
        order.items = self.load_items(&order.id).await?;
        Ok(order)
    }
}

const SELECT_COLUMNS: &str = "SELECT
    id,
    user_id,
    total_amount,
    status,
    estimated_end_date,
    finalized_at,
    created_at
 FROM orders";

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn recent_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(&user_id.0)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows =
            sqlx::query(&format!("{SELECT_COLUMNS} WHERE user_id = ? ORDER BY created_at DESC"))
                .bind(&user_id.0)
                .fetch_all(&self.pool)
                .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn save(&self, order: Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (
                id,
                user_id,
                total_amount,
                status,
                estimated_end_date,
                finalized_at,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                total_amount = excluded.total_amount,
                status = excluded.status,
                estimated_end_date = excluded.estimated_end_date,
                finalized_at = excluded.finalized_at",
        )
        .bind(&order.id.0)
        .bind(&order.user_id.0)
        .bind(order.total_amount.to_string())
        .bind(order.status.as_str())
        .bind(order.estimated_end_date.to_rfc3339())
        .bind(order.finalized_at.map(|value| value.to_rfc3339()))
        .bind(order.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_item WHERE order_id = ?")
            .bind(&order.id.0)
            .execute(&mut *tx)
            .await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_item (
                    order_id,
                    medicine_id,
                    medicine_name,
                    quantity,
                    dosage_per_day,
                    unit_price
                 ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&order.id.0)
            .bind(&item.medicine_id.0)
            .bind(&item.medicine_name)
            .bind(i64::from(item.quantity))
            .bind(i64::from(item.dosage_per_day))
            .bind(item.unit_price.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, RepositoryError> {
    let status_raw = row.get::<String, _>("status");
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    Ok(Order {
        id: OrderId(row.get::<String, _>("id")),
        user_id: UserId(row.get::<String, _>("user_id")),
        items: Vec::new(),
        total_amount: parse_decimal(&row.get::<String, _>("total_amount"))?,
        status,
        estimated_end_date: parse_timestamp(&row.get::<String, _>("estimated_end_date"))?,
        finalized_at: row
            .get::<Option<String>, _>("finalized_at")
            .map(|raw| parse_timestamp(&raw))
            .transpose()?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

fn item_from_row(row: SqliteRow) -> Result<OrderItem, RepositoryError> {
    Ok(OrderItem {
        medicine_id: MedicineId(row.get::<String, _>("medicine_id")),
        medicine_name: row.get::<String, _>("medicine_name"),
        quantity: row.get::<i64, _>("quantity") as u32,
        dosage_per_day: row.get::<i64, _>("dosage_per_day") as u32,
        unit_price: parse_decimal(&row.get::<String, _>("unit_price"))?,
    })
}
