//! The inventory ledger: the only code path that writes variant stock.
//!
//! Reservation is a conditional decrement at the storage layer, never a
//! read-then-write pair, so concurrent checkouts for the same variant cannot
//! lose updates. Callers run `reserve`/`release` inside a transaction; a
//! failed reservation aborts the whole transaction, which is what makes a
//! multi-line reservation all-or-nothing.

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Statement};
use uuid::Uuid;

use crate::{
    entity::product_variants::{Column as VariantCol, Entity as Variants},
    error::{AppError, AppResult},
};

/// One reserved or released line. Carries the variant key so a shortfall can
/// be reported without another lookup.
#[derive(Debug, Clone)]
pub struct StockLine {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub size: String,
    pub color: String,
    pub quantity: i32,
}

/// Decrement stock for every line, or none of them.
///
/// Each line is a single `UPDATE ... SET stock = stock - q WHERE id = $v AND
/// stock >= q`; a miss means the variant cannot satisfy demand and the error
/// aborts the caller's transaction, rolling back any lines already taken.
pub async fn reserve<C: ConnectionTrait>(conn: &C, lines: &[StockLine]) -> AppResult<()> {
    for line in lines {
        let result = Variants::update_many()
            .col_expr(
                VariantCol::Stock,
                Expr::col(VariantCol::Stock).sub(line.quantity),
            )
            .filter(VariantCol::Id.eq(line.variant_id))
            .filter(VariantCol::Stock.gte(line.quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let available = Variants::find_by_id(line.variant_id)
                .one(conn)
                .await?
                .map(|v| v.stock)
                .ok_or(AppError::NotFound)?;
            return Err(AppError::InsufficientStock {
                product_id: line.product_id,
                size: line.size.clone(),
                color: line.color.clone(),
                available,
                requested: line.quantity,
            });
        }
    }

    refresh_totals(conn, lines).await
}

/// Give reserved stock back. The ledger does not track which order a release
/// belongs to; exactly-once is enforced by the caller's status transition in
/// the same transaction.
pub async fn release<C: ConnectionTrait>(conn: &C, lines: &[StockLine]) -> AppResult<()> {
    for line in lines {
        Variants::update_many()
            .col_expr(
                VariantCol::Stock,
                Expr::col(VariantCol::Stock).add(line.quantity),
            )
            .filter(VariantCol::Id.eq(line.variant_id))
            .exec(conn)
            .await?;
    }

    refresh_totals(conn, lines).await
}

/// Admin restock or correction, through the same single-writer path. The
/// conditional update refuses a decrement below zero.
pub async fn adjust<C: ConnectionTrait>(conn: &C, variant_id: Uuid, delta: i32) -> AppResult<()> {
    let mut update = Variants::update_many()
        .col_expr(VariantCol::Stock, Expr::col(VariantCol::Stock).add(delta))
        .filter(VariantCol::Id.eq(variant_id));
    if delta < 0 {
        update = update.filter(VariantCol::Stock.gte(-delta));
    }
    let result = update.exec(conn).await?;

    if result.rows_affected == 0 {
        let variant = Variants::find_by_id(variant_id)
            .one(conn)
            .await?
            .ok_or(AppError::NotFound)?;
        return Err(AppError::BadRequest(format!(
            "stock cannot go negative ({} available, delta {})",
            variant.stock, delta
        )));
    }

    let variant = Variants::find_by_id(variant_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;
    refresh_product_total(conn, variant.product_id).await
}

/// Recompute `products.total_stock` for every product touched by a mutation.
/// The summary is redundant by design; the variant rows stay the source of
/// truth.
async fn refresh_totals<C: ConnectionTrait>(conn: &C, lines: &[StockLine]) -> AppResult<()> {
    let mut product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    for product_id in product_ids {
        refresh_product_total(conn, product_id).await?;
    }
    Ok(())
}

async fn refresh_product_total<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<()> {
    conn.execute(Statement::from_sql_and_values(
        conn.get_database_backend(),
        r#"
        UPDATE products
        SET total_stock = (
            SELECT COALESCE(SUM(stock), 0)
            FROM product_variants
            WHERE product_id = $1
        )
        WHERE id = $1
        "#,
        [product_id.into()],
    ))
    .await?;
    Ok(())
}
