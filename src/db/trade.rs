//! Fill database operations

use crate::types::{Fill, Side};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillRecord {
    pub id: Option<i64>,
    pub session_id: i64,
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub is_maker: bool,
    pub executed_at: String,
}

impl FillRecord {
    pub fn from_fill(session_id: i64, fill: &Fill) -> Self {
        FillRecord {
            id: None,
            session_id,
            order_id: fill.order_id.to_string(),
            symbol: fill.symbol.clone(),
            side: fill.side,
            price: fill.price,
            quantity: fill.quantity,
            fee: fill.fee,
            is_maker: fill.is_maker,
            executed_at: fill.timestamp.to_rfc3339(),
        }
    }

    fn from_row(row: &Row) -> SqlResult<Self> {
        let side: String = row.get(4)?;
        Ok(FillRecord {
            id: Some(row.get(0)?),
            session_id: row.get(1)?,
            order_id: row.get(2)?,
            symbol: row.get(3)?,
            side: if side == "sell" { Side::Sell } else { Side::Buy },
            price: row.get(5)?,
            quantity: row.get(6)?,
            fee: row.get(7)?,
            is_maker: row.get::<_, i64>(8)? != 0,
            executed_at: row.get(9)?,
        })
    }

    pub fn insert(&self, conn: Arc<Mutex<Connection>>) -> SqlResult<i64> {
        let conn = conn.lock().unwrap();
        conn.execute(
            "INSERT INTO session_fills (
                session_id, order_id, symbol, side, price, quantity, fee, is_maker, executed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.session_id,
                self.order_id,
                self.symbol,
                self.side.to_string(),
                self.price,
                self.quantity,
                self.fee,
                self.is_maker as i64,
                self.executed_at
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Fills for a session in execution order
    pub fn for_session(session_id: i64, conn: Arc<Mutex<Connection>>) -> SqlResult<Vec<FillRecord>> {
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, order_id, symbol, side, price, quantity, fee, is_maker, executed_at
             FROM session_fills WHERE session_id = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![session_id], FillRecord::from_row)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SessionRecord};
    use chrono::Utc;
    use uuid::Uuid;

    fn fill(side: Side, price: f64) -> Fill {
        Fill {
            order_id: Uuid::new_v4(),
            symbol: "BTC-USDT".to_string(),
            side,
            price,
            quantity: 0.5,
            fee: 1.3,
            is_maker: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_fill_round_trip() {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();

        let session_id = SessionRecord::new("BTC-USDT", "hold", 2000.0)
            .insert(db.get_connection())
            .unwrap();

        FillRecord::from_fill(session_id, &fill(Side::Buy, 50_000.0))
            .insert(db.get_connection())
            .unwrap();
        FillRecord::from_fill(session_id, &fill(Side::Sell, 50_500.0))
            .insert(db.get_connection())
            .unwrap();

        let fills = FillRecord::for_session(session_id, db.get_connection()).unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].side, Side::Buy);
        assert_eq!(fills[1].side, Side::Sell);
        assert_eq!(fills[1].price, 50_500.0);
    }
}
