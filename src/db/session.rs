//! Session database operations

use crate::core::ledger::LedgerState;
use rusqlite::{params, Connection, Result as SqlResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Option<i64>,
    pub symbol: String,
    pub strategy: String,
    pub starting_capital: f64,
    pub final_equity: Option<f64>,
    pub realized_pnl: Option<f64>,
    pub total_fees: Option<f64>,
    pub fill_count: i64,
    pub outcome: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

impl SessionRecord {
    pub fn new(symbol: &str, strategy: &str, starting_capital: f64) -> Self {
        SessionRecord {
            id: None,
            symbol: symbol.to_string(),
            strategy: strategy.to_string(),
            starting_capital,
            final_equity: None,
            realized_pnl: None,
            total_fees: None,
            fill_count: 0,
            outcome: None,
            started_at: None,
            ended_at: None,
        }
    }

    fn from_row(row: &Row) -> SqlResult<Self> {
        Ok(SessionRecord {
            id: Some(row.get(0)?),
            symbol: row.get(1)?,
            strategy: row.get(2)?,
            starting_capital: row.get(3)?,
            final_equity: row.get(4)?,
            realized_pnl: row.get(5)?,
            total_fees: row.get(6)?,
            fill_count: row.get(7)?,
            outcome: row.get(8)?,
            started_at: Some(row.get(9)?),
            ended_at: row.get(10)?,
        })
    }

    /// Insert the session and return its id
    pub fn insert(&self, conn: Arc<Mutex<Connection>>) -> SqlResult<i64> {
        let conn = conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (symbol, strategy, starting_capital) VALUES (?1, ?2, ?3)",
            params![self.symbol, self.strategy, self.starting_capital],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Close out a session with its final ledger state and outcome
    pub fn finish(
        session_id: i64,
        state: &LedgerState,
        outcome: &str,
        conn: Arc<Mutex<Connection>>,
    ) -> SqlResult<()> {
        let conn = conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET
                final_equity = ?1,
                realized_pnl = ?2,
                total_fees = ?3,
                fill_count = ?4,
                outcome = ?5,
                ended_at = datetime('now')
             WHERE id = ?6",
            params![
                state.equity,
                state.realized_pnl,
                state.total_fees,
                state.fill_count as i64,
                outcome,
                session_id
            ],
        )?;
        Ok(())
    }

    /// Append an equity curve point
    pub fn record_equity(
        session_id: i64,
        state: &LedgerState,
        conn: Arc<Mutex<Connection>>,
    ) -> SqlResult<()> {
        let conn = conn.lock().unwrap();
        conn.execute(
            "INSERT INTO session_equity (session_id, cash, equity, realized_pnl, unrealized_pnl, as_of)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                state.cash,
                state.equity,
                state.realized_pnl,
                state.unrealized_pnl,
                state.as_of.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Log a raw quote observation
    pub fn record_quote(
        session_id: i64,
        quote: &crate::types::Quote,
        conn: Arc<Mutex<Connection>>,
    ) -> SqlResult<()> {
        let conn = conn.lock().unwrap();
        conn.execute(
            "INSERT INTO session_quotes (session_id, symbol, bid, ask, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                quote.symbol,
                quote.bid,
                quote.ask,
                quote.timestamp.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Fetch a session by id
    pub fn get(session_id: i64, conn: Arc<Mutex<Connection>>) -> SqlResult<SessionRecord> {
        let conn = conn.lock().unwrap();
        conn.query_row(
            "SELECT id, symbol, strategy, starting_capital, final_equity, realized_pnl,
                    total_fees, fill_count, outcome, started_at, ended_at
             FROM sessions WHERE id = ?1",
            params![session_id],
            SessionRecord::from_row,
        )
    }

    /// List the most recent sessions, newest first
    pub fn list_recent(limit: usize, conn: Arc<Mutex<Connection>>) -> SqlResult<Vec<SessionRecord>> {
        let conn = conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, strategy, starting_capital, final_equity, realized_pnl,
                    total_fees, fill_count, outcome, started_at, ended_at
             FROM sessions ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], SessionRecord::from_row)?;
        rows.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::Ledger;
    use crate::db::Database;

    fn store() -> Database {
        let db = Database::new_in_memory().unwrap();
        db.run_migrations().unwrap();
        db
    }

    #[test]
    fn test_session_round_trip() {
        let db = store();
        let record = SessionRecord::new("BTC-USDT", "macd-bollinger", 2000.0);
        let id = record.insert(db.get_connection()).unwrap();

        let loaded = SessionRecord::get(id, db.get_connection()).unwrap();
        assert_eq!(loaded.symbol, "BTC-USDT");
        assert_eq!(loaded.strategy, "macd-bollinger");
        assert!(loaded.ended_at.is_none());
    }

    #[test]
    fn test_finish_records_outcome() {
        let db = store();
        let id = SessionRecord::new("BTC-USDT", "hold", 2000.0)
            .insert(db.get_connection())
            .unwrap();

        let ledger = Ledger::new(2000.0);
        SessionRecord::finish(id, &ledger.snapshot(), "stopped", db.get_connection()).unwrap();

        let loaded = SessionRecord::get(id, db.get_connection()).unwrap();
        assert_eq!(loaded.outcome.as_deref(), Some("stopped"));
        assert_eq!(loaded.final_equity, Some(2000.0));
        assert!(loaded.ended_at.is_some());
    }

    #[test]
    fn test_equity_curve_appends() {
        let db = store();
        let id = SessionRecord::new("BTC-USDT", "hold", 2000.0)
            .insert(db.get_connection())
            .unwrap();

        let ledger = Ledger::new(2000.0);
        for _ in 0..3 {
            SessionRecord::record_equity(id, &ledger.snapshot(), db.get_connection()).unwrap();
        }

        let conn = db.get_connection();
        let conn = conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM session_equity WHERE session_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_list_recent_orders_newest_first() {
        let db = store();
        for symbol in ["A", "B", "C"] {
            SessionRecord::new(symbol, "hold", 1000.0)
                .insert(db.get_connection())
                .unwrap();
        }

        let sessions = SessionRecord::list_recent(2, db.get_connection()).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].symbol, "C");
        assert_eq!(sessions[1].symbol, "B");
    }
}
