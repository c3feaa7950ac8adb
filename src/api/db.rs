use actix_web::HttpResponse;
use log::{log, Level};
use sqlx::{Error, Pool, Postgres, Transaction};

pub async fn open_transaction(
    db: &Pool<Postgres>,
) -> Result<Transaction<'static, Postgres>, HttpResponse> {
    match db.try_begin().await {
        Ok(Some(t)) => Ok(t),
        Ok(None) => {
            log!(Level::Error, "Failed to open transaction");
            Err(HttpResponse::InternalServerError().body("Internal DB Error: Ok(None) transaction"))
        }
        Err(e) => {
            log!(Level::Error, "Failed to open transaction");
            Err(HttpResponse::InternalServerError().body(format!("Internal DB Error: {}", e)))
        }
    }
}

/// Logs a failed query, rolls back the transaction it belongs to (if any),
/// and converts the failure into the response the handler should return.
pub async fn log_query<T>(
    query: Result<T, Error>,
    tx: Option<Transaction<'static, Postgres>>,
) -> Result<(Option<Transaction<'static, Postgres>>, T), HttpResponse> {
    match query {
        Ok(v) => Ok((tx, v)),
        Err(e) => {
            log!(Level::Warn, "DB Query failed: {}", e);
            if let Some(tx) = tx {
                match tx.rollback().await {
                    Ok(_) => {}
                    Err(tx_e) => {
                        log!(Level::Error, "Transaction failed to rollback: {}", tx_e);
                        return Err(HttpResponse::InternalServerError().body("Internal DB Error"));
                    }
                }
            }
            Err(HttpResponse::InternalServerError().body("Internal DB Error"))
        }
    }
}
