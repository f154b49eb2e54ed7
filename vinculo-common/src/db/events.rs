//! Analytics event storage

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::tracking::{EventName, TrackedEvent};
use crate::Result;

/// Append a validated event
pub async fn record_event(pool: &SqlitePool, event: &TrackedEvent, country: Option<&str>) -> Result<()> {
    let props = event.props.as_ref().map(|p| p.to_string());

    sqlx::query(
        r#"
        INSERT INTO analytics_events (guid, name, session_id, product, country, props)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(event.name.as_str())
    .bind(&event.session_id)
    .bind(event.product.map(|p| p.as_str()))
    .bind(country)
    .bind(props)
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of stored events with the given name
pub async fn count_events(pool: &SqlitePool, name: EventName) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_events WHERE name = ?")
        .bind(name.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ProductCode;
    use crate::db::init_memory_database;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_count() {
        let pool = init_memory_database().await.unwrap();
        let event = TrackedEvent {
            name: EventName::CheckoutStarted,
            session_id: "s-1".to_string(),
            product: Some(ProductCode::Deep),
            props: Some(json!({"source": "paywall"})),
        };

        record_event(&pool, &event, Some("ES")).await.unwrap();
        record_event(&pool, &event, None).await.unwrap();

        assert_eq!(count_events(&pool, EventName::CheckoutStarted).await.unwrap(), 2);
        assert_eq!(count_events(&pool, EventName::QuizStarted).await.unwrap(), 0);

        let country: Option<String> =
            sqlx::query_scalar("SELECT country FROM analytics_events WHERE country IS NOT NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(country.as_deref(), Some("ES"));
    }
}
