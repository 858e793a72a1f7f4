use std::{collections::BTreeMap, sync::Mutex};

use consumption_client::domain::ConsumptionRecord;

use crate::pipeline::{PipelineError, RecordStore};

/// In-process `RecordStore`, used for dry runs and tests.
///
/// Mirrors the table's primary key: inserting a date that is already stored
/// fails and leaves the store unchanged.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    rows: Mutex<BTreeMap<String, ConsumptionRecord>>,
}

impl MemoryRecordStore {
    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, ConsumptionRecord>>, PipelineError> {
        self.rows
            .lock()
            .map_err(|_| PipelineError::Store("memory store lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn clear_all(&self) -> Result<u64, PipelineError> {
        let mut rows = self.lock()?;
        let deleted = rows.len() as u64;
        rows.clear();
        Ok(deleted)
    }

    async fn insert(&self, records: &[ConsumptionRecord]) -> Result<(), PipelineError> {
        let mut rows = self.lock()?;

        let mut incoming = BTreeMap::new();
        for r in records {
            if rows.contains_key(&r.date) || incoming.insert(r.date.clone(), r.clone()).is_some() {
                return Err(PipelineError::Store(format!("duplicate date {}", r.date)));
            }
        }

        rows.extend(incoming);
        Ok(())
    }

    async fn query_by_date_range(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Vec<ConsumptionRecord>, PipelineError> {
        if from > to {
            return Ok(Vec::new());
        }
        let rows = self.lock()?;
        Ok(rows
            .range(from.to_string()..=to.to_string())
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn date_bounds(&self) -> Result<(Option<String>, Option<String>), PipelineError> {
        let rows = self.lock()?;
        Ok((
            rows.keys().next().cloned(),
            rows.keys().next_back().cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_dates_are_refused() {
        let store = MemoryRecordStore::default();
        store
            .insert(&[ConsumptionRecord::empty("2024-01-01")])
            .await
            .expect("first insert");

        let res = store.insert(&[ConsumptionRecord::empty("2024-01-01")]).await;
        assert!(matches!(res, Err(PipelineError::Store(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn range_query_is_inclusive_and_ordered() {
        let store = MemoryRecordStore::default();
        let records: Vec<_> = ["2024-01-03", "2024-01-01", "2024-01-02", "2024-02-01"]
            .into_iter()
            .map(ConsumptionRecord::empty)
            .collect();
        store.insert(&records).await.expect("insert");

        let dates: Vec<String> = store
            .query_by_date_range("2024-01-01", "2024-01-03")
            .await
            .expect("query")
            .into_iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, ["2024-01-01", "2024-01-02", "2024-01-03"]);

        assert!(store
            .query_by_date_range("2024-02-02", "2024-01-01")
            .await
            .expect("query")
            .is_empty());
    }

    #[tokio::test]
    async fn clear_reports_deleted_rows() {
        let store = MemoryRecordStore::default();
        assert_eq!(store.date_bounds().await.expect("bounds"), (None, None));

        store
            .insert(&[ConsumptionRecord::empty("2023-05-01"), ConsumptionRecord::empty("2024-05-01")])
            .await
            .expect("insert");
        assert_eq!(
            store.date_bounds().await.expect("bounds"),
            (Some("2023-05-01".to_string()), Some("2024-05-01".to_string()))
        );

        assert_eq!(store.clear_all().await.expect("clear"), 2);
        assert!(store.is_empty());
    }
}
